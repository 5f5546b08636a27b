//! Game Boy Advance emulation core.
//!
//! [`gba::Gba`] ties an ARM7TDMI ([`cpu::arm7tdmi`]) to the memory map in
//! [`system_bus`]. All time flows through one [`scheduler::Scheduler`]: the
//! CPU charges cycles on every bus access, and the peripherals in
//! [`cpu::hardware`] react to the events they scheduled, raising interrupts
//! through their [`cpu::hardware::interrupt_control::IrqHandle`].
//!
//! The crate does no file I/O and installs no `tracing` subscriber.

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
mod bitwise;

#[allow(clippy::missing_panics_doc)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::large_stack_frames)]
#[allow(clippy::unreadable_literal)]
pub mod bus;

#[allow(clippy::cast_possible_truncation)]
pub mod cpu;
pub mod error;
pub mod gba;
pub mod scheduler;

#[allow(clippy::cast_possible_truncation)]
pub mod system_bus;
