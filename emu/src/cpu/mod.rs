//! # ARM7TDMI
//!
//! The core is split in decoding (`arm::instructions`, `thumb::instruction`),
//! execution (`arm::operations`, `thumb::operations`) and the machine state in
//! [`arm7tdmi`]. Everything outside the CPU is reached through [`crate::bus::Bus`].

pub mod arm;

#[allow(clippy::cast_lossless)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::large_stack_frames)]
#[allow(clippy::module_name_repetitions)]
pub mod arm7tdmi;
pub mod condition;
pub mod cpu_modes;

#[cfg(feature = "debugger")]
pub mod debugger;
pub mod exception;

#[allow(clippy::cast_possible_truncation)]
pub mod flags;

#[allow(clippy::cast_possible_truncation)]
pub mod hardware;
pub mod psr;
pub mod register_bank;
pub mod registers;
pub mod thumb;
