//! Memory-mapped hardware around the CPU.
//!
//! Every peripheral here is passive: it reacts to register accesses routed by
//! the system bus and to the scheduler events it registered itself. The only
//! way back to the core is the [`interrupt_control::IrqHandle`] each one holds.

pub mod dma;
pub mod internal_memory;
pub mod interrupt_control;
pub mod keypad;
pub mod lcd;
pub mod serial;
pub mod sound;
pub mod timers;
