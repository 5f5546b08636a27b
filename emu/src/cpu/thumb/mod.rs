//! # Thumb Instruction Set (16-bit)
//!
//! A compressed subset of the ARM instructions, executed on the same core.
//! Only branches are conditional.

pub mod alu_instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::missing_panics_doc)]
pub mod operations;
