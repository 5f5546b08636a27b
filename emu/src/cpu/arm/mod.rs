//! # ARM state (32-bit opcodes)
//!
//! Every opcode carries a condition in bits 31-28, checked against the CPSR
//! flags before anything else happens (see [`condition`](super::condition)).
//! [`instructions`] turns the remaining bits into an [`ArmModeInstruction`],
//! matching the most specific pattern first:
//!
//! ```text
//!  BX            cond 0001 0010 1111 1111 1111 0001 Rn
//!  MUL/MLA       cond 0000 00AS Rd   Rn   Rs   1001 Rm
//!  MULL/MLAL     cond 0000 1UAS RdHi RdLo Rs   1001 Rm
//!  SWP           cond 0001 0B00 Rn   Rd   0000 1001 Rm
//!  LDRH/LDRSB..  cond 000P UIWL Rn   Rd   off  1SH1 off
//!  MRS/MSR       cond 00I1 0P?0 ....
//!  data proc.    cond 00I  op  S Rn  Rd   operand2
//!  LDR/STR       cond 01IP UBWL Rn   Rd   offset
//!  LDM/STM       cond 100P USWL Rn   register list
//!  B/BL          cond 101L offset
//!  coprocessor   cond 110x / 1110     -> undefined exception
//!  SWI           cond 1111 comment
//! ```
//!
//! [`operations`] executes them against a [`crate::bus::Bus`], and
//! [`alu_instruction`] holds the sixteen ALU opcodes and the barrel shifter.
//! A shift amount taken from a register costs one internal cycle.
//!
//! [`ArmModeInstruction`]: instructions::ArmModeInstruction

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
pub mod alu_instruction;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::similar_names)]
pub mod instructions;

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_possible_wrap)]
#[allow(clippy::cast_lossless)]
#[allow(clippy::similar_names)]
pub mod operations;
