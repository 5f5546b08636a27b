//! # Conditional Execution
//!
//! Every ARM instruction carries a 4-bit condition in bits 31-28; in Thumb
//! state only the conditional branch (format 16) has one. The instruction is
//! executed only if the CPSR flags satisfy it, see
//! [`Psr::can_execute`](super::psr::Psr::can_execute).
//!
//! ```text
//! Code  Suffix  Flags tested        Code  Suffix  Flags tested
//! 0000  EQ      Z=1                 1000  HI      C=1 and Z=0
//! 0001  NE      Z=0                 1001  LS      C=0 or Z=1
//! 0010  CS      C=1                 1010  GE      N=V
//! 0011  CC      C=0                 1011  LT      N!=V
//! 0100  MI      N=1                 1100  GT      Z=0 and N=V
//! 0101  PL      N=0                 1101  LE      Z=1 or N!=V
//! 0110  VS      V=1                 1110  AL      always
//! 0111  VC      V=0                 1111  NV      never (reserved)
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Eq, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub enum Condition {
    EQ = 0x0,
    NE = 0x1,
    CS = 0x2,
    CC = 0x3,
    MI = 0x4,
    PL = 0x5,
    VS = 0x6,
    VC = 0x7,
    HI = 0x8,
    LS = 0x9,
    GE = 0xA,
    LT = 0xB,
    GT = 0xC,
    LE = 0xD,
    AL = 0xE,
    NV = 0xF,
}

impl From<u32> for Condition {
    fn from(item: u32) -> Self {
        match item & 0xF {
            0x0 => Self::EQ,
            0x1 => Self::NE,
            0x2 => Self::CS,
            0x3 => Self::CC,
            0x4 => Self::MI,
            0x5 => Self::PL,
            0x6 => Self::VS,
            0x7 => Self::VC,
            0x8 => Self::HI,
            0x9 => Self::LS,
            0xA => Self::GE,
            0xB => Self::LT,
            0xC => Self::GT,
            0xD => Self::LE,
            0xE => Self::AL,
            _ => Self::NV,
        }
    }
}

impl From<u16> for Condition {
    fn from(item: u16) -> Self {
        u32::from(item).into()
    }
}
