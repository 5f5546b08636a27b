//! # Processor Modes
//!
//! | Mode       | Bits  | Banked registers     | SPSR |
//! |------------|-------|----------------------|------|
//! | User       | 10000 | -                    | no   |
//! | FIQ        | 10001 | R8-R14               | yes  |
//! | IRQ        | 10010 | R13-R14              | yes  |
//! | Supervisor | 10011 | R13-R14              | yes  |
//! | Abort      | 10111 | R13-R14              | yes  |
//! | Undefined  | 11011 | R13-R14              | yes  |
//! | System     | 11111 | - (shares User bank) | no   |

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// The normal ARM program execution state.
    User = 0b10000,

    /// Designed to support a data transfer or channel process.
    Fiq = 0b10001,

    /// Used for general-purpose interrupt handling.
    Irq = 0b10010,

    /// Protected mode for the operating system
    Supervisor = 0b10011,

    /// Entered after a data or instruction prefetch abort.
    Abort = 0b10111,

    /// Entered when an undefined instruction is executed
    Undefined = 0b11011,

    /// A privileged user mode for the operating system.
    System = 0b11111,
}

/// Mode bits that do not name any ARM7TDMI mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid processor mode bits 0b{0:05b}")]
pub struct InvalidMode(pub u32);

impl Mode {
    /// Number of distinct R13/R14/SPSR banks (User and System share one).
    pub const BANKS: usize = 6;

    /// Row of the bank table holding this mode's R13, R14 and SPSR.
    #[must_use]
    pub const fn bank_index(self) -> usize {
        match self {
            Self::User | Self::System => 0,
            Self::Fiq => 1,
            Self::Irq => 2,
            Self::Supervisor => 3,
            Self::Abort => 4,
            Self::Undefined => 5,
        }
    }

    #[must_use]
    pub const fn is_privileged(self) -> bool {
        !matches!(self, Self::User)
    }

    #[must_use]
    pub const fn has_spsr(self) -> bool {
        !matches!(self, Self::User | Self::System)
    }
}

impl From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as Self
    }
}

impl TryFrom<u32> for Mode {
    type Error = InvalidMode;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        match n {
            0b10000 => Ok(Self::User),
            0b10001 => Ok(Self::Fiq),
            0b10010 => Ok(Self::Irq),
            0b10011 => Ok(Self::Supervisor),
            0b10111 => Ok(Self::Abort),
            0b11011 => Ok(Self::Undefined),
            0b11111 => Ok(Self::System),
            _ => Err(InvalidMode(n)),
        }
    }
}
