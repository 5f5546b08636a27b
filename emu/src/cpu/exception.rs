use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;

/// Exceptions the core can take. Aborts and FIQ have no source on this
/// system and are not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exception {
    Reset,
    Undefined,
    SoftwareInterrupt,
    Irq,
}

impl Exception {
    #[must_use]
    pub const fn vector(self) -> u32 {
        match self {
            Self::Reset => 0x00,
            Self::Undefined => 0x04,
            Self::SoftwareInterrupt => 0x08,
            Self::Irq => 0x18,
        }
    }

    #[must_use]
    pub const fn target_mode(self) -> Mode {
        match self {
            Self::Reset | Self::SoftwareInterrupt => Mode::Supervisor,
            Self::Undefined => Mode::Undefined,
            Self::Irq => Mode::Irq,
        }
    }

    #[must_use]
    pub const fn disables_fiq(self) -> bool {
        matches!(self, Self::Reset)
    }
}
