//! # Banked Registers for Exception Modes
//!
//! Storage for the registers that are swapped out when changing CPU modes.
//! Instead of one named field per banked register, the storage is a pair of
//! tables indexed by bank number:
//!
//! ```text
//!            R8-R12 table            R13/R14 + SPSR table
//!  row 0     User/System/IRQ/...     User/System (no SPSR)
//!  row 1     FIQ                     FIQ
//!  row 2                             IRQ
//!  row 3                             Supervisor
//!  row 4                             Abort
//!  row 5                             Undefined
//! ```
//!
//! The active values live in [`Registers`]; on a mode switch the outgoing
//! mode's rows are saved and the incoming mode's rows are loaded.

use serde::{Deserialize, Serialize};

use crate::cpu::cpu_modes::Mode;
use crate::cpu::psr::Psr;
use crate::cpu::registers::{REG_LR, REG_SP, Registers};

const FIQ_ROW: usize = 1;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    /// R8-R12, row 0 is shared by every mode but FIQ.
    high: [[u32; 5]; 2],
    /// R13 and R14, one row per [`Mode::bank_index`].
    stack_link: [[u32; 2]; Mode::BANKS],
    /// SPSR per bank, row 0 (User/System) is never used.
    spsr: [Psr; Mode::BANKS],
}

const fn high_row(mode: Mode) -> usize {
    match mode {
        Mode::Fiq => FIQ_ROW,
        _ => 0,
    }
}

impl RegisterBank {
    /// Saves the `from` bank out of `registers` and loads the `to` bank in.
    pub fn switch(&mut self, registers: &mut Registers, from: Mode, to: Mode) {
        let (from_high, to_high) = (high_row(from), high_row(to));
        if from_high != to_high {
            for (i, reg) in (8..=12).enumerate() {
                self.high[from_high][i] = registers.register_at(reg);
                registers.set_register_at(reg, self.high[to_high][i]);
            }
        }

        let (from_row, to_row) = (from.bank_index(), to.bank_index());
        if from_row != to_row {
            self.stack_link[from_row] = [registers.register_at(REG_SP), registers.register_at(REG_LR)];
            let [sp, lr] = self.stack_link[to_row];
            registers.set_register_at(REG_SP, sp);
            registers.set_register_at(REG_LR, lr);
        }
    }

    #[must_use]
    pub const fn spsr(&self, mode: Mode) -> Psr {
        self.spsr[mode.bank_index()]
    }

    pub const fn set_spsr(&mut self, mode: Mode, value: Psr) {
        self.spsr[mode.bank_index()] = value;
    }

    /// Reads a User-bank register while in another mode (`STM ^`).
    /// `registers` must be the active view of `current`.
    #[must_use]
    pub const fn user_register(&self, registers: &Registers, current: Mode, reg: usize) -> u32 {
        match reg {
            8..=12 if high_row(current) != 0 => self.high[0][reg - 8],
            13 | 14 if current.bank_index() != 0 => self.stack_link[0][reg - 13],
            _ => registers.register_at(reg),
        }
    }

    /// Writes a User-bank register while in another mode (`LDM ^`).
    pub const fn set_user_register(
        &mut self,
        registers: &mut Registers,
        current: Mode,
        reg: usize,
        value: u32,
    ) {
        match reg {
            8..=12 if high_row(current) != 0 => self.high[0][reg - 8] = value,
            13 | 14 if current.bank_index() != 0 => self.stack_link[0][reg - 13] = value,
            _ => registers.set_register_at(reg, value),
        }
    }

    /// Stack pointer of a mode that is not the active one (skip-BIOS setup).
    pub const fn set_banked_sp(&mut self, mode: Mode, value: u32) {
        self.stack_link[mode.bank_index()][0] = value;
    }
}
