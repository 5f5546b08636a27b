//! Serial I/O with no link partner attached.
//!
//! Only the transfer timing of normal and multiplayer mode is modeled: a
//! transfer started with the internal clock completes after the configured
//! number of bits, and the "received" data is all ones like an open line.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::{Interrupt, IrqHandle};
use crate::scheduler::{EventKind, Scheduler};

/// Cycles per bit at 256 KHz and 2 MHz shift clock.
pub const CYCLES_PER_BIT: [u64; 2] = [64, 8];

/// Multiplayer transfers take roughly one 16 bit frame at 115200 bauds.
const MULTIPLAYER_TRANSFER_CYCLES: u64 = 2_560;

const START_BIT: u8 = 7;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
struct Registers {
    /// SIODATA32, also SIOMULTI0/1.
    data_32: u32,
    /// SIOMULTI2/3.
    multi: [u16; 2],
    /// SIOCNT
    control: u16,
    /// SIODATA8, also SIOMLT_SEND.
    data_8: u16,
    /// RCNT
    mode_select: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SerialMode {
    Normal8,
    Normal32,
    Multiplayer,
    Other,
}

#[derive(Debug)]
pub struct Serial {
    registers: Registers,
    irq: IrqHandle,
}

impl Serial {
    #[must_use]
    pub fn new(irq: IrqHandle) -> Self {
        Self {
            registers: Registers::default(),
            irq,
        }
    }

    fn mode(&self) -> SerialMode {
        if self.registers.mode_select.get_bit(15) {
            return SerialMode::Other;
        }

        match self.registers.control.get_bits(12..=13) {
            0 => SerialMode::Normal8,
            1 => SerialMode::Normal32,
            2 => SerialMode::Multiplayer,
            _ => SerialMode::Other,
        }
    }

    fn transfer_cycles(&self) -> Option<u64> {
        let internal_clock = self.registers.control.get_bit(0);
        let per_bit = CYCLES_PER_BIT[usize::from(self.registers.control.get_bit(1))];

        match self.mode() {
            SerialMode::Normal8 if internal_clock => Some(8 * per_bit),
            SerialMode::Normal32 if internal_clock => Some(32 * per_bit),
            SerialMode::Multiplayer => Some(MULTIPLAYER_TRANSFER_CYCLES),
            // External clock with nobody on the other side never completes.
            _ => None,
        }
    }

    /// `offset` is relative to `0x0400_0120`.
    #[must_use]
    pub fn read_register(&self, offset: u32) -> u8 {
        let registers = &self.registers;
        match offset {
            0..=3 => registers.data_32.get_byte(offset as u8),
            4 | 5 => registers.multi[0].get_byte((offset - 4) as u8),
            6 | 7 => registers.multi[1].get_byte((offset - 6) as u8),
            8 | 9 => registers.control.get_byte((offset - 8) as u8),
            10 | 11 => registers.data_8.get_byte((offset - 10) as u8),
            0x14 | 0x15 => registers.mode_select.get_byte((offset - 0x14) as u8),
            _ => 0,
        }
    }

    pub fn write_register(&mut self, offset: u32, value: u8, scheduler: &mut Scheduler) {
        let registers = &mut self.registers;
        match offset {
            0..=3 => registers.data_32.set_byte(offset as u8, value),
            4 | 5 => registers.multi[0].set_byte((offset - 4) as u8, value),
            6 | 7 => registers.multi[1].set_byte((offset - 6) as u8, value),
            8 => {
                let was_active = registers.control.get_bit(START_BIT);
                registers.control.set_byte(0, value);
                if !was_active && value.get_bit(START_BIT) {
                    self.start(scheduler);
                }
            }
            9 => registers.control.set_byte(1, value),
            10 | 11 => registers.data_8.set_byte((offset - 10) as u8, value),
            0x14 | 0x15 => registers.mode_select.set_byte((offset - 0x14) as u8, value),
            _ => {}
        }
    }

    fn start(&self, scheduler: &mut Scheduler) {
        if let Some(cycles) = self.transfer_cycles() {
            tracing::debug!("serial transfer started ({:?}, {cycles} cycles)", self.mode());
            scheduler.add_event(cycles, EventKind::SerialTransfer);
        }
    }

    /// Handles the `SerialTransfer` event.
    pub fn complete_transfer(&mut self) {
        if !self.registers.control.get_bit(START_BIT) {
            return;
        }

        match self.mode() {
            SerialMode::Normal8 => self.registers.data_8.set_byte(0, 0xFF),
            SerialMode::Normal32 => self.registers.data_32 = u32::MAX,
            SerialMode::Multiplayer => {
                // Slot 0 is the master's own data, the other slots stay empty.
                self.registers.data_32 = (self.registers.data_32 & 0xFFFF) | 0xFFFF_0000;
                self.registers.multi = [0xFFFF; 2];
            }
            SerialMode::Other => {}
        }

        self.registers.control.set_bit_off(START_BIT);
        tracing::debug!("serial transfer complete");

        if self.registers.control.get_bit(14) {
            self.irq.request(Interrupt::Serial);
        }
    }
}
