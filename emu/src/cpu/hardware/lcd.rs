//! LCD controller timing and video memory.
//!
//! The GBA LCD is 240x160 pixels. Pixel composition is left to the
//! presentation side, which reads [`Memory`] and DISPCNT. This module drives
//! the scanline state machine that software synchronizes against.
//!
//! # Display Timing
//!
//! One pixel every 4 CPU cycles, 308 pixel slots per line:
//!
//! ```text
//!                    240 pixels          68 pixels
//!                   ◄──────────►       ◄──────────►
//!               ┌─────────────────────────────────────┐
//!               │                      │              │
//!    160 lines  │      Visible         │   HBlank    │ VDraw
//!               │      (VDraw)         │             │
//!               ├──────────────────────┼─────────────┤
//!     68 lines  │                VBlank              │ VBlank
//!               └─────────────────────────────────────┘
//! ```
//!
//! Two events alternate forever: `HBlankStart` fires [`HDRAW_CYCLES`] into a
//! line, `LineEnd` fires [`HBLANK_CYCLES`] later. Each one re-arms the other
//! with the nominal duration minus its own lateness.
//!
//! # Interrupts
//!
//! Enabled through DISPSTAT:
//! - **V-Blank**: entering line 160
//! - **H-Blank**: at the start of every HBlank, VBlank lines included
//! - **V-Count**: when VCOUNT becomes equal to the DISPSTAT setting

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::dma::DmaTiming;
use crate::cpu::hardware::interrupt_control::{Interrupt, IrqHandle};
use crate::scheduler::{EventKind, Scheduler};

pub use self::memory::Memory;

mod memory;

/// GBA display width
pub const LCD_WIDTH: usize = 240;

/// GBA display height
pub const LCD_HEIGHT: usize = 160;

pub const HDRAW_CYCLES: u64 = 960;
pub const HBLANK_CYCLES: u64 = 272;
pub const CYCLES_PER_LINE: u64 = HDRAW_CYCLES + HBLANK_CYCLES;
pub const TOTAL_LINES: u16 = 228;
pub const CYCLES_PER_FRAME: u64 = CYCLES_PER_LINE * TOTAL_LINES as u64;

const VBLANK_FLAG: u8 = 0;
const HBLANK_FLAG: u8 = 1;
const VCOUNT_FLAG: u8 = 2;
const VBLANK_IRQ_ENABLE: u8 = 3;
const HBLANK_IRQ_ENABLE: u8 = 4;
const VCOUNT_IRQ_ENABLE: u8 = 5;

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct Registers {
    /// LCD Control
    pub dispcnt: u16,
    /// Undocumented
    pub green_swap: u16,
    /// General LCD Status (STAT, LYC)
    pub dispstat: u16,
    /// Vertical Counter (LY)
    pub vcount: u16,
}

impl Registers {
    fn vcount_setting(&self) -> u16 {
        self.dispstat.get_bits(8..=15)
    }
}

pub struct Lcd {
    registers: Registers,
    pub(crate) memory: Memory,
    frame_complete: bool,
    frames: u64,
    irq: IrqHandle,
}

impl Lcd {
    #[must_use]
    pub fn new(irq: IrqHandle) -> Self {
        Self {
            registers: Registers {
                // VCOUNT and its compare value both start at 0.
                dispstat: 1 << VCOUNT_FLAG,
                ..Registers::default()
            },
            memory: Memory::default(),
            frame_complete: false,
            frames: 0,
            irq,
        }
    }

    /// Arms the scanline state machine at the start of line 0.
    pub fn start(&self, scheduler: &mut Scheduler) {
        scheduler.add_event(HDRAW_CYCLES, EventKind::HBlankStart);
    }

    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.registers
    }

    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// True once per frame, at the start of VBlank.
    pub const fn take_frame_complete(&mut self) -> bool {
        let complete = self.frame_complete;
        self.frame_complete = false;
        complete
    }

    /// Handles `HBlankStart`. Returns the DMA timing to trigger, if any.
    pub fn hblank_start(&mut self, late: u64, scheduler: &mut Scheduler) -> Option<DmaTiming> {
        self.registers.dispstat.set_bit_on(HBLANK_FLAG);
        if self.registers.dispstat.get_bit(HBLANK_IRQ_ENABLE) {
            self.irq.request(Interrupt::HBlank);
        }

        scheduler.add_periodic_event(HBLANK_CYCLES, late, EventKind::LineEnd);

        (usize::from(self.registers.vcount) < LCD_HEIGHT).then_some(DmaTiming::HBlank)
    }

    /// Handles `LineEnd`. Returns the DMA timing to trigger, if any.
    pub fn line_end(&mut self, late: u64, scheduler: &mut Scheduler) -> Option<DmaTiming> {
        self.registers.dispstat.set_bit_off(HBLANK_FLAG);

        self.registers.vcount = (self.registers.vcount + 1) % TOTAL_LINES;
        self.update_vcount_match(true);

        let mut dma = None;
        match self.registers.vcount {
            160 => {
                self.registers.dispstat.set_bit_on(VBLANK_FLAG);
                if self.registers.dispstat.get_bit(VBLANK_IRQ_ENABLE) {
                    self.irq.request(Interrupt::VBlank);
                }
                self.frame_complete = true;
                self.frames += 1;
                dma = Some(DmaTiming::VBlank);
            }
            // The flag is already clear on the last line.
            227 => self.registers.dispstat.set_bit_off(VBLANK_FLAG),
            _ => {}
        }

        scheduler.add_periodic_event(HDRAW_CYCLES, late, EventKind::HBlankStart);
        dma
    }

    fn update_vcount_match(&mut self, raise: bool) {
        let matches = self.registers.vcount == self.registers.vcount_setting();
        self.registers.dispstat.set_bit(VCOUNT_FLAG, matches);
        if matches && raise && self.registers.dispstat.get_bit(VCOUNT_IRQ_ENABLE) {
            self.irq.request(Interrupt::VCount);
        }
    }

    /// `offset` is relative to DISPCNT (`0x0400_0000`).
    #[must_use]
    pub fn read_register(&self, offset: u32) -> u8 {
        let byte = (offset & 1) as u8;
        match offset {
            0 | 1 => self.registers.dispcnt.get_byte(byte),
            2 | 3 => self.registers.green_swap.get_byte(byte),
            4 | 5 => self.registers.dispstat.get_byte(byte),
            6 | 7 => self.registers.vcount.get_byte(byte),
            _ => 0,
        }
    }

    pub fn write_register(&mut self, offset: u32, value: u8) {
        let byte = (offset & 1) as u8;
        match offset {
            0 | 1 => self.registers.dispcnt.set_byte(byte, value),
            2 | 3 => self.registers.green_swap.set_byte(byte, value),
            4 => {
                // The three status flags are read only.
                let flags = self.registers.dispstat & 0b111;
                self.registers.dispstat.set_byte(0, value & 0x38);
                self.registers.dispstat |= flags;
            }
            5 => {
                self.registers.dispstat.set_byte(1, value);
                self.update_vcount_match(false);
            }
            _ => tracing::debug!("write to read-only VCOUNT ignored"),
        }
    }
}
