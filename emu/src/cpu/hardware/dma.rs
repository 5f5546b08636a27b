//! # DMA
//!
//! Four channels, each with a 12 byte register block at `0x0400_00B0 + 12 * n`:
//! source (SAD), destination (DAD), word count (`CNT_L`) and control (`CNT_H`).
//!
//! This module owns the register state and the trigger logic. The transfer
//! itself is run by the system bus, which is the only component able to reach
//! the whole memory map: it asks for a [`Transfer`] plan, moves the units and
//! reports back with [`Dma::finish`].
//!
//! ```text
//!  enable / VBlank / HBlank ──▶ trigger ──(2 cycles)──▶ DmaTransfer event
//!                                                          │
//!                     bus: begin() ─▶ n units ─▶ finish() ◀┘
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::hardware::interrupt_control::{Interrupt, IrqHandle};
use crate::scheduler::{EventKind, Scheduler};

/// Cycles between a trigger and the first unit being moved.
pub const START_DELAY: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DmaTiming {
    Immediate,
    VBlank,
    HBlank,
    Special,
}

impl From<u16> for DmaTiming {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => Self::Immediate,
            1 => Self::VBlank,
            2 => Self::HBlank,
            _ => Self::Special,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressControl {
    Increment,
    Decrement,
    Fixed,
    /// Increment, and reload the destination on every repeat.
    IncrementReload,
}

impl From<u16> for AddressControl {
    fn from(value: u16) -> Self {
        match value & 0b11 {
            0 => Self::Increment,
            1 => Self::Decrement,
            2 => Self::Fixed,
            _ => Self::IncrementReload,
        }
    }
}

impl AddressControl {
    const fn step(self, unit: u32) -> i32 {
        match self {
            Self::Increment | Self::IncrementReload => unit as i32,
            Self::Decrement => -(unit as i32),
            Self::Fixed => 0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct Registers {
    pub source_address: u32,
    pub destination_address: u32,
    pub word_count: u16,
    pub control: u16,
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
struct Channel {
    registers: Registers,
    /// Internal copies latched when the channel is enabled.
    source: u32,
    destination: u32,
    scheduled: bool,
}

/// One burst of a channel, executed by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub source: u32,
    pub destination: u32,
    pub units: u32,
    pub word_sized: bool,
    pub source_step: i32,
    pub destination_step: i32,
}

#[derive(Debug)]
pub struct Dma {
    channels: [Channel; 4],
    irq: IrqHandle,
}

const SOURCE_MASKS: [u32; 4] = [0x07FF_FFFF, 0x0FFF_FFFF, 0x0FFF_FFFF, 0x0FFF_FFFF];
const DESTINATION_MASKS: [u32; 4] = [0x07FF_FFFF, 0x07FF_FFFF, 0x07FF_FFFF, 0x0FFF_FFFF];

impl Dma {
    #[must_use]
    pub fn new(irq: IrqHandle) -> Self {
        Self {
            channels: [Channel::default(); 4],
            irq,
        }
    }

    #[must_use]
    pub fn registers(&self, channel: usize) -> &Registers {
        &self.channels[channel].registers
    }

    fn enabled(&self, channel: usize) -> bool {
        self.channels[channel].registers.control.get_bit(15)
    }

    fn timing(&self, channel: usize) -> DmaTiming {
        DmaTiming::from(self.channels[channel].registers.control.get_bits(12..=13))
    }

    fn unit_count(&self, channel: usize) -> u32 {
        let count = u32::from(self.channels[channel].registers.word_count);
        match (channel, count) {
            (3, 0) => 0x1_0000,
            (_, 0) => 0x4000,
            (3, count) => count,
            (_, count) => count & 0x3FFF,
        }
    }

    /// Only the control word is readable.
    #[must_use]
    pub fn read_register(&self, offset: u32) -> u8 {
        let channel = (offset / 12) as usize;
        match offset % 12 {
            10 => self.channels[channel].registers.control.get_byte(0),
            11 => self.channels[channel].registers.control.get_byte(1),
            _ => 0,
        }
    }

    /// `offset` is relative to `0x0400_00B0`.
    pub fn write_register(&mut self, offset: u32, value: u8, scheduler: &mut Scheduler) {
        let channel = (offset / 12) as usize;
        let byte = offset % 12;
        let registers = &mut self.channels[channel].registers;

        match byte {
            0..=3 => registers.source_address.set_byte(byte as u8, value),
            4..=7 => registers.destination_address.set_byte((byte - 4) as u8, value),
            8 | 9 => registers.word_count.set_byte((byte - 8) as u8, value),
            10 => registers.control.set_byte(0, value & 0xE0),
            _ => {
                let was_enabled = self.enabled(channel);
                self.channels[channel].registers.control.set_byte(1, value);
                if !was_enabled && self.enabled(channel) {
                    self.enable(channel, scheduler);
                }
            }
        }
    }

    fn enable(&mut self, channel: usize, scheduler: &mut Scheduler) {
        let state = &mut self.channels[channel];
        state.source = state.registers.source_address & SOURCE_MASKS[channel];
        state.destination = state.registers.destination_address & DESTINATION_MASKS[channel];

        if self.timing(channel) == DmaTiming::Immediate {
            self.schedule(channel, scheduler);
        }
    }

    fn schedule(&mut self, channel: usize, scheduler: &mut Scheduler) {
        let state = &mut self.channels[channel];
        if !state.scheduled {
            state.scheduled = true;
            scheduler.add_event(START_DELAY, EventKind::DmaTransfer { channel });
        }
    }

    /// Starts every enabled channel waiting for `timing`.
    pub fn trigger(&mut self, timing: DmaTiming, scheduler: &mut Scheduler) {
        for channel in 0..self.channels.len() {
            if self.enabled(channel) && self.timing(channel) == timing {
                // Special timing is audio FIFO / video capture, neither is driven here.
                if timing != DmaTiming::Special {
                    self.schedule(channel, scheduler);
                }
            }
        }
    }

    /// Plan for the channel's next burst, `None` if it was disabled meanwhile.
    pub fn begin(&mut self, channel: usize) -> Option<Transfer> {
        self.channels[channel].scheduled = false;
        if !self.enabled(channel) {
            return None;
        }

        let control = self.channels[channel].registers.control;
        let word_sized = control.get_bit(10);
        let unit = if word_sized { 4 } else { 2 };
        let state = &self.channels[channel];

        let transfer = Transfer {
            source: state.source,
            destination: state.destination,
            units: self.unit_count(channel),
            word_sized,
            source_step: AddressControl::from(control.get_bits(7..=8)).step(unit),
            destination_step: AddressControl::from(control.get_bits(5..=6)).step(unit),
        };

        tracing::debug!(
            "DMA{channel}: {} x {unit} bytes from {:#010X} to {:#010X}",
            transfer.units,
            transfer.source,
            transfer.destination
        );

        Some(transfer)
    }

    /// Stores the advanced addresses, handles repeat and raises the IRQ.
    pub fn finish(&mut self, channel: usize, source: u32, destination: u32) {
        let control = self.channels[channel].registers.control;
        let state = &mut self.channels[channel];
        state.source = source & SOURCE_MASKS[channel];
        state.destination = destination & DESTINATION_MASKS[channel];

        let repeat = control.get_bit(9)
            && DmaTiming::from(control.get_bits(12..=13)) != DmaTiming::Immediate;
        if repeat {
            if AddressControl::from(control.get_bits(5..=6)) == AddressControl::IncrementReload {
                state.destination =
                    state.registers.destination_address & DESTINATION_MASKS[channel];
            }
        } else {
            state.registers.control.set_bit_off(15);
        }

        if control.get_bit(14) {
            self.irq.request(Interrupt::dma(channel));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::interrupt_control::InterruptControl;
    use pretty_assertions::assert_eq;

    fn write(dma: &mut Dma, offset: u32, value: u32, bytes: u32, scheduler: &mut Scheduler) {
        for byte in 0..bytes {
            dma.write_register(offset + byte, value.get_byte(byte as u8), scheduler);
        }
    }

    fn configure(dma: &mut Dma, channel: u32, control: u16, scheduler: &mut Scheduler) {
        let base = channel * 12;
        write(dma, base, 0x0200_0000, 4, scheduler);
        write(dma, base + 4, 0x0300_0000, 4, scheduler);
        write(dma, base + 8, 4, 2, scheduler);
        write(dma, base + 10, u32::from(control), 2, scheduler);
    }

    #[test]
    fn immediate_channel_starts_after_delay() {
        let control = InterruptControl::new();
        let mut dma = Dma::new(control.handle());
        let mut scheduler = Scheduler::new();

        configure(&mut dma, 3, 0xC400, &mut scheduler);

        scheduler.advance(1);
        assert_eq!(scheduler.pop_pending(), None);
        scheduler.advance(1);
        assert_eq!(
            scheduler.pop_pending(),
            Some((EventKind::DmaTransfer { channel: 3 }, 0))
        );

        let transfer = dma.begin(3);
        assert_eq!(
            transfer,
            Some(Transfer {
                source: 0x0200_0000,
                destination: 0x0300_0000,
                units: 4,
                word_sized: true,
                source_step: 4,
                destination_step: 4,
            })
        );

        dma.finish(3, 0x0200_0010, 0x0300_0010);
        assert_eq!(control.pending(), Interrupt::Dma3.mask());
        assert_eq!(dma.read_register(3 * 12 + 11), 0x44);
    }

    #[test]
    fn blank_channels_wait_for_their_trigger() {
        let control = InterruptControl::new();
        let mut dma = Dma::new(control.handle());
        let mut scheduler = Scheduler::new();

        // HBlank, repeat, dest increment/reload, source fixed, half-words
        configure(&mut dma, 1, 0xA360, &mut scheduler);
        assert_eq!(scheduler.pending_events(), 0);

        dma.trigger(DmaTiming::VBlank, &mut scheduler);
        assert_eq!(scheduler.pending_events(), 0);

        dma.trigger(DmaTiming::HBlank, &mut scheduler);
        dma.trigger(DmaTiming::HBlank, &mut scheduler);
        assert_eq!(scheduler.pending_events(), 1);

        let transfer = dma.begin(1);
        assert_eq!(transfer.map(|t| (t.source_step, t.destination_step)), Some((0, 2)));

        dma.finish(1, 0x0200_0000, 0x0300_0008);
        // Repeat keeps the channel on and reloads the destination.
        assert_eq!(dma.read_register(12 + 11) & 0x80, 0x80);
        assert_eq!(dma.begin(1).map(|t| t.destination), Some(0x0300_0000));
        assert_eq!(control.pending(), 0);
    }

    #[test]
    fn zero_count_means_maximum() {
        let control = InterruptControl::new();
        let mut dma = Dma::new(control.handle());
        let mut scheduler = Scheduler::new();

        write(&mut dma, 10, 0x8000, 2, &mut scheduler);
        write(&mut dma, 36 + 10, 0x8000, 2, &mut scheduler);

        assert_eq!(dma.begin(0).map(|t| t.units), Some(0x4000));
        assert_eq!(dma.begin(3).map(|t| t.units), Some(0x1_0000));
    }

    #[test]
    fn source_address_is_masked_per_channel() {
        let control = InterruptControl::new();
        let mut dma = Dma::new(control.handle());
        let mut scheduler = Scheduler::new();

        write(&mut dma, 0, 0x0E00_0000, 4, &mut scheduler);
        write(&mut dma, 10, 0x8000, 2, &mut scheduler);

        assert_eq!(dma.begin(0).map(|t| t.source), Some(0x0600_0000));
    }
}
