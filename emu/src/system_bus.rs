//! # System Bus
//!
//! The GBA memory map behind the [`Bus`] trait. It owns every peripheral and
//! the [`Scheduler`], so it is also where elapsed cycles turn into fired
//! events.
//!
//! | Region                    | Bus    | Cycles (N/S, 16-bit access)     |
//! |---------------------------|--------|---------------------------------|
//! | `0x0000_0000` BIOS        | 32 bit | 1                               |
//! | `0x0200_0000` EWRAM       | 16 bit | 3                               |
//! | `0x0300_0000` IWRAM       | 32 bit | 1                               |
//! | `0x0400_0000` I/O         | 32 bit | 1                               |
//! | `0x0500_0000` Palette     | 16 bit | 1                               |
//! | `0x0600_0000` VRAM        | 16 bit | 1                               |
//! | `0x0700_0000` OAM         | 32 bit | 1                               |
//! | `0x0800_0000` ROM WS0-2   | 16 bit | from WAITCNT                    |
//! | `0x0E00_0000` SRAM        | 8 bit  | from WAITCNT                    |
//!
//! A 32-bit access on a 16-bit bus is two accesses: N+S (or S+S when the
//! access itself is sequential).
//!
//! ## Event dispatch
//!
//! ```text
//!  access / idle ──▶ tick_components(n) ──▶ scheduler.advance(n)
//!                                               │
//!                        ┌──── pop_pending() ◀──┘
//!                        ▼
//!                  dispatch(kind, late) ──▶ lcd / timers / dma / sound / serial
//! ```
//!
//! A DMA transfer runs from inside the dispatch loop and charges its own
//! cycles. Those only advance the clock; the events they make due are picked
//! up by the loop that is already running.

use std::rc::Rc;

use crate::bitwise::Bits;
use crate::bus::{Bus, MemoryAccess};
use crate::cpu::hardware::dma::Dma;
use crate::cpu::hardware::internal_memory::{BIOS_SIZE, BackupStorage, InternalMemory};
use crate::cpu::hardware::interrupt_control::InterruptControl;
use crate::cpu::hardware::keypad::Keypad;
use crate::cpu::hardware::lcd::Lcd;
use crate::cpu::hardware::serial::Serial;
use crate::cpu::hardware::sound::{Sound, StereoSample};
use crate::cpu::hardware::timers::Timers;
use crate::scheduler::{EventKind, Scheduler};

const IO_SIZE: u32 = 0x400;

/// Wait states selected by WAITCNT for SRAM and the first access to ROM.
const NON_SEQUENTIAL_WAITS: [u32; 4] = [4, 3, 2, 8];
/// Sequential ROM wait states, per wait state region, for WAITCNT bit 0/1.
const SEQUENTIAL_WAITS: [[u32; 2]; 3] = [[2, 1], [4, 1], [8, 1]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Width {
    Byte,
    HalfWord,
    Word,
}

pub struct SystemBus {
    internal_memory: InternalMemory,
    backup: Box<dyn BackupStorage>,
    lcd: Lcd,
    sound: Sound,
    dma: Dma,
    timers: Timers,
    serial: Serial,
    keypad: Keypad,
    interrupts: Rc<InterruptControl>,
    scheduler: Scheduler,

    /// WAITCNT
    wait_control: u16,
    /// POSTFLG
    post_boot_flag: u8,
    /// Backing store for the I/O registers nobody emulates.
    io_registers: Box<[u8; IO_SIZE as usize]>,

    /// Last value driven on the data bus, returned by unmapped reads.
    open_bus: u32,
    /// Last opcode fetched from the BIOS, returned by protected BIOS reads.
    last_bios_word: u32,
    executing_bios: bool,
    dispatching: bool,
}

impl SystemBus {
    /// Builds the memory map and arms the free running events (scanline and
    /// audio sample clocks).
    #[must_use]
    pub fn new(
        internal_memory: InternalMemory,
        backup: Box<dyn BackupStorage>,
        interrupts: Rc<InterruptControl>,
        audio_buffer_len: usize,
    ) -> Self {
        let mut scheduler = Scheduler::new();
        let lcd = Lcd::new(interrupts.handle());
        let sound = Sound::new(audio_buffer_len);
        lcd.start(&mut scheduler);
        sound.start(&mut scheduler);

        Self {
            internal_memory,
            backup,
            lcd,
            sound,
            dma: Dma::new(interrupts.handle()),
            timers: Timers::new(interrupts.handle()),
            serial: Serial::new(interrupts.handle()),
            keypad: Keypad::new(interrupts.handle()),
            interrupts,
            scheduler,
            wait_control: 0,
            post_boot_flag: 0,
            io_registers: Box::new([0; IO_SIZE as usize]),
            open_bus: 0,
            last_bios_word: 0,
            // Execution starts at the reset vector.
            executing_bios: true,
            dispatching: false,
        }
    }

    #[must_use]
    pub const fn now(&self) -> u64 {
        self.scheduler.now()
    }

    #[must_use]
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    #[must_use]
    pub const fn lcd(&self) -> &Lcd {
        &self.lcd
    }

    pub const fn take_frame_complete(&mut self) -> bool {
        self.lcd.take_frame_complete()
    }

    pub const fn keypad_mut(&mut self) -> &mut Keypad {
        &mut self.keypad
    }

    pub fn take_audio_samples(&mut self) -> Vec<StereoSample> {
        self.sound.take_samples()
    }

    #[must_use]
    pub fn backup(&self) -> &dyn BackupStorage {
        self.backup.as_ref()
    }

    /// The BIOS sets POSTFLG once it is done with the boot sequence.
    pub const fn set_post_boot_flag(&mut self) {
        self.post_boot_flag = 1;
    }

    fn run_due_events(&mut self) {
        if self.dispatching {
            return;
        }

        self.dispatching = true;
        while let Some((kind, late)) = self.scheduler.pop_pending() {
            self.dispatch(kind, late);
        }
        self.dispatching = false;
    }

    fn dispatch(&mut self, kind: EventKind, late: u64) {
        tracing::trace!("event {kind:?} ({late} cycles late)");

        match kind {
            EventKind::HBlankStart => {
                if let Some(timing) = self.lcd.hblank_start(late, &mut self.scheduler) {
                    self.dma.trigger(timing, &mut self.scheduler);
                }
            }
            EventKind::LineEnd => {
                if let Some(timing) = self.lcd.line_end(late, &mut self.scheduler) {
                    self.dma.trigger(timing, &mut self.scheduler);
                }
            }
            EventKind::TimerOverflow { timer, generation } => {
                self.timers
                    .handle_overflow(timer, generation, late, &mut self.scheduler);
            }
            EventKind::DmaTransfer { channel } => self.run_dma(channel),
            EventKind::AudioSample => self.sound.sample(late, &mut self.scheduler),
            EventKind::AudioBufferFull => self.sound.flush(),
            EventKind::SerialTransfer => self.serial.complete_transfer(),
        }
    }

    fn run_dma(&mut self, channel: usize) {
        let Some(transfer) = self.dma.begin(channel) else {
            return;
        };

        let mut source = transfer.source;
        let mut destination = transfer.destination;
        for unit in 0..transfer.units {
            let access = if unit == 0 {
                MemoryAccess::NonSequential
            } else {
                MemoryAccess::Sequential
            };

            if transfer.word_sized {
                let value = self.read_word(source, access);
                self.write_word(destination, value, access);
            } else {
                let value = self.read_half_word(source, access);
                self.write_half_word(destination, value, access);
            }

            source = source.wrapping_add_signed(transfer.source_step);
            destination = destination.wrapping_add_signed(transfer.destination_step);
        }

        self.dma.finish(channel, source, destination);
    }

    fn rom_non_sequential(&self, region: usize) -> u32 {
        let bits = match region {
            0 => self.wait_control.get_bits(2..=3),
            1 => self.wait_control.get_bits(5..=6),
            _ => self.wait_control.get_bits(8..=9),
        };
        1 + NON_SEQUENTIAL_WAITS[bits as usize]
    }

    fn rom_sequential(&self, region: usize) -> u32 {
        let bit = [4, 7, 10][region];
        1 + SEQUENTIAL_WAITS[region][usize::from(self.wait_control.get_bit(bit))]
    }

    fn access_cycles(&self, address: u32, access: MemoryAccess, width: Width) -> u32 {
        let sequential = match access {
            MemoryAccess::Untimed => return 0,
            MemoryAccess::Sequential => true,
            MemoryAccess::NonSequential => false,
        };
        let word = width == Width::Word;

        match address >> 24 {
            0x02 => {
                if word {
                    6
                } else {
                    3
                }
            }
            0x05 | 0x06 => 1 + u32::from(word),
            0x08..=0x0D => {
                let region = ((address >> 25) - 4) as usize;
                let first = if sequential {
                    self.rom_sequential(region)
                } else {
                    self.rom_non_sequential(region)
                };
                if word {
                    first + self.rom_sequential(region)
                } else {
                    first
                }
            }
            0x0E | 0x0F => {
                1 + NON_SEQUENTIAL_WAITS[self.wait_control.get_bits(0..=1) as usize]
            }
            _ => 1,
        }
    }

    fn charge(&mut self, address: u32, access: MemoryAccess, width: Width) {
        let cycles = self.access_cycles(address, access, width);
        if cycles > 0 {
            self.tick_components(cycles);
        }
    }

    fn read_raw(&self, address: u32) -> u8 {
        match address >> 24 {
            0x00 if (address as usize) < BIOS_SIZE => {
                if self.executing_bios {
                    self.internal_memory.read_bios(address)
                } else {
                    tracing::debug!("protected BIOS read at {address:#010X}");
                    self.last_bios_word.get_byte((address & 0b11) as u8)
                }
            }
            0x02 => self.internal_memory.read_ewram(address),
            0x03 => self.internal_memory.read_iwram(address),
            0x04 if address & 0x00FF_FFFF < IO_SIZE => self.read_io(address & 0x3FF),
            0x05 => self.lcd.memory.read_palette(address),
            0x06 => self.lcd.memory.read_vram(address),
            0x07 => self.lcd.memory.read_oam(address),
            0x08..=0x0D => self.internal_memory.read_rom(address),
            0x0E | 0x0F => self.backup.read(address & 0xFFFF),
            _ => {
                tracing::debug!("open bus read at {address:#010X}");
                self.open_bus.get_byte((address & 0b11) as u8)
            }
        }
    }

    fn write_raw(&mut self, address: u32, value: u8) {
        match address >> 24 {
            0x02 => self.internal_memory.write_ewram(address, value),
            0x03 => self.internal_memory.write_iwram(address, value),
            0x04 if address & 0x00FF_FFFF < IO_SIZE => self.write_io(address & 0x3FF, value),
            0x05 => self.lcd.memory.write_palette(address, value),
            0x06 => self.lcd.memory.write_vram(address, value),
            0x07 => self.lcd.memory.write_oam(address, value),
            0x0E | 0x0F => self.backup.write(address & 0xFFFF, value),
            0x00 | 0x08..=0x0D => {
                tracing::debug!("write to read-only memory at {address:#010X} dropped");
            }
            _ => tracing::debug!("unmapped write at {address:#010X} dropped"),
        }
    }

    fn read_io(&self, offset: u32) -> u8 {
        match offset {
            0x000..=0x007 => self.lcd.read_register(offset),
            0x088 | 0x089 => self.sound.read_register(offset - 0x088),
            0x0B0..=0x0DF => self.dma.read_register(offset - 0x0B0),
            0x100..=0x10F => self.timers.read_register(offset - 0x100, self.now()),
            0x120..=0x12B | 0x134 | 0x135 => self.serial.read_register(offset - 0x120),
            0x130..=0x133 => self.keypad.read_register(offset - 0x130),
            0x200..=0x203 | 0x208 => self.interrupts.read_register(offset - 0x200),
            0x204 => self.wait_control.get_byte(0),
            0x205 => self.wait_control.get_byte(1),
            0x300 => self.post_boot_flag,
            _ => self.io_registers[offset as usize],
        }
    }

    fn write_io(&mut self, offset: u32, value: u8) {
        match offset {
            0x000..=0x007 => self.lcd.write_register(offset, value),
            0x088 | 0x089 => self.sound.write_register(offset - 0x088, value),
            0x0B0..=0x0DF => {
                self.dma
                    .write_register(offset - 0x0B0, value, &mut self.scheduler);
            }
            0x100..=0x10F => {
                self.timers
                    .write_register(offset - 0x100, value, &mut self.scheduler);
            }
            0x120..=0x12B | 0x134 | 0x135 => {
                self.serial
                    .write_register(offset - 0x120, value, &mut self.scheduler);
            }
            0x130..=0x133 => self.keypad.write_register(offset - 0x130, value),
            0x200..=0x203 | 0x208 => self.interrupts.write_register(offset - 0x200, value),
            0x204 => self.wait_control.set_byte(0, value),
            // Bit 15 (cartridge type) is read only.
            0x205 => self.wait_control.set_byte(1, value & 0x7F),
            0x300 => self.post_boot_flag = value & 1,
            0x301 => {
                if value.get_bit(7) {
                    tracing::debug!("STOP mode is not emulated");
                } else {
                    self.interrupts.request_halt();
                }
            }
            _ => self.io_registers[offset as usize] = value,
        }
    }

    fn read_bytes<const N: usize>(&self, address: u32) -> [u8; N] {
        std::array::from_fn(|i| self.read_raw(address.wrapping_add(i as u32)))
    }

    /// Memory-mapped peripherals decode each byte lane on their own.
    fn write_bytes(&mut self, address: u32, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.write_raw(address.wrapping_add(i as u32), *byte);
        }
    }

    const fn is_sram(address: u32) -> bool {
        matches!(address >> 24, 0x0E | 0x0F)
    }
}

impl Bus for SystemBus {
    // Reads sample the bus at the end of the access, after its wait states.
    fn read_byte(&mut self, address: u32, access: MemoryAccess) -> u8 {
        self.charge(address, access, Width::Byte);
        let value = self.read_raw(address);
        self.open_bus = u32::from_le_bytes([value; 4]);
        value
    }

    fn read_half_word(&mut self, address: u32, access: MemoryAccess) -> u16 {
        self.charge(address, access, Width::HalfWord);
        let value = if Self::is_sram(address) {
            // 8-bit bus, the addressed byte shows up on both lanes.
            u16::from_le_bytes([self.read_raw(address); 2])
        } else {
            u16::from_le_bytes(self.read_bytes(address & !0b1))
        };
        self.open_bus = u32::from(value) * 0x0001_0001;
        value
    }

    fn read_word(&mut self, address: u32, access: MemoryAccess) -> u32 {
        self.charge(address, access, Width::Word);
        let value = if Self::is_sram(address) {
            u32::from_le_bytes([self.read_raw(address); 4])
        } else {
            u32::from_le_bytes(self.read_bytes(address & !0b11))
        };
        self.open_bus = value;
        value
    }

    fn write_byte(&mut self, address: u32, value: u8, access: MemoryAccess) {
        match address >> 24 {
            0x05..=0x07 => self.lcd.memory.write_byte(address, value),
            _ => self.write_raw(address, value),
        }
        self.charge(address, access, Width::Byte);
    }

    fn write_half_word(&mut self, address: u32, value: u16, access: MemoryAccess) {
        if Self::is_sram(address) {
            let byte = value.get_byte((address & 0b1) as u8);
            self.write_raw(address, byte);
        } else {
            let address = address & !0b1;
            self.write_bytes(address, &value.to_le_bytes());
        }
        self.charge(address, access, Width::HalfWord);
    }

    fn write_word(&mut self, address: u32, value: u32, access: MemoryAccess) {
        if Self::is_sram(address) {
            let byte = value.get_byte((address & 0b11) as u8);
            self.write_raw(address, byte);
        } else {
            let address = address & !0b11;
            self.write_bytes(address, &value.to_le_bytes());
        }
        self.charge(address, access, Width::Word);
    }

    fn fetch_word(&mut self, address: u32, access: MemoryAccess) -> u32 {
        self.executing_bios = (address as usize) < BIOS_SIZE;
        let value = self.read_word(address, access);
        if self.executing_bios {
            self.last_bios_word = value;
        }
        value
    }

    fn fetch_half_word(&mut self, address: u32, access: MemoryAccess) -> u16 {
        self.executing_bios = (address as usize) < BIOS_SIZE;
        let value = self.read_half_word(address, access);
        if self.executing_bios {
            self.last_bios_word = u32::from_le_bytes(self.read_bytes(address & !0b11));
        }
        value
    }

    fn tick_components(&mut self, cycles: u32) {
        self.scheduler.advance(u64::from(cycles));
        self.run_due_events();
    }

    fn idle_until_event(&mut self) {
        let skipped = self.scheduler.skip_to_next_event();
        tracing::trace!("halted, skipped {skipped} cycles");
        self.run_due_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::hardware::internal_memory::Sram;
    use crate::cpu::hardware::interrupt_control::Interrupt;
    use crate::cpu::hardware::lcd::CYCLES_PER_LINE;
    use crate::cpu::hardware::sound::SAMPLE_PERIOD;
    use pretty_assertions::assert_eq;

    fn bus_with(bios: Vec<u8>, rom: Vec<u8>) -> (Rc<InterruptControl>, SystemBus) {
        let interrupts = InterruptControl::new();
        let bus = SystemBus::new(
            InternalMemory::new(bios, rom),
            Box::new(Sram::default()),
            Rc::clone(&interrupts),
            16,
        );
        (interrupts, bus)
    }

    fn bus() -> (Rc<InterruptControl>, SystemBus) {
        bus_with(vec![0; BIOS_SIZE], vec![0; 0x100])
    }

    fn cycles_of(bus: &mut SystemBus, f: impl FnOnce(&mut SystemBus)) -> u64 {
        let before = bus.now();
        f(bus);
        bus.now() - before
    }

    #[test]
    fn region_timings() {
        let (_, mut bus) = bus();
        use MemoryAccess::{NonSequential, Sequential, Untimed};

        assert_eq!(cycles_of(&mut bus, |b| { b.read_word(0x0300_0000, NonSequential); }), 1);
        assert_eq!(cycles_of(&mut bus, |b| { b.read_word(0x0200_0000, NonSequential); }), 6);
        assert_eq!(cycles_of(&mut bus, |b| { b.read_half_word(0x0200_0000, Sequential); }), 3);
        assert_eq!(cycles_of(&mut bus, |b| { b.read_word(0x0600_0000, NonSequential); }), 2);
        assert_eq!(cycles_of(&mut bus, |b| { b.read_word(0x0800_0000, NonSequential); }), 8);
        assert_eq!(cycles_of(&mut bus, |b| { b.read_word(0x0800_0004, Sequential); }), 6);
        assert_eq!(cycles_of(&mut bus, |b| { b.read_byte(0x0E00_0000, NonSequential); }), 5);
        assert_eq!(cycles_of(&mut bus, |b| { b.read_word(0x0800_0000, Untimed); }), 0);
    }

    #[test]
    fn waitcnt_reprograms_rom_timing() {
        let (_, mut bus) = bus();
        // WS0: N = 3 waits, S = 1 wait
        bus.write_half_word(0x0400_0204, 0b1_0100, MemoryAccess::Untimed);

        let cycles = cycles_of(&mut bus, |b| {
            b.read_word(0x0800_0000, MemoryAccess::NonSequential);
        });
        assert_eq!(cycles, 4 + 2);
        assert_eq!(bus.read_half_word(0x0400_0204, MemoryAccess::Untimed), 0b1_0100);
    }

    #[test]
    fn bios_is_protected_outside_bios() {
        let bios = (0..BIOS_SIZE).map(|i| i as u8).collect();
        let (_, mut bus) = bus_with(bios, vec![0; 0x100]);

        assert_eq!(bus.fetch_word(0x100, MemoryAccess::NonSequential), 0x0302_0100);
        assert_eq!(bus.read_word(0x20, MemoryAccess::NonSequential), 0x2322_2120);

        bus.fetch_word(0x0800_0000, MemoryAccess::NonSequential);
        assert_eq!(bus.read_word(0x20, MemoryAccess::NonSequential), 0x0302_0100);
        assert_eq!(bus.read_byte(0x21, MemoryAccess::NonSequential), 0x01);
    }

    #[test]
    fn unmapped_reads_return_open_bus() {
        let (_, mut bus) = bus();
        bus.write_word(0x0300_0010, 0xDEAD_BEEF, MemoryAccess::NonSequential);
        bus.read_word(0x0300_0010, MemoryAccess::NonSequential);

        assert_eq!(bus.read_word(0x1000_0000, MemoryAccess::NonSequential), 0xDEAD_BEEF);
        assert_eq!(bus.read_half_word(0x0000_4002, MemoryAccess::NonSequential), 0xDEAD);
    }

    #[test]
    fn rom_past_the_end_reads_the_address() {
        let (_, mut bus) = bus_with(vec![0; BIOS_SIZE], vec![0xAA; 4]);
        assert_eq!(bus.read_word(0x0800_0000, MemoryAccess::Untimed), 0xAAAA_AAAA);
        assert_eq!(bus.read_half_word(0x0800_0100, MemoryAccess::Untimed), 0x0080);
    }

    #[test]
    fn video_memory_byte_writes() {
        let (_, mut bus) = bus();
        bus.write_byte(0x0500_0003, 0x1F, MemoryAccess::NonSequential);
        bus.write_byte(0x0700_0000, 0x1F, MemoryAccess::NonSequential);

        assert_eq!(bus.read_half_word(0x0500_0002, MemoryAccess::Untimed), 0x1F1F);
        assert_eq!(bus.read_half_word(0x0700_0000, MemoryAccess::Untimed), 0);
    }

    #[test]
    fn sram_is_byte_wide() {
        let (_, mut bus) = bus();
        bus.write_word(0x0E00_0001, 0x1122_3344, MemoryAccess::NonSequential);

        assert_eq!(bus.backup().contents()[1], 0x33);
        assert_eq!(bus.read_word(0x0E00_0001, MemoryAccess::Untimed), 0x3333_3333);
    }

    #[test]
    fn plain_io_registers_remember_writes() {
        let (_, mut bus) = bus();
        bus.write_half_word(0x0400_0008, 0x1C08, MemoryAccess::NonSequential);
        assert_eq!(bus.read_half_word(0x0400_0008, MemoryAccess::NonSequential), 0x1C08);
    }

    #[test]
    fn haltcnt_requests_halt() {
        let (interrupts, mut bus) = bus();
        bus.write_byte(0x0400_0301, 0x00, MemoryAccess::NonSequential);
        assert!(interrupts.take_halt_request());

        bus.write_byte(0x0400_0301, 0x80, MemoryAccess::NonSequential);
        assert!(!interrupts.take_halt_request());
    }

    #[test]
    fn immediate_dma_copies_and_charges_cycles() {
        let (interrupts, mut bus) = bus();
        for i in 0..4 {
            bus.write_word(0x0300_0000 + i * 4, 0x1000 + i, MemoryAccess::Untimed);
        }

        bus.write_word(0x0400_00D4, 0x0300_0000, MemoryAccess::Untimed);
        bus.write_word(0x0400_00D8, 0x0300_0100, MemoryAccess::Untimed);
        let start = bus.now();
        // 4 words, irq, enable
        bus.write_word(0x0400_00DC, 0xC400_0004, MemoryAccess::Untimed);

        bus.tick_components(2);
        for i in 0..4 {
            assert_eq!(bus.read_word(0x0300_0100 + i * 4, MemoryAccess::Untimed), 0x1000 + i);
        }
        assert_eq!(bus.now(), start + 2 + 8);
        assert_eq!(interrupts.pending(), Interrupt::Dma3.mask());
    }

    #[test]
    fn timer_irq_through_io_registers() {
        let (interrupts, mut bus) = bus();
        bus.write_half_word(0x0400_0100, 0xFFF0, MemoryAccess::Untimed);
        bus.write_half_word(0x0400_0102, 0x00C0, MemoryAccess::Untimed);

        bus.tick_components(15);
        assert_eq!(interrupts.pending(), 0);
        assert_eq!(bus.read_half_word(0x0400_0100, MemoryAccess::Untimed), 0xFFFF);

        bus.tick_components(1);
        assert_eq!(interrupts.pending(), Interrupt::Timer0.mask());
    }

    #[test]
    fn timer_read_sees_the_end_of_the_access() {
        let (_, mut bus) = bus();
        bus.write_half_word(0x0400_0102, 0x0080, MemoryAccess::Untimed);

        assert_eq!(bus.read_half_word(0x0400_0100, MemoryAccess::NonSequential), 1);
        assert_eq!(bus.now(), 1);
    }

    #[test]
    fn vblank_dma_and_frame_complete() {
        let (_, mut bus) = bus();
        bus.write_word(0x0400_00B0, 0x0300_0000, MemoryAccess::Untimed);
        bus.write_word(0x0400_00B4, 0x0300_0200, MemoryAccess::Untimed);
        bus.write_word(0x0300_0000, 0xCAFE_F00D, MemoryAccess::Untimed);
        // 1 word, VBlank timing
        bus.write_word(0x0400_00B8, 0x9400_0001, MemoryAccess::Untimed);

        bus.tick_components((CYCLES_PER_LINE * 160) as u32);
        assert!(bus.take_frame_complete());
        assert_eq!(bus.read_word(0x0300_0200, MemoryAccess::Untimed), 0);

        bus.tick_components(2);

        assert_eq!(bus.read_word(0x0300_0200, MemoryAccess::Untimed), 0xCAFE_F00D);
        assert_eq!(bus.lcd().frames(), 1);
    }

    #[test]
    fn halted_bus_jumps_to_the_next_event() {
        let (_, mut bus) = bus();
        bus.idle_until_event();
        assert_eq!(bus.now(), SAMPLE_PERIOD);
    }
}
