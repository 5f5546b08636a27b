//! # Bus Interface
//!
//! The CPU never knows the memory map. It talks to a [`Bus`], classifying
//! every access by its timing class so the implementation can charge the
//! right amount of wait states:
//!
//! | Class           | Meaning                                                   |
//! |-----------------|-----------------------------------------------------------|
//! | `NonSequential` | Address unrelated to the previous access (N cycle)        |
//! | `Sequential`    | Address follows the previous one in the same region (S)   |
//! | `Untimed`       | Bookkeeping access, no cycles charged (debugger, DMA peek)|
//!
//! The ARM7TDMI has no barrel aligner on the data bus: a misaligned word load
//! returns the aligned word rotated by `8 * (address & 3)`. The provided
//! helpers implement that behavior (and the signed-load quirks) once for every
//! implementation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MemoryAccess {
    #[default]
    NonSequential,
    Sequential,
    Untimed,
}

pub trait Bus {
    fn read_byte(&mut self, address: u32, access: MemoryAccess) -> u8;

    /// `address` is expected to be half-word aligned, the low bit is ignored.
    fn read_half_word(&mut self, address: u32, access: MemoryAccess) -> u16;

    /// `address` is expected to be word aligned, the low bits are ignored.
    fn read_word(&mut self, address: u32, access: MemoryAccess) -> u32;

    fn write_byte(&mut self, address: u32, value: u8, access: MemoryAccess);

    fn write_half_word(&mut self, address: u32, value: u16, access: MemoryAccess);

    fn write_word(&mut self, address: u32, value: u32, access: MemoryAccess);

    /// Propagates `cycles` of elapsed time to every time-dependent component.
    fn tick_components(&mut self, cycles: u32);

    /// One internal CPU cycle with no memory side effect.
    fn idle(&mut self) {
        self.tick_components(1);
    }

    /// Used while the CPU is halted. Implementations with a scheduler can jump
    /// straight to the next event.
    fn idle_until_event(&mut self) {
        self.idle();
    }

    /// Opcode fetch. Same as a read, but lets the memory map know the CPU is
    /// executing from `address` (the ARM7TDMI signals this on its nOPC pin).
    fn fetch_word(&mut self, address: u32, access: MemoryAccess) -> u32 {
        self.read_word(address, access)
    }

    fn fetch_half_word(&mut self, address: u32, access: MemoryAccess) -> u16 {
        self.read_half_word(address, access)
    }

    /// Word load as seen by `LDR`: misaligned addresses rotate the aligned word.
    fn read_word_rotated(&mut self, address: u32, access: MemoryAccess) -> u32 {
        self.read_word(address & !0b11, access)
            .rotate_right(8 * (address & 0b11))
    }

    /// Half-word load as seen by `LDRH`: an odd address rotates the aligned
    /// half-word by 8 bits inside the 32-bit result.
    fn read_half_word_rotated(&mut self, address: u32, access: MemoryAccess) -> u32 {
        u32::from(self.read_half_word(address & !0b1, access)).rotate_right(8 * (address & 0b1))
    }

    /// `LDRSH`: an odd address degrades to a sign-extended byte load.
    fn read_signed_half_word(&mut self, address: u32, access: MemoryAccess) -> u32 {
        if address & 0b1 == 0 {
            i32::from(self.read_half_word(address, access) as i16) as u32
        } else {
            self.read_signed_byte(address, access)
        }
    }

    /// `LDRSB`
    fn read_signed_byte(&mut self, address: u32, access: MemoryAccess) -> u32 {
        i32::from(self.read_byte(address, access) as i8) as u32
    }
}

/// A flat, zero wait-state memory used by unit tests across the crate.
#[cfg(test)]
pub(crate) mod flat {
    use super::{Bus, MemoryAccess};

    pub struct FlatBus {
        pub memory: Vec<u8>,
        pub cycles: u64,
        pub accesses: Vec<(u32, MemoryAccess)>,
    }

    impl FlatBus {
        pub fn new(size: usize) -> Self {
            Self {
                memory: vec![0; size],
                cycles: 0,
                accesses: Vec::new(),
            }
        }

        pub fn load_words(&mut self, address: u32, words: &[u32]) {
            for (i, word) in words.iter().enumerate() {
                let at = address as usize + i * 4;
                self.memory[at..at + 4].copy_from_slice(&word.to_le_bytes());
            }
        }

        pub fn load_half_words(&mut self, address: u32, half_words: &[u16]) {
            for (i, half) in half_words.iter().enumerate() {
                let at = address as usize + i * 2;
                self.memory[at..at + 2].copy_from_slice(&half.to_le_bytes());
            }
        }

        pub fn word_at(&self, address: u32) -> u32 {
            let at = address as usize;
            u32::from_le_bytes([
                self.memory[at],
                self.memory[at + 1],
                self.memory[at + 2],
                self.memory[at + 3],
            ])
        }

        fn index(&self, address: u32) -> usize {
            address as usize % self.memory.len()
        }

        fn charge(&mut self, address: u32, access: MemoryAccess) {
            self.accesses.push((address, access));
            if access != MemoryAccess::Untimed {
                self.cycles += 1;
            }
        }
    }

    impl Bus for FlatBus {
        fn read_byte(&mut self, address: u32, access: MemoryAccess) -> u8 {
            self.charge(address, access);
            self.memory[self.index(address)]
        }

        fn read_half_word(&mut self, address: u32, access: MemoryAccess) -> u16 {
            let address = address & !0b1;
            self.charge(address, access);
            let at = self.index(address);
            u16::from_le_bytes([self.memory[at], self.memory[at + 1]])
        }

        fn read_word(&mut self, address: u32, access: MemoryAccess) -> u32 {
            let address = address & !0b11;
            self.charge(address, access);
            self.word_at(self.index(address) as u32)
        }

        fn write_byte(&mut self, address: u32, value: u8, access: MemoryAccess) {
            self.charge(address, access);
            let at = self.index(address);
            self.memory[at] = value;
        }

        fn write_half_word(&mut self, address: u32, value: u16, access: MemoryAccess) {
            let address = address & !0b1;
            self.charge(address, access);
            let at = self.index(address);
            self.memory[at..at + 2].copy_from_slice(&value.to_le_bytes());
        }

        fn write_word(&mut self, address: u32, value: u32, access: MemoryAccess) {
            let address = address & !0b11;
            self.charge(address, access);
            let at = self.index(address);
            self.memory[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }

        fn tick_components(&mut self, cycles: u32) {
            self.cycles += u64::from(cycles);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::flat::FlatBus;
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn misaligned_word_reads_rotate() {
        let mut rng = StdRng::seed_from_u64(0xB05);
        let mut bus = FlatBus::new(0x100);

        for _ in 0..200 {
            let word: u32 = rng.r#gen();
            let base = rng.gen_range(0..0x3F_u32) * 4;
            bus.load_words(base, &[word]);

            for offset in 0..4 {
                assert_eq!(
                    bus.read_word_rotated(base + offset, MemoryAccess::Untimed),
                    word.rotate_right(8 * offset)
                );
            }
        }
    }

    #[test]
    fn misaligned_half_word_read_rotates() {
        let mut bus = FlatBus::new(0x10);
        bus.load_half_words(0x4, &[0xBEEF]);

        assert_eq!(bus.read_half_word_rotated(0x4, MemoryAccess::Untimed), 0xBEEF);
        assert_eq!(
            bus.read_half_word_rotated(0x5, MemoryAccess::Untimed),
            0xEF00_00BE
        );
    }

    #[test]
    fn signed_half_word_at_odd_address_is_signed_byte() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut bus = FlatBus::new(0x100);
        for byte in &mut bus.memory {
            *byte = rng.r#gen();
        }

        for address in (1..0xFF).step_by(2) {
            let signed_half = bus.read_signed_half_word(address, MemoryAccess::Untimed);
            let signed_byte = bus.read_signed_byte(address, MemoryAccess::Untimed);
            assert_eq!(signed_half, signed_byte);
        }
    }

    #[test]
    fn signed_loads_extend_from_source_width() {
        let mut bus = FlatBus::new(0x10);
        bus.load_half_words(0x0, &[0x8001, 0x7FFF]);

        assert_eq!(bus.read_signed_half_word(0x0, MemoryAccess::Untimed), 0xFFFF_8001);
        assert_eq!(bus.read_signed_half_word(0x2, MemoryAccess::Untimed), 0x0000_7FFF);
        // Low byte of 0x8001 is positive even though the half-word is negative.
        assert_eq!(bus.read_signed_byte(0x0, MemoryAccess::Untimed), 0x0000_0001);
        assert_eq!(bus.read_signed_byte(0x1, MemoryAccess::Untimed), 0xFFFF_FF80);
    }

    #[test]
    fn default_idle_ticks_one_cycle() {
        let mut bus = FlatBus::new(0x10);
        bus.idle();
        bus.idle_until_event();
        assert_eq!(bus.cycles, 2);
    }
}
