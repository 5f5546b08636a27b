//! BIOS, work RAM and cartridge storage.
//!
//! Addresses passed in here are full bus addresses; mirroring is resolved by
//! masking. Region selection (and what happens outside these regions) is the
//! system bus' job.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

pub const BIOS_SIZE: usize = 0x4000;
pub const EWRAM_SIZE: usize = 0x4_0000;
pub const IWRAM_SIZE: usize = 0x8000;
pub const MAX_ROM_SIZE: usize = 0x200_0000;
pub const SRAM_SIZE: usize = 0x1_0000;

/// Cartridge backup memory as seen through the 8-bit SRAM window at
/// `0x0E00_0000`. Loading and persisting the contents belongs to whoever
/// builds the system.
pub trait BackupStorage {
    fn read(&self, offset: u32) -> u8;

    fn write(&mut self, offset: u32, value: u8);

    /// Raw contents, for persistence.
    fn contents(&self) -> &[u8];
}

/// Plain battery backed SRAM, mirrored every 32 KiB like the usual chip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sram {
    data: Vec<u8>,
}

impl Default for Sram {
    fn default() -> Self {
        Self {
            data: vec![0xFF; 0x8000],
        }
    }
}

impl Sram {
    /// Reuses a previously saved image, padded or cut to the chip size.
    #[must_use]
    pub fn from_contents(contents: &[u8]) -> Self {
        let mut sram = Self::default();
        let len = contents.len().min(sram.data.len());
        sram.data[..len].copy_from_slice(&contents[..len]);
        sram
    }
}

impl BackupStorage for Sram {
    fn read(&self, offset: u32) -> u8 {
        self.data[offset as usize % self.data.len()]
    }

    fn write(&mut self, offset: u32, value: u8) {
        let len = self.data.len();
        self.data[offset as usize % len] = value;
    }

    fn contents(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Serialize, Deserialize)]
pub struct InternalMemory {
    /// From 0x00000000 to 0x00003FFF (16 `KBytes`).
    bios_system_rom: Vec<u8>,

    /// From 0x02000000 to 0x0203FFFF (256 `KBytes`), mirrored up to 0x02FFFFFF.
    working_ram: Vec<u8>,

    /// From 0x03000000 to 0x03007FFF (32 `KBytes`), mirrored up to 0x03FFFFFF.
    working_iram: Vec<u8>,

    /// Game Pak ROM, visible three times (0x08, 0x0A and 0x0C wait states).
    rom: Vec<u8>,
}

impl Default for InternalMemory {
    fn default() -> Self {
        Self::new(vec![0; BIOS_SIZE], Vec::new())
    }
}

impl InternalMemory {
    /// Sizes are validated by the caller.
    #[must_use]
    pub fn new(bios: Vec<u8>, rom: Vec<u8>) -> Self {
        Self {
            bios_system_rom: bios,
            working_ram: vec![0; EWRAM_SIZE],
            working_iram: vec![0; IWRAM_SIZE],
            rom,
        }
    }

    #[must_use]
    pub fn read_bios(&self, address: u32) -> u8 {
        self.bios_system_rom
            .get(address as usize)
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn read_ewram(&self, address: u32) -> u8 {
        self.working_ram[address as usize % EWRAM_SIZE]
    }

    pub fn write_ewram(&mut self, address: u32, value: u8) {
        self.working_ram[address as usize % EWRAM_SIZE] = value;
    }

    #[must_use]
    pub fn read_iwram(&self, address: u32) -> u8 {
        self.working_iram[address as usize % IWRAM_SIZE]
    }

    pub fn write_iwram(&mut self, address: u32, value: u8) {
        self.working_iram[address as usize % IWRAM_SIZE] = value;
    }

    #[must_use]
    pub fn read_rom(&self, address: u32) -> u8 {
        let offset = (address & 0x01FF_FFFF) as usize;
        self.rom.get(offset).copied().unwrap_or_else(|| {
            // The Game Pak shares AD0-15 between address and data. Reading past
            // the end of the ROM leaves the lower 16 bits of the half-word
            // address on the bus, which the CPU takes as the data.
            (((offset >> 1) & 0xFFFF) as u16).get_byte((offset & 0b1) as u8)
        })
    }

    #[must_use]
    pub fn rom_len(&self) -> usize {
        self.rom.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_last_byte_work_ram() {
        let mut im = InternalMemory::default();
        im.write_iwram(0x0300_7FFF, 5);
        assert_eq!(im.working_iram[0x7FFF], 5);
    }

    #[test]
    fn test_read_rom() {
        let im = InternalMemory::new(vec![0; BIOS_SIZE], vec![1, 2, 3, 4]);
        assert_eq!(im.read_rom(0x0800_0000), 1);
        assert_eq!(im.read_rom(0x0A00_0003), 4);
        assert_eq!(im.read_rom(0x0C00_0002), 3);

        // Testing reading in empty rom
        assert_eq!(im.read_rom(0x09FF_FFFF), 0xFF);
        assert_eq!(im.read_rom(0x09FF_FFEE), 0xF7);
        assert_eq!(im.read_rom(0x09FF_FFEF), 0xFF);
    }

    #[test]
    fn test_mirror_iram() {
        let mut im = InternalMemory::default();
        im.working_iram[0x21FF] = 5;

        assert_eq!(im.read_iwram(0x0300_21FF), 5);
        assert_eq!(im.read_iwram(0x0300_A1FF), 5);
        assert_eq!(im.read_iwram(0x03FF_A1FF), 5);

        im.write_iwram(0x0301_71FF, 10);
        assert_eq!(im.working_iram[0x71FF], 10);
    }

    #[test]
    fn test_mirror_wram() {
        let mut im = InternalMemory::default();
        im.working_ram[0x01_0003] = 5;

        assert_eq!(im.read_ewram(0x0201_0003), 5);
        assert_eq!(im.read_ewram(0x0205_0003), 5);
        assert_eq!(im.read_ewram(0x02F5_0003), 5);

        im.write_ewram(0x0235_0010, 1);
        assert_eq!(im.working_ram[0x01_0010], 1);
    }

    #[test]
    fn bios_outside_image_reads_zero() {
        let im = InternalMemory::new(vec![0xAA; BIOS_SIZE], Vec::new());
        assert_eq!(im.read_bios(0x3FFF), 0xAA);
        assert_eq!(im.read_bios(0x4000), 0);
    }

    #[test]
    fn sram_mirrors_and_restores() {
        let mut sram = Sram::from_contents(&[1, 2, 3]);
        assert_eq!(sram.read(0x8001), 2);
        assert_eq!(sram.read(0x10), 0xFF);

        sram.write(0xFFFF, 7);
        assert_eq!(sram.contents()[0x7FFF], 7);
    }
}
