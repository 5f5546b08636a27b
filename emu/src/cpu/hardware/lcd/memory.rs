//! LCD Memory - VRAM, Palette RAM, and OAM.
//!
//! | Region          | Address Range           | Size    |
//! |-----------------|-------------------------|---------|
//! | BG Palette RAM  | 0x0500_0000-0x0500_01FF | 512 B   |
//! | OBJ Palette RAM | 0x0500_0200-0x0500_03FF | 512 B   |
//! | VRAM            | 0x0600_0000-0x0601_7FFF | 96 KB   |
//! | OAM             | 0x0700_0000-0x0700_03FF | 1 KB    |
//!
//! Palette and OAM mirror every 1 KB up to the next region. VRAM mirrors
//! every 128 KB, and the last 32 KB of each mirror fold back onto
//! `0x0601_0000` (the OBJ tile area).
//!
//! All three sit on a 16-bit bus: a byte write to palette RAM or VRAM lands
//! in both halves of the addressed half-word, a byte write to OAM is dropped.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// Contains VRAM, palette RAM, and OAM. These are stored as boxed arrays
/// to avoid stack overflow (total ~98KB).
#[serde_as]
#[derive(Serialize, Deserialize)]
pub struct Memory {
    #[serde_as(as = "Box<[_; 512]>")]
    pub bg_palette_ram: Box<[u8; 0x200]>,

    #[serde_as(as = "Box<[_; 512]>")]
    pub obj_palette_ram: Box<[u8; 0x200]>,

    #[serde_as(as = "Box<[_; 98304]>")]
    pub video_ram: Box<[u8; 0x18000]>,

    /// 128 sprites of 8 bytes, with the rotation/scaling parameters
    /// interleaved in the fourth half-word of each entry.
    #[serde_as(as = "Box<[_; 1024]>")]
    pub obj_attributes: Box<[u8; 0x400]>,
}

impl Default for Memory {
    #[allow(clippy::large_stack_arrays)]
    fn default() -> Self {
        Self {
            bg_palette_ram: Box::new([0; 0x200]),
            obj_palette_ram: Box::new([0; 0x200]),
            video_ram: Box::new([0; 0x18000]),
            obj_attributes: Box::new([0; 0x400]),
        }
    }
}

const fn vram_offset(address: u32) -> usize {
    let offset = (address & 0x1_FFFF) as usize;
    if offset >= 0x1_8000 {
        offset - 0x8000
    } else {
        offset
    }
}

impl Memory {
    fn palette_byte(&mut self, address: u32) -> &mut u8 {
        let offset = (address & 0x3FF) as usize;
        if offset < 0x200 {
            &mut self.bg_palette_ram[offset]
        } else {
            &mut self.obj_palette_ram[offset - 0x200]
        }
    }

    #[must_use]
    pub fn read_palette(&self, address: u32) -> u8 {
        let offset = (address & 0x3FF) as usize;
        if offset < 0x200 {
            self.bg_palette_ram[offset]
        } else {
            self.obj_palette_ram[offset - 0x200]
        }
    }

    pub fn write_palette(&mut self, address: u32, value: u8) {
        *self.palette_byte(address) = value;
    }

    #[must_use]
    pub fn read_vram(&self, address: u32) -> u8 {
        self.video_ram[vram_offset(address)]
    }

    pub fn write_vram(&mut self, address: u32, value: u8) {
        self.video_ram[vram_offset(address)] = value;
    }

    #[must_use]
    pub fn read_oam(&self, address: u32) -> u8 {
        self.obj_attributes[(address & 0x3FF) as usize]
    }

    pub fn write_oam(&mut self, address: u32, value: u8) {
        self.obj_attributes[(address & 0x3FF) as usize] = value;
    }

    /// 8-bit CPU store to palette RAM or VRAM.
    pub fn write_byte(&mut self, address: u32, value: u8) {
        let aligned = address & !1;
        match address >> 24 {
            0x05 => {
                self.write_palette(aligned, value);
                self.write_palette(aligned + 1, value);
            }
            0x06 => {
                self.write_vram(aligned, value);
                self.write_vram(aligned + 1, value);
            }
            _ => tracing::debug!("byte write to OAM at {address:#010X} ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn vram_upper_mirror_folds_onto_obj_tiles() {
        let mut memory = Memory::default();
        memory.write_vram(0x0601_0004, 0xAB);

        assert_eq!(memory.read_vram(0x0601_8004), 0xAB);
        assert_eq!(memory.read_vram(0x0603_0004), 0xAB);
        assert_eq!(memory.read_vram(0x0603_8004), 0xAB);
    }

    #[test]
    fn palette_is_split_and_mirrored() {
        let mut memory = Memory::default();
        memory.write_palette(0x0500_0202, 0x1F);

        assert_eq!(memory.obj_palette_ram[2], 0x1F);
        assert_eq!(memory.read_palette(0x0500_0602), 0x1F);
        assert_eq!(memory.read_palette(0x0500_0002), 0x00);
    }

    #[test]
    fn byte_writes_duplicate_or_drop() {
        let mut memory = Memory::default();
        memory.write_byte(0x0500_0011, 0x42);
        memory.write_byte(0x0600_0020, 0x24);
        memory.write_byte(0x0700_0000, 0x99);

        assert_eq!(memory.bg_palette_ram[0x10..0x12], [0x42, 0x42]);
        assert_eq!(memory.video_ram[0x20..0x22], [0x24, 0x24]);
        assert_eq!(memory.read_oam(0x0700_0000), 0);
    }
}
