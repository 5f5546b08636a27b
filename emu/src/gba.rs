use std::rc::Rc;

use serde::{Deserialize, Serialize};

#[cfg(feature = "debugger")]
use crate::cpu::debugger::Observer;
use crate::{
    cpu::{
        arm7tdmi::Arm7tdmi,
        hardware::{
            internal_memory::{BIOS_SIZE, BackupStorage, InternalMemory, MAX_ROM_SIZE, Sram},
            interrupt_control::InterruptControl,
            keypad::GbaButton,
            lcd::Lcd,
            sound::StereoSample,
        },
    },
    error::GbaError,
    system_bus::SystemBus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GbaConfig {
    /// Start at the cartridge entry point with the register state the BIOS
    /// leaves behind, instead of running the BIOS boot sequence.
    pub skip_bios: bool,
    /// Samples per audio buffer hand-off.
    pub audio_buffer_len: usize,
}

impl Default for GbaConfig {
    fn default() -> Self {
        Self {
            skip_bios: false,
            audio_buffer_len: 1024,
        }
    }
}

pub struct Gba {
    cpu: Arm7tdmi,
    bus: SystemBus,
}

impl Gba {
    /// Builds a powered-on system with a blank SRAM.
    pub fn new(bios: Vec<u8>, cartridge: Vec<u8>, config: GbaConfig) -> Result<Self, GbaError> {
        Self::with_backup(bios, cartridge, Box::new(Sram::default()), config)
    }

    pub fn with_backup(
        bios: Vec<u8>,
        cartridge: Vec<u8>,
        backup: Box<dyn BackupStorage>,
        config: GbaConfig,
    ) -> Result<Self, GbaError> {
        if bios.len() != BIOS_SIZE {
            return Err(GbaError::InvalidBiosSize {
                expected: BIOS_SIZE,
                actual: bios.len(),
            });
        }
        if cartridge.is_empty() {
            return Err(GbaError::EmptyRom);
        }
        if cartridge.len() > MAX_ROM_SIZE {
            return Err(GbaError::RomTooLarge {
                size: cartridge.len(),
                max: MAX_ROM_SIZE,
            });
        }

        let interrupts = InterruptControl::new();
        let memory = InternalMemory::new(bios, cartridge);
        let mut bus = SystemBus::new(
            memory,
            backup,
            Rc::clone(&interrupts),
            config.audio_buffer_len,
        );
        let mut cpu = Arm7tdmi::new(interrupts);

        if config.skip_bios {
            cpu.skip_bios(&mut bus);
            bus.set_post_boot_flag();
        } else {
            cpu.reset(&mut bus);
        }

        tracing::debug!("system ready, skip_bios: {}", config.skip_bios);

        Ok(Self { cpu, bus })
    }

    pub fn step(&mut self) {
        self.cpu.step(&mut self.bus);
    }

    /// Runs until the LCD enters VBlank. Returns the cycles it took.
    pub fn run_frame(&mut self) -> u64 {
        let start = self.bus.now();
        loop {
            self.cpu.step(&mut self.bus);
            if self.bus.take_frame_complete() {
                break;
            }
        }
        self.bus.now() - start
    }

    /// Cycles elapsed since power on.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.bus.now()
    }

    pub fn set_button(&mut self, button: GbaButton, pressed: bool) {
        self.bus.keypad_mut().set_button(button, pressed);
    }

    /// Sets all keys at once from an active-low KEYINPUT mask.
    pub fn set_key_input(&mut self, released: u16) {
        self.bus.keypad_mut().set_key_input(released);
    }

    pub fn take_audio_samples(&mut self) -> Vec<StereoSample> {
        self.bus.take_audio_samples()
    }

    /// Video registers and memory for the presentation side.
    #[must_use]
    pub const fn lcd(&self) -> &Lcd {
        self.bus.lcd()
    }

    #[must_use]
    pub fn backup(&self) -> &dyn BackupStorage {
        self.bus.backup()
    }

    #[must_use]
    pub const fn cpu(&self) -> &Arm7tdmi {
        &self.cpu
    }

    #[must_use]
    pub const fn bus(&self) -> &SystemBus {
        &self.bus
    }

    #[cfg(feature = "debugger")]
    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.cpu.add_observer(observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_bad_images() {
        assert_eq!(
            Gba::new(vec![0; 16], vec![0; 4], GbaConfig::default()).err(),
            Some(GbaError::InvalidBiosSize {
                expected: BIOS_SIZE,
                actual: 16
            })
        );
        assert_eq!(
            Gba::new(vec![0; BIOS_SIZE], Vec::new(), GbaConfig::default()).err(),
            Some(GbaError::EmptyRom)
        );
        assert_eq!(
            Gba::new(vec![0; BIOS_SIZE], vec![0; MAX_ROM_SIZE + 1], GbaConfig::default()).err(),
            Some(GbaError::RomTooLarge {
                size: MAX_ROM_SIZE + 1,
                max: MAX_ROM_SIZE
            })
        );
    }

    #[test]
    fn skip_bios_starts_in_the_cartridge() {
        let config = GbaConfig {
            skip_bios: true,
            ..GbaConfig::default()
        };
        let gba = Gba::new(vec![0; BIOS_SIZE], vec![0; 0x100], config);
        let gba = gba.unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(gba.cpu().current_instruction_address(), 0x0800_0000);
    }
}
