use thiserror::Error;

/// Problems with the images handed to [`crate::gba::Gba::new`]. Once a system
/// is built nothing in the core can fail.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GbaError {
    #[error("BIOS image must be {expected} bytes, got {actual}")]
    InvalidBiosSize { expected: usize, actual: usize },

    #[error("cartridge ROM is empty")]
    EmptyRom,

    #[error("cartridge ROM is {size} bytes, the Game Pak bus addresses at most {max}")]
    RomTooLarge { size: usize, max: usize },
}
