//! # Interrupt Control
//!
//! IE (enable), IF (request) and IME (master enable) live here. The CPU core
//! and the I/O register space share one [`InterruptControl`]; peripherals only
//! ever get an [`IrqHandle`], which can raise a source and nothing else.
//!
//! ```text
//!  peripheral ──IrqHandle::request──▶ IF |= bit
//!                                      │
//!  CPU boundary: IE & IF != 0 ─────────┴──▶ wake from halt
//!                IME && !CPSR.I ──────────▶ clear lowest IF bit, enter IRQ
//! ```
//!
//! All the state is in [`Cell`]s: the core is single threaded and every
//! access is a short read-modify-write with no borrow held across calls.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;

/// Interrupt sources, the discriminant is the bit position in IE/IF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interrupt {
    VBlank = 0,
    HBlank = 1,
    VCount = 2,
    Timer0 = 3,
    Timer1 = 4,
    Timer2 = 5,
    Timer3 = 6,
    Serial = 7,
    Dma0 = 8,
    Dma1 = 9,
    Dma2 = 10,
    Dma3 = 11,
    Keypad = 12,
    GamePak = 13,
}

impl Interrupt {
    pub const ALL: [Self; 14] = [
        Self::VBlank,
        Self::HBlank,
        Self::VCount,
        Self::Timer0,
        Self::Timer1,
        Self::Timer2,
        Self::Timer3,
        Self::Serial,
        Self::Dma0,
        Self::Dma1,
        Self::Dma2,
        Self::Dma3,
        Self::Keypad,
        Self::GamePak,
    ];

    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << self as u16
    }

    #[must_use]
    pub const fn timer(index: usize) -> Self {
        match index {
            0 => Self::Timer0,
            1 => Self::Timer1,
            2 => Self::Timer2,
            _ => Self::Timer3,
        }
    }

    #[must_use]
    pub const fn dma(channel: usize) -> Self {
        match channel {
            0 => Self::Dma0,
            1 => Self::Dma1,
            2 => Self::Dma2,
            _ => Self::Dma3,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InterruptControl {
    /// IE
    enable: Cell<u16>,
    /// IF, bits are set by requests and cleared by writing 1 to them.
    request: Cell<u16>,
    /// IME, only bit 0 is meaningful.
    master_enable: Cell<bool>,
    /// Set by a HALTCNT write, consumed by the CPU at the end of the instruction.
    halt_requested: Cell<bool>,
}

impl InterruptControl {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Creates the write-only capability handed to peripherals.
    #[must_use]
    pub fn handle(self: &Rc<Self>) -> IrqHandle {
        IrqHandle(Rc::clone(self))
    }

    pub fn request(&self, source: Interrupt) {
        self.request.set(self.request.get() | source.mask());
    }

    #[must_use]
    pub fn enable(&self) -> u16 {
        self.enable.get()
    }

    pub fn set_enable(&self, value: u16) {
        self.enable.set(value & 0x3FFF);
    }

    #[must_use]
    pub fn pending(&self) -> u16 {
        self.request.get()
    }

    /// IF write semantics: every bit set in `mask` is cleared.
    pub fn acknowledge(&self, mask: u16) {
        self.request.set(self.request.get() & !mask);
    }

    #[must_use]
    pub fn master_enabled(&self) -> bool {
        self.master_enable.get()
    }

    pub fn set_master_enable(&self, value: bool) {
        self.master_enable.set(value);
    }

    /// `IE & IF`, non zero means the IRQ line would be asserted if unmasked.
    #[must_use]
    pub fn irq_line(&self) -> u16 {
        self.enable.get() & self.request.get()
    }

    /// Lowest enabled pending source, which the core acknowledges on delivery.
    #[must_use]
    pub fn highest_priority(&self) -> Option<u16> {
        let line = self.irq_line();
        (line != 0).then(|| line & line.wrapping_neg())
    }

    pub fn request_halt(&self) {
        self.halt_requested.set(true);
    }

    pub fn take_halt_request(&self) -> bool {
        self.halt_requested.replace(false)
    }

    /// Byte view used by the I/O register space (IE at 0, IF at 2, IME at 8).
    #[must_use]
    pub fn read_register(&self, offset: u32) -> u8 {
        match offset {
            0 => self.enable().get_byte(0),
            1 => self.enable().get_byte(1),
            2 => self.pending().get_byte(0),
            3 => self.pending().get_byte(1),
            8 => u8::from(self.master_enabled()),
            _ => 0,
        }
    }

    pub fn write_register(&self, offset: u32, value: u8) {
        match offset {
            0 | 1 => {
                let mut enable = self.enable();
                enable.set_byte((offset & 1) as u8, value);
                self.set_enable(enable);
            }
            2 => self.acknowledge(u16::from(value)),
            3 => self.acknowledge(u16::from(value) << 8),
            8 => self.set_master_enable(value.get_bit(0)),
            _ => {}
        }
    }
}

/// Write-only interrupt capability held by peripherals.
#[derive(Debug, Clone)]
pub struct IrqHandle(Rc<InterruptControl>);

impl IrqHandle {
    pub fn request(&self, source: Interrupt) {
        tracing::trace!("interrupt requested: {source:?}");
        self.0.request(source);
    }
}
