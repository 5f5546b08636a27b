//! Read-only hooks for debuggers and tracers.
//!
//! Observers only ever see copies of the machine state, they cannot change
//! the outcome of an instruction. With no observer registered the CPU runs
//! the plain code path.

use crate::bus::{Bus, MemoryAccess};
use crate::cpu::arm7tdmi::{Arm7tdmi, CpuSnapshot};
use crate::cpu::hardware::interrupt_control::Interrupt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    HalfWord,
    Word,
}

pub trait Observer {
    /// Called before the instruction at `address` executes.
    fn instruction(&mut self, _address: u32, _op_code: u32, _state: &CpuSnapshot) {}

    /// Called before every bus access made by the CPU, opcode fetches included.
    fn memory_access(&mut self, _address: u32, _kind: AccessKind, _width: AccessWidth) {}

    /// Called once for every interrupt source that became pending.
    fn interrupt_requested(&mut self, _source: Interrupt) {}
}

#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn Observer>>,
    last_pending: u16,
}

impl ObserverSet {
    pub fn push(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Reports newly raised IF bits and the instruction about to execute.
    pub(crate) fn before_step(&mut self, cpu: &Arm7tdmi) {
        let pending = cpu.pending_interrupts();
        let raised = pending & !self.last_pending;
        self.last_pending = pending;

        for source in Interrupt::ALL {
            if raised & source.mask() != 0 {
                for observer in &mut self.observers {
                    observer.interrupt_requested(source);
                }
            }
        }

        if cpu.will_execute_instruction() {
            let snapshot = cpu.snapshot();
            let address = cpu.current_instruction_address();
            for observer in &mut self.observers {
                observer.instruction(address, cpu.next_opcode(), &snapshot);
            }
        }
    }

    fn memory_access(&mut self, address: u32, kind: AccessKind, width: AccessWidth) {
        for observer in &mut self.observers {
            observer.memory_access(address, kind, width);
        }
    }
}

/// Bus wrapper reporting every access to the observers.
pub(crate) struct ObservedBus<'a, B> {
    bus: &'a mut B,
    observers: &'a mut ObserverSet,
}

impl<'a, B: Bus> ObservedBus<'a, B> {
    pub(crate) fn new(bus: &'a mut B, observers: &'a mut ObserverSet) -> Self {
        Self { bus, observers }
    }
}

impl<B: Bus> Bus for ObservedBus<'_, B> {
    fn read_byte(&mut self, address: u32, access: MemoryAccess) -> u8 {
        self.observers
            .memory_access(address, AccessKind::Read, AccessWidth::Byte);
        self.bus.read_byte(address, access)
    }

    fn read_half_word(&mut self, address: u32, access: MemoryAccess) -> u16 {
        self.observers
            .memory_access(address, AccessKind::Read, AccessWidth::HalfWord);
        self.bus.read_half_word(address, access)
    }

    fn read_word(&mut self, address: u32, access: MemoryAccess) -> u32 {
        self.observers
            .memory_access(address, AccessKind::Read, AccessWidth::Word);
        self.bus.read_word(address, access)
    }

    fn fetch_word(&mut self, address: u32, access: MemoryAccess) -> u32 {
        self.observers
            .memory_access(address, AccessKind::Read, AccessWidth::Word);
        self.bus.fetch_word(address, access)
    }

    fn fetch_half_word(&mut self, address: u32, access: MemoryAccess) -> u16 {
        self.observers
            .memory_access(address, AccessKind::Read, AccessWidth::HalfWord);
        self.bus.fetch_half_word(address, access)
    }

    fn write_byte(&mut self, address: u32, value: u8, access: MemoryAccess) {
        self.observers
            .memory_access(address, AccessKind::Write, AccessWidth::Byte);
        self.bus.write_byte(address, value, access);
    }

    fn write_half_word(&mut self, address: u32, value: u16, access: MemoryAccess) {
        self.observers
            .memory_access(address, AccessKind::Write, AccessWidth::HalfWord);
        self.bus.write_half_word(address, value, access);
    }

    fn write_word(&mut self, address: u32, value: u32, access: MemoryAccess) {
        self.observers
            .memory_access(address, AccessKind::Write, AccessWidth::Word);
        self.bus.write_word(address, value, access);
    }

    fn tick_components(&mut self, cycles: u32) {
        self.bus.tick_components(cycles);
    }

    fn idle(&mut self) {
        self.bus.idle();
    }

    fn idle_until_event(&mut self) {
        self.bus.idle_until_event();
    }
}
