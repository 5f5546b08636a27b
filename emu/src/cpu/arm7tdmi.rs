//! # ARM7TDMI Core
//!
//! ## Pipeline
//!
//! The core has a three stage pipeline (fetch, decode, execute). It is
//! modeled with two prefetched opcodes and R15 always pointing at the next
//! fetch:
//!
//! ```text
//!              pipeline[0]   pipeline[1]   R15
//!  ARM         X             X + 4         X + 8    (X is executing)
//!  Thumb       X             X + 2         X + 4
//! ```
//!
//! A step shifts the pipeline, fetches at R15 and executes the opcode that
//! left it. Writing R15 flushes the pipeline: the target and the following
//! instruction are fetched (N then S) and R15 ends two instructions past the
//! target, so the invariant holds again before the next step.
//!
//! ## Interrupts and halt
//!
//! Between two instructions the core looks at `IE & IF`. A non zero value
//! wakes it from halt; if IME is set and CPSR.I is clear the lowest pending
//! source is acknowledged and the IRQ exception is taken. While halted the
//! bus is asked to fast-forward to the next scheduled event.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::bus::{Bus, MemoryAccess};
use crate::cpu::cpu_modes::Mode;
#[cfg(feature = "debugger")]
use crate::cpu::debugger::{ObservedBus, Observer, ObserverSet};
use crate::cpu::exception::Exception;
use crate::cpu::hardware::interrupt_control::InterruptControl;
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::register_bank::RegisterBank;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP, Registers};

/// Entry point of the cartridge, where the BIOS jumps after boot.
pub const CARTRIDGE_ENTRY_POINT: u32 = 0x0800_0000;

/// Stack pointers the BIOS sets up before jumping to the cartridge.
pub const USER_STACK_POINTER: u32 = 0x0300_7F00;
pub const IRQ_STACK_POINTER: u32 = 0x0300_7FA0;
pub const SUPERVISOR_STACK_POINTER: u32 = 0x0300_7FE0;

pub struct Arm7tdmi {
    pub cpsr: Psr,
    pub registers: Registers,
    pub register_bank: RegisterBank,

    pipeline: [u32; 2],
    /// Timing class of the next opcode fetch.
    next_fetch: MemoryAccess,
    /// Set by anything that writes R15 during the current instruction.
    pipeline_flushed: bool,
    halted: bool,

    interrupts: Rc<InterruptControl>,

    #[cfg(feature = "debugger")]
    observers: ObserverSet,
}

/// A copy of the architectural state, for observers and save states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub registers: Registers,
    pub cpsr: Psr,
    pub register_bank: RegisterBank,
    pub pipeline: [u32; 2],
    pub halted: bool,
}

impl Arm7tdmi {
    #[must_use]
    pub fn new(interrupts: Rc<InterruptControl>) -> Self {
        let mut cpsr = Psr::from(Mode::Supervisor);
        cpsr.set_irq_disable(true);
        cpsr.set_fiq_disable(true);

        Self {
            cpsr,
            registers: Registers::default(),
            register_bank: RegisterBank::default(),
            pipeline: [0; 2],
            next_fetch: MemoryAccess::NonSequential,
            pipeline_flushed: false,
            halted: false,
            interrupts,
            #[cfg(feature = "debugger")]
            observers: ObserverSet::default(),
        }
    }

    /// Puts the core in its power-on state (Supervisor, ARM, IRQ/FIQ masked)
    /// and fills the pipeline from address 0.
    pub fn reset<B: Bus>(&mut self, bus: &mut B) {
        let old_cpsr = self.cpsr;
        self.switch_mode(Mode::Supervisor);
        self.register_bank.set_spsr(Mode::Supervisor, old_cpsr);
        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);
        self.cpsr.set_fiq_disable(true);
        self.halted = false;
        self.branch_to(bus, Exception::Reset.vector());
    }

    /// Register state left by the BIOS boot sequence, starting at the
    /// cartridge entry point in System mode.
    pub fn skip_bios<B: Bus>(&mut self, bus: &mut B) {
        // Leave Supervisor first: the switch saves the live R13 into its bank.
        self.switch_mode(Mode::System);
        self.cpsr = Psr::from(Mode::System);
        self.register_bank
            .set_banked_sp(Mode::Supervisor, SUPERVISOR_STACK_POINTER);
        self.register_bank.set_banked_sp(Mode::Irq, IRQ_STACK_POINTER);
        self.registers.set_register_at(REG_SP, USER_STACK_POINTER);
        self.halted = false;
        self.branch_to(bus, CARTRIDGE_ENTRY_POINT);
    }

    /// Executes one pipeline step: an instruction, an interrupt entry, or
    /// (while halted) a wait for the next event.
    #[cfg(not(feature = "debugger"))]
    pub fn step<B: Bus>(&mut self, bus: &mut B) {
        self.step_inner(bus);
    }

    #[cfg(feature = "debugger")]
    pub fn step<B: Bus>(&mut self, bus: &mut B) {
        if self.observers.is_empty() {
            self.step_inner(bus);
            return;
        }

        let mut observers = std::mem::take(&mut self.observers);
        observers.before_step(self);
        self.step_inner(&mut ObservedBus::new(bus, &mut observers));
        self.observers = observers;
    }

    /// Registers a pure observer notified of instructions, memory accesses
    /// and interrupt requests.
    #[cfg(feature = "debugger")]
    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    fn step_inner<B: Bus>(&mut self, bus: &mut B) {
        if self.halted {
            if self.interrupts.irq_line() == 0 {
                bus.idle_until_event();
                return;
            }
            self.halted = false;
        }

        if let Some(source) = self.deliverable_interrupt() {
            self.interrupts.acknowledge(source);
            self.enter_exception(bus, Exception::Irq);
            return;
        }

        let op_code = self.pipeline[0];
        self.pipeline[0] = self.pipeline[1];
        self.pipeline_flushed = false;

        let pc = self.registers.program_counter();
        let state = self.cpsr.cpu_state();
        match state {
            CpuState::Arm => {
                self.pipeline[1] = bus.fetch_word(pc, self.next_fetch);
                self.next_fetch = MemoryAccess::Sequential;
                self.execute_arm(bus, op_code);
            }
            CpuState::Thumb => {
                self.pipeline[1] = u32::from(bus.fetch_half_word(pc, self.next_fetch));
                self.next_fetch = MemoryAccess::Sequential;
                self.execute_thumb(bus, op_code as u16);
            }
        }

        if !self.pipeline_flushed {
            self.registers
                .advance_program_counter(state.instruction_size());
        }

        if self.interrupts.take_halt_request() {
            tracing::trace!("cpu halted");
            self.halted = true;
        }
    }

    /// Source mask of the interrupt the core would take right now.
    fn deliverable_interrupt(&self) -> Option<u16> {
        if !self.interrupts.master_enabled() || self.cpsr.irq_disable() {
            return None;
        }
        self.interrupts.highest_priority()
    }

    /// IF as seen by the core.
    #[must_use]
    pub fn pending_interrupts(&self) -> u16 {
        self.interrupts.pending()
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// True when the next step runs `pipeline[0]` (no halt, no IRQ entry).
    #[must_use]
    pub fn will_execute_instruction(&self) -> bool {
        (!self.halted || self.interrupts.irq_line() != 0) && self.deliverable_interrupt().is_none()
    }

    /// Address of the instruction the next step executes.
    #[must_use]
    pub fn current_instruction_address(&self) -> u32 {
        let size = self.cpsr.cpu_state().instruction_size();
        self.registers.program_counter().wrapping_sub(2 * size)
    }

    #[must_use]
    pub const fn next_opcode(&self) -> u32 {
        self.pipeline[0]
    }

    /// Refills the pipeline from R15 (aligned to the current state).
    pub(crate) fn flush_pipeline<B: Bus>(&mut self, bus: &mut B) {
        self.pipeline_flushed = true;

        match self.cpsr.cpu_state() {
            CpuState::Arm => {
                let pc = self.registers.program_counter() & !0b11;
                self.pipeline[0] = bus.fetch_word(pc, MemoryAccess::NonSequential);
                self.pipeline[1] = bus.fetch_word(pc.wrapping_add(4), MemoryAccess::Sequential);
                self.registers.set_program_counter(pc.wrapping_add(8));
            }
            CpuState::Thumb => {
                let pc = self.registers.program_counter() & !0b1;
                self.pipeline[0] = u32::from(bus.fetch_half_word(pc, MemoryAccess::NonSequential));
                self.pipeline[1] =
                    u32::from(bus.fetch_half_word(pc.wrapping_add(2), MemoryAccess::Sequential));
                self.registers.set_program_counter(pc.wrapping_add(4));
            }
        }

        self.next_fetch = MemoryAccess::Sequential;
    }

    pub(crate) fn branch_to<B: Bus>(&mut self, bus: &mut B, address: u32) {
        self.registers.set_program_counter(address);
        self.flush_pipeline(bus);
    }

    /// Writes a register, R15 writes branch.
    pub(crate) fn write_register<B: Bus>(&mut self, bus: &mut B, reg: usize, value: u32) {
        if reg == REG_PROGRAM_COUNTER {
            self.branch_to(bus, value);
        } else {
            self.registers.set_register_at(reg, value);
        }
    }

    /// The next opcode fetch follows a data access, it is non sequential.
    pub(crate) const fn data_access_done(&mut self) {
        self.next_fetch = MemoryAccess::NonSequential;
    }

    pub(crate) fn enter_exception<B: Bus>(&mut self, bus: &mut B, exception: Exception) {
        let size = self.cpsr.cpu_state().instruction_size();
        let pc = self.registers.program_counter();
        let return_address = match exception {
            // Address of the next instruction to execute, plus 4.
            Exception::Irq => pc.wrapping_sub(2 * size).wrapping_add(4),
            // Address of the instruction following the faulting one.
            Exception::SoftwareInterrupt | Exception::Undefined => pc.wrapping_sub(size),
            Exception::Reset => 0,
        };

        tracing::trace!(
            "entering {exception:?} from 0x{:08X}, return address 0x{return_address:08X}",
            pc.wrapping_sub(2 * size)
        );

        let old_cpsr = self.cpsr;
        let mode = exception.target_mode();
        self.switch_mode(mode);
        self.register_bank.set_spsr(mode, old_cpsr);

        self.cpsr.set_cpu_state(CpuState::Arm);
        self.cpsr.set_irq_disable(true);
        if exception.disables_fiq() {
            self.cpsr.set_fiq_disable(true);
        }

        self.registers.set_register_at(REG_LR, return_address);
        self.branch_to(bus, exception.vector());
    }

    /// Banks out the registers of the current mode and banks in `mode`'s.
    pub(crate) fn switch_mode(&mut self, mode: Mode) {
        let current = self.cpsr.mode();
        if current != mode {
            self.register_bank
                .switch(&mut self.registers, current, mode);
            self.cpsr.set_mode(mode);
        }
    }

    /// Full CPSR write (MSR, exception return). Invalid mode bits are
    /// architecturally unpredictable: the current mode is kept.
    pub(crate) fn write_cpsr(&mut self, value: u32) {
        let mut value = Psr::from_raw(value);

        match Mode::try_from(value.mode_bits()) {
            Ok(mode) => self.switch_mode(mode),
            Err(err) => {
                tracing::warn!("{err} written to CPSR, staying in {:?}", self.cpsr.mode());
                value.set_mode(self.cpsr.mode());
            }
        }

        self.cpsr = value;
    }

    /// SPSR of the current mode. User and System have none, the CPSR is
    /// returned instead.
    #[must_use]
    pub fn spsr(&self) -> Psr {
        let mode = self.cpsr.mode();
        if mode.has_spsr() {
            self.register_bank.spsr(mode)
        } else {
            self.cpsr
        }
    }

    pub(crate) fn set_spsr(&mut self, value: Psr) {
        let mode = self.cpsr.mode();
        if mode.has_spsr() {
            self.register_bank.set_spsr(mode, value);
        } else {
            tracing::debug!("SPSR write ignored in {mode:?} mode");
        }
    }

    /// Exception return (`MOVS pc, lr`, `LDM ^` with R15): CPSR = SPSR.
    pub(crate) fn restore_cpsr_from_spsr(&mut self) {
        let mode = self.cpsr.mode();
        if mode.has_spsr() {
            self.write_cpsr(self.register_bank.spsr(mode).into());
        } else {
            tracing::warn!("exception return attempted in {mode:?} mode, CPSR unchanged");
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            registers: self.registers,
            cpsr: self.cpsr,
            register_bank: self.register_bank.clone(),
            pipeline: self.pipeline,
            halted: self.halted,
        }
    }

    /// Loads a state produced by [`Self::snapshot`].
    pub fn restore(&mut self, snapshot: &CpuSnapshot) {
        self.registers = snapshot.registers;
        self.register_bank = snapshot.register_bank.clone();
        self.pipeline = snapshot.pipeline;
        self.halted = snapshot.halted;
        self.next_fetch = MemoryAccess::NonSequential;

        let mode = self.cpsr.mode();
        self.cpsr = snapshot.cpsr;
        if Mode::try_from(self.cpsr.mode_bits()).is_err() {
            tracing::warn!("snapshot with invalid CPSR mode, keeping {mode:?}");
            self.cpsr.set_mode(mode);
        }
    }
}

/// Internal cycles of a multiply, from how many significant bytes `rs` has.
/// Signed multiplies also terminate early on leading ones.
pub(crate) fn multiply_cycles(rs: u32, signed: bool) -> u32 {
    let check = |mask: u32| rs & mask == 0 || (signed && rs & mask == mask);

    if check(0xFFFF_FF00) {
        1
    } else if check(0xFFFF_0000) {
        2
    } else if check(0xFF00_0000) {
        3
    } else {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::flat::FlatBus;
    use crate::cpu::hardware::interrupt_control::Interrupt;
    use pretty_assertions::assert_eq;

    const NOP: u32 = 0xE1A0_0000; // MOV R0, R0

    fn cpu_at_reset(program: &[u32]) -> (Arm7tdmi, FlatBus, Rc<InterruptControl>) {
        let interrupts = InterruptControl::new();
        let mut bus = FlatBus::new(0x1000);
        bus.load_words(0, program);
        let mut cpu = Arm7tdmi::new(Rc::clone(&interrupts));
        cpu.reset(&mut bus);
        (cpu, bus, interrupts)
    }

    #[test]
    fn reset_state() {
        let (cpu, _, _) = cpu_at_reset(&[NOP]);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert!(cpu.cpsr.irq_disable());
        assert!(cpu.cpsr.fiq_disable());
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);
        assert_eq!(cpu.registers.program_counter(), 8);
        assert_eq!(cpu.current_instruction_address(), 0);
    }

    #[test]
    fn branch_refills_pipeline_at_target() {
        // 0x00: B 0x100
        // 0x100: MOV R1, #1
        // 0x104: MOV R2, #2
        let (mut cpu, mut bus, _) = cpu_at_reset(&[0xEA00_003E]);
        bus.load_words(0x100, &[0xE3A0_1001, 0xE3A0_2002]);
        bus.accesses.clear();

        cpu.step(&mut bus);

        // The fetch at 0x08 happens while the branch executes, then the
        // target and the next word are fetched non-sequentially/sequentially.
        assert_eq!(
            bus.accesses,
            vec![
                (0x08, MemoryAccess::Sequential),
                (0x100, MemoryAccess::NonSequential),
                (0x104, MemoryAccess::Sequential),
            ]
        );
        assert_eq!(cpu.registers.program_counter(), 0x108);
        assert_eq!(cpu.current_instruction_address(), 0x100);

        cpu.step(&mut bus);
        assert_eq!(cpu.registers.register_at(1), 1);
        assert_eq!(cpu.registers.program_counter(), 0x10C);
        cpu.step(&mut bus);
        assert_eq!(cpu.registers.register_at(2), 2);
    }

    #[test]
    fn irq_is_gated_by_enable_and_master_enable() {
        // Loop forever at 0x00, handler at 0x18.
        let (mut cpu, mut bus, interrupts) = cpu_at_reset(&[0xEAFF_FFFE]);
        cpu.cpsr.set_irq_disable(false);
        interrupts.set_master_enable(true);

        interrupts.handle().request(Interrupt::Timer0);
        for _ in 0..4 {
            cpu.step(&mut bus);
        }
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(interrupts.pending(), Interrupt::Timer0.mask());

        interrupts.set_enable(Interrupt::Timer0.mask());
        cpu.step(&mut bus);

        assert_eq!(cpu.cpsr.mode(), Mode::Irq);
        assert!(cpu.cpsr.irq_disable());
        assert_eq!(cpu.current_instruction_address(), 0x18);
        assert_eq!(cpu.registers.register_at(REG_LR), 4);
        assert_eq!(cpu.spsr().mode(), Mode::Supervisor);
        assert_eq!(interrupts.pending(), 0);
    }

    #[test]
    fn software_interrupt_and_return() {
        // 0x00: SWI 0, 0x04: MOV R0, #7, 0x08: SWI handler: MOVS PC, LR
        let (mut cpu, mut bus, _) = cpu_at_reset(&[0xEF00_0000, 0xE3A0_0007, 0xE1B0_F00E]);
        cpu.write_cpsr(u32::from(Psr::from(Mode::System)));

        cpu.step(&mut bus);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.registers.register_at(REG_LR), 4);
        assert_eq!(cpu.current_instruction_address(), 0x08);

        cpu.step(&mut bus);
        assert_eq!(cpu.cpsr.mode(), Mode::System);
        assert_eq!(cpu.current_instruction_address(), 0x04);

        cpu.step(&mut bus);
        assert_eq!(cpu.registers.register_at(0), 7);
    }

    #[test]
    fn undefined_instruction_traps() {
        let (mut cpu, mut bus, _) = cpu_at_reset(&[0xE7F0_00F0]);
        cpu.step(&mut bus);

        assert_eq!(cpu.cpsr.mode(), Mode::Undefined);
        assert_eq!(cpu.registers.register_at(REG_LR), 4);
        assert_eq!(cpu.current_instruction_address(), 0x04);
    }

    #[test]
    fn halt_waits_for_enabled_interrupt() {
        let (mut cpu, mut bus, interrupts) = cpu_at_reset(&[NOP, NOP, NOP]);
        interrupts.request_halt();
        cpu.step(&mut bus);
        assert!(cpu.is_halted());

        let pc = cpu.registers.program_counter();
        let cycles = bus.cycles;
        cpu.step(&mut bus);
        assert!(cpu.is_halted());
        assert_eq!(cpu.registers.program_counter(), pc);
        assert!(bus.cycles > cycles);

        // Pending but IRQs masked in CPSR: wakes up and keeps executing.
        interrupts.set_enable(Interrupt::VBlank.mask());
        interrupts.request(Interrupt::VBlank);
        cpu.step(&mut bus);
        assert!(!cpu.is_halted());
        assert_eq!(cpu.registers.program_counter(), pc + 4);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
    }

    #[test]
    fn invalid_mode_write_keeps_mode() {
        let (mut cpu, _, _) = cpu_at_reset(&[NOP]);
        cpu.write_cpsr(0xF000_0000 | 0b00101);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert!(cpu.cpsr.sign_flag());
    }

    #[test]
    fn skip_bios_state() {
        let interrupts = InterruptControl::new();
        let mut bus = FlatBus::new(0x100);
        let mut cpu = Arm7tdmi::new(interrupts);
        cpu.skip_bios(&mut bus);

        assert_eq!(cpu.cpsr.mode(), Mode::System);
        assert_eq!(cpu.registers.register_at(REG_SP), USER_STACK_POINTER);
        assert_eq!(cpu.current_instruction_address(), CARTRIDGE_ENTRY_POINT);

        cpu.switch_mode(Mode::Irq);
        assert_eq!(cpu.registers.register_at(REG_SP), IRQ_STACK_POINTER);
        cpu.switch_mode(Mode::Supervisor);
        assert_eq!(cpu.registers.register_at(REG_SP), SUPERVISOR_STACK_POINTER);
    }

    #[test]
    fn snapshot_round_trips_through_serde() {
        let (mut cpu, mut bus, _) = cpu_at_reset(&[0xE3A0_1001, NOP]);
        cpu.step(&mut bus);

        let snapshot = cpu.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: CpuSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);

        let (mut other, _, _) = cpu_at_reset(&[]);
        other.restore(&decoded);
        assert_eq!(other.snapshot(), snapshot);
    }

    #[test]
    fn multiply_early_termination() {
        assert_eq!(multiply_cycles(0xFF, false), 1);
        assert_eq!(multiply_cycles(0xFFFF_FFFF, true), 1);
        assert_eq!(multiply_cycles(0xFFFF_FFFF, false), 4);
        assert_eq!(multiply_cycles(0x1234, false), 2);
        assert_eq!(multiply_cycles(0x00FF_0000, false), 3);
        assert_eq!(multiply_cycles(0xFF80_0000, true), 3);
    }
}
