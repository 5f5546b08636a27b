use crate::bitwise::Bits;
use crate::bus::{Bus, MemoryAccess};
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArithmeticOpResult, ArmModeAluInstruction, PsrKind, PsrOpKind,
    ShiftOperator, add_with_carry, shift, shift_immediate, sub_with_carry,
};
use crate::cpu::arm::instructions::{
    ArmModeInstruction, ArmModeMultiplyLongVariant, HalfwordDataTransferOffsetKind,
    SingleDataTransferOffsetInfo,
};
use crate::cpu::arm7tdmi::{Arm7tdmi, multiply_cycles};
use crate::cpu::exception::Exception;
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, ReadWriteKind,
};
use crate::cpu::psr::{CpuState, Psr};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};

pub const SIZE_OF_INSTRUCTION: u32 = 4;

/// Result of a logical operation: C comes from the shifter, V is preserved.
const fn logical(result: u32, carry: bool, overflow: bool) -> ArithmeticOpResult {
    ArithmeticOpResult {
        result,
        carry,
        overflow,
        sign: (result >> 31) != 0,
        zero: result == 0,
    }
}

impl Arm7tdmi {
    pub(crate) fn execute_arm<B: Bus>(&mut self, bus: &mut B, op_code: u32) {
        let instruction = ArmModeInstruction::from(op_code);
        if !self.cpsr.can_execute(instruction.condition()) {
            return;
        }

        match instruction {
            ArmModeInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                rn,
                destination,
                op2,
                ..
            } => self.data_processing(bus, alu_instruction, set_conditions, rn, destination, op2),
            ArmModeInstruction::Multiply {
                accumulate,
                set_conditions,
                rd,
                rn,
                rs,
                rm,
                ..
            } => self.multiply(bus, accumulate, set_conditions, rd, rn, rs, rm),
            ArmModeInstruction::MultiplyLong {
                variant,
                set_conditions,
                rd_hi,
                rd_lo,
                rs,
                rm,
                ..
            } => self.multiply_long(bus, variant, set_conditions, rd_hi, rd_lo, rs, rm),
            ArmModeInstruction::PsrTransfer { psr_kind, kind, .. } => {
                self.psr_transfer(bus, psr_kind, kind);
            }
            ArmModeInstruction::SingleDataSwap {
                quantity, rn, rd, rm, ..
            } => self.single_data_swap(bus, quantity, rn, rd, rm),
            ArmModeInstruction::BranchAndExchange { register, .. } => {
                self.branch_and_exchange(bus, register);
            }
            ArmModeInstruction::HalfwordDataTransfer {
                indexing,
                offsetting,
                write_back,
                load_store,
                offset_kind,
                base_register,
                rd,
                transfer_kind,
                ..
            } => {
                let offset = match offset_kind {
                    HalfwordDataTransferOffsetKind::Immediate { offset } => offset,
                    HalfwordDataTransferOffsetKind::Register { register } => {
                        self.registers.register_at(register)
                    }
                };
                self.half_word_data_transfer(
                    bus,
                    indexing,
                    offsetting,
                    write_back,
                    load_store,
                    offset,
                    base_register,
                    rd,
                    transfer_kind,
                );
            }
            ArmModeInstruction::SingleDataTransfer {
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
                ..
            } => self.single_data_transfer(
                bus,
                load_store,
                quantity,
                write_back,
                indexing,
                rd,
                base_register,
                offset_info,
                offsetting,
            ),
            ArmModeInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
                ..
            } => self.block_data_transfer(
                bus,
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
                rn,
                register_list,
            ),
            ArmModeInstruction::Branch { link, offset, .. } => self.branch(bus, link, offset),
            ArmModeInstruction::SoftwareInterrupt { comment, .. } => {
                tracing::trace!("SWI 0x{comment:06X}");
                self.enter_exception(bus, Exception::SoftwareInterrupt);
            }
            ArmModeInstruction::Coprocessor { .. } | ArmModeInstruction::Undefined { .. } => {
                tracing::debug!(
                    "undefined ARM instruction 0x{op_code:08X} at 0x{:08X}",
                    self.registers.program_counter().wrapping_sub(2 * SIZE_OF_INSTRUCTION)
                );
                self.enter_exception(bus, Exception::Undefined);
            }
        }
    }

    /// Operand 2 through the barrel shifter. A shift by register costs one
    /// internal cycle and makes R15 read 12 bytes ahead instead of 8.
    fn shifter_operand<B: Bus>(&self, bus: &mut B, op2: AluSecondOperandInfo) -> ArithmeticOpResult {
        let carry = self.cpsr.carry_flag();

        match op2 {
            AluSecondOperandInfo::Immediate { base, shift } => {
                if shift == 0 {
                    logical(base, carry, false)
                } else {
                    let value = base.rotate_right(shift);
                    logical(value, value.get_bit(31), false)
                }
            }
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind,
                register,
            } => match shift_op {
                ShiftOperator::Immediate(amount) => {
                    shift_immediate(shift_kind, amount, self.registers.register_at(register), carry)
                }
                ShiftOperator::Register(rs) => {
                    bus.idle();
                    let amount = self.registers.register_at(rs) & 0xFF;
                    let rm = self.read_register_late(register);
                    shift(shift_kind, amount, rm, carry)
                }
            },
        }
    }

    /// Register read one cycle after the fetch, R15 is one more instruction ahead.
    fn read_register_late(&self, register: usize) -> u32 {
        let value = self.registers.register_at(register);
        if register == REG_PROGRAM_COUNTER {
            value.wrapping_add(SIZE_OF_INSTRUCTION)
        } else {
            value
        }
    }

    pub fn data_processing<B: Bus>(
        &mut self,
        bus: &mut B,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: usize,
        destination: usize,
        op2: AluSecondOperandInfo,
    ) {
        use ArmModeAluInstruction::*;

        let register_shift = matches!(
            op2,
            AluSecondOperandInfo::Register {
                shift_op: ShiftOperator::Register(_),
                ..
            }
        );
        let operand = self.shifter_operand(bus, op2);
        let op1 = if register_shift {
            self.read_register_late(rn)
        } else {
            self.registers.register_at(rn)
        };
        let op2 = operand.result;
        let carry = self.cpsr.carry_flag();
        let overflow = self.cpsr.overflow_flag();

        let result = match alu_instruction {
            And | Tst => logical(op1 & op2, operand.carry, overflow),
            Eor | Teq => logical(op1 ^ op2, operand.carry, overflow),
            Orr => logical(op1 | op2, operand.carry, overflow),
            Bic => logical(op1 & !op2, operand.carry, overflow),
            Mov => logical(op2, operand.carry, overflow),
            Mvn => logical(!op2, operand.carry, overflow),
            Sub | Cmp => sub_with_carry(op1, op2, true),
            Rsb => sub_with_carry(op2, op1, true),
            Add | Cmn => add_with_carry(op1, op2, false),
            Adc => add_with_carry(op1, op2, carry),
            Sbc => sub_with_carry(op1, op2, carry),
            Rsc => sub_with_carry(op2, op1, carry),
        };

        if set_conditions {
            if destination == REG_PROGRAM_COUNTER && !alu_instruction.is_test() {
                // MOVS pc, lr and friends: return from exception.
                self.restore_cpsr_from_spsr();
            } else {
                self.cpsr.set_flags(&result);
            }
        }

        if !alu_instruction.is_test() {
            self.write_register(bus, destination, result.result);
        }
    }

    fn psr_transfer<B: Bus>(&mut self, bus: &mut B, psr_kind: PsrKind, kind: PsrOpKind) {
        match kind {
            PsrOpKind::Mrs {
                destination_register,
            } => {
                let psr = match psr_kind {
                    PsrKind::Cpsr => self.cpsr,
                    PsrKind::Spsr => self.spsr(),
                };
                self.write_register(bus, destination_register, psr.into());
            }
            PsrOpKind::Msr {
                source_register,
                field_mask,
            } => {
                let value = self.registers.register_at(source_register);
                self.write_psr(psr_kind, value, field_mask);
            }
            PsrOpKind::MsrImmediate { value, field_mask } => {
                self.write_psr(psr_kind, value, field_mask);
            }
        }
    }

    /// MSR. Field mask bit 3 selects the flags byte, bit 0 the control byte.
    /// User mode can only touch the flags, and the T bit is never written here.
    fn write_psr(&mut self, psr_kind: PsrKind, value: u32, field_mask: u32) {
        let mut mask: u32 = 0;
        if field_mask.get_bit(3) {
            mask |= 0xFF00_0000;
        }
        if field_mask.get_bit(0) && self.cpsr.mode().is_privileged() {
            mask |= 0x0000_00FF;
        }

        match psr_kind {
            PsrKind::Cpsr => {
                mask.set_bit_off(5);
                let current = u32::from(self.cpsr);
                self.write_cpsr((current & !mask) | (value & mask));
            }
            PsrKind::Spsr => {
                let current = u32::from(self.spsr());
                self.set_spsr(Psr::from_raw((current & !mask) | (value & mask)));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn multiply<B: Bus>(
        &mut self,
        bus: &mut B,
        accumulate: bool,
        set_conditions: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    ) {
        let rs_value = self.registers.register_at(rs);
        let mut result = self.registers.register_at(rm).wrapping_mul(rs_value);
        let mut cycles = multiply_cycles(rs_value, true);

        if accumulate {
            result = result.wrapping_add(self.registers.register_at(rn));
            cycles += 1;
        }

        for _ in 0..cycles {
            bus.idle();
        }

        // C is left unchanged (its value is meaningless on this core).
        if set_conditions {
            self.cpsr.set_nz(result);
        }
        self.write_register(bus, rd, result);
    }

    #[allow(clippy::too_many_arguments)]
    fn multiply_long<B: Bus>(
        &mut self,
        bus: &mut B,
        variant: ArmModeMultiplyLongVariant,
        set_conditions: bool,
        rd_hi: usize,
        rd_lo: usize,
        rs: usize,
        rm: usize,
    ) {
        let rs_value = self.registers.register_at(rs);
        let rm_value = self.registers.register_at(rm);
        let signed = variant.is_signed();

        let mut result = if signed {
            (i64::from(rm_value as i32) * i64::from(rs_value as i32)) as u64
        } else {
            u64::from(rm_value) * u64::from(rs_value)
        };
        let mut cycles = multiply_cycles(rs_value, signed) + 1;

        if variant.accumulates() {
            let accumulator = (u64::from(self.registers.register_at(rd_hi)) << 32)
                | u64::from(self.registers.register_at(rd_lo));
            result = result.wrapping_add(accumulator);
            cycles += 1;
        }

        for _ in 0..cycles {
            bus.idle();
        }

        if set_conditions {
            self.cpsr.set_sign_flag(result.get_bit(63));
            self.cpsr.set_zero_flag(result == 0);
        }
        self.registers.set_register_at(rd_lo, result as u32);
        self.write_register(bus, rd_hi, (result >> 32) as u32);
    }

    fn single_data_swap<B: Bus>(
        &mut self,
        bus: &mut B,
        quantity: ReadWriteKind,
        rn: usize,
        rd: usize,
        rm: usize,
    ) {
        let address = self.registers.register_at(rn);
        let source = self.registers.register_at(rm);

        let old = match quantity {
            ReadWriteKind::Word => {
                let old = bus.read_word_rotated(address, MemoryAccess::NonSequential);
                bus.write_word(address, source, MemoryAccess::NonSequential);
                old
            }
            ReadWriteKind::Byte => {
                let old = bus.read_byte(address, MemoryAccess::NonSequential);
                bus.write_byte(address, source as u8, MemoryAccess::NonSequential);
                u32::from(old)
            }
        };

        self.finish_load(bus, rd, old);
    }

    /// Internal cycle of a load, then the loaded value lands in `rd`.
    pub(crate) fn finish_load<B: Bus>(&mut self, bus: &mut B, rd: usize, value: u32) {
        bus.idle();
        self.data_access_done();
        self.write_register(bus, rd, value);
    }

    fn branch_and_exchange<B: Bus>(&mut self, bus: &mut B, register: usize) {
        let target = self.registers.register_at(register);
        self.cpsr.set_cpu_state(CpuState::from(target.get_bit(0)));
        self.branch_to(bus, target);
    }

    fn branch<B: Bus>(&mut self, bus: &mut B, link: bool, offset: u32) {
        let pc = self.registers.program_counter();
        if link {
            self.registers
                .set_register_at(REG_LR, pc.wrapping_sub(SIZE_OF_INSTRUCTION));
        }
        self.branch_to(bus, pc.wrapping_add(offset));
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn half_word_data_transfer<B: Bus>(
        &mut self,
        bus: &mut B,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset: u32,
        base_register: usize,
        rd: usize,
        transfer_kind: HalfwordTransferKind,
    ) {
        let base = self.registers.register_at(base_register);
        let offset_address = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };
        let write_back = write_back || indexing == Indexing::Post;

        match load_store {
            LoadStoreKind::Load => {
                let access = MemoryAccess::NonSequential;
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfword => bus.read_half_word_rotated(address, access),
                    HalfwordTransferKind::SignedByte => bus.read_signed_byte(address, access),
                    HalfwordTransferKind::SignedHalfword => bus.read_signed_half_word(address, access),
                };
                if write_back {
                    self.write_register(bus, base_register, offset_address);
                }
                self.finish_load(bus, rd, value);
            }
            LoadStoreKind::Store => {
                let value = self.read_register_late(rd);
                bus.write_half_word(address, value as u16, MemoryAccess::NonSequential);
                self.data_access_done();
                if write_back {
                    self.write_register(bus, base_register, offset_address);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn single_data_transfer<B: Bus>(
        &mut self,
        bus: &mut B,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: usize,
        base_register: usize,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    ) {
        let offset = match offset_info {
            SingleDataTransferOffsetInfo::Immediate { offset } => offset,
            SingleDataTransferOffsetInfo::RegisterImmediate {
                shift_amount,
                shift_kind,
                reg_offset,
            } => {
                shift_immediate(
                    shift_kind,
                    shift_amount,
                    self.registers.register_at(reg_offset),
                    self.cpsr.carry_flag(),
                )
                .result
            }
        };

        let base = self.registers.register_at(base_register);
        let offset_address = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };
        let write_back = write_back || indexing == Indexing::Post;

        self.transfer(bus, load_store, quantity, address, rd);
        // A load into the base register wins over the write-back.
        if write_back && !(load_store == LoadStoreKind::Load && rd == base_register) {
            self.write_register(bus, base_register, offset_address);
        }
    }

    /// `LDR`/`STR` of a word or byte at `address`, shared by both states.
    pub(crate) fn transfer<B: Bus>(
        &mut self,
        bus: &mut B,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        address: u32,
        rd: usize,
    ) {
        let access = MemoryAccess::NonSequential;
        match load_store {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Word => bus.read_word_rotated(address, access),
                    ReadWriteKind::Byte => u32::from(bus.read_byte(address, access)),
                };
                self.finish_load(bus, rd, value);
            }
            LoadStoreKind::Store => {
                let value = self.read_register_late(rd);
                match quantity {
                    ReadWriteKind::Word => bus.write_word(address, value, access),
                    ReadWriteKind::Byte => bus.write_byte(address, value as u8, access),
                }
                self.data_access_done();
            }
        }
    }

    /// `LDM`/`STM`, also used by Thumb `PUSH`/`POP`/`LDMIA`/`STMIA`.
    ///
    /// Registers are always transferred lowest first at the lowest address.
    /// An empty list transfers R15 and moves the base by 0x40.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn block_data_transfer<B: Bus>(
        &mut self,
        bus: &mut B,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        register_list: u16,
    ) {
        let (list, span) = if register_list == 0 {
            (1_u16 << 15, 0x40)
        } else {
            (register_list, register_list.count_ones() * 4)
        };

        let base = self.registers.register_at(rn);
        let (start, final_base) = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Pre) => (base.wrapping_add(4), base.wrapping_add(span)),
            (Offsetting::Up, Indexing::Post) => (base, base.wrapping_add(span)),
            (Offsetting::Down, Indexing::Pre) => (base.wrapping_sub(span), base.wrapping_sub(span)),
            (Offsetting::Down, Indexing::Post) => {
                (base.wrapping_sub(span).wrapping_add(4), base.wrapping_sub(span))
            }
        };

        // S bit without R15 in an LDM (or any STM): user bank transfer.
        let user_bank = load_psr && !(load_store == LoadStoreKind::Load && list.get_bit(15));
        let mode = self.cpsr.mode();
        let registers = (0..16).filter(|reg| list.get_bit(*reg as u8));

        let mut address = start;
        let mut access = MemoryAccess::NonSequential;

        match load_store {
            LoadStoreKind::Store => {
                for (index, reg) in registers.enumerate() {
                    let value = if reg == rn && write_back && index > 0 {
                        // The base is already written back after the first transfer.
                        final_base
                    } else if user_bank {
                        self.register_bank
                            .user_register(&self.registers, mode, reg)
                    } else {
                        self.read_register_late(reg)
                    };
                    bus.write_word(address, value, access);
                    access = MemoryAccess::Sequential;
                    address = address.wrapping_add(4);
                }

                self.data_access_done();
                if write_back {
                    self.write_register(bus, rn, final_base);
                }
            }
            LoadStoreKind::Load => {
                if write_back {
                    self.registers.set_register_at(rn, final_base);
                }

                let mut new_pc = None;
                for reg in registers {
                    let value = bus.read_word(address, access);
                    access = MemoryAccess::Sequential;
                    address = address.wrapping_add(4);

                    if user_bank {
                        self.register_bank
                            .set_user_register(&mut self.registers, mode, reg, value);
                    } else if reg == REG_PROGRAM_COUNTER {
                        new_pc = Some(value);
                    } else {
                        self.registers.set_register_at(reg, value);
                    }
                }

                bus.idle();
                self.data_access_done();

                if let Some(target) = new_pc {
                    if load_psr {
                        self.restore_cpsr_from_spsr();
                    }
                    self.branch_to(bus, target);
                }
            }
        }
    }
}
