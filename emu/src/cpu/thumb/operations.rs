use crate::bitwise::Bits;
use crate::bus::{Bus, MemoryAccess};
use crate::cpu::arm::alu_instruction::{ArithmeticOpResult, add_with_carry, shift, shift_immediate, sub_with_carry};
use crate::cpu::arm7tdmi::{Arm7tdmi, multiply_cycles};
use crate::cpu::exception::Exception;
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, ReadWriteKind, ShiftKind,
};
use crate::cpu::psr::CpuState;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{
    ThumbHighRegisterOperation, ThumbImmediateOperation, ThumbModeAluInstruction,
};
use crate::cpu::thumb::instruction::Instruction;

pub const SIZE_OF_INSTRUCTION: u32 = 2;

impl Arm7tdmi {
    #[allow(clippy::too_many_lines)]
    pub(crate) fn execute_thumb<B: Bus>(&mut self, bus: &mut B, op_code: u16) {
        use Instruction::*;

        match Instruction::from(op_code) {
            MoveShiftedRegister {
                shift_operation,
                offset5,
                source_register,
                destination_register,
            } => self.move_shifted_reg(shift_operation, offset5, source_register, destination_register),
            AddSubtract {
                immediate,
                subtract,
                rn_offset3,
                source_register,
                destination_register,
            } => {
                let operand = if immediate {
                    rn_offset3
                } else {
                    self.registers.register_at(rn_offset3 as usize)
                };
                let rs = self.registers.register_at(source_register);
                let result = if subtract {
                    sub_with_carry(rs, operand, true)
                } else {
                    add_with_carry(rs, operand, false)
                };
                self.cpsr.set_flags(&result);
                self.registers
                    .set_register_at(destination_register, result.result);
            }
            MoveCompareAddSubtractImm {
                operation,
                destination_register,
                offset,
            } => self.move_compare_add_sub_imm(operation, destination_register, offset),
            AluOp {
                alu_operation,
                source_register,
                destination_register,
            } => self.alu_op(bus, alu_operation, source_register, destination_register),
            HiRegisterOpBX {
                register_operation,
                source_register,
                destination_register,
            } => self.hi_reg_operation_branch_ex(
                bus,
                register_operation,
                source_register,
                destination_register,
            ),
            PCRelativeLoad {
                destination_register,
                offset,
            } => {
                let address = (self.registers.program_counter() & !0b10).wrapping_add(offset);
                let value = bus.read_word(address, MemoryAccess::NonSequential);
                self.finish_load(bus, destination_register, value);
            }
            LoadStoreRegisterOffset {
                load_store,
                byte_word,
                offset_register,
                base_register,
                destination_register,
            } => {
                let address = self
                    .registers
                    .register_at(base_register)
                    .wrapping_add(self.registers.register_at(offset_register));
                self.transfer(bus, load_store, byte_word, address, destination_register);
            }
            LoadStoreSignExtByteHalfword {
                transfer,
                load_store,
                offset_register,
                base_register,
                destination_register,
            } => {
                let offset = self.registers.register_at(offset_register);
                self.half_word_data_transfer(
                    bus,
                    Indexing::Pre,
                    Offsetting::Up,
                    false,
                    load_store,
                    offset,
                    base_register,
                    destination_register,
                    transfer.unwrap_or(HalfwordTransferKind::UnsignedHalfword),
                );
            }
            LoadStoreImmOffset {
                load_store,
                byte_word,
                offset,
                base_register,
                destination_register,
            } => {
                let address = self.registers.register_at(base_register).wrapping_add(offset);
                self.transfer(bus, load_store, byte_word, address, destination_register);
            }
            LoadStoreHalfword {
                load_store,
                offset,
                base_register,
                destination_register,
            } => self.half_word_data_transfer(
                bus,
                Indexing::Pre,
                Offsetting::Up,
                false,
                load_store,
                offset,
                base_register,
                destination_register,
                HalfwordTransferKind::UnsignedHalfword,
            ),
            SPRelativeLoadStore {
                load_store,
                destination_register,
                offset,
            } => {
                let address = self.registers.register_at(REG_SP).wrapping_add(offset);
                self.transfer(bus, load_store, ReadWriteKind::Word, address, destination_register);
            }
            LoadAddress {
                sp,
                destination_register,
                offset,
            } => {
                let base = if sp {
                    self.registers.register_at(REG_SP)
                } else {
                    self.registers.program_counter() & !0b10
                };
                self.registers
                    .set_register_at(destination_register, base.wrapping_add(offset));
            }
            AddOffsetSP { negative, offset } => {
                let sp = self.registers.register_at(REG_SP);
                let sp = if negative {
                    sp.wrapping_sub(offset)
                } else {
                    sp.wrapping_add(offset)
                };
                self.registers.set_register_at(REG_SP, sp);
            }
            PushPopReg {
                load_store,
                pc_lr,
                register_list,
            } => match load_store {
                // PUSH is STMDB SP!, POP is LDMIA SP!.
                LoadStoreKind::Store => {
                    let list = register_list | (u16::from(pc_lr) << REG_LR);
                    self.block_data_transfer(
                        bus,
                        Indexing::Pre,
                        Offsetting::Down,
                        false,
                        true,
                        LoadStoreKind::Store,
                        REG_SP,
                        list,
                    );
                }
                LoadStoreKind::Load => {
                    let list = register_list | (u16::from(pc_lr) << REG_PROGRAM_COUNTER);
                    self.block_data_transfer(
                        bus,
                        Indexing::Post,
                        Offsetting::Up,
                        false,
                        true,
                        LoadStoreKind::Load,
                        REG_SP,
                        list,
                    );
                }
            },
            MultipleLoadStore {
                load_store,
                base_register,
                register_list,
            } => self.block_data_transfer(
                bus,
                Indexing::Post,
                Offsetting::Up,
                false,
                true,
                load_store,
                base_register,
                register_list,
            ),
            CondBranch { condition, offset } => {
                if self.cpsr.can_execute(condition) {
                    let target = self.registers.program_counter().wrapping_add(offset);
                    self.branch_to(bus, target);
                }
            }
            Swi { comment } => {
                tracing::trace!("SWI 0x{comment:02X}");
                self.enter_exception(bus, Exception::SoftwareInterrupt);
            }
            UncondBranch { offset } => {
                let target = self.registers.program_counter().wrapping_add(offset);
                self.branch_to(bus, target);
            }
            LongBranchLink {
                second_half,
                offset,
            } => self.long_branch_link(bus, second_half, offset),
            Undefined => {
                tracing::debug!(
                    "undefined Thumb instruction 0x{op_code:04X} at 0x{:08X}",
                    self.registers.program_counter().wrapping_sub(2 * SIZE_OF_INSTRUCTION)
                );
                self.enter_exception(bus, Exception::Undefined);
            }
        }
    }

    fn move_shifted_reg(&mut self, op: ShiftKind, offset5: u32, rs: usize, rd: usize) {
        let result = shift_immediate(op, offset5, self.registers.register_at(rs), self.cpsr.carry_flag());
        self.cpsr.set_nz(result.result);
        self.cpsr.set_carry_flag(result.carry);
        self.registers.set_register_at(rd, result.result);
    }

    fn move_compare_add_sub_imm(&mut self, op: ThumbImmediateOperation, rd: usize, offset: u32) {
        let value = self.registers.register_at(rd);

        match op {
            ThumbImmediateOperation::Mov => {
                self.cpsr.set_nz(offset);
                self.registers.set_register_at(rd, offset);
            }
            ThumbImmediateOperation::Cmp => {
                let result = sub_with_carry(value, offset, true);
                self.cpsr.set_flags(&result);
            }
            ThumbImmediateOperation::Add => {
                let result = add_with_carry(value, offset, false);
                self.cpsr.set_flags(&result);
                self.registers.set_register_at(rd, result.result);
            }
            ThumbImmediateOperation::Sub => {
                let result = sub_with_carry(value, offset, true);
                self.cpsr.set_flags(&result);
                self.registers.set_register_at(rd, result.result);
            }
        }
    }

    fn alu_op<B: Bus>(&mut self, bus: &mut B, op: ThumbModeAluInstruction, rs: usize, rd: usize) {
        use ThumbModeAluInstruction::*;

        let source = self.registers.register_at(rs);
        let destination = self.registers.register_at(rd);
        let carry = self.cpsr.carry_flag();

        let result = match op {
            And => destination & source,
            Eor => destination ^ source,
            Orr => destination | source,
            Bic => destination & !source,
            Mvn => !source,
            Lsl => self.shift_by_register(bus, ShiftKind::Lsl, source, destination),
            Lsr => self.shift_by_register(bus, ShiftKind::Lsr, source, destination),
            Asr => self.shift_by_register(bus, ShiftKind::Asr, source, destination),
            Ror => self.shift_by_register(bus, ShiftKind::Ror, source, destination),
            Adc => self.set_arithmetic_flags(add_with_carry(destination, source, carry)),
            Sbc => self.set_arithmetic_flags(sub_with_carry(destination, source, carry)),
            Neg => self.set_arithmetic_flags(sub_with_carry(0, source, true)),
            Mul => {
                for _ in 0..multiply_cycles(destination, true) {
                    bus.idle();
                }
                destination.wrapping_mul(source)
            }
            Tst => {
                self.cpsr.set_nz(destination & source);
                return;
            }
            Cmp => {
                self.set_arithmetic_flags(sub_with_carry(destination, source, true));
                return;
            }
            Cmn => {
                self.set_arithmetic_flags(add_with_carry(destination, source, false));
                return;
            }
        };

        self.cpsr.set_nz(result);
        self.registers.set_register_at(rd, result);
    }

    /// Format 4 shifts take the amount from the bottom byte of Rs and one
    /// internal cycle.
    fn shift_by_register<B: Bus>(&mut self, bus: &mut B, kind: ShiftKind, amount: u32, value: u32) -> u32 {
        bus.idle();
        let result = shift(kind, amount & 0xFF, value, self.cpsr.carry_flag());
        self.cpsr.set_carry_flag(result.carry);
        result.result
    }

    fn set_arithmetic_flags(&mut self, result: ArithmeticOpResult) -> u32 {
        self.cpsr.set_flags(&result);
        result.result
    }

    fn hi_reg_operation_branch_ex<B: Bus>(
        &mut self,
        bus: &mut B,
        op: ThumbHighRegisterOperation,
        rs: usize,
        rd: usize,
    ) {
        let source = self.registers.register_at(rs);

        match op {
            ThumbHighRegisterOperation::Add => {
                let result = self.registers.register_at(rd).wrapping_add(source);
                self.write_register(bus, rd, result);
            }
            ThumbHighRegisterOperation::Cmp => {
                let result = sub_with_carry(self.registers.register_at(rd), source, true);
                self.cpsr.set_flags(&result);
            }
            ThumbHighRegisterOperation::Mov => self.write_register(bus, rd, source),
            ThumbHighRegisterOperation::Bx => {
                self.cpsr.set_cpu_state(CpuState::from(source.get_bit(0)));
                self.branch_to(bus, source);
            }
        }
    }

    /// BL is two instructions. The first one parks the upper half of the
    /// offset in LR, the second one branches and leaves the return address
    /// (with bit 0 set) in LR.
    fn long_branch_link<B: Bus>(&mut self, bus: &mut B, second_half: bool, offset: u32) {
        let pc = self.registers.program_counter();

        if second_half {
            let target = self
                .registers
                .register_at(REG_LR)
                .wrapping_add(offset << 1);
            let next_instruction = pc.wrapping_sub(SIZE_OF_INSTRUCTION);
            self.registers.set_register_at(REG_LR, next_instruction | 1);
            self.branch_to(bus, target);
        } else {
            let high = (offset << 12).sign_extended(23);
            self.registers.set_register_at(REG_LR, pc.wrapping_add(high));
        }
    }
}
