//! # ARM Instruction Decoding
//!
//! Turns a 32-bit opcode into an [`ArmModeInstruction`] with every field
//! extracted. Execution lives in [`operations`](super::operations).
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Bits 27-25 determine the basic category:                               │
//! │                                                                         │
//! │  000 + special patterns  →  Multiply, Multiply Long, SWP, BX, LDRH...   │
//! │  00x (opcode 10xx, S=0)  →  PSR transfer (MRS, MSR)                     │
//! │  00x                     →  Data Processing                             │
//! │  01x                     →  Load/Store (011 with bit 4 set: undefined)  │
//! │  100                     →  Block Data Transfer (LDM/STM)               │
//! │  101                     →  Branch (B/BL)                               │
//! │  110, 1110               →  Coprocessor (undefined on this system)      │
//! │  1111                    →  Software Interrupt                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Patterns are checked from the most specific to the least specific, the
//! order of the `if` chain in [`ArmModeInstruction::from`] matters.

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::arm::alu_instruction::{
    AluSecondOperandInfo, ArmModeAluInstruction, PsrKind, PsrOpKind, ShiftOperator,
};
use crate::cpu::condition::Condition;
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, OperandKind, ReadWriteKind,
    ShiftKind,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SingleDataTransferOffsetInfo {
    Immediate {
        offset: u32,
    },
    RegisterImmediate {
        shift_amount: u32,
        shift_kind: ShiftKind,
        reg_offset: usize,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum HalfwordDataTransferOffsetKind {
    Immediate { offset: u32 },
    Register { register: usize },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmModeMultiplyLongVariant {
    Umull,
    Umlal,
    Smull,
    Smlal,
}

impl ArmModeMultiplyLongVariant {
    #[must_use]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::Smull | Self::Smlal)
    }

    #[must_use]
    pub const fn accumulates(self) -> bool {
        matches!(self, Self::Umlal | Self::Smlal)
    }
}

impl From<u32> for ArmModeMultiplyLongVariant {
    fn from(op_code: u32) -> Self {
        match op_code.get_bits(21..=22) {
            0b00 => Self::Umull,
            0b01 => Self::Umlal,
            0b10 => Self::Smull,
            _ => Self::Smlal,
        }
    }
}

/// All ARM instruction types after decoding.
///
/// | Variant                | Example Instructions      |
/// |------------------------|---------------------------|
/// | `DataProcessing`       | AND, ADD, CMP, MOV        |
/// | `Multiply`             | MUL, MLA                  |
/// | `MultiplyLong`         | UMULL, SMLAL              |
/// | `PsrTransfer`          | MRS, MSR                  |
/// | `SingleDataSwap`       | SWP, SWPB                 |
/// | `BranchAndExchange`    | BX                        |
/// | `HalfwordDataTransfer` | LDRH, STRH, LDRSB, LDRSH  |
/// | `SingleDataTransfer`   | LDR, STR, LDRB, STRB      |
/// | `BlockDataTransfer`    | LDM, STM                  |
/// | `Branch`               | B, BL                     |
/// | `SoftwareInterrupt`    | SWI                       |
/// | `Coprocessor`          | CDP, LDC, MRC...          |
/// | `Undefined`            | reserved encodings        |
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum ArmModeInstruction {
    DataProcessing {
        condition: Condition,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        rn: usize,
        destination: usize,
        op2: AluSecondOperandInfo,
    },
    Multiply {
        condition: Condition,
        accumulate: bool,
        set_conditions: bool,
        rd: usize,
        rn: usize,
        rs: usize,
        rm: usize,
    },
    MultiplyLong {
        condition: Condition,
        variant: ArmModeMultiplyLongVariant,
        set_conditions: bool,
        rd_hi: usize,
        rd_lo: usize,
        rs: usize,
        rm: usize,
    },
    PsrTransfer {
        condition: Condition,
        psr_kind: PsrKind,
        kind: PsrOpKind,
    },
    SingleDataSwap {
        condition: Condition,
        quantity: ReadWriteKind,
        rn: usize,
        rd: usize,
        rm: usize,
    },
    BranchAndExchange {
        condition: Condition,
        register: usize,
    },
    HalfwordDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        write_back: bool,
        load_store: LoadStoreKind,
        offset_kind: HalfwordDataTransferOffsetKind,
        base_register: usize,
        rd: usize,
        transfer_kind: HalfwordTransferKind,
    },
    SingleDataTransfer {
        condition: Condition,
        load_store: LoadStoreKind,
        quantity: ReadWriteKind,
        write_back: bool,
        indexing: Indexing,
        rd: usize,
        base_register: usize,
        offset_info: SingleDataTransferOffsetInfo,
        offsetting: Offsetting,
    },
    BlockDataTransfer {
        condition: Condition,
        indexing: Indexing,
        offsetting: Offsetting,
        load_psr: bool,
        write_back: bool,
        load_store: LoadStoreKind,
        rn: usize,
        register_list: u16,
    },
    Branch {
        condition: Condition,
        link: bool,
        /// Already sign-extended and multiplied by 4.
        offset: u32,
    },
    SoftwareInterrupt {
        condition: Condition,
        comment: u32,
    },
    Coprocessor {
        condition: Condition,
    },
    Undefined {
        condition: Condition,
    },
}

impl ArmModeInstruction {
    #[must_use]
    pub const fn condition(&self) -> Condition {
        match self {
            Self::DataProcessing { condition, .. }
            | Self::Multiply { condition, .. }
            | Self::MultiplyLong { condition, .. }
            | Self::PsrTransfer { condition, .. }
            | Self::SingleDataSwap { condition, .. }
            | Self::BranchAndExchange { condition, .. }
            | Self::HalfwordDataTransfer { condition, .. }
            | Self::SingleDataTransfer { condition, .. }
            | Self::BlockDataTransfer { condition, .. }
            | Self::Branch { condition, .. }
            | Self::SoftwareInterrupt { condition, .. }
            | Self::Coprocessor { condition }
            | Self::Undefined { condition } => *condition,
        }
    }
}

fn decode_psr_transfer(op_code: u32, condition: Condition) -> Option<ArmModeInstruction> {
    let psr_kind = PsrKind::from(op_code.get_bit(22));

    // MRS: cond 00010 P 00 1111 Rd 0000 0000 0000
    if op_code.get_bits(23..=27) == 0b0_0010
        && op_code.get_bits(20..=21) == 0b00
        && op_code.get_bits(16..=19) == 0b1111
        && op_code.get_bits(0..=11) == 0
    {
        return Some(ArmModeInstruction::PsrTransfer {
            condition,
            psr_kind,
            kind: PsrOpKind::Mrs {
                destination_register: op_code.get_bits(12..=15) as usize,
            },
        });
    }

    // MSR: cond 00I10 P 10 mask 1111 operand
    if op_code.get_bits(26..=27) == 0b00
        && op_code.get_bits(23..=24) == 0b10
        && op_code.get_bits(20..=21) == 0b10
        && op_code.get_bits(12..=15) == 0b1111
    {
        let field_mask = op_code.get_bits(16..=19);
        let kind = if op_code.get_bit(25) {
            let base = op_code.get_bits(0..=7);
            let rotate = op_code.get_bits(8..=11) * 2;
            PsrOpKind::MsrImmediate {
                value: base.rotate_right(rotate),
                field_mask,
            }
        } else if op_code.get_bits(4..=11) == 0 {
            PsrOpKind::Msr {
                source_register: op_code.get_bits(0..=3) as usize,
                field_mask,
            }
        } else {
            return None;
        };

        return Some(ArmModeInstruction::PsrTransfer {
            condition,
            psr_kind,
            kind,
        });
    }

    None
}

fn decode_data_processing(op_code: u32, condition: Condition) -> ArmModeInstruction {
    let alu_instruction = ArmModeAluInstruction::from(op_code.get_bits(21..=24));
    let set_conditions = op_code.get_bit(20);
    let op_kind = OperandKind::from(op_code.get_bit(25));

    if alu_instruction.is_test() && !set_conditions {
        return decode_psr_transfer(op_code, condition)
            .unwrap_or(ArmModeInstruction::Undefined { condition });
    }

    let op2 = match op_kind {
        OperandKind::Immediate => AluSecondOperandInfo::Immediate {
            base: op_code.get_bits(0..=7),
            shift: op_code.get_bits(8..=11) * 2,
        },
        OperandKind::Register => {
            let shift_op = if op_code.get_bit(4) {
                ShiftOperator::Register(op_code.get_bits(8..=11) as usize)
            } else {
                ShiftOperator::Immediate(op_code.get_bits(7..=11))
            };
            AluSecondOperandInfo::Register {
                shift_op,
                shift_kind: op_code.get_bits(5..=6).into(),
                register: op_code.get_bits(0..=3) as usize,
            }
        }
    };

    ArmModeInstruction::DataProcessing {
        condition,
        alu_instruction,
        set_conditions,
        rn: op_code.get_bits(16..=19) as usize,
        destination: op_code.get_bits(12..=15) as usize,
        op2,
    }
}

impl From<u32> for ArmModeInstruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u32) -> Self {
        let condition = Condition::from(op_code.get_bits(28..=31));

        if op_code.get_bits(4..=27) == 0x12_FFF1 {
            Self::BranchAndExchange {
                condition,
                register: op_code.get_bits(0..=3) as usize,
            }
        } else if op_code.get_bits(25..=27) == 0b000 && op_code.get_bits(4..=7) == 0b1001 {
            let rm = op_code.get_bits(0..=3) as usize;
            let rs = op_code.get_bits(8..=11) as usize;
            let set_conditions = op_code.get_bit(20);

            if op_code.get_bits(22..=24) == 0b000 {
                Self::Multiply {
                    condition,
                    accumulate: op_code.get_bit(21),
                    set_conditions,
                    rd: op_code.get_bits(16..=19) as usize,
                    rn: op_code.get_bits(12..=15) as usize,
                    rs,
                    rm,
                }
            } else if op_code.get_bits(23..=24) == 0b01 {
                Self::MultiplyLong {
                    condition,
                    variant: op_code.into(),
                    set_conditions,
                    rd_hi: op_code.get_bits(16..=19) as usize,
                    rd_lo: op_code.get_bits(12..=15) as usize,
                    rs,
                    rm,
                }
            } else if op_code.get_bits(23..=24) == 0b10
                && op_code.get_bits(20..=21) == 0b00
                && op_code.get_bits(8..=11) == 0
            {
                Self::SingleDataSwap {
                    condition,
                    quantity: op_code.get_bit(22).into(),
                    rn: op_code.get_bits(16..=19) as usize,
                    rd: op_code.get_bits(12..=15) as usize,
                    rm,
                }
            } else {
                Self::Undefined { condition }
            }
        } else if op_code.get_bits(25..=27) == 0b000 && op_code.get_bit(7) && op_code.get_bit(4) {
            let load_store = LoadStoreKind::from(op_code.get_bit(20));
            let Ok(transfer_kind) = HalfwordTransferKind::try_from(op_code.get_bits(5..=6)) else {
                return Self::Undefined { condition };
            };
            // Signed stores are LDRD/STRD on later cores, reserved on ARMv4.
            if load_store == LoadStoreKind::Store && transfer_kind != HalfwordTransferKind::UnsignedHalfword {
                return Self::Undefined { condition };
            }

            let offset_kind = if op_code.get_bit(22) {
                HalfwordDataTransferOffsetKind::Immediate {
                    offset: (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
                }
            } else {
                HalfwordDataTransferOffsetKind::Register {
                    register: op_code.get_bits(0..=3) as usize,
                }
            };

            Self::HalfwordDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                write_back: op_code.get_bit(21),
                load_store,
                offset_kind,
                base_register: op_code.get_bits(16..=19) as usize,
                rd: op_code.get_bits(12..=15) as usize,
                transfer_kind,
            }
        } else if op_code.get_bits(26..=27) == 0b00 {
            decode_data_processing(op_code, condition)
        } else if op_code.get_bits(25..=27) == 0b011 && op_code.get_bit(4) {
            tracing::debug!("undefined instruction decode: opcode=0x{op_code:08X}");
            Self::Undefined { condition }
        } else if op_code.get_bits(26..=27) == 0b01 {
            // NOTE: The I bit is inverted compared to data processing, 0 means immediate.
            let offset_info = if op_code.get_bit(25) {
                SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: op_code.get_bits(7..=11),
                    shift_kind: op_code.get_bits(5..=6).into(),
                    reg_offset: op_code.get_bits(0..=3) as usize,
                }
            } else {
                SingleDataTransferOffsetInfo::Immediate {
                    offset: op_code.get_bits(0..=11),
                }
            };

            Self::SingleDataTransfer {
                condition,
                load_store: op_code.get_bit(20).into(),
                quantity: op_code.get_bit(22).into(),
                write_back: op_code.get_bit(21),
                indexing: op_code.get_bit(24).into(),
                rd: op_code.get_bits(12..=15) as usize,
                base_register: op_code.get_bits(16..=19) as usize,
                offset_info,
                offsetting: op_code.get_bit(23).into(),
            }
        } else if op_code.get_bits(25..=27) == 0b100 {
            Self::BlockDataTransfer {
                condition,
                indexing: op_code.get_bit(24).into(),
                offsetting: op_code.get_bit(23).into(),
                load_psr: op_code.get_bit(22),
                write_back: op_code.get_bit(21),
                load_store: op_code.get_bit(20).into(),
                rn: op_code.get_bits(16..=19) as usize,
                register_list: op_code.get_bits(0..=15) as u16,
            }
        } else if op_code.get_bits(25..=27) == 0b101 {
            Self::Branch {
                condition,
                link: op_code.get_bit(24),
                offset: op_code.get_bits(0..=23).sign_extended(24) << 2,
            }
        } else if op_code.get_bits(24..=27) == 0b1111 {
            Self::SoftwareInterrupt {
                condition,
                comment: op_code.get_bits(0..=23),
            }
        } else {
            Self::Coprocessor { condition }
        }
    }
}

impl std::fmt::Display for ArmModeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_branch() {
        let output = ArmModeInstruction::from(0b1110_1011_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: true,
                offset: 508,
            },
            output
        );

        let output = ArmModeInstruction::from(0b0000_1010_0000_0000_0000_0000_0111_1111);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::EQ,
                link: false,
                offset: 508,
            },
            output
        );

        // B -8: branch to itself.
        let output = ArmModeInstruction::from(0xEAFF_FFFE);
        assert_eq!(
            ArmModeInstruction::Branch {
                condition: Condition::AL,
                link: false,
                offset: (-8_i32) as u32,
            },
            output
        );
    }

    #[test]
    fn decode_branch_and_exchange() {
        let output = ArmModeInstruction::from(0b0000_0001_0010_1111_1111_1111_0001_0001);
        assert_eq!(
            ArmModeInstruction::BranchAndExchange {
                condition: Condition::EQ,
                register: 1
            },
            output
        );
    }

    #[test]
    fn decode_psr_transfer() {
        // MSR SPSR, R14
        let output = ArmModeInstruction::from(0b1110_00_0_1011_0_1001_1111_000000001110);
        assert_eq!(
            ArmModeInstruction::PsrTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Spsr,
                kind: PsrOpKind::Msr {
                    source_register: 14,
                    field_mask: 0b1001,
                }
            },
            output
        );

        // MRS R0, CPSR
        assert_eq!(
            ArmModeInstruction::from(0xE10F_0000),
            ArmModeInstruction::PsrTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::Mrs {
                    destination_register: 0
                },
            }
        );

        // MSR CPSR_f, #0xF0000000
        assert_eq!(
            ArmModeInstruction::from(0xE328_F20F),
            ArmModeInstruction::PsrTransfer {
                condition: Condition::AL,
                psr_kind: PsrKind::Cpsr,
                kind: PsrOpKind::MsrImmediate {
                    value: 0xF000_0000,
                    field_mask: 0b1000,
                },
            }
        );
    }

    #[test]
    fn decode_data_processing() {
        // ADD R0, R1, R2, LSL #3
        assert_eq!(
            ArmModeInstruction::from(0xE081_0182),
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstruction::Add,
                set_conditions: false,
                rn: 1,
                destination: 0,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Immediate(3),
                    shift_kind: ShiftKind::Lsl,
                    register: 2,
                },
            }
        );

        // MOVS R3, R4, ROR R5
        assert_eq!(
            ArmModeInstruction::from(0xE1B0_3574),
            ArmModeInstruction::DataProcessing {
                condition: Condition::AL,
                alu_instruction: ArmModeAluInstruction::Mov,
                set_conditions: true,
                rn: 0,
                destination: 3,
                op2: AluSecondOperandInfo::Register {
                    shift_op: ShiftOperator::Register(5),
                    shift_kind: ShiftKind::Ror,
                    register: 4,
                },
            }
        );
    }

    #[test]
    fn decode_half_word_data_transfer_immediate_offset() {
        let output = ArmModeInstruction::from(0b1110_0001_1100_0001_0000_0000_1011_0000);
        assert_eq!(
            ArmModeInstruction::HalfwordDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Up,
                write_back: false,
                load_store: LoadStoreKind::Store,
                offset_kind: HalfwordDataTransferOffsetKind::Immediate { offset: 0 },
                base_register: 1,
                rd: 0,
                transfer_kind: HalfwordTransferKind::UnsignedHalfword,
            },
            output
        );
    }

    #[test]
    fn decode_single_data_transfer() {
        let output = ArmModeInstruction::from(0b11100111010100010101000000001100);
        assert_eq!(
            output,
            ArmModeInstruction::SingleDataTransfer {
                condition: Condition::AL,
                load_store: LoadStoreKind::Load,
                quantity: ReadWriteKind::Byte,
                write_back: false,
                indexing: Indexing::Pre,
                rd: 5,
                base_register: 1,
                offset_info: SingleDataTransferOffsetInfo::RegisterImmediate {
                    shift_amount: 0,
                    shift_kind: ShiftKind::Lsl,
                    reg_offset: 12
                },
                offsetting: Offsetting::Down
            }
        );
    }

    #[test]
    fn decode_swap_vs_halfword_transfer() {
        let output = ArmModeInstruction::from(0b1110_0001_0100_0110_0100_0000_1001_0101);
        assert_eq!(
            output,
            ArmModeInstruction::SingleDataSwap {
                condition: Condition::AL,
                quantity: ReadWriteKind::Byte,
                rn: 6,
                rd: 4,
                rm: 5,
            }
        );

        let strh_opcode = 0b1110_0001_1100_0001_0000_0000_1011_0000;
        assert!(matches!(
            ArmModeInstruction::from(strh_opcode),
            ArmModeInstruction::HalfwordDataTransfer { .. }
        ));
    }

    #[test]
    fn decode_multiplies() {
        // MLAS R1, R2, R3, R4
        assert_eq!(
            ArmModeInstruction::from(0xE031_4392),
            ArmModeInstruction::Multiply {
                condition: Condition::AL,
                accumulate: true,
                set_conditions: true,
                rd: 1,
                rn: 4,
                rs: 3,
                rm: 2,
            }
        );

        // SMLAL R0, R1, R2, R3
        assert_eq!(
            ArmModeInstruction::from(0xE0E1_0392),
            ArmModeInstruction::MultiplyLong {
                condition: Condition::AL,
                variant: ArmModeMultiplyLongVariant::Smlal,
                set_conditions: false,
                rd_hi: 1,
                rd_lo: 0,
                rs: 3,
                rm: 2,
            }
        );
    }

    #[test]
    fn decode_block_and_swi() {
        // STMFD SP!, {R0-R3, LR}
        assert_eq!(
            ArmModeInstruction::from(0xE92D_400F),
            ArmModeInstruction::BlockDataTransfer {
                condition: Condition::AL,
                indexing: Indexing::Pre,
                offsetting: Offsetting::Down,
                load_psr: false,
                write_back: true,
                load_store: LoadStoreKind::Store,
                rn: 13,
                register_list: 0x400F,
            }
        );

        assert_eq!(
            ArmModeInstruction::from(0xEF00_0005),
            ArmModeInstruction::SoftwareInterrupt {
                condition: Condition::AL,
                comment: 5,
            }
        );
    }

    #[test]
    fn reserved_encodings_are_undefined() {
        // Media space (011 with bit 4 set).
        assert_eq!(
            ArmModeInstruction::from(0xE7F0_00F0),
            ArmModeInstruction::Undefined {
                condition: Condition::AL
            }
        );
        // TST with S clear that is not a PSR transfer.
        assert_eq!(
            ArmModeInstruction::from(0xE100_0001),
            ArmModeInstruction::Undefined {
                condition: Condition::AL
            }
        );
        // CDP
        assert_eq!(
            ArmModeInstruction::from(0xEE00_0000),
            ArmModeInstruction::Coprocessor {
                condition: Condition::AL
            }
        );
    }
}
