//! # Thumb Instruction Decoding
//!
//! Thumb instructions are grouped into 19 formats, identified by their high bits:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Format 1:  000 xx          Move shifted register                       │
//! │  Format 2:  00011           Add/subtract                                │
//! │  Format 3:  001 xx          Move/compare/add/subtract immediate         │
//! │  Format 4:  010000          ALU operations                              │
//! │  Format 5:  010001          Hi register operations / BX                 │
//! │  Format 6:  01001           PC-relative load                            │
//! │  Format 7:  0101 xx0        Load/store with register offset             │
//! │  Format 8:  0101 xx1        Load/store sign-extended byte/halfword      │
//! │  Format 9:  011 xx          Load/store with immediate offset            │
//! │  Format 10: 1000 x          Load/store halfword                         │
//! │  Format 11: 1001 x          SP-relative load/store                      │
//! │  Format 12: 1010 x          Load address                                │
//! │  Format 13: 10110000        Add offset to stack pointer                 │
//! │  Format 14: 1011 x10x       Push/pop registers                          │
//! │  Format 15: 1100 x          Multiple load/store                         │
//! │  Format 16: 1101 xxxx       Conditional branch                          │
//! │  Format 17: 11011111        Software interrupt                          │
//! │  Format 18: 11100           Unconditional branch                        │
//! │  Format 19: 1111 x          Long branch with link                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Long Branch (BL)
//!
//! ```text
//! First:  1111 0xxx xxxx xxxx  ; LR = PC + (offset_hi << 12)
//! Second: 1111 1xxx xxxx xxxx  ; PC = LR + (offset_lo << 1), LR = next | 1
//! ```

use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::condition::Condition;
use crate::cpu::flags::{HalfwordTransferKind, LoadStoreKind, ReadWriteKind, ShiftKind};
use crate::cpu::thumb::alu_instructions::{
    ThumbHighRegisterOperation, ThumbImmediateOperation, ThumbModeAluInstruction,
};

#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum Instruction {
    MoveShiftedRegister {
        shift_operation: ShiftKind,
        offset5: u32,
        source_register: usize,
        destination_register: usize,
    },
    AddSubtract {
        immediate: bool,
        subtract: bool,
        rn_offset3: u32,
        source_register: usize,
        destination_register: usize,
    },
    MoveCompareAddSubtractImm {
        operation: ThumbImmediateOperation,
        destination_register: usize,
        offset: u32,
    },
    AluOp {
        alu_operation: ThumbModeAluInstruction,
        source_register: usize,
        destination_register: usize,
    },
    HiRegisterOpBX {
        register_operation: ThumbHighRegisterOperation,
        source_register: usize,
        destination_register: usize,
    },
    PCRelativeLoad {
        destination_register: usize,
        offset: u32,
    },
    LoadStoreRegisterOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset_register: usize,
        base_register: usize,
        destination_register: usize,
    },
    /// `STRH` when `transfer` is `None`.
    LoadStoreSignExtByteHalfword {
        transfer: Option<HalfwordTransferKind>,
        load_store: LoadStoreKind,
        offset_register: usize,
        base_register: usize,
        destination_register: usize,
    },
    LoadStoreImmOffset {
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
        offset: u32,
        base_register: usize,
        destination_register: usize,
    },
    LoadStoreHalfword {
        load_store: LoadStoreKind,
        offset: u32,
        base_register: usize,
        destination_register: usize,
    },
    SPRelativeLoadStore {
        load_store: LoadStoreKind,
        destination_register: usize,
        offset: u32,
    },
    LoadAddress {
        sp: bool,
        destination_register: usize,
        offset: u32,
    },
    AddOffsetSP {
        negative: bool,
        offset: u32,
    },
    PushPopReg {
        load_store: LoadStoreKind,
        pc_lr: bool,
        register_list: u16,
    },
    MultipleLoadStore {
        load_store: LoadStoreKind,
        base_register: usize,
        register_list: u16,
    },
    CondBranch {
        condition: Condition,
        /// Sign-extended byte offset.
        offset: u32,
    },
    Swi {
        comment: u32,
    },
    UncondBranch {
        /// Sign-extended byte offset.
        offset: u32,
    },
    LongBranchLink {
        second_half: bool,
        offset: u32,
    },
    Undefined,
}

impl From<u16> for Instruction {
    #[allow(clippy::too_many_lines)]
    fn from(op_code: u16) -> Self {
        use Instruction::*;

        let low_register = |start: u8| op_code.get_bits(start..=start + 2) as usize;

        if op_code.get_bits(8..=15) == 0b1101_1111 {
            Swi {
                comment: u32::from(op_code.get_bits(0..=7)),
            }
        } else if op_code.get_bits(8..=15) == 0b1011_0000 {
            AddOffsetSP {
                negative: op_code.get_bit(7),
                offset: u32::from(op_code.get_bits(0..=6)) << 2,
            }
        } else if op_code.get_bits(10..=15) == 0b01_0000 {
            AluOp {
                alu_operation: op_code.get_bits(6..=9).into(),
                source_register: low_register(3),
                destination_register: low_register(0),
            }
        } else if op_code.get_bits(10..=15) == 0b01_0001 {
            let destination_register =
                low_register(0) | (usize::from(op_code.get_bit(7)) << 3);

            HiRegisterOpBX {
                register_operation: op_code.get_bits(8..=9).into(),
                source_register: op_code.get_bits(3..=6) as usize,
                destination_register,
            }
        } else if op_code.get_bits(12..=15) == 0b1011 && op_code.get_bits(9..=10) == 0b10 {
            PushPopReg {
                load_store: op_code.get_bit(11).into(),
                pc_lr: op_code.get_bit(8),
                register_list: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(11..=15) == 0b00011 {
            AddSubtract {
                immediate: op_code.get_bit(10),
                subtract: op_code.get_bit(9),
                rn_offset3: u32::from(op_code.get_bits(6..=8)),
                source_register: low_register(3),
                destination_register: low_register(0),
            }
        } else if op_code.get_bits(11..=15) == 0b01001 {
            PCRelativeLoad {
                destination_register: low_register(8),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b0101 && !op_code.get_bit(9) {
            LoadStoreRegisterOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word: op_code.get_bit(10).into(),
                offset_register: low_register(6),
                base_register: low_register(3),
                destination_register: low_register(0),
            }
        } else if op_code.get_bits(12..=15) == 0b0101 {
            //   S H  (bit 10, bit 11)
            //   0 0  STRH
            //   0 1  LDRH
            //   1 0  LDSB
            //   1 1  LDSH
            let (load_store, transfer) = match (op_code.get_bit(10), op_code.get_bit(11)) {
                (false, false) => (LoadStoreKind::Store, None),
                (false, true) => (
                    LoadStoreKind::Load,
                    Some(HalfwordTransferKind::UnsignedHalfword),
                ),
                (true, false) => (LoadStoreKind::Load, Some(HalfwordTransferKind::SignedByte)),
                (true, true) => (
                    LoadStoreKind::Load,
                    Some(HalfwordTransferKind::SignedHalfword),
                ),
            };
            LoadStoreSignExtByteHalfword {
                transfer,
                load_store,
                offset_register: low_register(6),
                base_register: low_register(3),
                destination_register: low_register(0),
            }
        } else if op_code.get_bits(11..=15) == 0b11100 {
            UncondBranch {
                offset: (u32::from(op_code.get_bits(0..=10)) << 1).sign_extended(12),
            }
        } else if op_code.get_bits(12..=15) == 0b1000 {
            LoadStoreHalfword {
                load_store: op_code.get_bit(11).into(),
                offset: u32::from(op_code.get_bits(6..=10)) << 1,
                base_register: low_register(3),
                destination_register: low_register(0),
            }
        } else if op_code.get_bits(12..=15) == 0b1001 {
            SPRelativeLoadStore {
                load_store: op_code.get_bit(11).into(),
                destination_register: low_register(8),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1010 {
            LoadAddress {
                sp: op_code.get_bit(11),
                destination_register: low_register(8),
                offset: u32::from(op_code.get_bits(0..=7)) << 2,
            }
        } else if op_code.get_bits(12..=15) == 0b1100 {
            MultipleLoadStore {
                load_store: op_code.get_bit(11).into(),
                base_register: low_register(8),
                register_list: op_code.get_bits(0..=7),
            }
        } else if op_code.get_bits(12..=15) == 0b1101 {
            let condition = Condition::from(op_code.get_bits(8..=11));
            // Condition 1110 is undefined in this format, 1111 is SWI (handled above).
            if condition == Condition::AL {
                return Undefined;
            }
            CondBranch {
                condition,
                offset: (u32::from(op_code.get_bits(0..=7)) << 1).sign_extended(9),
            }
        } else if op_code.get_bits(12..=15) == 0b1111 {
            LongBranchLink {
                second_half: op_code.get_bit(11),
                offset: u32::from(op_code.get_bits(0..=10)),
            }
        } else if op_code.get_bits(13..=15) == 0b000 {
            MoveShiftedRegister {
                shift_operation: op_code.get_bits(11..=12).into(),
                offset5: u32::from(op_code.get_bits(6..=10)),
                source_register: low_register(3),
                destination_register: low_register(0),
            }
        } else if op_code.get_bits(13..=15) == 0b001 {
            MoveCompareAddSubtractImm {
                operation: op_code.get_bits(11..=12).into(),
                destination_register: low_register(8),
                offset: u32::from(op_code.get_bits(0..=7)),
            }
        } else if op_code.get_bits(13..=15) == 0b011 {
            let byte_word: ReadWriteKind = op_code.get_bit(12).into();
            let offset = u32::from(op_code.get_bits(6..=10));
            let offset = match byte_word {
                ReadWriteKind::Word => offset << 2,
                ReadWriteKind::Byte => offset,
            };

            LoadStoreImmOffset {
                load_store: op_code.get_bit(11).into(),
                byte_word,
                offset,
                base_register: low_register(3),
                destination_register: low_register(0),
            }
        } else {
            // 1011 hints and 11101 (BLX on ARMv5) are undefined on ARMv4T.
            tracing::debug!("undefined thumb instruction 0x{op_code:04X}");
            Undefined
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
