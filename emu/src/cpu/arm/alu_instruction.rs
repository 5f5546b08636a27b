use serde::{Deserialize, Serialize};

use crate::bitwise::Bits;
use crate::cpu::flags::ShiftKind;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArmModeAluInstruction {
    And = 0x0,
    Eor = 0x1,
    Sub = 0x2,
    Rsb = 0x3,
    Add = 0x4,
    Adc = 0x5,
    Sbc = 0x6,
    Rsc = 0x7,
    Tst = 0x8,
    Teq = 0x9,
    Cmp = 0xA,
    Cmn = 0xB,
    Orr = 0xC,
    Mov = 0xD,
    Bic = 0xE,
    Mvn = 0xF,
}

impl ArmModeAluInstruction {
    /// TST, TEQ, CMP and CMN only update flags.
    #[must_use]
    pub const fn is_test(self) -> bool {
        matches!(self, Self::Tst | Self::Teq | Self::Cmp | Self::Cmn)
    }
}

impl From<u32> for ArmModeAluInstruction {
    fn from(alu_op_code: u32) -> Self {
        use ArmModeAluInstruction::*;
        match alu_op_code & 0xF {
            0x0 => And,
            0x1 => Eor,
            0x2 => Sub,
            0x3 => Rsb,
            0x4 => Add,
            0x5 => Adc,
            0x6 => Sbc,
            0x7 => Rsc,
            0x8 => Tst,
            0x9 => Teq,
            0xA => Cmp,
            0xB => Cmn,
            0xC => Orr,
            0xD => Mov,
            0xE => Bic,
            _ => Mvn,
        }
    }
}

/// How the shift amount of a register operand is given.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum ShiftOperator {
    Immediate(u32),
    Register(usize),
}

/// Operand 2 of a data processing instruction.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum AluSecondOperandInfo {
    Register {
        shift_op: ShiftOperator,
        shift_kind: ShiftKind,
        register: usize,
    },
    /// `base` rotated right by `shift` (already doubled).
    Immediate { base: u32, shift: u32 },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum PsrKind {
    Cpsr,
    Spsr,
}

impl From<bool> for PsrKind {
    fn from(value: bool) -> Self {
        if value { Self::Spsr } else { Self::Cpsr }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum PsrOpKind {
    Mrs {
        destination_register: usize,
    },
    Msr {
        source_register: usize,
        field_mask: u32,
    },
    MsrImmediate {
        value: u32,
        field_mask: u32,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArithmeticOpResult {
    pub result: u32,
    pub carry: bool,
    pub overflow: bool,
    pub sign: bool,
    pub zero: bool,
}

impl ArithmeticOpResult {
    fn shifted(result: u32, carry: bool) -> Self {
        Self {
            result,
            carry,
            sign: result.get_bit(31),
            zero: result == 0,
            ..Default::default()
        }
    }
}

/// `a + b + carry_in`. Carry is the unsigned overflow of the 33-bit sum,
/// overflow is set when both operands share a sign the result does not have.
#[must_use]
pub fn add_with_carry(a: u32, b: u32, carry_in: bool) -> ArithmeticOpResult {
    let (partial, first_carry) = a.overflowing_add(b);
    let (result, second_carry) = partial.overflowing_add(u32::from(carry_in));
    let overflow = ((a ^ result) & (b ^ result)).get_bit(31);

    ArithmeticOpResult {
        result,
        carry: first_carry || second_carry,
        overflow,
        sign: result.get_bit(31),
        zero: result == 0,
    }
}

/// `a - b - !carry_in`, computed as `a + !b + carry_in` so that
/// carry means "no borrow" (a >= b for a plain SUB).
#[must_use]
pub fn sub_with_carry(a: u32, b: u32, carry_in: bool) -> ArithmeticOpResult {
    add_with_carry(a, !b, carry_in)
}

/// Barrel shifter with a shift amount coming from a register (only the
/// bottom byte counts). An amount of 0 leaves value and carry untouched.
#[must_use]
pub fn shift(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    if shift_amount == 0 {
        return ArithmeticOpResult::shifted(rm, carry);
    }

    match kind {
        ShiftKind::Lsl => match shift_amount {
            1..=31 => ArithmeticOpResult::shifted(
                rm << shift_amount,
                rm.get_bit((32 - shift_amount) as u8),
            ),
            32 => ArithmeticOpResult::shifted(0, rm.get_bit(0)),
            _ => ArithmeticOpResult::shifted(0, false),
        },
        ShiftKind::Lsr => match shift_amount {
            1..=31 => ArithmeticOpResult::shifted(
                rm >> shift_amount,
                rm.get_bit((shift_amount - 1) as u8),
            ),
            32 => ArithmeticOpResult::shifted(0, rm.get_bit(31)),
            _ => ArithmeticOpResult::shifted(0, false),
        },
        ShiftKind::Asr => match shift_amount {
            1..=31 => ArithmeticOpResult::shifted(
                ((rm as i32) >> shift_amount) as u32,
                rm.get_bit((shift_amount - 1) as u8),
            ),
            _ => ArithmeticOpResult::shifted(((rm as i32) >> 31) as u32, rm.get_bit(31)),
        },
        ShiftKind::Ror => {
            let amount = shift_amount % 32;
            if amount == 0 {
                ArithmeticOpResult::shifted(rm, rm.get_bit(31))
            } else {
                ArithmeticOpResult::shifted(
                    rm.rotate_right(amount),
                    rm.get_bit((amount - 1) as u8),
                )
            }
        }
    }
}

/// Barrel shifter with an amount encoded in the instruction (5 bits).
/// An encoded 0 has special meanings: LSL#0 is no shift, LSR#0 and ASR#0
/// mean a shift by 32, ROR#0 is RRX.
#[must_use]
pub fn shift_immediate(kind: ShiftKind, shift_amount: u32, rm: u32, carry: bool) -> ArithmeticOpResult {
    match (kind, shift_amount) {
        (ShiftKind::Lsr | ShiftKind::Asr, 0) => shift(kind, 32, rm, carry),
        (ShiftKind::Ror, 0) => {
            ArithmeticOpResult::shifted((rm >> 1) | (u32::from(carry) << 31), rm.get_bit(0))
        }
        _ => shift(kind, shift_amount, rm, carry),
    }
}
