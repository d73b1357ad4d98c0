use common::asm::Opcode;
use common::constants::intr;

use crate::emulator_state::Psw;
use crate::intr::IntrController;

const SIGN_BIT: i32 = 0x8000;
const CARRY_BIT: i32 = 0x1_0000;
const WORD_MASK: i32 = 0xffff;
const SHIFT_MASK: u16 = 0xf;

// Computes at full precision; the caller truncates. Division by zero raises the
// exception and yields 0.
pub fn calc(intr: &mut IntrController, op: Opcode, v1: u16, v2: u16) -> i32 {
    let (a, b) = (v1 as i32, v2 as i32);
    let count = (v2 & SHIFT_MASK) as u32;
    match op {
        Opcode::Add => a + b,
        Opcode::Sub | Opcode::Cmp => a - b,
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::Adds => a + b * 2,
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::Div | Opcode::Mod if v2 == 0 => {
            intr.interrupt(intr::ZERO_DIV);
            0
        },
        Opcode::Div => a / b,
        Opcode::Mod => a % b,
        Opcode::Shla | Opcode::Shll => a << count,
        Opcode::Shra => (v1 as i16 as i32) >> count,
        Opcode::Shrl => a >> count,
        _ => panic!("{op:?} is not an ALU operation"),
    }
}

// Condition codes for an ALU result. Only V/C/S/Z are produced.
pub fn cc_flags(op: Opcode, v1: u16, v2: u16, res: i32) -> u8 {
    let (a, b) = (v1 as i32, v2 as i32);
    let mut flags = 0u8;

    let overflow = match op {
        Opcode::Add => (a ^ res) & (b ^ res) & SIGN_BIT != 0,
        Opcode::Sub | Opcode::Cmp => (a ^ b) & (a ^ res) & SIGN_BIT != 0,
        _ => false,
    };
    if overflow {
        flags |= Psw::V;
    }

    let carry_applies = match op {
        Opcode::Add | Opcode::Sub | Opcode::Cmp => true,
        op if op.is_shift() => v2 & SHIFT_MASK == 1,
        _ => false,
    };
    if carry_applies && res & CARRY_BIT != 0 {
        flags |= Psw::C;
    }

    if res & SIGN_BIT != 0 {
        flags |= Psw::S;
    }
    if res & WORD_MASK == 0 {
        flags |= Psw::Z;
    }
    flags
}
