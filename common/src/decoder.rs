use super::asm::*;

use num_traits::FromPrimitive;

// Raw fields of an instruction word. The opcode is None when the 5-bit field
// doesn't name an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    pub op: Option<Opcode>,
    pub mode: AddrMode,
    pub rd: Reg,
    pub rx: Reg,
}

pub fn decode_fields(word: u16) -> Fields {
    let op = Opcode::decode(word >> OP_SHIFT);
    let Some(mode) = AddrMode::from_u16((word >> MODE_SHIFT) & AddrMode::MASK) else {
        unreachable!("3-bit mode field of {word:#06x}");
    };
    let rd = Reg::from_nibble(word >> RD_SHIFT);
    let rx = Reg::from_nibble(word);
    Fields{op, mode, rd, rx}
}

// Decode the instruction at the start of input, which should hold at least two
// words if the first one needs an extra word.
pub fn decode(input: &[u16]) -> Option<Ins> {
    let fields = decode_fields(*input.first()?);
    let op = fields.op?;
    let mut ins = Ins{op, mode: fields.mode, rd: fields.rd, rx: fields.rx, extra: None};
    if ins.num_words() == 2 {
        ins.extra = Some(*input.get(1)?);
    }
    Some(ins)
}
