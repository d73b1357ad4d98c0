use crate::misc::sext4;

use std::fmt;

use derive_more::IsVariant;
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;


#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop = 0,
    Ld,
    St,
    Add,
    Sub,
    Cmp,
    And,
    Or,
    Xor,
    Adds,
    Mul,
    Div,
    Mod,

    Shla = 16,
    Shll,
    Shra,
    Shrl,
    Jmp,
    Call,
    In,
    Out,
    PushPop,

    RetReti = 26,

    Svc = 30,
    Halt,
}

impl Opcode {
    pub const NUM_BITS: usize = 5;
    pub const MASK: u16 = (1u16 << Self::NUM_BITS) - 1;

    pub fn decode(bits: u16) -> Option<Opcode> {
        Opcode::from_u16(bits & Self::MASK)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, Opcode::Shla | Opcode::Shll | Opcode::Shra | Opcode::Shrl)
    }

    // These never take an operand, so they're always one word long no matter
    // what the mode field holds.
    pub fn has_operand(self) -> bool {
        use Opcode::*;
        !matches!(self, Nop | PushPop | RetReti | Svc | Halt)
    }

    fn mnemonic(self) -> &'static str {
        use Opcode::*;
        match self {
            Nop => "nop",
            Ld => "ld",
            St => "st",
            Add => "add",
            Sub => "sub",
            Cmp => "cmp",
            And => "and",
            Or => "or",
            Xor => "xor",
            Adds => "adds",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Shla => "shla",
            Shll => "shll",
            Shra => "shra",
            Shrl => "shrl",
            Jmp => "jmp",
            Call => "call",
            In => "in",
            Out => "out",
            PushPop => "push",
            RetReti => "ret",
            Svc => "svc",
            Halt => "halt",
        }
    }
}


#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq, IsVariant)]
pub enum AddrMode {
    Direct = 0,
    Indexed,
    Immediate,
    FpRelative,
    Register,
    ShortImmediate,
    Indirect,
    ByteIndirect,
}

impl AddrMode {
    pub const NUM_BITS: usize = 3;
    pub const MASK: u16 = (1u16 << Self::NUM_BITS) - 1;

    // PUSH/POP and RET/RETI are told apart by this bit of the mode field.
    pub const ALT_BIT: u16 = 0x4;

    pub fn has_extra_word(self) -> bool {
        matches!(self, AddrMode::Direct | AddrMode::Indexed | AddrMode::Immediate)
    }

    pub fn has_ea(self) -> bool {
        !matches!(self, AddrMode::Immediate | AddrMode::Register | AddrMode::ShortImmediate)
    }
}


#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq, Hash)]
pub enum Reg {
    G0 = 0,
    G1,
    G2,
    G3,
    G4,
    G5,
    G6,
    G7,
    G8,
    G9,
    G10,
    G11,
    FP,
    SP,
    USP,
    FLAG,
}

impl Reg {
    pub const NUM_BITS: usize = 4;
    pub const MASK: u16 = (1u16 << Self::NUM_BITS) - 1;

    // Every 4-bit value is a register, so this can't fail.
    pub fn from_nibble(bits: u16) -> Reg {
        let Some(reg) = Reg::from_u16(bits & Self::MASK) else {
            unreachable!("4-bit register field {bits:#x}");
        };
        reg
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}


// Condition codes live in the rd field of JMP.
#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive, PartialEq, Eq)]
pub enum JumpCond {
    Jz = 0,
    Jc,
    Jm,
    Jo,
    Jgt,
    Jge,
    Jle,
    Jlt,
    Jnz,
    Jnc,
    Jnm,
    Jno,
    Jhi,

    Jls = 14,
    Jmp,
}

impl JumpCond {
    pub fn decode(rd: Reg) -> Option<JumpCond> {
        JumpCond::from_usize(rd.index())
    }

    pub fn reg(self) -> Reg {
        Reg::from_nibble(self as u16)
    }
}

impl fmt::Display for JumpCond {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}


////////////////////////////////////////////////////////////////////////////////


pub const OP_SHIFT: u16 = 11;
pub const MODE_SHIFT: u16 = 8;
pub const RD_SHIFT: u16 = 4;

pub const fn encode_word(op: Opcode, mode: AddrMode, rd: Reg, rx: Reg) -> u16 {
    ((op as u16) << OP_SHIFT) | ((mode as u16) << MODE_SHIFT) | ((rd as u16) << RD_SHIFT) | (rx as u16)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ins {
    pub op: Opcode,
    pub mode: AddrMode,
    pub rd: Reg,
    pub rx: Reg,
    pub extra: Option<u16>, // Second word, only for modes that have one
}

impl Ins {
    pub fn new(op: Opcode, mode: AddrMode, rd: Reg, rx: Reg, extra: Option<u16>) -> Ins {
        let ins = Ins{op, mode, rd, rx, extra};
        assert_eq!(ins.extra.is_some(), ins.num_words() == 2, "{ins:?}: extra word mismatch");
        ins
    }

    pub fn direct(op: Opcode, rd: Reg, addr: u16) -> Ins {
        Ins::new(op, AddrMode::Direct, rd, Reg::G0, Some(addr))
    }

    pub fn indexed(op: Opcode, rd: Reg, addr: u16, rx: Reg) -> Ins {
        Ins::new(op, AddrMode::Indexed, rd, rx, Some(addr))
    }

    pub fn imm(op: Opcode, rd: Reg, val: u16) -> Ins {
        Ins::new(op, AddrMode::Immediate, rd, Reg::G0, Some(val))
    }

    // disp is in words
    pub fn fp_rel(op: Opcode, rd: Reg, disp: i8) -> Ins {
        assert!((-8..=7).contains(&disp), "FP displacement {disp} out of range");
        Ins::new(op, AddrMode::FpRelative, rd, Reg::from_nibble(disp as u16), None)
    }

    pub fn reg(op: Opcode, rd: Reg, rx: Reg) -> Ins {
        Ins::new(op, AddrMode::Register, rd, rx, None)
    }

    pub fn short_imm(op: Opcode, rd: Reg, val: i8) -> Ins {
        assert!((-8..=7).contains(&val), "Short immediate {val} out of range");
        Ins::new(op, AddrMode::ShortImmediate, rd, Reg::from_nibble(val as u16), None)
    }

    pub fn ind(op: Opcode, rd: Reg, rx: Reg) -> Ins {
        Ins::new(op, AddrMode::Indirect, rd, rx, None)
    }

    pub fn byte_ind(op: Opcode, rd: Reg, rx: Reg) -> Ins {
        Ins::new(op, AddrMode::ByteIndirect, rd, rx, None)
    }

    pub fn jump(cond: JumpCond, addr: u16) -> Ins {
        Ins::direct(Opcode::Jmp, cond.reg(), addr)
    }

    pub fn call(addr: u16) -> Ins {
        Ins::direct(Opcode::Call, Reg::G0, addr)
    }

    pub fn input(rd: Reg, port: u8) -> Ins {
        Ins::direct(Opcode::In, rd, port as u16)
    }

    pub fn output(rd: Reg, port: u8) -> Ins {
        Ins::direct(Opcode::Out, rd, port as u16)
    }

    pub fn push(rd: Reg) -> Ins {
        Ins::new(Opcode::PushPop, AddrMode::Direct, rd, Reg::G0, None)
    }

    pub fn pop(rd: Reg) -> Ins {
        Ins::new(Opcode::PushPop, AddrMode::Register, rd, Reg::G0, None)
    }

    pub fn ret() -> Ins {
        Ins::new(Opcode::RetReti, AddrMode::Direct, Reg::G0, Reg::G0, None)
    }

    pub fn reti() -> Ins {
        Ins::new(Opcode::RetReti, AddrMode::Register, Reg::G0, Reg::G0, None)
    }

    pub fn nop() -> Ins {
        Ins::new(Opcode::Nop, AddrMode::Direct, Reg::G0, Reg::G0, None)
    }

    pub fn svc() -> Ins {
        Ins::new(Opcode::Svc, AddrMode::Direct, Reg::G0, Reg::G0, None)
    }

    pub fn halt() -> Ins {
        Ins::new(Opcode::Halt, AddrMode::Direct, Reg::G0, Reg::G0, None)
    }

    pub fn is_alt(&self) -> bool {
        (self.mode as u16) & AddrMode::ALT_BIT != 0
    }

    pub fn num_words(&self) -> u16 {
        if self.op.has_operand() && self.mode.has_extra_word() { 2 } else { 1 }
    }

    pub fn size(&self) -> u16 {
        self.num_words() * crate::constants::WORD_SIZE
    }

    pub fn encode(&self) -> Vec<u16> {
        let mut out = vec![encode_word(self.op, self.mode, self.rd, self.rx)];
        out.extend(self.extra);
        out
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let extra = |f: &mut fmt::Formatter| match self.extra {
            Some(val) => write!(f, "{val:#06x}"),
            None => write!(f, "?"),
        };
        match self.mode {
            AddrMode::Direct => extra(f),
            AddrMode::Indexed => {
                extra(f)?;
                write!(f, ",{}", self.rx)
            },
            AddrMode::Immediate => {
                write!(f, "#")?;
                extra(f)
            },
            AddrMode::FpRelative => {
                let disp = (sext4(self.rx as u16) as i16) * 2;
                write!(f, "{disp},fp")
            },
            AddrMode::Register => write!(f, "{}", self.rx),
            AddrMode::ShortImmediate => write!(f, "#{}", sext4(self.rx as u16) as i16),
            AddrMode::Indirect => write!(f, "@{}", self.rx),
            AddrMode::ByteIndirect => write!(f, "%{}", self.rx),
        }
    }
}

impl fmt::Display for Ins {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.op {
            Opcode::Nop | Opcode::Svc | Opcode::Halt => write!(f, "{}", self.op.mnemonic()),
            Opcode::PushPop => {
                let name = if self.is_alt() { "pop" } else { "push" };
                write!(f, "{name} {}", self.rd)
            },
            Opcode::RetReti => write!(f, "{}", if self.is_alt() { "reti" } else { "ret" }),
            Opcode::Jmp => {
                match JumpCond::decode(self.rd) {
                    Some(cond) => write!(f, "{cond} ")?,
                    None => write!(f, "j?{} ", self.rd.index())?,
                }
                self.fmt_operand(f)
            },
            Opcode::Call => {
                write!(f, "call ")?;
                self.fmt_operand(f)
            },
            op => {
                write!(f, "{} {},", op.mnemonic(), self.rd)?;
                self.fmt_operand(f)
            },
        }
    }
}

pub fn assemble(prog: &[Ins]) -> Vec<u16> {
    prog.iter().flat_map(Ins::encode).collect()
}
