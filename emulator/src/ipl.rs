use common::asm::{AddrMode, JumpCond, Opcode, Reg, RD_SHIFT, encode_word};
use common::asm::AddrMode::*;
use common::asm::Opcode::*;
use common::asm::Reg::*;

const fn ins(op: Opcode, mode: AddrMode, rd: Reg) -> u16 {
    encode_word(op, mode, rd, G0)
}

const fn short(op: Opcode, rd: Reg, val: u16) -> u16 {
    ins(op, ShortImmediate, rd) | val
}

const fn jump(cond: JumpCond) -> u16 {
    ins(Jmp, Direct, G0) | ((cond as u16) << RD_SHIFT)
}

const LOOP: u16 = 0xe008;
const WAIT: u16 = 0xe01c;

// Boot loader mapped at 0xE000. Reads sectors 0-15 into 0x0000 and jumps
// there; the loaded program is expected to detach the ROM.
pub const IPL: [u16; 29] = [
    ins(Ld, Immediate, SP), 0xe000,     // e000 ld   sp,#0xe000
    short(Ld, G0, 0),                   // e004 ld   g0,#0        ; buffer
    short(Ld, G1, 0),                   // e006 ld   g1,#0        ; sector
// loop:
    ins(Out, Direct, G0), 0x0012,       // e008 out  g0,0x12
    short(Ld, G2, 0),                   // e00c ld   g2,#0
    ins(Out, Direct, G2), 0x0014,       // e00e out  g2,0x14
    ins(Out, Direct, G1), 0x0016,       // e012 out  g1,0x16
    short(Ld, G2, 2),                   // e016 ld   g2,#2        ; read
    ins(Out, Direct, G2), 0x0010,       // e018 out  g2,0x10
// wait:
    ins(In, Direct, G2), 0x0010,        // e01c in   g2,0x10
    ins(And, Immediate, G2), 0x0080,    // e020 and  g2,#0x80     ; idle?
    jump(JumpCond::Jz), WAIT,           // e024 jz   wait
    ins(Add, Immediate, G0), 0x0200,    // e028 add  g0,#0x200
    short(Add, G1, 1),                  // e02c add  g1,#1
    ins(Cmp, Immediate, G1), 0x0010,    // e02e cmp  g1,#16
    jump(JumpCond::Jnz), LOOP,          // e032 jnz  loop
    jump(JumpCond::Jmp), 0x0000,        // e036 jmp  0x0000
];
