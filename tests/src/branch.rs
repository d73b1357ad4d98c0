use common::asm::{AddrMode, Ins, JumpCond, Opcode, Reg};
use common::constants::intr;
use emu_lib::Psw;

use crate::flags::{C, S, V, Z};
use crate::{addr_of, load, START};

const TAKEN: u16 = START + 8;

fn run(cond: JumpCond, flags: u8, should_take: bool) {
    let prog = [
        Ins::jump(cond, TAKEN),
        Ins::short_imm(Opcode::Ld, Reg::G0, 1),
        Ins::halt(),
    // taken:
        Ins::short_imm(Opcode::Ld, Reg::G0, 2),
        Ins::halt(),
    ];
    assert_eq!(addr_of(&prog, 3), TAKEN);

    let mut emu = load(&prog);
    emu.set_flags(Psw::P | flags);
    emu.run();
    let g0 = emu.reg_read(Reg::G0);
    let taken = match g0 {
        1 => false,
        2 => true,
        _ => panic!("Invalid g0: {g0}"),
    };
    assert_eq!(taken, should_take, "{cond} with flags {flags:#04x}");
}

#[test]
fn jmp() {
    run(JumpCond::Jmp, 0, true);
    run(JumpCond::Jmp, C | V | S | Z, true);
}

#[test]
fn jz_jnz() {
    run(JumpCond::Jz, 0, false);
    run(JumpCond::Jz, Z, true);
    run(JumpCond::Jnz, 0, true);
    run(JumpCond::Jnz, Z | C, false);
}

#[test]
fn jc_jnc() {
    run(JumpCond::Jc, C, true);
    run(JumpCond::Jc, Z, false);
    run(JumpCond::Jnc, C, false);
    run(JumpCond::Jnc, S, true);
}

#[test]
fn jm_jnm() {
    run(JumpCond::Jm, S, true);
    run(JumpCond::Jm, V, false);
    run(JumpCond::Jnm, S, false);
    run(JumpCond::Jnm, 0, true);
}

#[test]
fn jo_jno() {
    run(JumpCond::Jo, V, true);
    run(JumpCond::Jo, S, false);
    run(JumpCond::Jno, V, false);
    run(JumpCond::Jno, C, true);
}

#[test]
fn signed() {
    run(JumpCond::Jgt, 0, true);
    run(JumpCond::Jgt, S | V, true);
    run(JumpCond::Jgt, Z, false);
    run(JumpCond::Jgt, S, false);

    run(JumpCond::Jge, 0, true);
    run(JumpCond::Jge, Z, true);
    run(JumpCond::Jge, V, false);

    run(JumpCond::Jle, Z, true);
    run(JumpCond::Jle, S, true);
    run(JumpCond::Jle, S | V, false);

    run(JumpCond::Jlt, S, true);
    run(JumpCond::Jlt, V, true);
    run(JumpCond::Jlt, S | V, false);
}

#[test]
fn unsigned() {
    run(JumpCond::Jhi, 0, true);
    run(JumpCond::Jhi, C, false);
    run(JumpCond::Jhi, Z, false);

    run(JumpCond::Jls, 0, false);
    run(JumpCond::Jls, C, true);
    run(JumpCond::Jls, Z, true);
}

#[test]
fn compare_and_branch() {
    // Count g0 down from 5, adding to g1 each time.
    let prog = [
        Ins::short_imm(Opcode::Ld, Reg::G0, 5),
        Ins::short_imm(Opcode::Ld, Reg::G1, 0),
    // loop:
        Ins::reg(Opcode::Add, Reg::G1, Reg::G0),
        Ins::short_imm(Opcode::Sub, Reg::G0, 1),
        Ins::jump(JumpCond::Jnz, START + 4),
        Ins::halt(),
    ];
    assert_eq!(addr_of(&prog, 2), START + 4);
    let emu = crate::run(&prog);
    assert_eq!(emu.reg_read(Reg::G1), 15);
}

#[test]
fn indirect_target() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G3, START + 10),
        Ins::ind(Opcode::Jmp, JumpCond::Jmp.reg(), Reg::G3),
        Ins::short_imm(Opcode::Ld, Reg::G0, 1),
        Ins::halt(),
    // target:
        Ins::short_imm(Opcode::Ld, Reg::G0, 2),
        Ins::halt(),
    ];
    assert_eq!(addr_of(&prog, 4), START + 10);
    let mut emu = load(&prog);
    emu.run();
    assert_eq!(emu.reg_read(Reg::G0), 2);
}

#[test]
fn undefined_forms() {
    let bad = [
        // Condition 13 doesn't exist.
        Ins::direct(Opcode::Jmp, Reg::from_nibble(13), 0x2000),
        Ins::imm(Opcode::Jmp, JumpCond::Jmp.reg(), 0x2000),
        Ins::reg(Opcode::Jmp, JumpCond::Jmp.reg(), Reg::G0),
        Ins::byte_ind(Opcode::Jmp, JumpCond::Jmp.reg(), Reg::G0),
        Ins::new(Opcode::Call, AddrMode::ShortImmediate, Reg::G0, Reg::G1, None),
    ];
    for ins in bad {
        let mut emu = load(&[ins]);
        emu.run_ins();
        assert!(emu.get_state().get_intr().is_pending(intr::UNDEF_OP), "{ins:?}");
        assert_eq!(emu.pc(), START + ins.size());
    }
}
