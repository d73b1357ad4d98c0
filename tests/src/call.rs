use common::asm::{Ins, Opcode, Reg};
use emu_lib::Suspend;

use crate::{addr_of, load, load_at, run, START, STACK_TOP};

#[test]
fn call_ret_stack() {
    let prog = [
        Ins::call(0x5678),
        Ins::halt(),
    ];
    let mut emu = load(&prog);
    load_at(&mut emu, &[Ins::ret()], 0x5678);
    emu.reg_write(Reg::SP, 0xfffe);

    assert_eq!(emu.step(), Suspend::Stepped);
    assert_eq!(emu.pc(), 0x5678);
    assert_eq!(emu.reg_read(Reg::SP), 0xfffc);
    assert_eq!(emu.mem_read_word(0xfffc), START + 4);

    assert_eq!(emu.step(), Suspend::Stepped);
    assert_eq!(emu.pc(), START + 4);
    assert_eq!(emu.reg_read(Reg::SP), 0xfffe);

    assert_eq!(emu.resume(emu_lib::Until::halt()), Suspend::Halted);
}

#[test]
fn push_pop_round_trip() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G0, 0xabcd),
        Ins::imm(Opcode::Ld, Reg::G1, 0x1234),
        Ins::push(Reg::G0),
        Ins::push(Reg::G1),
        Ins::pop(Reg::G2),
        Ins::pop(Reg::G3),
        Ins::halt(),
    ];
    let emu = run(&prog);
    assert_eq!(emu.reg_read(Reg::G2), 0x1234);
    assert_eq!(emu.reg_read(Reg::G3), 0xabcd);
    assert_eq!(emu.reg_read(Reg::SP), STACK_TOP);
    assert_eq!(emu.mem_read_word(STACK_TOP - 2), 0xabcd);
    assert_eq!(emu.mem_read_word(STACK_TOP - 4), 0x1234);
}

#[test]
fn nested_calls() {
    // main calls f, f calls g; each adds to g0.
    let prog = [
        Ins::short_imm(Opcode::Ld, Reg::G0, 0),
        Ins::call(START + 8),
        Ins::halt(),
    // f:
        Ins::short_imm(Opcode::Add, Reg::G0, 1),
        Ins::call(START + 18),
        Ins::short_imm(Opcode::Add, Reg::G0, 2),
        Ins::ret(),
    // g:
        Ins::short_imm(Opcode::Add, Reg::G0, 4),
        Ins::ret(),
    ];
    assert_eq!(addr_of(&prog, 3), START + 8);
    assert_eq!(addr_of(&prog, 7), START + 18);

    let mut emu = load(&prog);
    emu.run();
    assert_eq!(emu.pc(), addr_of(&prog, 3));
    assert_eq!(emu.reg_read(Reg::G0), 7);
    assert_eq!(emu.reg_read(Reg::SP), STACK_TOP);
}

#[test]
fn frame_pointer_arguments() {
    // Caller pushes two arguments; callee reads them through FP.
    let prog = [
        Ins::short_imm(Opcode::Ld, Reg::G0, 6),
        Ins::push(Reg::G0),
        Ins::short_imm(Opcode::Ld, Reg::G0, 7),
        Ins::push(Reg::G0),
        Ins::call(START + 16),
        Ins::short_imm(Opcode::Add, Reg::SP, 4),
        Ins::halt(),
    // mul:
        Ins::push(Reg::FP),
        Ins::reg(Opcode::Ld, Reg::FP, Reg::SP),
        Ins::fp_rel(Opcode::Ld, Reg::G0, 2),
        Ins::fp_rel(Opcode::Mul, Reg::G0, 3),
        Ins::pop(Reg::FP),
        Ins::ret(),
    ];
    assert_eq!(addr_of(&prog, 7), START + 16);

    let mut emu = load(&prog);
    emu.reg_write(Reg::FP, 0x4444);
    emu.run();
    assert_eq!(emu.pc(), addr_of(&prog, 7));
    assert_eq!(emu.reg_read(Reg::G0), 42);
    assert_eq!(emu.reg_read(Reg::FP), 0x4444);
    assert_eq!(emu.reg_read(Reg::SP), STACK_TOP);
}

#[test]
fn call_indirect() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G5, START + 8),
        Ins::ind(Opcode::Call, Reg::G0, Reg::G5),
        Ins::halt(),
    // f:
        Ins::short_imm(Opcode::Ld, Reg::G0, 3),
        Ins::ret(),
    ];
    assert_eq!(addr_of(&prog, 3), START + 8);
    let mut emu = load(&prog);
    emu.run();
    assert_eq!(emu.reg_read(Reg::G0), 3);
    assert_eq!(emu.pc(), START + 8);
}
