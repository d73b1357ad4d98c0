use common::asm::{AddrMode, Ins, Opcode, Reg};
use common::constants::intr;

use crate::{load, run};

const DATA: u16 = 0x2000;

#[test]
fn direct() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G0, 0xbeef),
        Ins::direct(Opcode::St, Reg::G0, DATA),
        Ins::direct(Opcode::Ld, Reg::G1, DATA),
        Ins::direct(Opcode::Add, Reg::G1, DATA),
        Ins::halt(),
    ];
    let emu = run(&prog);
    assert_eq!(emu.mem_read_word(DATA), 0xbeef);
    assert_eq!(emu.reg_read(Reg::G1), 0xbeefu16.wrapping_mul(2));
}

#[test]
fn indexed() {
    let prog = [
        Ins::short_imm(Opcode::Ld, Reg::G2, 4),
        Ins::indexed(Opcode::Ld, Reg::G0, DATA, Reg::G2),
        Ins::short_imm(Opcode::Ld, Reg::G1, -1),
        Ins::indexed(Opcode::St, Reg::G1, DATA + 2, Reg::G2),
        Ins::halt(),
    ];
    let mut emu = load(&prog);
    emu.mem_write_word(DATA + 4, 0x1357);
    emu.run();
    assert_eq!(emu.reg_read(Reg::G0), 0x1357);
    assert_eq!(emu.mem_read_word(DATA + 6), 0xffff);
}

#[test]
fn immediate() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G0, 0x8001),
        Ins::short_imm(Opcode::Ld, Reg::G1, 7),
        Ins::short_imm(Opcode::Ld, Reg::G2, -8),
        Ins::short_imm(Opcode::Add, Reg::G0, -1),
        Ins::halt(),
    ];
    let emu = run(&prog);
    assert_eq!(emu.reg_read(Reg::G0), 0x8000);
    assert_eq!(emu.reg_read(Reg::G1), 7);
    assert_eq!(emu.reg_read(Reg::G2), 0xfff8);
}

#[test]
fn fp_relative() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::FP, 0x3000),
        Ins::fp_rel(Opcode::Ld, Reg::G0, -2),
        Ins::fp_rel(Opcode::Ld, Reg::G1, 3),
        Ins::fp_rel(Opcode::St, Reg::G0, 1),
        Ins::halt(),
    ];
    let mut emu = load(&prog);
    emu.mem_write_word(0x3000 - 4, 0xaaaa);
    emu.mem_write_word(0x3000 + 6, 0x5555);
    emu.run();
    assert_eq!(emu.reg_read(Reg::G0), 0xaaaa);
    assert_eq!(emu.reg_read(Reg::G1), 0x5555);
    assert_eq!(emu.mem_read_word(0x3002), 0xaaaa);
}

#[test]
fn register() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G0, 0x0f0f),
        Ins::reg(Opcode::Ld, Reg::G11, Reg::G0),
        Ins::reg(Opcode::Add, Reg::G11, Reg::G0),
        Ins::halt(),
    ];
    let emu = run(&prog);
    assert_eq!(emu.reg_read(Reg::G11), 0x1e1e);
}

#[test]
fn indirect() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G1, DATA),
        Ins::ind(Opcode::Ld, Reg::G0, Reg::G1),
        Ins::short_imm(Opcode::Add, Reg::G0, 1),
        Ins::ind(Opcode::St, Reg::G0, Reg::G1),
        Ins::halt(),
    ];
    let mut emu = load(&prog);
    emu.mem_write_word(DATA, 0x00ff);
    emu.run();
    assert_eq!(emu.mem_read_word(DATA), 0x0100);
}

#[test]
fn byte_indirect() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G1, DATA + 1),
        Ins::byte_ind(Opcode::Ld, Reg::G0, Reg::G1),
        Ins::imm(Opcode::Ld, Reg::G2, 0xabcd),
        Ins::byte_ind(Opcode::St, Reg::G2, Reg::G1),
        Ins::halt(),
    ];
    let mut emu = load(&prog);
    emu.mem_write_word(DATA, 0x1234);
    emu.run();
    // Zero-extended.
    assert_eq!(emu.reg_read(Reg::G0), 0x34);
    // Only the low byte is stored.
    assert_eq!(emu.mem_read_word(DATA), 0x12cd);
}

#[test]
fn flag_register_operand() {
    let prog = [
        Ins::short_imm(Opcode::Ld, Reg::G0, 0),
        Ins::reg(Opcode::Ld, Reg::G1, Reg::FLAG),
        Ins::push(Reg::FLAG),
        Ins::pop(Reg::G2),
        Ins::halt(),
    ];
    let mut emu = load(&prog);
    emu.set_flags(0x40 | 0x01);
    emu.run();
    assert_eq!(emu.reg_read(Reg::G1), 0x41);
    assert_eq!(emu.reg_read(Reg::G2), 0x41);
}

#[test]
fn store_needs_an_address() {
    for mode in [AddrMode::Immediate, AddrMode::Register, AddrMode::ShortImmediate] {
        let extra = if mode.has_extra_word() { Some(0x2000) } else { None };
        let prog = [Ins::new(Opcode::St, mode, Reg::G0, Reg::G1, extra)];
        let mut emu = load(&prog);
        emu.run_ins();
        assert!(emu.get_state().get_intr().is_pending(intr::UNDEF_OP), "st in {mode:?}");
        assert_eq!(emu.pc(), crate::addr_of(&prog, 1));
    }
}
