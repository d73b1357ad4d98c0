use common::asm::{Ins, Opcode, Reg};
use common::constants::intr;
use emu_lib::mmu::TlbEntry;
use emu_lib::{Emulator, Suspend};

use crate::{addr_of, load, run, set_vector, START};

const CODE_PAGE: u8 = (START >> 8) as u8;
const DATA_PAGE: u8 = 0x20;
const DATA_FRAME: u8 = 0x30;

const CODE: u8 = TlbEntry::VALID | TlbEntry::READ | TlbEntry::EXEC;
const DATA: u8 = TlbEntry::VALID | TlbEntry::READ | TlbEntry::WRITE;

fn map(emu: &mut Emulator, idx: usize, page: u8, frame: u8, flags: u8) {
    let mmu = emu.get_state_mut().get_mmu_mut();
    mmu.set_tlb_entry(idx, TlbEntry::new(page, frame, flags));
    mmu.set_tlb_enabled(true);
}

// Prog runs in user mode with its own page mapped; SVC ends it.
fn user(prog: &[Ins]) -> Emulator {
    let mut emu = load(prog);
    map(&mut emu, 0, CODE_PAGE, CODE_PAGE, CODE);
    set_vector(&mut emu, intr::SVC, 0x4000);
    emu.load_words(&[Ins::halt().encode()[0]], 0x4000).unwrap();
    emu.set_flags(0);
    emu
}

fn entry(emu: &Emulator, idx: usize) -> TlbEntry {
    emu.get_state().get_mmu().tlb_entry(idx)
}

#[test]
fn translates_user_accesses() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G0, 0x5555),
        Ins::direct(Opcode::St, Reg::G0, 0x2004),
        Ins::direct(Opcode::Ld, Reg::G1, 0x2004),
        Ins::svc(),
    ];
    let mut emu = user(&prog);
    map(&mut emu, 1, DATA_PAGE, DATA_FRAME, DATA);
    emu.run();

    assert_eq!(emu.pc(), 0x4002);
    assert_eq!(emu.reg_read(Reg::G1), 0x5555);
    assert_eq!(emu.mem_read_word(0x3004), 0x5555);
    assert_eq!(emu.mem_read_word(0x2004), 0);

    assert_eq!(entry(&emu, 0).flags, CODE | TlbEntry::REFERENCED);
    assert_eq!(entry(&emu, 1).flags, DATA | TlbEntry::REFERENCED | TlbEntry::DIRTY);
}

#[test]
fn miss_handler_restarts_instruction() {
    let prog = [
        Ins::direct(Opcode::Ld, Reg::G0, 0x2006),
        Ins::svc(),
    // miss handler:
        Ins::input(Reg::G5, 0xa0),
        Ins::imm(Opcode::Ld, Reg::G6, DATA_PAGE as u16),
        Ins::output(Reg::G6, 0x84),
        Ins::imm(Opcode::Ld, Reg::G7, ((DATA as u16) << 8) | DATA_FRAME as u16),
        Ins::output(Reg::G7, 0x86),
        Ins::reti(),
    ];
    let mut emu = user(&prog);
    set_vector(&mut emu, intr::TLB_MISS, addr_of(&prog, 2));
    emu.mem_write_word(0x3006, 0x7777);

    // Fault, then the handler, then the retried load.
    let until = emu_lib::Until::halt().with_break_at(START + 4);
    assert_eq!(emu.resume(until), Suspend::Breakpoint(START + 4));
    assert_eq!(emu.reg_read(Reg::G0), 0x7777);
    assert_eq!(emu.reg_read(Reg::G5), 0x2006);
    assert_eq!(emu.get_flags(), 0);
    assert_eq!(entry(&emu, 1).page, DATA_PAGE);
    assert!(entry(&emu, 1).is_valid());

    assert_eq!(emu.resume(emu_lib::Until::halt()), Suspend::Halted);
}

#[test]
fn protection_violation() {
    let prog = [
        Ins::short_imm(Opcode::Ld, Reg::G0, 1),
        Ins::direct(Opcode::St, Reg::G0, 0x2000),
        Ins::svc(),
    ];
    let mut emu = user(&prog);
    map(&mut emu, 1, DATA_PAGE, DATA_FRAME, TlbEntry::VALID | TlbEntry::READ);

    emu.step();
    emu.step();
    assert!(emu.get_state().get_intr().is_pending(intr::MEM_VIOLATION));
    // Restartable: pc is back on the store.
    assert_eq!(emu.pc(), addr_of(&prog, 1));
    assert_eq!(emu.get_state().get_mmu().fault_addr(), 0x2000);
    assert_eq!(emu.mem_read_word(0x3000), 0);
    assert_eq!(entry(&emu, 1).flags & TlbEntry::DIRTY, 0);
}

#[test]
fn fetch_needs_exec() {
    let mut emu = user(&[Ins::nop()]);
    map(&mut emu, 0, CODE_PAGE, CODE_PAGE, TlbEntry::VALID | TlbEntry::READ);
    emu.step();
    assert!(emu.get_state().get_intr().is_pending(intr::MEM_VIOLATION));
    assert_eq!(emu.pc(), START);
}

#[test]
fn invalid_entries_miss() {
    let mut emu = user(&[Ins::nop()]);
    map(&mut emu, 0, CODE_PAGE, CODE_PAGE, CODE & !TlbEntry::VALID);
    emu.step();
    assert!(emu.get_state().get_intr().is_pending(intr::TLB_MISS));
    assert_eq!(emu.get_state().get_mmu().fault_addr(), START);
}

#[test]
fn privileged_bypasses_tlb() {
    let prog = [
        Ins::imm(Opcode::Ld, Reg::G0, 0x0102),
        Ins::direct(Opcode::St, Reg::G0, 0x2000),
        Ins::halt(),
    ];
    let mut emu = load(&prog);
    map(&mut emu, 0, DATA_PAGE, DATA_FRAME, DATA);
    emu.run();
    assert_eq!(emu.pc(), addr_of(&prog, 3));
    assert_eq!(emu.mem_read_word(0x2000), 0x0102);
    assert_eq!(entry(&emu, 0).flags, DATA);

    // Same result with the TLB off.
    let emu = run(&prog);
    assert_eq!(emu.mem_read_word(0x2000), 0x0102);
}
