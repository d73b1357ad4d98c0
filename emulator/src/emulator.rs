use common::asm::{AddrMode, Ins, JumpCond, Opcode, Reg};
use common::constants::{VECTOR_BASE, WORD_SIZE};
use common::decoder::decode_fields;
use common::mem::words_to_bytes;
use common::misc::sext4;

use crate::alu;
use crate::emulator_state::{EmulatorState, Psw};
use crate::error::{EmuError, Fault};
use crate::io::console::{Console, Panel};
use crate::io::mmu_regs::MmuRegs;
use crate::io::serial::{Serial, SerialPort};
use crate::io::storage::{SectorStore, Storage};
use crate::io::system::SystemRegs;
use crate::io::timer::Timer;
use crate::io::{IoDevice, IoHostController};
use crate::mmu::Access;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use delegate::delegate;
use derive_more::IsVariant;
use log::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecRet {
    Ok,
    Halt,
}

// Why resume() returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum Suspend {
    Halted,
    Yielded,
    Stepped,
    Breakpoint(u16),
    Stopped,
}

// When resume() should give control back, other than on HALT or a stop request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Until {
    step: bool,
    budget: Option<Duration>,
    break_at: Option<u16>,
}

impl Until {
    pub fn halt() -> Self {
        Default::default()
    }

    pub fn step() -> Self {
        Until{step: true, ..Default::default()}
    }

    pub fn budget(budget: Duration) -> Self {
        Until{budget: Some(budget), ..Default::default()}
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    // Stops before the instruction at addr is executed, including the first
    // instruction of an interrupt handler. The pc a resume starts from is not
    // matched, so resuming from a breakpoint makes progress.
    pub fn with_break_at(mut self, addr: u16) -> Self {
        self.break_at = Some(addr);
        self
    }
}

// Cooperative cancellation, checked between instructions.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

////////////////////////////////////////////////////////////////////////////////

pub struct Emulator {
    state: EmulatorState,
    io: IoHostController,
    stop: StopHandle,
    // Devices ticked and interrupts checked; the instruction is still to run.
    entered: bool,
}

impl Emulator {
    // Instructions between wall-clock checks.
    const BUDGET_CHECK_INTERVAL: u64 = 1024;

    pub fn new(mut devices: Vec<Box<dyn IoDevice>>) -> Emulator {
        devices.push(Box::new(MmuRegs()));
        let mut emu = Emulator {
            state: EmulatorState::new(),
            io: IoHostController::new(devices),
            stop: StopHandle::default(),
            entered: false,
        };
        emu.reset();
        emu
    }

    pub fn with_standard_devices(
        serial: Arc<dyn SerialPort>,
        disk: Box<dyn SectorStore>,
        panel: Arc<dyn Panel>,
        boot_mode: u16,
    ) -> Emulator {
        Self::new(vec![
            Box::new(Timer::timer0()),
            Box::new(Timer::timer1()),
            Box::new(Serial::new(serial)),
            Box::new(Storage::new(disk)),
            Box::new(SystemRegs::new(boot_mode)),
            Box::new(Console::new(panel)),
        ])
    }

    // Back to the boot state: IPL mapped, pc at its entry, privileged.
    pub fn reset(&mut self) {
        self.state.reset();
        self.io.reset();
        self.entered = false;
    }

    pub fn load_image(&mut self, data: &[u8], start: u16) -> Result<(), EmuError> {
        self.state.mmu.load(data, start)
    }

    pub fn load_words(&mut self, words: &[u16], start: u16) -> Result<(), EmuError> {
        self.load_image(&words_to_bytes(words), start)
    }

    // Run until a halt.
    pub fn run(&mut self) {
        while self.run_ins() != ExecRet::Halt {}
    }

    pub fn run_at(&mut self, pc: u16) {
        self.state.set_pc(pc);
        self.run();
    }

    // Continue after halt.
    pub fn cont(&mut self) {
        self.run();
    }

    pub fn step(&mut self) -> Suspend {
        self.resume(Until::step())
    }

    pub fn run_for(&mut self, budget: Duration) -> Suspend {
        self.resume(Until::budget(budget))
    }

    pub fn resume(&mut self, until: Until) -> Suspend {
        let start = Instant::now();
        let mut executed = 0u64;
        loop {
            if self.stop.take() {
                return Suspend::Stopped;
            }

            if self.enter_cycle() && until.break_at == Some(self.state.pc()) {
                return Suspend::Breakpoint(self.state.pc());
            }
            if self.exec_cycle() == ExecRet::Halt {
                return Suspend::Halted;
            }
            executed += 1;
            if until.break_at == Some(self.state.pc()) {
                return Suspend::Breakpoint(self.state.pc());
            }

            if until.step {
                return Suspend::Stepped;
            }
            if let Some(budget) = until.budget {
                if executed % Self::BUDGET_CHECK_INTERVAL == 0 && start.elapsed() >= budget {
                    return Suspend::Yielded;
                }
            }
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    // Run a single instruction, letting each device get a time slice and
    // potentially taking an interrupt first.
    pub fn run_ins(&mut self) -> ExecRet {
        self.enter_cycle();
        self.exec_cycle()
    }

    // Returns whether an interrupt was taken. Does nothing if the last call
    // wasn't followed by exec_cycle(), so a cycle split at a breakpoint still
    // ticks the devices once.
    fn enter_cycle(&mut self) -> bool {
        if self.entered {
            return false;
        }
        self.entered = true;
        self.state.inc_ins();
        self.io.tick(&mut self.state.mmu, &mut self.state.intr);
        self.check_interrupt()
    }

    fn exec_cycle(&mut self) -> ExecRet {
        self.entered = false;
        let start_pc = self.state.pc();
        match self.exec_next() {
            Ok(ret) => ret,
            Err(fault) => {
                debug!("PC: {start_pc:#06x}: {fault}");
                if fault.is_restartable() {
                    self.state.set_pc(start_pc);
                }
                self.state.intr.interrupt(fault.number());
                ExecRet::Ok
            },
        }
    }

    pub fn get_state(&self) -> &EmulatorState {
        &self.state
    }

    pub fn get_state_mut(&mut self) -> &mut EmulatorState {
        &mut self.state
    }

    delegate! {
        to self.state {
            pub fn reg_read(&self, reg: Reg) -> u16;
            pub fn reg_write(&mut self, reg: Reg, val: u16);
            pub fn pc(&self) -> u16;
            pub fn set_pc(&mut self, pc: u16);
            pub fn get_flags(&self) -> u8;
            pub fn set_flags(&mut self, val: u8);
            pub fn get_psw(&self) -> &Psw;
            pub fn num_ins(&self) -> usize;
        }

        to self.state.intr {
            pub fn interrupt(&mut self, num: u8);
        }

        // Physical accesses; these bypass the TLB.
        to self.state.mmu {
            #[call(read8)]
            pub fn mem_read_byte(&self, addr: u16) -> u8;
            #[call(read16)]
            pub fn mem_read_word(&self, addr: u16) -> u16;
            #[call(write8)]
            pub fn mem_write_byte(&mut self, addr: u16, val: u8);
            #[call(write16)]
            pub fn mem_write_word(&mut self, addr: u16, val: u16);
            pub fn detach_ipl(&mut self);
            pub fn is_ipl_mode(&self) -> bool;
        }
    }

    ///////////////////////////////////////////////////////////////////////////
    // Interrupts
    ///////////////////////////////////////////////////////////////////////////

    fn check_interrupt(&mut self) -> bool {
        if !self.state.psw.is_intr_enabled() && !self.state.intr.is_occurred_exception() {
            return false;
        }
        let Some(num) = self.state.intr.check_intr_num() else {
            return false;
        };

        let old_flags = self.state.get_flags();
        let old_pc = self.state.pc();
        // Switches to the supervisor stack before anything is pushed.
        self.state.set_flags_priv((old_flags & !Psw::E) | Psw::P);
        self.push_supervisor(old_flags as u16);
        self.push_supervisor(old_pc);

        let new_pc = self.state.mmu.read16(VECTOR_BASE + WORD_SIZE * num as u16);
        debug!("Interrupt {num}; saving pc {old_pc:#06x} and flags {old_flags:#04x}; loading pc {new_pc:#06x}");
        self.state.set_pc(new_pc);
        true
    }

    fn push_supervisor(&mut self, val: u16) {
        let sp = self.state.reg_read(Reg::SP).wrapping_sub(WORD_SIZE);
        self.state.reg_write(Reg::SP, sp);
        self.state.mmu.write16(sp, val);
    }

    ///////////////////////////////////////////////////////////////////////////
    // Memory, as seen by the CPU
    ///////////////////////////////////////////////////////////////////////////

    fn translate(&mut self, addr: u16, access: Access) -> Result<u16, Fault> {
        let privileged = self.state.psw.is_privileged();
        self.state.mmu.translate(addr, access, privileged)
    }

    fn load_byte(&mut self, addr: u16, access: Access) -> Result<u8, Fault> {
        let phys = self.translate(addr, access)?;
        Ok(self.state.mmu.read8(phys))
    }

    fn load_word(&mut self, addr: u16, access: Access) -> Result<u16, Fault> {
        let upper = self.load_byte(addr, access)? as u16;
        let lower = self.load_byte(addr.wrapping_add(1), access)? as u16;
        Ok((upper << u8::BITS) | lower)
    }

    fn store_byte(&mut self, addr: u16, val: u8) -> Result<(), Fault> {
        let phys = self.translate(addr, Access::Write)?;
        self.state.mmu.write8(phys, val);
        Ok(())
    }

    // Both halves are translated before either is written.
    fn store_word(&mut self, addr: u16, val: u16) -> Result<(), Fault> {
        let upper = self.translate(addr, Access::Write)?;
        let lower = self.translate(addr.wrapping_add(1), Access::Write)?;
        self.state.mmu.write8(upper, (val >> u8::BITS) as u8);
        self.state.mmu.write8(lower, val as u8);
        Ok(())
    }

    fn push_word(&mut self, val: u16) -> Result<(), Fault> {
        let sp = self.state.reg_read(Reg::SP).wrapping_sub(WORD_SIZE);
        self.store_word(sp, val)?;
        self.state.reg_write(Reg::SP, sp);
        Ok(())
    }

    fn pop_word(&mut self) -> Result<u16, Fault> {
        let sp = self.state.reg_read(Reg::SP);
        let val = self.load_word(sp, Access::Read)?;
        self.state.reg_write(Reg::SP, sp.wrapping_add(WORD_SIZE));
        Ok(val)
    }

    ///////////////////////////////////////////////////////////////////////////
    // Fetch and decode
    ///////////////////////////////////////////////////////////////////////////

    fn exec_next(&mut self) -> Result<ExecRet, Fault> {
        let pc = self.state.pc();
        let word = self.load_word(pc, Access::Execute)?;
        self.state.psw.next_pc();

        let fields = decode_fields(word);
        let Some(op) = fields.op else {
            debug!("PC: {pc:#06x}: undefined {word:#06x}");
            return Err(Fault::UndefinedOp{word});
        };

        let mut extra = None;
        if op.has_operand() && fields.mode.has_extra_word() {
            extra = Some(self.load_word(self.state.pc(), Access::Execute)?);
            self.state.psw.next_pc();
        }

        let ins = Ins{op, mode: fields.mode, rd: fields.rd, rx: fields.rx, extra};
        debug!("PC: {pc:#06x}: {ins}");
        self.exec(&ins, word)
    }

    fn extra(ins: &Ins) -> u16 {
        match ins.extra {
            Some(val) => val,
            None => panic!("{ins:?} is missing its second word"),
        }
    }

    fn effective_addr(&self, ins: &Ins) -> u16 {
        match ins.mode {
            AddrMode::Direct => Self::extra(ins),
            AddrMode::Indexed => Self::extra(ins).wrapping_add(self.state.reg_read(ins.rx)),
            AddrMode::FpRelative => {
                let disp = sext4(ins.rx as u16).wrapping_mul(WORD_SIZE);
                self.state.reg_read(Reg::FP).wrapping_add(disp)
            },
            AddrMode::Indirect | AddrMode::ByteIndirect => self.state.reg_read(ins.rx),
            AddrMode::Immediate | AddrMode::Register | AddrMode::ShortImmediate => 0,
        }
    }

    fn load_operand(&mut self, ins: &Ins) -> Result<u16, Fault> {
        let ea = self.effective_addr(ins);
        match ins.mode {
            AddrMode::Direct | AddrMode::Indexed | AddrMode::FpRelative | AddrMode::Indirect => {
                self.load_word(ea, Access::Read)
            },
            AddrMode::ByteIndirect => Ok(self.load_byte(ea, Access::Read)? as u16),
            AddrMode::Immediate => Ok(Self::extra(ins)),
            AddrMode::Register => Ok(self.state.reg_read(ins.rx)),
            AddrMode::ShortImmediate => Ok(sext4(ins.rx as u16)),
        }
    }

    // For instructions that only use the address. Modes without one are
    // undefined.
    fn require_ea(&self, ins: &Ins, word: u16) -> Result<u16, Fault> {
        if !ins.mode.has_ea() {
            return Err(Fault::UndefinedOp{word});
        }
        Ok(self.effective_addr(ins))
    }

    ///////////////////////////////////////////////////////////////////////////
    // Execute
    ///////////////////////////////////////////////////////////////////////////

    fn exec(&mut self, ins: &Ins, word: u16) -> Result<ExecRet, Fault> {
        use Opcode::*;
        match ins.op {
            Nop => (),
            Ld => {
                let val = self.load_operand(ins)?;
                self.state.reg_write(ins.rd, val);
            },
            St => self.exec_st(ins, word)?,
            Add | Sub | Cmp | And | Or | Xor | Adds | Mul | Div | Mod
                | Shla | Shll | Shra | Shrl => self.exec_alu(ins)?,
            Jmp => self.exec_jmp(ins, word)?,
            Call => self.exec_call(ins, word)?,
            In | Out => self.exec_io(ins, word)?,
            PushPop if ins.is_alt() => {
                let val = self.pop_word()?;
                self.state.reg_write(ins.rd, val);
            },
            PushPop => self.push_word(self.state.reg_read(ins.rd))?,
            RetReti if ins.is_alt() => self.exec_reti()?,
            RetReti => {
                let new_pc = self.pop_word()?;
                self.state.set_pc(new_pc);
            },
            Svc => return Err(Fault::Svc),
            Halt => {
                if !self.state.psw.is_privileged() {
                    return Err(Fault::PrivViolation);
                }
                return Ok(ExecRet::Halt);
            },
        }
        Ok(ExecRet::Ok)
    }

    fn exec_st(&mut self, ins: &Ins, word: u16) -> Result<(), Fault> {
        let ea = self.require_ea(ins, word)?;
        let val = self.state.reg_read(ins.rd);
        if ins.mode.is_byte_indirect() {
            self.store_byte(ea, val as u8)
        } else {
            self.store_word(ea, val)
        }
    }

    fn exec_alu(&mut self, ins: &Ins) -> Result<(), Fault> {
        let v2 = self.load_operand(ins)?;
        let v1 = self.state.reg_read(ins.rd);
        let res = alu::calc(&mut self.state.intr, ins.op, v1, v2);
        self.change_flag(ins.op, v1, v2, res);
        // Written after the flags, so a FLAG destination takes the result.
        if ins.op != Opcode::Cmp {
            self.state.reg_write(ins.rd, res as u16);
        }
        Ok(())
    }

    fn change_flag(&mut self, op: Opcode, v1: u16, v2: u16, res: i32) {
        self.state.psw.set_cc(alu::cc_flags(op, v1, v2, res));
    }

    fn cond_holds(&self, cond: JumpCond) -> bool {
        let psw = &self.state.psw;
        let (z, c, s, v) = (psw.get_zero(), psw.get_carry(), psw.get_sign(), psw.get_overflow());
        use JumpCond::*;
        match cond {
            Jz => z,
            Jc => c,
            Jm => s,
            Jo => v,
            Jgt => !z && s == v,
            Jge => s == v,
            Jle => z || s != v,
            Jlt => s != v,
            Jnz => !z,
            Jnc => !c,
            Jnm => !s,
            Jno => !v,
            Jhi => !c && !z,
            Jls => c || z,
            Jmp => true,
        }
    }

    // Byte mode makes no sense for a jump target.
    fn jump_target(&self, ins: &Ins, word: u16) -> Result<u16, Fault> {
        if ins.mode.is_byte_indirect() {
            return Err(Fault::UndefinedOp{word});
        }
        self.require_ea(ins, word)
    }

    fn exec_jmp(&mut self, ins: &Ins, word: u16) -> Result<(), Fault> {
        let Some(cond) = JumpCond::decode(ins.rd) else {
            return Err(Fault::UndefinedOp{word});
        };
        let target = self.jump_target(ins, word)?;
        if self.cond_holds(cond) {
            trace!("PC: {cond} taken to {target:#06x}");
            self.state.set_pc(target);
        }
        Ok(())
    }

    fn exec_call(&mut self, ins: &Ins, word: u16) -> Result<(), Fault> {
        let target = self.jump_target(ins, word)?;
        self.push_word(self.state.pc())?;
        self.state.set_pc(target);
        Ok(())
    }

    fn exec_io(&mut self, ins: &Ins, word: u16) -> Result<(), Fault> {
        let ea = self.require_ea(ins, word)?;
        let psw = &self.state.psw;
        if !psw.is_privileged() && !psw.is_io_privileged() {
            return Err(Fault::PrivViolation);
        }

        let port = ea as u8;
        if ins.op == Opcode::In {
            let val = self.io.input(&mut self.state.mmu, port);
            self.state.reg_write(ins.rd, val);
        } else {
            let val = self.state.reg_read(ins.rd);
            self.io.output(&mut self.state.mmu, port, val);
        }
        Ok(())
    }

    // Both words are read before SP moves, so a fault leaves the stack intact.
    fn exec_reti(&mut self) -> Result<(), Fault> {
        let sp = self.state.reg_read(Reg::SP);
        let new_pc = self.load_word(sp, Access::Read)?;
        let new_flags = self.load_word(sp.wrapping_add(WORD_SIZE), Access::Read)?;
        self.state.reg_write(Reg::SP, sp.wrapping_add(2 * WORD_SIZE));

        debug!("RETI to pc {new_pc:#06x}, flags {new_flags:#04x}");
        self.state.set_pc(new_pc);
        self.state.set_flags(new_flags as u8);
        Ok(())
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
