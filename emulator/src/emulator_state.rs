use common::asm::Reg;
use common::constants::{IPL_START, MEM_HIGH};
use common::misc::IsEven;

use crate::intr::IntrController;
use crate::mmu::Mmu;

use log::{trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Psw {
    pc: u16,
    flags: u8,
}

impl Psw {
    pub const Z_SHIFT: u8 = 0;
    pub const S_SHIFT: u8 = 1;
    pub const C_SHIFT: u8 = 2;
    pub const V_SHIFT: u8 = 3;
    pub const I_SHIFT: u8 = 5;
    pub const P_SHIFT: u8 = 6;
    pub const E_SHIFT: u8 = 7;

    pub const Z: u8 = 0x1 << Self::Z_SHIFT;
    pub const S: u8 = 0x1 << Self::S_SHIFT;
    pub const C: u8 = 0x1 << Self::C_SHIFT;
    pub const V: u8 = 0x1 << Self::V_SHIFT;
    pub const I: u8 = 0x1 << Self::I_SHIFT;
    pub const P: u8 = 0x1 << Self::P_SHIFT;
    pub const E: u8 = 0x1 << Self::E_SHIFT;

    // The only bits user mode may change.
    pub const CC_MASK: u8 = Self::V | Self::C | Self::S | Self::Z;
    pub const PRIV_MASK: u8 = Self::E | Self::P | Self::I;

    pub const BOOT_PC: u16 = IPL_START;

    pub fn new() -> Psw {
        Psw{pc: Self::BOOT_PC, flags: Self::P}
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn next_pc(&mut self) {
        if self.pc >= MEM_HIGH - 1 {
            warn!("PC advanced past {MEM_HIGH:#06x} from {:#06x}", self.pc);
        }
        self.pc = self.pc.wrapping_add(2);
    }

    // Odd targets are reported, not corrected.
    pub fn jump_to(&mut self, addr: u16) {
        if !addr.is_even() {
            warn!("Jump to odd address {addr:#06x}");
        }
        self.pc = addr;
    }

    pub fn get_flags(&self) -> u8 {
        self.flags
    }

    // Outside privileged mode only V/C/S/Z can change.
    pub fn set_flags(&mut self, val: u8) {
        if self.is_privileged() {
            self.flags = val;
        } else {
            self.flags = (self.flags & Self::PRIV_MASK) | (val & Self::CC_MASK);
        }
    }

    pub fn set_flags_priv(&mut self, val: u8) {
        self.flags = val;
    }

    // Replace the condition codes only.
    pub fn set_cc(&mut self, cc: u8) {
        self.flags = (self.flags & !Self::CC_MASK) | (cc & Self::CC_MASK);
    }

    fn get(&self, bit: u8) -> bool {
        self.flags & bit != 0
    }

    pub fn is_intr_enabled(&self) -> bool {
        self.get(Self::E)
    }

    pub fn is_privileged(&self) -> bool {
        self.get(Self::P)
    }

    pub fn is_io_privileged(&self) -> bool {
        self.get(Self::I)
    }

    pub fn get_overflow(&self) -> bool {
        self.get(Self::V)
    }

    pub fn get_carry(&self) -> bool {
        self.get(Self::C)
    }

    pub fn get_sign(&self) -> bool {
        self.get(Self::S)
    }

    pub fn get_zero(&self) -> bool {
        self.get(Self::Z)
    }
}

impl Default for Psw {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////

// G0-G11 and FP are plain registers. SP is banked on the privilege flag; USP
// always names the user bank.
#[derive(Debug, Clone, Default)]
pub(crate) struct RegisterFile {
    regs: [u16; Self::NUM_PLAIN],
    ssp: u16,
    usp: u16,
    priv_mode: bool,
}

impl RegisterFile {
    const NUM_PLAIN: usize = 13;

    pub fn new() -> Self {
        Default::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn read(&self, reg: Reg) -> u16 {
        match reg {
            Reg::SP if self.priv_mode => self.ssp,
            Reg::SP | Reg::USP => self.usp,
            Reg::FLAG => panic!("FLAG is not held in the register file"),
            _ => self.regs[reg.index()],
        }
    }

    pub fn write(&mut self, reg: Reg, val: u16) {
        trace!("Reg: writing {val:#06x} to {reg}");
        match reg {
            Reg::SP if self.priv_mode => self.ssp = val,
            Reg::SP | Reg::USP => self.usp = val,
            Reg::FLAG => panic!("FLAG is not held in the register file"),
            _ => self.regs[reg.index()] = val,
        }
    }

    pub fn set_priv_mode(&mut self, priv_mode: bool) {
        self.priv_mode = priv_mode;
    }

    pub fn priv_mode(&self) -> bool {
        self.priv_mode
    }
}

////////////////////////////////////////////////////////////////////////////////

// Architectural state. Kept apart from the I/O controller so devices can be
// handed the memory while the controller is borrowed.
pub struct EmulatorState {
    num_ins: usize,
    pub(crate) regs: RegisterFile,
    pub(crate) psw: Psw,
    pub(crate) intr: IntrController,
    pub(crate) mmu: Mmu,
}

impl EmulatorState {
    pub fn new() -> Self {
        let mut state = EmulatorState {
            num_ins: 0usize,
            regs: RegisterFile::new(),
            psw: Psw::new(),
            intr: IntrController::new(),
            mmu: Mmu::new(),
        };
        state.sync_priv();
        state
    }

    pub fn reset(&mut self) {
        self.regs.reset();
        self.psw.reset();
        self.intr.reset();
        self.mmu.reset();
        self.mmu.load_ipl();
        self.sync_priv();
    }

    pub fn inc_ins(&mut self) {
        self.num_ins += 1;
    }

    pub fn num_ins(&self) -> usize {
        self.num_ins
    }

    fn sync_priv(&mut self) {
        self.regs.set_priv_mode(self.psw.is_privileged());
    }

    // Index 15 is the flag byte.
    pub fn reg_read(&self, reg: Reg) -> u16 {
        match reg {
            Reg::FLAG => self.psw.get_flags() as u16,
            _ => self.regs.read(reg),
        }
    }

    pub fn reg_write(&mut self, reg: Reg, val: u16) {
        match reg {
            Reg::FLAG => self.set_flags(val as u8),
            _ => self.regs.write(reg, val),
        }
    }

    pub fn pc(&self) -> u16 {
        self.psw.pc()
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.psw.jump_to(pc);
    }

    pub fn get_flags(&self) -> u8 {
        self.psw.get_flags()
    }

    pub fn set_flags(&mut self, val: u8) {
        self.psw.set_flags(val);
        self.sync_priv();
    }

    pub fn set_flags_priv(&mut self, val: u8) {
        self.psw.set_flags_priv(val);
        self.sync_priv();
    }

    pub fn get_psw(&self) -> &Psw {
        &self.psw
    }

    pub(crate) fn get_regs(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn get_intr(&self) -> &IntrController {
        &self.intr
    }

    pub fn get_intr_mut(&mut self) -> &mut IntrController {
        &mut self.intr
    }

    pub fn get_mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn get_mmu_mut(&mut self) -> &mut Mmu {
        &mut self.mmu
    }
}

impl Default for EmulatorState {
    fn default() -> Self {
        Self::new()
    }
}
