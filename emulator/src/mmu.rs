use common::constants::{IPL_SIZE, IPL_START, MEM_SIZE, PAGE_BITS, PAGE_SIZE, TLB_ENTRIES};

use crate::error::{EmuError, Fault};
use crate::ipl::IPL;

use log::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TlbEntry {
    pub page: u8,
    pub frame: u8,
    pub flags: u8,
}

impl TlbEntry {
    pub const VALID: u8 = 0x80;
    pub const REFERENCED: u8 = 0x10;
    pub const DIRTY: u8 = 0x08;
    pub const READ: u8 = 0x04;
    pub const WRITE: u8 = 0x02;
    pub const EXEC: u8 = 0x01;

    pub fn new(page: u8, frame: u8, flags: u8) -> TlbEntry {
        TlbEntry{page, frame, flags}
    }

    pub fn is_valid(&self) -> bool {
        self.flags & Self::VALID != 0
    }

    fn allows(&self, access: Access) -> bool {
        let bit = match access {
            Access::Read => Self::READ,
            Access::Write => Self::WRITE,
            Access::Execute => Self::EXEC,
        };
        self.flags & bit != 0
    }
}

// Physical memory, the boot ROM overlay and the TLB. The read/write methods are
// physical; translate() is the CPU's way in.
pub struct Mmu {
    mem: Vec<u8>,
    ipl_mode: bool,
    tlb: [TlbEntry; TLB_ENTRIES],
    tlb_enabled: bool,
    fault_addr: u16,
}

impl Mmu {
    pub fn new() -> Self {
        Mmu {
            mem: vec![0; MEM_SIZE],
            ipl_mode: false,
            tlb: [TlbEntry::default(); TLB_ENTRIES],
            tlb_enabled: false,
            fault_addr: 0,
        }
    }

    // Memory contents survive a reset.
    pub fn reset(&mut self) {
        self.tlb = [TlbEntry::default(); TLB_ENTRIES];
        self.tlb_enabled = false;
        self.fault_addr = 0;
    }

    pub fn read8(&self, addr: u16) -> u8 {
        self.mem[addr as usize]
    }

    pub fn write8(&mut self, addr: u16, val: u8) {
        if self.ipl_mode && addr >= IPL_START {
            warn!("Mem: dropped write of {val:#04x} to IPL ROM at {addr:#06x}");
            return;
        }
        trace!("Mem: writing {val:#04x} to {addr:#06x} (byte)");
        self.mem[addr as usize] = val;
    }

    pub fn read16(&self, addr: u16) -> u16 {
        ((self.read8(addr) as u16) << u8::BITS) | (self.read8(addr.wrapping_add(1)) as u16)
    }

    pub fn write16(&mut self, addr: u16, val: u16) {
        self.write8(addr, (val >> u8::BITS) as u8);
        self.write8(addr.wrapping_add(1), val as u8);
    }

    pub fn load(&mut self, data: &[u8], start: u16) -> Result<(), EmuError> {
        let end = start as usize + data.len();
        if end > MEM_SIZE {
            return Err(EmuError::ImageTooLarge{start, len: data.len()});
        }
        for (addr, byte) in (start..=u16::MAX).zip(data) {
            self.write8(addr, *byte);
        }
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////
    // Boot ROM
    ////////////////////////////////////////////////////////////////////////////

    pub fn load_ipl(&mut self) {
        let window = &mut self.mem[IPL_START as usize..][..IPL_SIZE];
        window.fill(0);
        for (pair, word) in window.chunks_exact_mut(2).zip(IPL.iter()) {
            pair.copy_from_slice(&word.to_be_bytes());
        }
        self.ipl_mode = true;
        debug!("Mmu: IPL mapped at {IPL_START:#06x}");
    }

    pub fn detach_ipl(&mut self) {
        self.ipl_mode = false;
        self.mem[IPL_START as usize..][..IPL_SIZE].fill(0);
        debug!("Mmu: IPL detached");
    }

    pub fn is_ipl_mode(&self) -> bool {
        self.ipl_mode
    }

    ////////////////////////////////////////////////////////////////////////////
    // TLB
    ////////////////////////////////////////////////////////////////////////////

    pub fn tlb_entry(&self, idx: usize) -> TlbEntry {
        self.tlb[idx]
    }

    pub fn set_tlb_entry(&mut self, idx: usize, entry: TlbEntry) {
        trace!("Mmu: TLB[{idx}] = {entry:?}");
        self.tlb[idx] = entry;
    }

    pub fn set_tlb_enabled(&mut self, enabled: bool) {
        debug!("Mmu: TLB {}", if enabled { "enabled" } else { "disabled" });
        self.tlb_enabled = enabled;
    }

    pub fn is_tlb_enabled(&self) -> bool {
        self.tlb_enabled
    }

    // Address of the last access that missed or was refused.
    pub fn fault_addr(&self) -> u16 {
        self.fault_addr
    }

    // Map a CPU address to a physical one. Privileged accesses bypass the TLB.
    pub fn translate(&mut self, addr: u16, access: Access, privileged: bool) -> Result<u16, Fault> {
        if privileged || !self.tlb_enabled {
            return Ok(addr);
        }

        let page = (addr >> PAGE_BITS) as u8;
        let Some(entry) = self.tlb.iter_mut().find(|e| e.is_valid() && e.page == page) else {
            self.fault_addr = addr;
            return Err(Fault::TlbMiss{addr});
        };

        if !entry.allows(access) {
            self.fault_addr = addr;
            return Err(Fault::MemViolation{addr});
        }

        entry.flags |= TlbEntry::REFERENCED;
        if access == Access::Write {
            entry.flags |= TlbEntry::DIRTY;
        }
        let offset = addr & (PAGE_SIZE as u16 - 1);
        Ok(((entry.frame as u16) << PAGE_BITS) | offset)
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
