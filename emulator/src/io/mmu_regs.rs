use common::constants::TLB_ENTRIES;

use crate::io::IoDevice;
use crate::mmu::{Mmu, TlbEntry};

// TLB and boot-ROM control. Always present; the emulator registers it itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct MmuRegs();

impl MmuRegs {
    pub const TLB_BASE: u8 = 0x80;
    const TLB_ENTRY_SIZE: u8 = 4;
    const TLB_END: u8 = Self::TLB_BASE + TLB_ENTRIES as u8 * Self::TLB_ENTRY_SIZE;

    pub const FAULT_ADDR: u8 = 0xa0;
    pub const STATUS: u8 = 0xa2;
    pub const DETACH_IPL: u8 = 0xa4;

    pub const STATUS_TLB_ENABLED: u16 = 0x1;
    pub const STATUS_IPL_MAPPED: u16 = 0x2;

    const NUM_ADDRS: usize = TLB_ENTRIES * 2 + 3;
    const ADDRS: [u8; Self::NUM_ADDRS] = {
        let mut addrs = [0u8; Self::NUM_ADDRS];
        let mut i = 0;
        while i < TLB_ENTRIES * 2 {
            addrs[i] = Self::TLB_BASE + 2 * i as u8;
            i += 1;
        }
        addrs[i] = Self::FAULT_ADDR;
        addrs[i + 1] = Self::STATUS;
        addrs[i + 2] = Self::DETACH_IPL;
        addrs
    };

    // Entry index and whether addr names the flags/frame half.
    fn tlb_reg(addr: u8) -> (usize, bool) {
        let off = addr - Self::TLB_BASE;
        ((off / Self::TLB_ENTRY_SIZE) as usize, off % Self::TLB_ENTRY_SIZE != 0)
    }

    fn status_read(mmu: &Mmu) -> u16 {
        let mut val = 0;
        if mmu.is_tlb_enabled() {
            val |= Self::STATUS_TLB_ENABLED;
        }
        if mmu.is_ipl_mode() {
            val |= Self::STATUS_IPL_MAPPED;
        }
        val
    }
}

impl IoDevice for MmuRegs {
    fn addrs(&self) -> &[u8] {
        &Self::ADDRS
    }

    fn input(&mut self, mmu: &mut Mmu, addr: u8) -> u16 {
        match addr {
            Self::TLB_BASE..Self::TLB_END => {
                let (idx, hi) = Self::tlb_reg(addr);
                let entry = mmu.tlb_entry(idx);
                if hi {
                    ((entry.flags as u16) << u8::BITS) | entry.frame as u16
                } else {
                    entry.page as u16
                }
            },
            Self::FAULT_ADDR => mmu.fault_addr(),
            Self::STATUS => Self::status_read(mmu),
            Self::DETACH_IPL => 0,
            _ => panic!("MmuRegs doesn't handle address {addr:#04x}"),
        }
    }

    fn output(&mut self, mmu: &mut Mmu, addr: u8, val: u16) {
        match addr {
            Self::TLB_BASE..Self::TLB_END => {
                let (idx, hi) = Self::tlb_reg(addr);
                let mut entry = mmu.tlb_entry(idx);
                if hi {
                    entry.flags = (val >> u8::BITS) as u8;
                    entry.frame = val as u8;
                } else {
                    entry.page = val as u8;
                }
                mmu.set_tlb_entry(idx, entry);
            },
            Self::FAULT_ADDR => (),
            Self::STATUS => mmu.set_tlb_enabled(val & Self::STATUS_TLB_ENABLED != 0),
            Self::DETACH_IPL => mmu.detach_ipl(),
            _ => panic!("MmuRegs doesn't handle address {addr:#04x}"),
        }
    }
}
