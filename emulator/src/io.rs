pub mod console;
pub mod mmu_regs;
pub mod serial;
pub mod storage;
pub mod system;
pub mod timer;

use common::constants::IO_SPACE_SIZE;
use common::misc::IsEven;

use crate::intr::IntrController;
use crate::mmu::Mmu;

use log::trace;

// A peripheral on the I/O bus. Devices only see the pieces of machine state
// they're allowed to touch: physical memory for DMA, and the interrupt
// controller from tick().
pub trait IoDevice: Send {
    fn reset(&mut self) {}

    // Called once per executed instruction.
    fn tick(&mut self, _mmu: &mut Mmu, _intr: &mut IntrController) {}

    // Even port addresses this device decodes.
    fn addrs(&self) -> &[u8];

    fn input(&mut self, mmu: &mut Mmu, addr: u8) -> u16;
    fn output(&mut self, mmu: &mut Mmu, addr: u8, val: u16);
}

////////////////////////////////////////////////////////////////////////////////

const NUM_SLOTS: usize = IO_SPACE_SIZE / 2;

pub struct IoHostController {
    devices: Vec<Box<dyn IoDevice>>,
    slots: [Option<usize>; NUM_SLOTS],
}

impl IoHostController {
    pub fn new(devices: Vec<Box<dyn IoDevice>>) -> Self {
        let mut slots = [None; NUM_SLOTS];
        for (idx, dev) in devices.iter().enumerate() {
            for &addr in dev.addrs() {
                assert!(addr.is_even(), "I/O addr {addr:#04x} not aligned");
                let slot = &mut slots[addr as usize / 2];
                assert!(slot.is_none(), "Duplicate I/O device for {addr:#04x}");
                *slot = Some(idx);
            }
        }
        IoHostController{devices, slots}
    }

    fn lookup(&self, addr: u8) -> Option<usize> {
        self.slots[addr as usize / 2]
    }

    // Odd addresses select the same register as the even one below.
    pub fn input(&mut self, mmu: &mut Mmu, addr: u8) -> u16 {
        let addr = addr & !1;
        let val = match self.lookup(addr) {
            Some(idx) => self.devices[idx].input(mmu, addr),
            None => 0,
        };
        trace!("IO: read {val:#06x} from {addr:#04x}");
        val
    }

    pub fn output(&mut self, mmu: &mut Mmu, addr: u8, val: u16) {
        let addr = addr & !1;
        trace!("IO: writing {val:#06x} to {addr:#04x}");
        if let Some(idx) = self.lookup(addr) {
            self.devices[idx].output(mmu, addr, val);
        }
    }

    pub fn tick(&mut self, mmu: &mut Mmu, intr: &mut IntrController) {
        for dev in self.devices.iter_mut() {
            dev.tick(mmu, intr);
        }
    }

    pub fn reset(&mut self) {
        for dev in self.devices.iter_mut() {
            dev.reset();
        }
    }
}
