use crate::io::IoDevice;
use crate::mmu::Mmu;

// Read-only identification registers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRegs {
    boot_mode: u16,
}

impl SystemRegs {
    pub const MACHINE_ID_ADDR: u8 = 0x1c;
    pub const BOOT_MODE_ADDR: u8 = 0x1e;
    const ADDRS: &[u8] = &[Self::MACHINE_ID_ADDR, Self::BOOT_MODE_ADDR];

    pub const MACHINE_ID: u16 = 0x0003;

    pub fn new(boot_mode: u16) -> Self {
        SystemRegs{boot_mode}
    }
}

impl IoDevice for SystemRegs {
    fn addrs(&self) -> &[u8] {
        Self::ADDRS
    }

    fn input(&mut self, _: &mut Mmu, addr: u8) -> u16 {
        match addr {
            Self::MACHINE_ID_ADDR => Self::MACHINE_ID,
            Self::BOOT_MODE_ADDR => self.boot_mode,
            _ => panic!("SystemRegs doesn't handle address {addr:#04x}"),
        }
    }

    fn output(&mut self, _: &mut Mmu, _: u8, _: u16) {}
}
