use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::io::IoDevice;
use crate::mmu::Mmu;

// Front panel switches and lamps.
pub trait Panel: Send + Sync {
    fn data_switches(&self) -> u16;
    fn rotary_switch(&self) -> u16;
    fn memory_address(&self) -> u16;
    fn function_switches(&self) -> u16;

    fn set_leds(&self, val: u16);
}

////////////////////////////////////////////////////////////////////////////////

// A panel with nothing attached; the host sets switches and reads lamps.
#[derive(Default)]
pub struct PanelState {
    data: AtomicU16,
    rotary: AtomicU16,
    mar: AtomicU16,
    function: AtomicU16,
    leds: AtomicU16,
}

impl PanelState {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_data_switches(&self, val: u16) {
        self.data.store(val, Ordering::Relaxed);
    }

    pub fn set_rotary_switch(&self, val: u16) {
        self.rotary.store(val, Ordering::Relaxed);
    }

    pub fn set_memory_address(&self, val: u16) {
        self.mar.store(val, Ordering::Relaxed);
    }

    pub fn set_function_switches(&self, val: u16) {
        self.function.store(val, Ordering::Relaxed);
    }

    pub fn leds(&self) -> u16 {
        self.leds.load(Ordering::Relaxed)
    }
}

impl Panel for PanelState {
    fn data_switches(&self) -> u16 {
        self.data.load(Ordering::Relaxed)
    }

    fn rotary_switch(&self) -> u16 {
        self.rotary.load(Ordering::Relaxed)
    }

    fn memory_address(&self) -> u16 {
        self.mar.load(Ordering::Relaxed)
    }

    fn function_switches(&self) -> u16 {
        self.function.load(Ordering::Relaxed)
    }

    fn set_leds(&self, val: u16) {
        self.leds.store(val, Ordering::Relaxed);
    }
}

////////////////////////////////////////////////////////////////////////////////

pub struct Console {
    panel: Arc<dyn Panel>,
}

impl Console {
    // Data switches on read, LEDs on write.
    pub const DATA: u8 = 0xf8;
    pub const ROTARY: u8 = 0xfa;
    pub const MAR: u8 = 0xfc;
    pub const FUNCTION: u8 = 0xfe;
    const ADDRS: &[u8] = &[Self::DATA, Self::ROTARY, Self::MAR, Self::FUNCTION];

    pub fn new(panel: Arc<dyn Panel>) -> Self {
        Console{panel}
    }
}

impl IoDevice for Console {
    fn addrs(&self) -> &[u8] {
        Self::ADDRS
    }

    fn input(&mut self, _: &mut Mmu, addr: u8) -> u16 {
        match addr {
            Self::DATA => self.panel.data_switches(),
            Self::ROTARY => self.panel.rotary_switch(),
            Self::MAR => self.panel.memory_address(),
            Self::FUNCTION => self.panel.function_switches(),
            _ => panic!("Console doesn't handle address {addr:#04x}"),
        }
    }

    fn output(&mut self, _: &mut Mmu, addr: u8, val: u16) {
        match addr {
            Self::DATA => self.panel.set_leds(val),
            Self::ROTARY | Self::MAR | Self::FUNCTION => (),
            _ => panic!("Console doesn't handle address {addr:#04x}"),
        }
    }
}
