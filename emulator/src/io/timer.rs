use common::constants::intr;

use crate::intr::IntrController;
use crate::io::IoDevice;
use crate::mmu::Mmu;

use log::trace;

// Interval timer counting in milliseconds. Time is estimated from executed
// instructions, not the host clock.
pub struct Timer {
    base: u8,
    addrs: [u8; 2],
    intr_num: u8,
    cycles_per_ms: u32,

    period: u16,
    counter: u16,
    cycles: u32,
    running: bool,
    intr_enable: bool,
    flag: bool,
}

impl Timer {
    pub const TIMER0_BASE: u8 = 0x00;
    pub const TIMER1_BASE: u8 = 0x04;

    // Counter on read, period on write.
    const COUNTER_OFFSET: u8 = 0;
    // Flag on read, control on write.
    const CONTROL_OFFSET: u8 = 2;

    const FLAG_SHIFT: u16 = 15;
    const INT_ENB_SHIFT: u16 = 15;
    const INT_ENB_MASK: u16 = 0x1 << Self::INT_ENB_SHIFT;
    const START_MASK: u16 = 0x1;

    pub const CYCLES_PER_MS: u32 = 2000;

    pub fn timer0() -> Self {
        Self::new(Self::TIMER0_BASE, intr::TIMER0)
    }

    pub fn timer1() -> Self {
        Self::new(Self::TIMER1_BASE, intr::TIMER1)
    }

    fn new(base: u8, intr_num: u8) -> Self {
        Timer {
            base,
            addrs: [base + Self::COUNTER_OFFSET, base + Self::CONTROL_OFFSET],
            intr_num,
            cycles_per_ms: Self::CYCLES_PER_MS,
            period: 0,
            counter: 0,
            cycles: 0,
            running: false,
            intr_enable: false,
            flag: false,
        }
    }

    pub fn with_cycles_per_ms(mut self, cycles_per_ms: u32) -> Self {
        assert!(cycles_per_ms > 0);
        self.cycles_per_ms = cycles_per_ms;
        self
    }

    fn control_write(&mut self, val: u16) {
        self.intr_enable = val & Self::INT_ENB_MASK != 0;
        let start = val & Self::START_MASK != 0;
        if start && !self.running {
            self.counter = 0;
            self.cycles = 0;
        }
        self.running = start;
    }

    fn flag_read(&mut self) -> u16 {
        let val = (self.flag as u16) << Self::FLAG_SHIFT;
        self.flag = false;
        val
    }
}

impl IoDevice for Timer {
    fn reset(&mut self) {
        self.period = 0;
        self.counter = 0;
        self.cycles = 0;
        self.running = false;
        self.intr_enable = false;
        self.flag = false;
    }

    fn tick(&mut self, _: &mut Mmu, intr: &mut IntrController) {
        if !self.running {
            return;
        }

        self.cycles += 1;
        if self.cycles < self.cycles_per_ms {
            return;
        }
        self.cycles = 0;
        self.counter = self.counter.wrapping_add(1);

        // A zero period never expires.
        if self.period == 0 || self.counter < self.period {
            return;
        }
        self.counter = 0;
        self.flag = true;
        trace!("Timer {:#04x}: expired", self.base);
        if self.intr_enable {
            intr.interrupt(self.intr_num);
        }
    }

    fn addrs(&self) -> &[u8] {
        &self.addrs
    }

    fn input(&mut self, _: &mut Mmu, addr: u8) -> u16 {
        match addr - self.base {
            Self::COUNTER_OFFSET => self.counter,
            Self::CONTROL_OFFSET => self.flag_read(),
            _ => panic!("Timer doesn't handle address {addr:#04x}"),
        }
    }

    fn output(&mut self, _: &mut Mmu, addr: u8, val: u16) {
        match addr - self.base {
            Self::COUNTER_OFFSET => self.period = val,
            Self::CONTROL_OFFSET => self.control_write(val),
            _ => panic!("Timer doesn't handle address {addr:#04x}"),
        }
    }
}
