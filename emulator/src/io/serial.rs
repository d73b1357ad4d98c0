use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use common::constants::intr;

use crate::intr::IntrController;
use crate::io::IoDevice;
use crate::mmu::Mmu;

use log::error;

// Host side of a serial line.
pub trait SerialPort: Send + Sync {
    fn send(&self, val: u8);
    fn receive(&self) -> u8;

    fn is_writeable(&self) -> bool;
    fn is_readable(&self) -> bool;
}

////////////////////////////////////////////////////////////////////////////////

// In-memory serial line. The host end pushes input and drains output.
#[derive(Default)]
pub struct PipeSerial {
    out_buf: Mutex<VecDeque<u8>>,
    in_buf: Mutex<VecDeque<u8>>,
}

impl PipeSerial {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn take_output(&self) -> VecDeque<u8> {
        std::mem::take(&mut self.out_buf.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn pop_output(&self) -> Option<u8> {
        self.out_buf.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    pub fn push_input(&self, val: u8) {
        self.in_buf.lock().unwrap_or_else(PoisonError::into_inner).push_back(val);
    }

    pub fn write_input(&self, vals: &[u8]) {
        for val in vals.iter() {
            self.push_input(*val);
        }
    }
}

impl SerialPort for PipeSerial {
    fn send(&self, val: u8) {
        self.out_buf.lock().unwrap_or_else(PoisonError::into_inner).push_back(val);
    }

    fn receive(&self) -> u8 {
        self.in_buf.lock().unwrap_or_else(PoisonError::into_inner).pop_front().unwrap_or(0)
    }

    fn is_writeable(&self) -> bool {
        true
    }

    fn is_readable(&self) -> bool {
        !self.in_buf.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

////////////////////////////////////////////////////////////////////////////////

pub struct Serial {
    port: Arc<dyn SerialPort>,
    tx_intr_enable: bool,
    rx_intr_enable: bool,
    // Set once an interrupt has been requested for the current state, so a
    // level that stays high isn't raised every tick.
    tx_raised: bool,
    rx_raised: bool,
}

impl Serial {
    pub const DATA: u8 = 0x08;
    pub const CONTROL: u8 = 0x0a;
    const ADDRS: &[u8] = &[Self::DATA, Self::CONTROL];

    const WRITEABLE_MASK: u16 = 0x80;
    const READABLE_MASK: u16 = 0x40;
    const TX_INT_ENB_MASK: u16 = 0x80;
    const RX_INT_ENB_MASK: u16 = 0x40;

    pub fn new(port: Arc<dyn SerialPort>) -> Self {
        Serial {
            port,
            tx_intr_enable: false,
            rx_intr_enable: false,
            tx_raised: false,
            rx_raised: false,
        }
    }

    fn data_read(&mut self) -> u16 {
        if !self.port.is_readable() {
            error!("Serial: read of data register when nothing was received");
            return 0;
        }
        self.rx_raised = false;
        self.port.receive() as u16
    }

    fn data_write(&mut self, val: u16) {
        if !self.port.is_writeable() {
            error!("Serial: send of {val:#04x} when not writeable");
            return;
        }
        self.tx_raised = false;
        self.port.send(val as u8);
    }

    fn status_read(&self) -> u16 {
        let mut val = 0;
        if self.port.is_writeable() {
            val |= Self::WRITEABLE_MASK;
        }
        if self.port.is_readable() {
            val |= Self::READABLE_MASK;
        }
        val
    }

    fn control_write(&mut self, val: u16) {
        let tx = val & Self::TX_INT_ENB_MASK != 0;
        let rx = val & Self::RX_INT_ENB_MASK != 0;
        if tx && !self.tx_intr_enable {
            self.tx_raised = false;
        }
        if rx && !self.rx_intr_enable {
            self.rx_raised = false;
        }
        self.tx_intr_enable = tx;
        self.rx_intr_enable = rx;
    }
}

impl IoDevice for Serial {
    fn reset(&mut self) {
        self.tx_intr_enable = false;
        self.rx_intr_enable = false;
        self.tx_raised = false;
        self.rx_raised = false;
    }

    fn tick(&mut self, _: &mut Mmu, intr: &mut IntrController) {
        if self.rx_intr_enable && !self.rx_raised && self.port.is_readable() {
            self.rx_raised = true;
            intr.interrupt(intr::SERIAL_RX);
        }
        if self.tx_intr_enable && !self.tx_raised && self.port.is_writeable() {
            self.tx_raised = true;
            intr.interrupt(intr::SERIAL_TX);
        }
    }

    fn addrs(&self) -> &[u8] {
        Self::ADDRS
    }

    fn input(&mut self, _: &mut Mmu, addr: u8) -> u16 {
        match addr {
            Self::DATA => self.data_read(),
            Self::CONTROL => self.status_read(),
            _ => panic!("Serial doesn't handle address {addr:#04x}"),
        }
    }

    fn output(&mut self, _: &mut Mmu, addr: u8, val: u16) {
        match addr {
            Self::DATA => self.data_write(val),
            Self::CONTROL => self.control_write(val),
            _ => panic!("Serial doesn't handle address {addr:#04x}"),
        }
    }
}
