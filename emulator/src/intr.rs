use common::constants::{intr, NUM_INTERRUPTS};

use log::trace;

// One pending bit per interrupt number. Raising an already pending number is a
// no-op: requests aren't counted.
#[derive(Debug, Clone, Default)]
pub struct IntrController {
    pending: [bool; NUM_INTERRUPTS],
}

impl IntrController {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn reset(&mut self) {
        self.pending = [false; NUM_INTERRUPTS];
    }

    pub fn interrupt(&mut self, num: u8) {
        assert!((num as usize) < NUM_INTERRUPTS, "Interrupt number {num} out of range");
        trace!("Intr: request {num}");
        self.pending[num as usize] = true;
    }

    pub fn is_pending(&self, num: u8) -> bool {
        self.pending[num as usize]
    }

    // Take the highest priority request: exceptions first, then ordinary
    // interrupts, lowest number first within each class.
    pub fn check_intr_num(&mut self) -> Option<u8> {
        let exceptions = intr::EXCEPTION_START..NUM_INTERRUPTS as u8;
        let interrupts = 0..intr::EXCEPTION_START;
        let num = exceptions.chain(interrupts).find(|&n| self.pending[n as usize])?;
        self.pending[num as usize] = false;
        Some(num)
    }

    pub fn is_occurred_exception(&self) -> bool {
        self.pending[intr::EXCEPTION_START as usize..].iter().any(|&p| p)
    }
}
