pub const WORD_SIZE: u16 = 2; // Bytes

pub const MEM_SIZE: usize = 0x1_0000;
pub const MEM_HIGH: u16 = 0xffff;

// Boot ROM window, mapped while the IPL overlay is active.
pub const IPL_START: u16 = 0xe000;
pub const IPL_SIZE: usize = MEM_SIZE - IPL_START as usize;

// One handler address per interrupt number.
pub const VECTOR_BASE: u16 = 0xffe0;
pub const NUM_INTERRUPTS: usize = 16;

pub const IO_SPACE_SIZE: usize = 0x100;

// TLB extension
pub const PAGE_BITS: u16 = 8;
pub const PAGE_SIZE: usize = 1 << PAGE_BITS;
pub const TLB_ENTRIES: usize = 8;

pub const SECTOR_SIZE: usize = 512;

/// Interrupt and exception numbers. Exceptions occupy the top of the range.
pub mod intr {
    pub const TIMER0: u8 = 0;
    pub const TIMER1: u8 = 1;
    pub const SERIAL_RX: u8 = 2;
    pub const SERIAL_TX: u8 = 3;
    pub const STORAGE: u8 = 6;

    pub const EXCEPTION_START: u8 = 10;

    pub const TLB_MISS: u8 = 10;
    pub const MEM_VIOLATION: u8 = 11;
    pub const ZERO_DIV: u8 = 12;
    pub const PRIV_VIOLATION: u8 = 13;
    pub const UNDEF_OP: u8 = 14;
    pub const SVC: u8 = 15;
}
