use common::constants::intr;

use thiserror::Error;

// Architectural exceptions. These never leave the emulator; they're turned into
// interrupt requests and handled by guest code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("TLB miss at {addr:#06x}")]
    TlbMiss { addr: u16 },

    #[error("Memory protection violation at {addr:#06x}")]
    MemViolation { addr: u16 },

    #[error("Privileged instruction in user mode")]
    PrivViolation,

    #[error("Undefined instruction {word:#06x}")]
    UndefinedOp { word: u16 },

    #[error("Supervisor call")]
    Svc,
}

impl Fault {
    pub fn number(&self) -> u8 {
        match self {
            Fault::TlbMiss{..} => intr::TLB_MISS,
            Fault::MemViolation{..} => intr::MEM_VIOLATION,
            Fault::PrivViolation => intr::PRIV_VIOLATION,
            Fault::UndefinedOp{..} => intr::UNDEF_OP,
            Fault::Svc => intr::SVC,
        }
    }

    // Memory faults abort the instruction so the handler can fix up the TLB and
    // run it again.
    pub fn is_restartable(&self) -> bool {
        matches!(self, Fault::TlbMiss{..} | Fault::MemViolation{..})
    }
}

// Host-side failures.
#[derive(Debug, Error)]
pub enum EmuError {
    #[error("Image of {len} bytes at {start:#06x} doesn't fit in memory")]
    ImageTooLarge { start: u16, len: usize },

    #[error("Disk image I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("Disk image size {0} is not a multiple of the sector size")]
    DiskImageSize(u64),

    #[error("Sector {0} is past the end of the disk")]
    SectorOutOfRange(u32),
}
