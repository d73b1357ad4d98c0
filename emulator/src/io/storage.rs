use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use common::constants::{intr, SECTOR_SIZE};

use crate::error::EmuError;
use crate::intr::IntrController;
use crate::io::IoDevice;
use crate::mmu::Mmu;

use log::{debug, error};

pub type Sector = [u8; SECTOR_SIZE];

// Backing store for the storage controller, addressed in 512-byte sectors.
pub trait SectorStore: Send {
    fn num_sectors(&self) -> u32;
    fn read_sector(&mut self, idx: u32) -> Result<Sector, EmuError>;
    fn write_sector(&mut self, idx: u32, data: &Sector) -> Result<(), EmuError>;
}

////////////////////////////////////////////////////////////////////////////////

// A raw image file, read-write.
pub struct DiskImage {
    file: File,
    num_sectors: u32,
}

impl DiskImage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EmuError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len % SECTOR_SIZE as u64 != 0 {
            return Err(EmuError::DiskImageSize(len));
        }
        let num_sectors = u32::try_from(len / SECTOR_SIZE as u64)
            .map_err(|_| EmuError::DiskImageSize(len))?;
        Ok(DiskImage{file, num_sectors})
    }

    fn seek_to(&mut self, idx: u32) -> Result<(), EmuError> {
        if idx >= self.num_sectors {
            return Err(EmuError::SectorOutOfRange(idx));
        }
        self.file.seek(SeekFrom::Start(idx as u64 * SECTOR_SIZE as u64))?;
        Ok(())
    }
}

impl SectorStore for DiskImage {
    fn num_sectors(&self) -> u32 {
        self.num_sectors
    }

    fn read_sector(&mut self, idx: u32) -> Result<Sector, EmuError> {
        self.seek_to(idx)?;
        let mut buf = [0u8; SECTOR_SIZE];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_sector(&mut self, idx: u32, data: &Sector) -> Result<(), EmuError> {
        self.seek_to(idx)?;
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

// In-memory disk. Clones share contents, so a test can keep one to inspect.
#[derive(Clone)]
pub struct RamDisk {
    data: Arc<Mutex<Vec<u8>>>,
}

impl RamDisk {
    pub fn new(num_sectors: u32) -> Self {
        Self::from_bytes(vec![0; num_sectors as usize * SECTOR_SIZE])
    }

    // Pads to a whole number of sectors.
    pub fn from_bytes(mut data: Vec<u8>) -> Self {
        let len = data.len().div_ceil(SECTOR_SIZE) * SECTOR_SIZE;
        data.resize(len, 0);
        RamDisk{data: Arc::new(Mutex::new(data))}
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn range(len: usize, idx: u32) -> Result<std::ops::Range<usize>, EmuError> {
        let start = idx as usize * SECTOR_SIZE;
        if start + SECTOR_SIZE > len {
            return Err(EmuError::SectorOutOfRange(idx));
        }
        Ok(start..start + SECTOR_SIZE)
    }
}

impl SectorStore for RamDisk {
    fn num_sectors(&self) -> u32 {
        (self.data.lock().unwrap_or_else(PoisonError::into_inner).len() / SECTOR_SIZE) as u32
    }

    fn read_sector(&mut self, idx: u32) -> Result<Sector, EmuError> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let range = Self::range(data.len(), idx)?;
        let mut buf = [0u8; SECTOR_SIZE];
        buf.copy_from_slice(&data[range]);
        Ok(buf)
    }

    fn write_sector(&mut self, idx: u32, sector: &Sector) -> Result<(), EmuError> {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let range = Self::range(data.len(), idx)?;
        data[range].copy_from_slice(sector);
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////

// Storage controller. Transfers complete immediately; the completion interrupt
// is delivered on the following tick.
pub struct Storage {
    store: Box<dyn SectorStore>,
    intr_enable: bool,
    error: bool,
    buffer: u16,
    sector_high: u16,
    sector_low: u16,
    done: bool,
}

impl Storage {
    pub const CONTROL: u8 = 0x10;
    pub const BUFFER: u8 = 0x12;
    pub const SECTOR_HIGH: u8 = 0x14;
    pub const SECTOR_LOW: u8 = 0x16;
    const ADDRS: &[u8] = &[Self::CONTROL, Self::BUFFER, Self::SECTOR_HIGH, Self::SECTOR_LOW];

    pub const STATUS_IDLE: u16 = 0x80;
    pub const STATUS_ERROR: u16 = 0x01;

    pub const CMD_INT_ENB: u16 = 0x80;
    pub const CMD_INIT: u16 = 0x04;
    pub const CMD_READ: u16 = 0x02;
    pub const CMD_WRITE: u16 = 0x01;

    pub fn new(store: Box<dyn SectorStore>) -> Self {
        Storage {
            store,
            intr_enable: false,
            error: false,
            buffer: 0,
            sector_high: 0,
            sector_low: 0,
            done: false,
        }
    }

    fn sector(&self) -> u32 {
        ((self.sector_high as u32) << u16::BITS) | self.sector_low as u32
    }

    fn status_read(&self) -> u16 {
        let mut val = Self::STATUS_IDLE;
        if self.error {
            val |= Self::STATUS_ERROR;
        }
        val
    }

    fn control_write(&mut self, mmu: &mut Mmu, val: u16) {
        self.intr_enable = val & Self::CMD_INT_ENB != 0;

        let res = if val & Self::CMD_INIT != 0 {
            self.error = false;
            Ok(())
        } else if val & Self::CMD_READ != 0 {
            self.read(mmu)
        } else if val & Self::CMD_WRITE != 0 {
            self.write(mmu)
        } else {
            return;
        };

        if let Err(err) = res {
            error!("Storage: sector {}: {err}", self.sector());
            self.error = true;
        }
        self.done = true;
    }

    // DMA goes to physical memory, wrapping at the top like the CPU's
    // address arithmetic.
    fn read(&mut self, mmu: &mut Mmu) -> Result<(), EmuError> {
        let sector = self.sector();
        let data = self.store.read_sector(sector)?;
        debug!("Storage: read sector {sector} into {:#06x}", self.buffer);
        for (off, byte) in data.iter().enumerate() {
            mmu.write8(self.buffer.wrapping_add(off as u16), *byte);
        }
        self.error = false;
        Ok(())
    }

    fn write(&mut self, mmu: &mut Mmu) -> Result<(), EmuError> {
        let sector = self.sector();
        let mut data = [0u8; SECTOR_SIZE];
        for (off, byte) in data.iter_mut().enumerate() {
            *byte = mmu.read8(self.buffer.wrapping_add(off as u16));
        }
        debug!("Storage: write sector {sector} from {:#06x}", self.buffer);
        self.store.write_sector(sector, &data)?;
        self.error = false;
        Ok(())
    }
}

impl IoDevice for Storage {
    fn reset(&mut self) {
        self.intr_enable = false;
        self.error = false;
        self.buffer = 0;
        self.sector_high = 0;
        self.sector_low = 0;
        self.done = false;
    }

    fn tick(&mut self, _: &mut Mmu, intr: &mut IntrController) {
        if self.done {
            self.done = false;
            if self.intr_enable {
                intr.interrupt(intr::STORAGE);
            }
        }
    }

    fn addrs(&self) -> &[u8] {
        Self::ADDRS
    }

    fn input(&mut self, _: &mut Mmu, addr: u8) -> u16 {
        match addr {
            Self::CONTROL => self.status_read(),
            Self::BUFFER => self.buffer,
            Self::SECTOR_HIGH => self.sector_high,
            Self::SECTOR_LOW => self.sector_low,
            _ => panic!("Storage doesn't handle address {addr:#04x}"),
        }
    }

    fn output(&mut self, mmu: &mut Mmu, addr: u8, val: u16) {
        match addr {
            Self::CONTROL => self.control_write(mmu, val),
            Self::BUFFER => self.buffer = val,
            Self::SECTOR_HIGH => self.sector_high = val,
            Self::SECTOR_LOW => self.sector_low = val,
            _ => panic!("Storage doesn't handle address {addr:#04x}"),
        }
    }
}
