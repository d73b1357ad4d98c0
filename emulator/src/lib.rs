pub mod alu;
pub mod emulator;
pub mod emulator_state;
pub mod error;
pub mod intr;
pub mod io;
pub mod ipl;
pub mod mmu;

pub use emulator::{Emulator, ExecRet, StopHandle, Suspend, Until};
pub use emulator_state::{EmulatorState, Psw};
pub use error::{EmuError, Fault};
pub use io::IoDevice;
