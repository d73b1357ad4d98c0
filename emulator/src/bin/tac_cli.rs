use emu_lib::{EmuError, Emulator, Suspend, Until};
use emu_lib::io::console::PanelState;
use emu_lib::io::serial::SerialPort;
use emu_lib::io::storage::DiskImage;
use common::asm::Reg;

use std::collections::VecDeque;
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use crossterm::tty::IsTty;
use log::error;


/// TaC Emulator
#[derive(Parser)]
struct Args {
    /// Disk image to boot from
    disk: PathBuf,

    /// Value of the boot mode register
    #[arg(long, default_value_t = 0)]
    boot_mode: u16,

    /// Milliseconds to run between terminal polls
    #[arg(long, default_value_t = 10)]
    slice_ms: u64,

    /// Stop before executing the instruction at this address
    #[arg(long, value_parser = parse_addr)]
    break_at: Option<u16>,

    /// Give up after this many slices
    #[arg(long)]
    max_slices: Option<u64>,
}

fn parse_addr(s: &str) -> Result<u16, std::num::ParseIntError> {
    match s.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    }
}

////////////////////////////////////////////////////////////////////////////////

// Serial line on the controlling terminal. Key presses are queued by pump()
// between slices.
#[derive(Default)]
struct StdioSerial {
    input: Mutex<VecDeque<u8>>,
}

impl StdioSerial {
    // Returns false when the user asked to quit (Ctrl-C).
    fn pump(&self) -> std::io::Result<bool> {
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                return Ok(false);
            }
            let byte = match key.code {
                KeyCode::Char(c) if c.is_ascii() => c as u8,
                KeyCode::Enter => b'\r',
                KeyCode::Tab => b'\t',
                KeyCode::Backspace => 0x08,
                KeyCode::Esc => 0x1b,
                _ => continue,
            };
            self.input.lock().unwrap_or_else(PoisonError::into_inner).push_back(byte);
        }
        Ok(true)
    }
}

impl SerialPort for StdioSerial {
    fn send(&self, val: u8) {
        let mut out = stdout().lock();
        if let Err(err) = out.write_all(&[val]).and_then(|_| out.flush()) {
            error!("Serial: stdout: {err}");
        }
    }

    fn receive(&self) -> u8 {
        self.input.lock().unwrap_or_else(PoisonError::into_inner).pop_front().unwrap_or(0)
    }

    fn is_writeable(&self) -> bool {
        true
    }

    fn is_readable(&self) -> bool {
        !self.input.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

struct RawMode;

impl RawMode {
    fn enable() -> std::io::Result<RawMode> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_raw_mode() {
            error!("Couldn't restore terminal: {err}");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

fn run(args: &Args) -> Result<(Emulator, Suspend), EmuError> {
    let disk = DiskImage::open(&args.disk)?;
    let serial = Arc::new(StdioSerial::default());
    let panel = Arc::new(PanelState::new());
    let mut emu = Emulator::with_standard_devices(serial.clone(), Box::new(disk), panel, args.boot_mode);

    let mut until = Until::budget(Duration::from_millis(args.slice_ms));
    if let Some(addr) = args.break_at {
        until = until.with_break_at(addr);
    }

    let interactive = stdin().is_tty();
    let _raw = if interactive { Some(RawMode::enable()?) } else { None };

    let mut slices = 0u64;
    let reason = loop {
        if interactive && !serial.pump()? {
            break Suspend::Stopped;
        }
        match emu.resume(until) {
            Suspend::Yielded => (),
            other => break other,
        }
        slices += 1;
        if args.max_slices.is_some_and(|max| slices >= max) {
            break Suspend::Yielded;
        }
    };
    Ok((emu, reason))
}

fn dump(emu: &Emulator, reason: Suspend) {
    println!();
    println!("{reason:?} after {} instructions", emu.num_ins());
    println!("pc   {:#06x}  flags {:#04x}", emu.pc(), emu.get_flags());
    for idx in 0..Reg::FLAG as u16 {
        let reg = Reg::from_nibble(idx);
        print!("{:<4} {:#06x}", reg.to_string(), emu.reg_read(reg));
        if idx % 4 == 3 { println!() } else { print!("  ") }
    }
    println!();
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();

    match run(&args) {
        Ok((emu, reason)) => {
            dump(&emu, reason);
            ExitCode::SUCCESS
        },
        Err(err) => {
            eprintln!("tac_cli: {err}");
            ExitCode::FAILURE
        },
    }
}
