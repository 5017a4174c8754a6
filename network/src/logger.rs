//! Serial logger for pre-OS execution.
//!
//! Minimal, no-allocation `log` backend writing to COM1 (0x3F8). Firmware
//! that already has a logger installed should keep it; the driver only
//! talks to the `log` facade.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Serial port base address (COM1).
const SERIAL_PORT: u16 = 0x3F8;

/// Transmit-ready polls before a byte is dropped.
const TX_READY_RETRIES: u32 = 100;

/// Write a single byte to COM1.
#[cfg(target_arch = "x86_64")]
#[inline]
pub fn write_byte(byte: u8) {
    unsafe {
        // Wait for transmit holding register empty (bounded)
        let mut retries = 0u32;
        loop {
            let status: u8;
            core::arch::asm!(
                "in al, dx",
                in("dx") SERIAL_PORT + 5,
                out("al") status,
                options(nomem, nostack, preserves_flags)
            );
            if status & 0x20 != 0 {
                break;
            }
            retries += 1;
            if retries > TX_READY_RETRIES {
                return; // Port not responding
            }
            core::hint::spin_loop();
        }
        core::arch::asm!(
            "out dx, al",
            in("dx") SERIAL_PORT,
            in("al") byte,
            options(nomem, nostack, preserves_flags)
        );
    }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
pub fn write_byte(_byte: u8) {}

/// `fmt::Write` over COM1, translating `\n` to `\r\n`.
struct SerialWriter;

impl Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                write_byte(b'\r');
            }
            write_byte(byte);
        }
        Ok(())
    }
}

/// `log` backend over COM1.
pub struct SerialLogger {
    /// Keeps lines from interleaving.
    lock: Mutex<()>,
}

impl SerialLogger {
    /// A logger with nothing written yet.
    pub const fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }
}

impl Default for SerialLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

impl Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _guard = self.lock.lock();
        // Serial output cannot fail in a way worth reporting.
        let _ = writeln!(SerialWriter, "[{}] {}", level_tag(record.level()), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: SerialLogger = SerialLogger::new();

/// Install the serial logger as the global `log` backend.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
