//! # Log sink
//!
//! A minimal `log::Log` implementation so kernel code can emit structured
//! diagnostics outside the dispatcher (spec.md §7: "the core never logs
//! from inside the dispatcher"). There is no blocking transport available
//! from `no_std` without a HAL-specific UART, so records are captured into
//! a small static ring buffer that a debugger or a later UART drain can
//! read back; this mirrors the capture-then-drain approach
//! `doublegate-VeridianOS`'s early-boot VGA fallback takes before a real
//! logging backend is online.

use log::{Level, Log, Metadata, Record};

use crate::sync::critical_section;

const RING_LEN: usize = 8;
const MSG_LEN: usize = 64;

struct LogRing {
    messages: [[u8; MSG_LEN]; RING_LEN],
    lens: [usize; RING_LEN],
    next: usize,
    count: usize,
}

impl LogRing {
    const fn new() -> Self {
        Self {
            messages: [[0; MSG_LEN]; RING_LEN],
            lens: [0; RING_LEN],
            next: 0,
            count: 0,
        }
    }

    fn push(&mut self, level: Level, target: &str, args: core::fmt::Arguments<'_>) {
        use core::fmt::Write;

        struct Cursor<'a> {
            buf: &'a mut [u8],
            len: usize,
        }
        impl<'a> Write for Cursor<'a> {
            fn write_str(&mut self, s: &str) -> core::fmt::Result {
                let remaining = self.buf.len() - self.len;
                let n = s.len().min(remaining);
                self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
                self.len += n;
                Ok(())
            }
        }

        let slot = self.next;
        let mut cursor = Cursor {
            buf: &mut self.messages[slot],
            len: 0,
        };
        let _ = write!(cursor, "[{level}] {target}: {args}");
        self.lens[slot] = cursor.len;
        self.next = (self.next + 1) % RING_LEN;
        self.count = (self.count + 1).min(RING_LEN);
    }
}

static mut RING: LogRing = LogRing::new();

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        critical_section(|_| unsafe {
            #[allow(static_mut_refs)]
            RING.push(record.level(), record.target(), *record.args());
        });
    }

    fn flush(&self) {}
}

/// Install the kernel log sink. Idempotent; call once during init.
pub fn init() {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Trace);
}

/// Most recent captured record, newest-last, as `(level-tagged message)`
/// strings. Exposed for tests and debugger inspection.
pub fn last_message() -> Option<&'static str> {
    critical_section(|_| unsafe {
        #[allow(static_mut_refs)]
        if RING.count == 0 {
            None
        } else {
            let slot = (RING.next + RING_LEN - 1) % RING_LEN;
            core::str::from_utf8(&RING.messages[slot][..RING.lens[slot]]).ok()
        }
    })
}
