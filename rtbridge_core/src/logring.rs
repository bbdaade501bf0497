//! Bounded async log ring for the producer and consumer hot paths.
//!
//! Hot-path code formats a short message into a stack-allocated
//! [`InlineMsg`] and pushes a [`LogRecord`] onto the ring; a separate
//! drain thread pops records and forwards them to `tracing`. The ring
//! never blocks and never allocates: when full, records are dropped
//! and counted, never leaving the hot path waiting on the drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::spsc;

const DEFAULT_CAPACITY: usize = 1024;
const MSG_CAPACITY: usize = 120;

/// Severity carried by a hot-path log record, mapped 1:1 to `tracing`
/// levels at drain time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Fixed-capacity, stack-resident message buffer: no heap allocation
/// on the hot path. Longer messages are truncated at push time.
#[derive(Clone, Copy)]
pub struct InlineMsg {
    bytes: [u8; MSG_CAPACITY],
    len: u8,
}

impl InlineMsg {
    pub fn from_str(s: &str) -> Self {
        let mut bytes = [0u8; MSG_CAPACITY];
        let n = s.len().min(MSG_CAPACITY);
        bytes[..n].copy_from_slice(&s.as_bytes()[..n]);
        Self { bytes, len: n as u8 }
    }

    pub fn as_str(&self) -> &str {
        let slice = &self.bytes[..self.len as usize];
        // SAFETY: only ever constructed from a valid &str, truncated on
        // a byte boundary is not guaranteed for multi-byte UTF-8, so
        // fall back to lossy conversion rather than risk a panic.
        std::str::from_utf8(slice).unwrap_or("<invalid utf8 log message>")
    }
}

/// A single hot-path log event: a monotonic timestamp (caller-supplied,
/// since the ring itself never calls a clock), a severity, and an
/// inline message.
#[derive(Clone, Copy)]
pub struct LogRecord {
    pub timestamp_ns: u64,
    pub level: LogLevel,
    pub message: InlineMsg,
}

impl LogRecord {
    /// Forwards this record to the ambient `tracing` subscriber.
    pub fn emit(&self) {
        let msg = self.message.as_str();
        match self.level {
            LogLevel::Debug => tracing::debug!(timestamp_ns = self.timestamp_ns, "{}", msg),
            LogLevel::Info => tracing::info!(timestamp_ns = self.timestamp_ns, "{}", msg),
            LogLevel::Warn => tracing::warn!(timestamp_ns = self.timestamp_ns, "{}", msg),
            LogLevel::Error => tracing::error!(timestamp_ns = self.timestamp_ns, "{}", msg),
        }
    }
}

/// Hot-path handle: formats and pushes, never blocks. Cloneable so both
/// the producer thread (`send_audio`) and the consumer callback
/// (`fill_tick`) can each hold one; the underlying sender is one per
/// channel, so concurrent callers serialize through a `try_lock` that
/// drops (and counts) the record rather than ever blocking.
#[derive(Clone)]
pub struct LogProducer {
    tx: Arc<Mutex<spsc::Sender<LogRecord>>>,
    dropped: Arc<AtomicU64>,
}

impl LogProducer {
    #[inline]
    pub fn log(&self, timestamp_ns: u64, level: LogLevel, message: &str) {
        let record = LogRecord {
            timestamp_ns,
            level,
            message: InlineMsg::from_str(message),
        };
        let sent = matches!(self.tx.try_lock(), Ok(tx) if tx.try_send(record).is_ok());
        if !sent {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of records dropped so far because the ring was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drain-side handle, owned by the dedicated log-drain thread.
pub struct LogDrain {
    rx: spsc::Receiver<LogRecord>,
    dropped: Arc<AtomicU64>,
}

impl LogDrain {
    /// Pops and forwards a single record, if any is pending.
    pub fn drain_one(&self) -> bool {
        match self.rx.try_recv() {
            Some(record) => {
                record.emit();
                true
            }
            None => false,
        }
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Runs the drain loop until `stop` is observed, polling at a short
    /// interval when the ring is empty. Intended to be the sole body of
    /// the log-drain thread.
    pub fn run(&self, stop: &std::sync::atomic::AtomicBool) {
        while !stop.load(Ordering::Acquire) {
            if !self.drain_one() {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        // Drain whatever remains before the thread exits.
        while self.drain_one() {}
    }
}

/// Creates a bounded log channel with the default 1024-record capacity.
pub fn log_channel() -> (LogProducer, LogDrain) {
    log_channel_with_capacity(DEFAULT_CAPACITY)
}

pub fn log_channel_with_capacity(capacity: usize) -> (LogProducer, LogDrain) {
    let (tx, rx) = spsc::channel(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        LogProducer { tx: Arc::new(Mutex::new(tx)), dropped: dropped.clone() },
        LogDrain { rx, dropped },
    )
}
