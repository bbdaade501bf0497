//! Process-wide `tracing` subscriber installation and the log-drain
//! thread that forwards the hot-path async log ring (C6) to it.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;

use rtbridge_core::logring::{self, LogDrain, LogProducer};
use tracing_subscriber::EnvFilter;

/// Installs the process-wide subscriber. `filter` overrides `RUST_LOG`
/// when given; otherwise falls back to `RUST_LOG`, then `info`.
pub fn init_subscriber(filter: Option<&str>) {
    let env_filter = match filter {
        Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

/// Owns the log-drain thread's lifetime; dropping/joining stops it.
pub struct LogDrainHandle {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LogDrainHandle {
    pub fn join(mut self) {
        self.stop.store(true, std::sync::atomic::Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Spawns the dedicated drain thread (the fourth long-lived thread,
/// alongside producer/consumer/worker) and returns the producer-side
/// handle hot-path code logs through plus a handle to stop the thread.
pub fn spawn_drain() -> (LogProducer, LogDrainHandle) {
    let (producer, drain) = logring::log_channel();
    let stop = Arc::new(AtomicBool::new(false));
    let drain_stop = stop.clone();
    let handle = std::thread::Builder::new()
        .name("rtbridge-log-drain".into())
        .spawn(move || run_drain(drain, &drain_stop))
        .expect("failed to spawn log-drain thread");
    (producer, LogDrainHandle { stop, handle: Some(handle) })
}

fn run_drain(drain: LogDrain, stop: &AtomicBool) {
    drain.run(stop);
    let dropped = drain.dropped_count();
    if dropped > 0 {
        tracing::warn!(dropped, "log ring dropped records under backpressure");
    }
}
