//! In-memory `SinkSdk` test double shared across the integration tests
//! in this crate, in the style of `rtbridge_sink`'s own `NullSink`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rtbridge_sink::{CapabilitySet, FormatId, Result, SinkSdk, SinkTarget, StreamCallback, ThreadMode, TransferMode};

pub struct NullSinkState {
    callback: Mutex<Option<StreamCallback>>,
    capabilities: CapabilitySet,
    open_count: AtomicUsize,
    connect_count: AtomicUsize,
    online: AtomicBool,
}

impl NullSinkState {
    pub fn new(capabilities: CapabilitySet) -> Arc<Self> {
        Arc::new(Self {
            callback: Mutex::new(None),
            capabilities,
            open_count: AtomicUsize::new(0),
            connect_count: AtomicUsize::new(0),
            online: AtomicBool::new(true),
        })
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }

    /// Counts `SinkController::open` invocations (each one calls
    /// `connect` exactly once), independent of the one-time `enable()`.
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Drives one consumer cycle tick directly, standing in for the
    /// SDK's internal worker loop.
    pub fn tick(&self, buf: &mut [u8]) {
        if let Some(cb) = self.callback.lock().unwrap().as_ref() {
            cb(buf);
        }
    }
}

pub struct NullSink(pub Arc<NullSinkState>);

impl SinkSdk for NullSink {
    fn discover(&self) -> Result<Vec<SinkTarget>> {
        Ok(vec![SinkTarget { name: "null".into(), id: 1, address: "null://0".into() }])
    }
    fn measure_mtu(&self, _target: &SinkTarget) -> Result<u32> {
        Ok(1500)
    }
    fn open(&self, _thread_mode: ThreadMode, _cycle_time_us: u32, _name: &str, _id: u64, _ms_mode: bool) -> Result<()> {
        self.0.open_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
    fn set_sink(&self, _target: &SinkTarget, _cycle_time_us: u32, _mtu: u32) -> Result<()> {
        Ok(())
    }
    fn inquire_support(&self, _target: &SinkTarget) -> Result<CapabilitySet> {
        Ok(self.0.capabilities.clone())
    }
    fn check_sink_support(&self, _format_id: FormatId) -> bool {
        true
    }
    fn set_sink_configure(&self, _format_id: FormatId) -> Result<()> {
        Ok(())
    }
    fn config_transfer(&self, _mode: TransferMode) -> Result<()> {
        Ok(())
    }
    fn connect_prepare(&self) -> Result<()> {
        Ok(())
    }
    fn connect(&self) -> Result<()> {
        self.0.connect_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
    fn connect_wait(&self, _timeout: Duration) -> Result<bool> {
        Ok(self.0.online.load(Ordering::Relaxed))
    }
    fn disconnect(&self, _immediate: bool) -> Result<()> {
        Ok(())
    }
    fn play(&self) -> Result<()> {
        Ok(())
    }
    fn stop(&self) -> Result<()> {
        Ok(())
    }
    fn is_online(&self) -> bool {
        self.0.online.load(Ordering::Relaxed)
    }
    fn set_stream_callback(&self, callback: StreamCallback) {
        *self.0.callback.lock().unwrap() = Some(callback);
    }
    fn run_worker(&self, _stop: Arc<AtomicBool>) {
        // Tests drive ticks directly via `NullSinkState::tick`.
    }
}
