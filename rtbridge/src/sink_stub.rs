//! Reference `SinkSdk`: a local stand-in for the proprietary wire
//! transport, which is an external collaborator out of this repo's
//! scope. Deployments link a real implementation of the trait and pass
//! it to [`rtbridge_sink::SinkController::new`] in place of this one;
//! nothing else in the wiring changes.
//!
//! This stand-in accepts any target, advertises a generous capability
//! set so the controller's PCM/DSD probing always succeeds, and pulls
//! the registered stream callback on its own clock rather than driving
//! real hardware.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rtbridge_sink::{
    BitOrder, CapabilitySet, DsdEncodingCap, Endianness, FormatId, Result, SinkSdk, SinkTarget,
    StreamCallback, ThreadMode, TransferMode,
};

const TICK_BUFFER_BYTES: usize = 4096;

pub struct LocalSink {
    callback: Mutex<Option<StreamCallback>>,
    cycle_time_us: AtomicU32,
    online: AtomicBool,
}

impl LocalSink {
    pub fn new() -> Self {
        Self {
            callback: Mutex::new(None),
            cycle_time_us: AtomicU32::new(1000),
            online: AtomicBool::new(true),
        }
    }
}

impl Default for LocalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkSdk for LocalSink {
    fn discover(&self) -> Result<Vec<SinkTarget>> {
        Ok(vec![SinkTarget { name: "local".into(), id: 0, address: "local://0".into() }])
    }

    fn measure_mtu(&self, _target: &SinkTarget) -> Result<u32> {
        Ok(1500)
    }

    fn open(&self, _thread_mode: ThreadMode, cycle_time_us: u32, _name: &str, _id: u64, _ms_mode: bool) -> Result<()> {
        self.cycle_time_us.store(cycle_time_us.max(1), Ordering::Relaxed);
        Ok(())
    }

    fn set_sink(&self, _target: &SinkTarget, cycle_time_us: u32, _mtu: u32) -> Result<()> {
        self.cycle_time_us.store(cycle_time_us.max(1), Ordering::Relaxed);
        Ok(())
    }

    fn inquire_support(&self, _target: &SinkTarget) -> Result<CapabilitySet> {
        Ok(CapabilitySet {
            pcm_bit_depths: vec![32, 24, 16],
            dsd_encodings: vec![
                DsdEncodingCap { bit_order: BitOrder::Lsb, endianness: Endianness::Little },
                DsdEncodingCap { bit_order: BitOrder::Msb, endianness: Endianness::Big },
            ],
            max_channels: 8,
        })
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
        Ok(())
    }

    fn connect_wait(&self, _timeout: Duration) -> Result<bool> {
        Ok(self.online.load(Ordering::Relaxed))
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
        self.online.load(Ordering::Relaxed)
    }

    fn set_stream_callback(&self, callback: StreamCallback) {
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn run_worker(&self, stop: Arc<AtomicBool>) {
        let period = Duration::from_micros(self.cycle_time_us.load(Ordering::Relaxed) as u64);
        let mut buf = vec![0u8; TICK_BUFFER_BYTES];
        while !stop.load(Ordering::Acquire) {
            if let Some(cb) = self.callback.lock().unwrap().as_ref() {
                cb(&mut buf);
            }
            std::thread::sleep(period);
        }
    }
}
