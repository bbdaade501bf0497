//! Sink-side state machine (C4): owns the ring, the SDK handle, and the
//! lifetime of the downstream connection.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rtbridge_core::logring::{self, LogLevel, LogProducer};
use rtbridge_core::{AudioFormat, DsdConversionMode, RingBuffer, S24Align};

use crate::config::SinkConfig;
use crate::error::{Result, SinkError};
use crate::sdk::{BitOrder, CapabilitySet, Endianness, FormatId, SinkSdk, SinkTarget, ThreadMode, TransferMode};
use crate::transition::{self, TransitionKind};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_RING_CAPACITY: usize = 1 << 20;

const DSD_PROBE_ORDER: [(BitOrder, Endianness); 4] = [
    (BitOrder::Lsb, Endianness::Big),
    (BitOrder::Msb, Endianness::Big),
    (BitOrder::Lsb, Endianness::Little),
    (BitOrder::Msb, Endianness::Little),
];
const DSD_PROBE_DEFAULT: (BitOrder, Endianness) = (BitOrder::Lsb, Endianness::Little);
const PCM_PROBE_ORDER: [u8; 3] = [32, 24, 16];

/// State shared with the registered stream callback, kept separate
/// from `SinkController` so the callback closure doesn't need to hold
/// an `Arc<SinkController>` back-reference.
struct CallbackState {
    ring: Arc<RingBuffer>,
    reconfiguring: AtomicBool,
    ring_users: AtomicUsize,
    stop_requested: AtomicBool,
    bytes_per_buffer: AtomicUsize,
    cycle_time_us: AtomicU32,
    frame_bytes: AtomicUsize,
    remainder_per_tick: AtomicU32,
    remainder_accumulator: AtomicU32,
    shutdown_silence_remaining: AtomicUsize,
    stabilization_remaining: AtomicUsize,
    prefill_target_bytes: AtomicUsize,
    prefilled: AtomicBool,
    underrun_count: AtomicU64,
    flow: Arc<(Mutex<()>, Condvar)>,
    log: LogProducer,
}

fn monotonic_ns() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0)
}

fn ring_guard_enter(state: &CallbackState) -> bool {
    if state.reconfiguring.load(Ordering::Acquire) {
        return false;
    }
    state.ring_users.fetch_add(1, Ordering::AcqRel);
    if state.reconfiguring.load(Ordering::Acquire) {
        state.ring_users.fetch_sub(1, Ordering::AcqRel);
        return false;
    }
    true
}

fn ring_guard_exit(state: &CallbackState) {
    state.ring_users.fetch_sub(1, Ordering::AcqRel);
}

/// One cycle tick: fills `buf` per the consumer callback contract in
/// spec.md §4.4. Must be wait-free and bounded in time.
fn fill_tick(buf: &mut [u8], state: &CallbackState) {
    let r = state.remainder_per_tick.load(Ordering::Relaxed);
    let mut want = state.bytes_per_buffer.load(Ordering::Relaxed);
    if r > 0 {
        let prev = state.remainder_accumulator.fetch_add(r, Ordering::Relaxed);
        if prev + r >= 1000 {
            state.remainder_accumulator.fetch_sub(1000, Ordering::Relaxed);
            want += state.frame_bytes.load(Ordering::Relaxed);
        }
    }
    let want = want.min(buf.len());

    if state.shutdown_silence_remaining.load(Ordering::Relaxed) > 0 {
        state.shutdown_silence_remaining.fetch_sub(1, Ordering::Relaxed);
        buf[..want].fill(0);
        return;
    }
    if state.stop_requested.load(Ordering::Acquire) {
        buf[..want].fill(0);
        return;
    }
    if !state.prefilled.load(Ordering::Relaxed) {
        if state.ring.available() >= state.prefill_target_bytes.load(Ordering::Relaxed) {
            state.prefilled.store(true, Ordering::Relaxed);
        } else {
            buf[..want].fill(0);
            return;
        }
    }
    if state.stabilization_remaining.load(Ordering::Relaxed) > 0 {
        state.stabilization_remaining.fetch_sub(1, Ordering::Relaxed);
        buf[..want].fill(0);
        return;
    }

    if !ring_guard_enter(state) {
        buf[..want].fill(0);
        return;
    }
    if state.ring.available() < want {
        state.underrun_count.fetch_add(1, Ordering::Relaxed);
        state.log.log(monotonic_ns(), LogLevel::Warn, "ring underrun in consumer callback");
        buf[..want].fill(0);
    } else {
        state.ring.pop(buf, want);
        if let Ok(_guard) = state.flow.0.try_lock() {
            state.flow.1.notify_one();
        }
    }
    ring_guard_exit(state);
}

pub struct SinkController {
    sdk: Arc<dyn SinkSdk>,
    ring: Arc<RingBuffer>,
    config: Mutex<SinkConfig>,
    target: Mutex<Option<SinkTarget>>,
    mtu: AtomicU32,
    enabled: AtomicBool,
    open: AtomicBool,
    playing: AtomicBool,
    paused: AtomicBool,
    current_format: Mutex<Option<AudioFormat>>,
    input_bytes: AtomicU8,
    diretta_bytes: AtomicU8,
    dsd_channels: AtomicU8,
    dsd_conversion_mode: Mutex<Option<DsdConversionMode>>,
    cb: Arc<CallbackState>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    worker_stop: Arc<AtomicBool>,
}

impl SinkController {
    pub fn new(sdk: Box<dyn SinkSdk>, config: SinkConfig) -> Result<Self> {
        Self::with_ring_capacity(sdk, config, DEFAULT_RING_CAPACITY)
    }

    /// No caller-supplied log ring: hot-path events are pushed into a
    /// `LogProducer` whose drain side is never polled, so it fills and
    /// drops silently rather than panicking or blocking. Callers that
    /// want the events forwarded to `tracing` should use
    /// [`Self::with_ring_capacity_and_log`] with a drained channel.
    pub fn with_ring_capacity(sdk: Box<dyn SinkSdk>, config: SinkConfig, ring_capacity: usize) -> Result<Self> {
        let (log, _unforwarded_drain) = logring::log_channel();
        Self::with_ring_capacity_and_log(sdk, config, ring_capacity, log)
    }

    /// Like [`Self::with_ring_capacity`], but hot-path events (consumer
    /// underruns, producer drops) are logged through the given
    /// [`LogProducer`] instead of a throwaway one nobody drains.
    pub fn with_ring_capacity_and_log(
        sdk: Box<dyn SinkSdk>,
        config: SinkConfig,
        ring_capacity: usize,
        log: LogProducer,
    ) -> Result<Self> {
        let ring = Arc::new(RingBuffer::new(ring_capacity).map_err(|_| SinkError::SdkCallFailed)?);
        let cb = Arc::new(CallbackState {
            ring: ring.clone(),
            reconfiguring: AtomicBool::new(false),
            ring_users: AtomicUsize::new(0),
            stop_requested: AtomicBool::new(false),
            bytes_per_buffer: AtomicUsize::new(0),
            cycle_time_us: AtomicU32::new(1000),
            frame_bytes: AtomicUsize::new(0),
            remainder_per_tick: AtomicU32::new(0),
            remainder_accumulator: AtomicU32::new(0),
            shutdown_silence_remaining: AtomicUsize::new(0),
            stabilization_remaining: AtomicUsize::new(0),
            prefill_target_bytes: AtomicUsize::new(0),
            prefilled: AtomicBool::new(false),
            underrun_count: AtomicU64::new(0),
            flow: Arc::new((Mutex::new(()), Condvar::new())),
            log,
        });
        Ok(Self {
            sdk: Arc::from(sdk),
            ring,
            config: Mutex::new(config),
            target: Mutex::new(None),
            mtu: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
            open: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            current_format: Mutex::new(None),
            input_bytes: AtomicU8::new(0),
            diretta_bytes: AtomicU8::new(0),
            dsd_channels: AtomicU8::new(0),
            dsd_conversion_mode: Mutex::new(None),
            cb,
            worker_handle: Mutex::new(None),
            worker_stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire) && !self.paused.load(Ordering::Acquire)
    }

    pub fn underrun_count(&self) -> u64 {
        self.cb.underrun_count.load(Ordering::Relaxed)
    }

    /// Handle producers can wait on (bounded, per spec.md §5) when the
    /// ring is full.
    pub fn flow_handle(&self) -> Arc<(Mutex<()>, Condvar)> {
        self.cb.flow.clone()
    }

    /// Whether the consumer callback has observed enough buffered audio
    /// to leave the pre-play silence gate. Producers use this together
    /// with [`Self::ring_fill_ratio`] to decide when backpressure applies.
    pub fn is_prefilled(&self) -> bool {
        self.cb.prefilled.load(Ordering::Relaxed)
    }

    pub fn ring_fill_ratio(&self) -> f64 {
        self.ring.fill_ratio()
    }

    /// The number of bytes the consumer callback pops per cycle tick at
    /// the current format, for callers driving the SDK's tick loop.
    pub fn bytes_per_buffer(&self) -> usize {
        self.cb.bytes_per_buffer.load(Ordering::Relaxed)
    }

    /// The ring occupancy, in bytes, the callback waits for before
    /// leaving the pre-play silence gate.
    pub fn prefill_target_bytes(&self) -> usize {
        self.cb.prefill_target_bytes.load(Ordering::Relaxed)
    }

    pub fn set_s24_hint(&self, hint: S24Align) {
        self.ring.set_s24_hint(hint);
    }

    /// The MTU in effect after `enable()`: the configured override, or
    /// whatever the SDK measured (falling back to `mtu_fallback`).
    pub fn mtu(&self) -> u32 {
        self.mtu.load(Ordering::Relaxed)
    }

    /// Discovers a target, opens the SDK, and inquires its
    /// capabilities. Bounded retries (3 x ~500ms) around the SDK open.
    pub fn enable(&self) -> Result<()> {
        let targets = self.sdk.discover().map_err(|_| SinkError::DiscoveryFailed)?;
        let target = targets.into_iter().next().ok_or(SinkError::DiscoveryFailed)?;

        let (mtu_override, mtu_fallback) = {
            let config = self.config.lock().unwrap();
            (config.mtu, config.mtu_fallback)
        };
        let mtu = match mtu_override {
            Some(mtu) => mtu,
            None => self.sdk.measure_mtu(&target).unwrap_or(mtu_fallback),
        };

        let initial_cycle_us = self.config.lock().unwrap().cycle_time_us;
        let thread_mode = self.config.lock().unwrap().thread_mode.0;
        let mut opened = false;
        for attempt in 0..RETRY_ATTEMPTS {
            match self.sdk.open(thread_mode, initial_cycle_us, &target.name, target.id, false) {
                Ok(()) => {
                    opened = true;
                    break;
                }
                Err(_) if attempt + 1 < RETRY_ATTEMPTS => thread::sleep(RETRY_DELAY),
                Err(_) => {}
            }
        }
        if !opened {
            return Err(SinkError::TransportOpenFailed);
        }

        let capabilities = self.sdk.inquire_support(&target).unwrap_or_default();
        tracing::info!(
            target = %target.name,
            pcm_depths = ?capabilities.pcm_bit_depths,
            dsd_encodings = capabilities.dsd_encodings.len(),
            "sink enabled"
        );

        *self.target.lock().unwrap() = Some(target);
        self.mtu.store(mtu, Ordering::Relaxed);
        self.enabled.store(true, Ordering::Release);
        Ok(())
    }

    /// Signals pending waits, closes if open, shuts down the worker,
    /// and releases the SDK handle.
    pub fn disable(&self) {
        self.cb.stop_requested.store(true, Ordering::Release);
        if self.is_open() {
            self.close();
        }
        self.shutdown_worker();
        let _ = self.sdk.disconnect(true);
        self.enabled.store(false, Ordering::Release);
    }

    /// Classifies the transition from the current format to `format`
    /// and choreographs it: ring reset, SDK reconnect/reopen, prefill
    /// and stabilization arming.
    pub fn open(&self, format: AudioFormat) -> Result<()> {
        let previous = *self.current_format.lock().unwrap();
        let format_switch_delay_ms = self.config.lock().unwrap().format_switch_delay_ms;
        let transition = transition::classify(previous, format, format_switch_delay_ms);

        if transition.kind.requires_sdk_close() {
            self.shutdown_worker();
            let _ = self.sdk.disconnect(true);
            self.interruptible_sleep(Duration::from_millis(transition.delay_ms as u64));
        }

        if transition.kind.is_full_reset() {
            self.begin_reconfigure();
            let _ = self.ring.resize(self.ring.capacity(), 0);
            self.cb.prefilled.store(false, Ordering::Relaxed);
            self.cb.remainder_accumulator.store(0, Ordering::Relaxed);
            self.end_reconfigure();
        }

        self.configure_for_format(&format)?;

        let mtu = self.mtu.load(Ordering::Relaxed);
        let cycle_time_us = compute_cycle_time_us(mtu, &format, self.diretta_bytes.load(Ordering::Relaxed));

        let target = self.target.lock().unwrap().clone().ok_or(SinkError::DiscoveryFailed)?;
        let mut set_ok = false;
        for attempt in 0..RETRY_ATTEMPTS {
            match self.sdk.set_sink(&target, cycle_time_us, mtu) {
                Ok(()) => {
                    set_ok = true;
                    break;
                }
                Err(_) if attempt + 1 < RETRY_ATTEMPTS => thread::sleep(RETRY_DELAY),
                Err(_) => {}
            }
        }
        if !set_ok {
            return Err(SinkError::TransportOpenFailed);
        }

        let transfer_mode = if format.is_dsd || bits_per_sample(&format) <= 16 {
            TransferMode::VarAuto
        } else {
            TransferMode::VarMax
        };
        let _ = self.sdk.config_transfer(transfer_mode);

        self.arm_prefill_and_stabilization(cycle_time_us, &format, transition.kind);

        let callback_state = self.cb.clone();
        self.sdk.set_stream_callback(Arc::new(move |buf| fill_tick(buf, &callback_state)));

        let _ = self.sdk.connect_prepare();
        let _ = self.sdk.connect();

        let online_wait_ms = self.config.lock().unwrap().online_wait_ms;
        match self.sdk.connect_wait(Duration::from_millis(online_wait_ms as u64)) {
            Ok(true) => {}
            _ => tracing::warn!("sink did not report online within the configured window"),
        }

        self.spawn_worker();
        let _ = self.sdk.play();

        self.open.store(true, Ordering::Release);
        self.playing.store(true, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        *self.current_format.lock().unwrap() = Some(format);
        Ok(())
    }

    /// Emits shutdown silence for a bounded time, stops the SDK, drains
    /// the worker, and transitions to `!open`.
    pub fn close(&self) {
        let cycle_time_us = self.current_cycle_time_us();
        let shutdown_buffers = buffers_for_duration_ms(100, cycle_time_us);
        self.cb.shutdown_silence_remaining.store(shutdown_buffers, Ordering::Relaxed);
        self.cb.stop_requested.store(true, Ordering::Release);
        let _ = self.sdk.stop();
        let _ = self.sdk.disconnect(true);
        self.shutdown_worker();
        self.open.store(false, Ordering::Release);
        self.playing.store(false, Ordering::Release);
    }

    /// Like `close`, then fully releases the SDK so the target is free
    /// for other sources.
    pub fn release(&self) {
        self.close();
        let _ = self.sdk.disconnect(true);
    }

    /// Producer entrypoint: dispatches to the ring's format-aware push
    /// based on the currently configured input/target bit depths.
    pub fn send_audio(&self, bytes: &[u8]) -> usize {
        if !ring_guard_enter(&self.cb) {
            return 0;
        }
        let is_dsd = self.current_format.lock().unwrap().map(|f| f.is_dsd).unwrap_or(false);
        let written = if is_dsd {
            let channels = self.dsd_channels.load(Ordering::Relaxed) as usize;
            let mode = self.dsd_conversion_mode.lock().unwrap().unwrap_or(DsdConversionMode::Passthrough);
            self.ring.push_dsd_planar(bytes, channels, mode)
        } else {
            match (self.input_bytes.load(Ordering::Relaxed), self.diretta_bytes.load(Ordering::Relaxed)) {
                (4, 3) => self.ring.push_24_packed(bytes),
                (2, 4) => self.ring.push_16_to_32(bytes),
                (2, 3) => self.ring.push_16_to_24(bytes),
                _ => self.ring.push(bytes),
            }
        };
        if written < bytes.len() {
            self.cb.log.log(monotonic_ns(), LogLevel::Warn, "send_audio: ring full, audio bytes dropped");
        }
        ring_guard_exit(&self.cb);
        written
    }

    fn begin_reconfigure(&self) {
        self.cb.reconfiguring.store(true, Ordering::Release);
        while self.cb.ring_users.load(Ordering::Acquire) != 0 {
            thread::yield_now();
        }
    }

    fn end_reconfigure(&self) {
        self.cb.reconfiguring.store(false, Ordering::Release);
    }

    fn current_cycle_time_us(&self) -> u32 {
        self.cb.cycle_time_us.load(Ordering::Relaxed)
    }

    fn interruptible_sleep(&self, total: Duration) {
        let step = Duration::from_millis(10);
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            if self.cb.stop_requested.load(Ordering::Acquire) {
                return;
            }
            let this_step = step.min(total - elapsed);
            thread::sleep(this_step);
            elapsed += this_step;
        }
    }

    fn shutdown_worker(&self) {
        self.worker_stop.store(true, Ordering::Release);
        if let Some(handle) = self.worker_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
        self.worker_stop.store(false, Ordering::Release);
    }

    /// Spawns the watchdog/worker thread that drives the SDK's internal
    /// transfer cycle; joined in `shutdown_worker` before any subsequent
    /// `disconnect`.
    fn spawn_worker(&self) {
        self.worker_stop.store(false, Ordering::Release);
        let stop = self.worker_stop.clone();
        let sdk = self.sdk.clone();
        let handle = thread::spawn(move || sdk.run_worker(stop));
        *self.worker_handle.lock().unwrap() = Some(handle);
    }

    fn configure_for_format(&self, format: &AudioFormat) -> Result<()> {
        let target = self.target.lock().unwrap().clone().ok_or(SinkError::DiscoveryFailed)?;
        let capabilities = self.sdk.inquire_support(&target).unwrap_or_default();

        if format.is_dsd {
            self.configure_dsd(format, &capabilities)
        } else {
            self.configure_pcm(format, &capabilities)
        }
    }

    fn configure_pcm(&self, format: &AudioFormat, capabilities: &CapabilitySet) -> Result<()> {
        let mut accepted = None;
        for &bits in PCM_PROBE_ORDER.iter() {
            let format_id = FormatId::Pcm { bits, rate: format.sample_rate, channels: format.channels };
            if capabilities.supports_pcm_bit_depth(bits) && self.sdk.check_sink_support(format_id) {
                accepted = Some((bits, format_id));
                break;
            }
        }
        let (bits, format_id) = accepted.ok_or(SinkError::UnsupportedFormat)?;
        self.sdk.set_sink_configure(format_id).map_err(|_| SinkError::UnsupportedFormat)?;

        let diretta_bytes = (bits / 8).max(1);
        let input_bytes = if format.bit_depth > 16 { 4 } else { 2 };
        self.diretta_bytes.store(diretta_bytes, Ordering::Relaxed);
        self.input_bytes.store(input_bytes, Ordering::Relaxed);
        self.cb.frame_bytes.store(diretta_bytes as usize * format.channels as usize, Ordering::Relaxed);
        Ok(())
    }

    fn configure_dsd(&self, format: &AudioFormat, capabilities: &CapabilitySet) -> Result<()> {
        let mut accepted = None;
        for &(bit_order, endianness) in DSD_PROBE_ORDER.iter() {
            let format_id = FormatId::Dsd { bit_order, endianness, channels: format.channels };
            if capabilities.supports_dsd(bit_order, endianness) && self.sdk.check_sink_support(format_id) {
                accepted = Some((bit_order, endianness, format_id));
                break;
            }
        }
        let (bit_order, endianness, format_id) = match accepted {
            Some(v) => v,
            None => {
                let (bit_order, endianness) = DSD_PROBE_DEFAULT;
                let format_id = FormatId::Dsd { bit_order, endianness, channels: format.channels };
                self.sdk
                    .set_sink_configure(format_id)
                    .map_err(|_| SinkError::UnsupportedFormat)?;
                (bit_order, endianness, format_id)
            }
        };
        if accepted.is_some() {
            self.sdk.set_sink_configure(format_id).map_err(|_| SinkError::UnsupportedFormat)?;
        }

        let source_lsb_first = matches!(format.dsd_endianness, rtbridge_core::DsdEndianness::DsfLsb);
        let target_lsb_first = matches!(bit_order, BitOrder::Lsb);
        let target_big_endian = matches!(endianness, Endianness::Big);
        let mode = DsdConversionMode::select(source_lsb_first, target_lsb_first, target_big_endian);
        *self.dsd_conversion_mode.lock().unwrap() = Some(mode);
        self.dsd_channels.store(format.channels, Ordering::Relaxed);
        self.cb.frame_bytes.store(4 * format.channels as usize, Ordering::Relaxed);
        Ok(())
    }

    fn arm_prefill_and_stabilization(&self, cycle_time_us: u32, format: &AudioFormat, kind: TransitionKind) {
        let bytes_per_buffer = bytes_per_buffer_for(cycle_time_us, format, self.diretta_bytes.load(Ordering::Relaxed));
        let frame_bytes = self.cb.frame_bytes.load(Ordering::Relaxed).max(1);
        let remainder = format.sample_rate % 1000;

        self.cb.bytes_per_buffer.store(bytes_per_buffer, Ordering::Relaxed);
        self.cb.cycle_time_us.store(cycle_time_us, Ordering::Relaxed);
        self.cb.remainder_per_tick.store(remainder, Ordering::Relaxed);

        let prefill_ms = if format.is_dsd {
            150
        } else if format.is_compressed {
            200
        } else {
            100
        };
        let mut prefill_buffers = buffers_for_duration_ms(prefill_ms, cycle_time_us);
        prefill_buffers = prefill_buffers.max(8).min((self.ring.capacity() / 4).max(frame_bytes) / bytes_per_buffer.max(1));
        self.cb.prefill_target_bytes.store(prefill_buffers * bytes_per_buffer, Ordering::Relaxed);
        self.cb.prefilled.store(false, Ordering::Relaxed);

        if kind == TransitionKind::QuickResume {
            self.cb.stabilization_remaining.store(0, Ordering::Relaxed);
        } else {
            let mult = if format.is_dsd { transition::dsd_multiplier(format.sample_rate) } else { 1 };
            let stabilization_ms = if format.is_dsd { 50 * mult } else { 0 };
            let stabilization_buffers = if format.is_dsd {
                buffers_for_duration_ms(stabilization_ms, cycle_time_us)
            } else {
                20
            };
            self.cb.stabilization_remaining.store(stabilization_buffers, Ordering::Relaxed);
        }
        self.cb.stop_requested.store(false, Ordering::Release);
    }
}

fn bits_per_sample(format: &AudioFormat) -> u8 {
    format.bit_depth
}

/// `cycle_time_us = round((mtu - 48) / (rate * channels * bps / 8) * 1e6)`, clamped `[100, 50000]`.
fn compute_cycle_time_us(mtu: u32, format: &AudioFormat, diretta_bytes: u8) -> u32 {
    let byte_rate = format.sample_rate as f64 * format.channels as f64 * diretta_bytes.max(1) as f64;
    if byte_rate <= 0.0 {
        return 1000;
    }
    let payload = (mtu as f64 - 48.0).max(1.0);
    let us = (payload / byte_rate * 1_000_000.0).round() as i64;
    us.clamp(100, 50_000) as u32
}

/// Always a whole multiple of the frame size: floors to a frame count
/// first so a tick's buffer never splits a frame across two ticks, then
/// converts to bytes. `fill_tick`'s remainder accumulator carries the
/// truncated frames back in over the course of 1000 ticks.
fn bytes_per_buffer_for(cycle_time_us: u32, format: &AudioFormat, diretta_bytes: u8) -> usize {
    let frame_bytes = diretta_bytes.max(1) as usize * format.channels as usize;
    let frames_per_tick = (format.sample_rate as f64 * cycle_time_us as f64 / 1_000_000.0) as usize;
    frames_per_tick * frame_bytes
}

fn buffers_for_duration_ms(duration_ms: u32, cycle_time_us: u32) -> usize {
    let cycle_ms = (cycle_time_us.max(1) as f64) / 1000.0;
    ((duration_ms as f64 / cycle_ms).ceil() as usize).max(1)
}
