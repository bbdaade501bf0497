//! Byte-addressed lock-free SPSC ring buffer with inline format conversion.
//!
//! Unlike a generic `T`-typed channel, this ring moves raw audio bytes
//! and performs the producer-side format widening/packing as it writes,
//! so the consumer thread only ever sees bytes in the sink's target
//! layout. Indices are monotonically increasing (never wrapped) byte
//! positions; `pos & mask` gives the physical offset.

use core::cell::UnsafeCell;
#[cfg(not(loom))]
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

#[cfg(loom)]
use loom::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::convert::{self, DsdConversionMode, S24Align};
use crate::error::{CoreError, Result};

/// Cache-line padded wrapper to prevent false sharing between the
/// producer's write index and the consumer's read index.
#[repr(align(64))]
struct CachePadded<T>(T);

impl<T> CachePadded<T> {
    const fn new(value: T) -> Self {
        CachePadded(value)
    }
}

impl<T> core::ops::Deref for CachePadded<T> {
    type Target = T;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// S24-in-32-bit-container sample alignment detection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum S24Mode {
    Unknown,
    Deferred,
    Lsb,
    Msb,
}

const S24_DEFERRED_COMMIT_THRESHOLD: u64 = 48_000;
const S24_PROBE_SAMPLES: usize = 64;

/// Producer-supplied alignment expectation, applied until sample-based
/// detection confirms (or overrides) it.
struct S24State {
    mode: S24Mode,
    confirmed: bool,
    hint: Option<S24Align>,
    silent_sample_count: u64,
}

impl S24State {
    const fn new() -> Self {
        Self {
            mode: S24Mode::Unknown,
            confirmed: false,
            hint: None,
            silent_sample_count: 0,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn set_hint(&mut self, hint: S24Align) {
        self.hint = Some(hint);
        if self.mode == S24Mode::Unknown {
            self.mode = match hint {
                S24Align::Lsb => S24Mode::Lsb,
                S24Align::Msb => S24Mode::Msb,
            };
        }
    }

    /// The alignment to use for this call, running detection on `src`
    /// first when not yet confirmed.
    fn align_for(&mut self, src: &[u8], sample_count: usize) -> S24Align {
        if !self.confirmed {
            self.observe(src, sample_count);
        }
        match self.mode {
            S24Mode::Lsb | S24Mode::Unknown | S24Mode::Deferred => {
                self.hint.unwrap_or(S24Align::Lsb)
            }
            S24Mode::Msb => S24Align::Msb,
        }
    }

    fn observe(&mut self, src: &[u8], sample_count: usize) {
        let n = sample_count.min(src.len() / 4).min(S24_PROBE_SAMPLES);
        if n == 0 {
            return;
        }
        let mut byte0_nonzero = false;
        let mut byte3_nonzero = false;
        for i in 0..n {
            if src[i * 4] != 0 {
                byte0_nonzero = true;
            }
            if src[i * 4 + 3] != 0 {
                byte3_nonzero = true;
            }
        }
        match (byte0_nonzero, byte3_nonzero) {
            (true, false) => {
                self.mode = S24Mode::Lsb;
                self.confirmed = true;
            }
            (false, true) => {
                self.mode = S24Mode::Msb;
                self.confirmed = true;
            }
            (true, true) => {
                self.mode = S24Mode::Lsb;
                self.confirmed = true;
            }
            (false, false) => {
                self.mode = S24Mode::Deferred;
                self.silent_sample_count += n as u64;
                if self.silent_sample_count >= S24_DEFERRED_COMMIT_THRESHOLD {
                    self.mode = match self.hint {
                        Some(S24Align::Msb) => S24Mode::Msb,
                        _ => S24Mode::Lsb,
                    };
                    self.confirmed = true;
                }
            }
        }
    }
}

/// A contiguous writable region returned by [`RingBuffer::direct_write_region`].
pub struct DirectWrite<'a> {
    pub slice: &'a mut [u8],
}

/// Counters exposed for diagnostics; updated with relaxed ordering since
/// they're advisory, not part of the synchronization protocol.
#[derive(Debug, Default)]
pub struct RingCounters {
    pub truncated_writes: AtomicU64,
    pub truncated_reads: AtomicU64,
}

/// Lock-free byte ring buffer shared between one producer thread and one
/// consumer thread. `write_pos` is touched only by the producer,
/// `read_pos` only by the consumer; that invariant is not enforced by
/// the type system, since the sink controller must be able to `resize`
/// the buffer from neither side under its own reconfiguration guard.
pub struct RingBuffer {
    buffer: UnsafeCell<Vec<u8>>,
    mask: AtomicUsize,
    write_pos: CachePadded<AtomicUsize>,
    read_pos: CachePadded<AtomicUsize>,
    s24: UnsafeCell<S24State>,
    staging: UnsafeCell<Vec<u8>>,
    pub counters: RingCounters,
}

// SAFETY: exclusive producer/consumer access to disjoint index ranges is
// maintained by the caller's single-producer/single-consumer discipline.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(CoreError::InvalidCapacity);
        }
        let capacity = capacity.next_power_of_two();
        Ok(Self {
            buffer: UnsafeCell::new(vec![0u8; capacity]),
            mask: AtomicUsize::new(capacity - 1),
            write_pos: CachePadded::new(AtomicUsize::new(0)),
            read_pos: CachePadded::new(AtomicUsize::new(0)),
            s24: UnsafeCell::new(S24State::new()),
            staging: UnsafeCell::new(Vec::new()),
            counters: RingCounters::default(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.mask.load(Ordering::Relaxed) + 1
    }

    /// Supplies an expected S24 alignment at sink-open time; applied
    /// immediately while the mode is still unconfirmed.
    pub fn set_s24_hint(&self, hint: S24Align) {
        // SAFETY: called only from the producer/controller thread while
        // the consumer is not concurrently reading S24 state (S24 state
        // is producer-exclusive, mirroring write_pos).
        unsafe { (*self.s24.get()).set_hint(hint) };
    }

    /// Rounds `new_capacity` up to a power of two >= 2, fills the buffer
    /// with `silence_byte`, and resets both indices and S24 state. Must
    /// only be called under the sink controller's reconfiguration guard
    /// (no concurrent producer/consumer access).
    pub fn resize(&self, new_capacity: usize, silence_byte: u8) -> Result<()> {
        if new_capacity < 2 {
            return Err(CoreError::InvalidCapacity);
        }
        let new_capacity = new_capacity.next_power_of_two();
        // SAFETY: caller guarantees exclusive access during reconfiguration.
        unsafe {
            let buf = &mut *self.buffer.get();
            buf.clear();
            buf.resize(new_capacity, silence_byte);
            (*self.s24.get()).reset();
        }
        self.mask.store(new_capacity - 1, Ordering::Relaxed);
        self.write_pos.store(0, Ordering::Relaxed);
        self.read_pos.store(0, Ordering::Release);
        Ok(())
    }

    /// Snapshot of free space, conservative for a concurrently-running
    /// consumer: loads `read_pos` with acquire so the producer never
    /// overestimates space and corrupts unread data.
    pub fn free_space(&self) -> usize {
        let cap = self.capacity();
        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        cap - (write.wrapping_sub(read)) - 1
    }

    /// Snapshot of available bytes, conservative for a concurrently
    /// running producer: loads `write_pos` with acquire.
    pub fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Relaxed);
        write.wrapping_sub(read)
    }

    /// Fraction of capacity currently occupied, for backpressure
    /// thresholds. Conservative in the same direction as `available`.
    pub fn fill_ratio(&self) -> f64 {
        let cap = self.capacity();
        if cap == 0 {
            return 0.0;
        }
        self.available() as f64 / cap as f64
    }

    fn mask_of(&self, pos: usize) -> usize {
        pos & self.mask.load(Ordering::Relaxed)
    }

    /// Returns a contiguous writable slice of at least `n` bytes if both
    /// free space and distance-to-wrap allow it; `None` otherwise (the
    /// caller should fall back to [`Self::push`]).
    ///
    /// # Safety
    /// Caller (the producer thread) must not retain the slice across a
    /// subsequent call that might resize the buffer.
    pub unsafe fn direct_write_region(&self, n: usize) -> Option<DirectWrite<'_>> {
        if self.free_space() < n {
            return None;
        }
        let cap = self.capacity();
        let write = self.write_pos.load(Ordering::Relaxed);
        let offset = self.mask_of(write);
        if cap - offset < n {
            return None;
        }
        let buf = unsafe { &mut *self.buffer.get() };
        Some(DirectWrite {
            slice: &mut buf[offset..offset + n],
        })
    }

    /// Advances `write_pos` by `k` with release ordering, publishing the
    /// bytes written through [`Self::direct_write_region`].
    pub fn commit_direct_write(&self, k: usize) {
        let write = self.write_pos.load(Ordering::Relaxed);
        self.write_pos.store(write.wrapping_add(k), Ordering::Release);
    }

    /// Copies as many bytes of `src` as fit, with a two-chunk
    /// wraparound fallback when a direct region isn't available.
    /// Returns the number of bytes accepted.
    pub fn push(&self, src: &[u8]) -> usize {
        let n = src.len().min(self.free_space());
        if n == 0 {
            if !src.is_empty() {
                self.counters.truncated_writes.fetch_add(1, Ordering::Relaxed);
            }
            return 0;
        }
        if n < src.len() {
            self.counters.truncated_writes.fetch_add(1, Ordering::Relaxed);
        }
        // SAFETY: single producer thread, n bounded by free_space above.
        if let Some(region) = unsafe { self.direct_write_region(n) } {
            region.slice.copy_from_slice(&src[..n]);
            self.commit_direct_write(n);
            return n;
        }
        let cap = self.capacity();
        let write = self.write_pos.load(Ordering::Relaxed);
        let offset = self.mask_of(write);
        let first = (cap - offset).min(n);
        let second = n - first;
        let buf = unsafe { &mut *self.buffer.get() };
        buf[offset..offset + first].copy_from_slice(&src[..first]);
        if second > 0 {
            buf[..second].copy_from_slice(&src[first..first + second]);
        }
        self.commit_direct_write(n);
        n
    }

    fn staging_mut(&self, min_len: usize) -> &mut Vec<u8> {
        // SAFETY: staging is producer-exclusive scratch space.
        let staging = unsafe { &mut *self.staging.get() };
        if staging.len() < min_len {
            staging.resize(min_len, 0);
        }
        staging
    }

    /// Runs S24 auto-detection on `src`, selects the LSB- or
    /// MSB-aligned converter, stages the packed output, and pushes it.
    /// Returns input bytes consumed (a multiple of 4).
    pub fn push_24_packed(&self, src: &[u8]) -> usize {
        let sample_count = src.len() / 4;
        if sample_count == 0 {
            return 0;
        }
        // SAFETY: S24 state is producer-exclusive.
        let align = unsafe { (*self.s24.get()).align_for(src, sample_count) };
        let staging = self.staging_mut(sample_count * 3);
        let written = convert::pack_24(&mut staging[..sample_count * 3], src, sample_count, align);
        let accepted = self.push(&staging[..written]);
        (accepted / 3) * 4
    }

    /// Widens 16-bit samples to 32-bit containers and pushes them.
    /// Returns input bytes consumed (a multiple of 2).
    pub fn push_16_to_32(&self, src: &[u8]) -> usize {
        let sample_count = src.len() / 2;
        if sample_count == 0 {
            return 0;
        }
        let staging = self.staging_mut(sample_count * 4);
        let written = convert::widen_16_to_32(&mut staging[..sample_count * 4], src, sample_count);
        let accepted = self.push(&staging[..written]);
        (accepted / 4) * 2
    }

    /// Widens 16-bit samples to 24-bit containers and pushes them.
    /// Returns input bytes consumed (a multiple of 2).
    pub fn push_16_to_24(&self, src: &[u8]) -> usize {
        let sample_count = src.len() / 2;
        if sample_count == 0 {
            return 0;
        }
        let staging = self.staging_mut(sample_count * 3);
        let written = convert::widen_16_to_24(&mut staging[..sample_count * 3], src, sample_count);
        let accepted = self.push(&staging[..written]);
        (accepted / 3) * 2
    }

    /// Aligns `src` to 4-byte-per-channel planar groups, interleaves and
    /// converts into staging per `mode`, and pushes the result. Returns
    /// input bytes consumed.
    pub fn push_dsd_planar(&self, src: &[u8], channels: usize, mode: DsdConversionMode) -> usize {
        if channels == 0 {
            return 0;
        }
        let group_count = src.len() / 4 / channels;
        if group_count == 0 {
            return 0;
        }
        let total = group_count * channels * 4;
        let staging = self.staging_mut(total);
        let written =
            convert::dsd_planar_to_interleaved(&mut staging[..total], src, channels, group_count, mode);
        let accepted = self.push(&staging[..written]);
        (accepted / (channels * 4)) * channels * 4
    }

    /// Copies up to `n` bytes into `dst` with a two-chunk wraparound
    /// read, advancing `read_pos` with release ordering. Returns bytes
    /// copied.
    pub fn pop(&self, dst: &mut [u8], n: usize) -> usize {
        let available = self.available();
        let n = n.min(dst.len()).min(available);
        if n == 0 {
            return 0;
        }
        let cap = self.capacity();
        let read = self.read_pos.load(Ordering::Relaxed);
        let offset = self.mask_of(read);
        let first = (cap - offset).min(n);
        let second = n - first;
        // SAFETY: single consumer thread, n bounded by available above.
        let buf = unsafe { &*self.buffer.get() };
        dst[..first].copy_from_slice(&buf[offset..offset + first]);
        if second > 0 {
            dst[first..first + second].copy_from_slice(&buf[..second]);
        }
        self.read_pos.store(read.wrapping_add(n), Ordering::Release);
        n
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_to_power_of_two() {
        let ring = RingBuffer::new(100).unwrap();
        assert_eq!(ring.capacity(), 128);
    }

    #[test]
    fn rejects_capacity_below_two() {
        assert_eq!(RingBuffer::new(1).unwrap_err(), CoreError::InvalidCapacity);
        assert_eq!(RingBuffer::new(0).unwrap_err(), CoreError::InvalidCapacity);
    }

    #[test]
    fn single_byte_gap_is_maintained() {
        let ring = RingBuffer::new(8).unwrap();
        assert_eq!(ring.free_space(), 7);
        let n = ring.push(&[1; 7]);
        assert_eq!(n, 7);
        assert_eq!(ring.free_space(), 0);
        // A further push must be truncated to zero, never overwrite unread data.
        let n = ring.push(&[9; 4]);
        assert_eq!(n, 0);
    }

    #[test]
    fn push_pop_roundtrip() {
        let ring = RingBuffer::new(16).unwrap();
        let data = [1u8, 2, 3, 4, 5];
        assert_eq!(ring.push(&data), 5);
        let mut out = [0u8; 5];
        assert_eq!(ring.pop(&mut out, 5), 5);
        assert_eq!(out, data);
    }

    #[test]
    fn wraparound_push_pop() {
        let ring = RingBuffer::new(8).unwrap();
        // Fill to 6, drain 6, then push 6 again so the second push wraps.
        assert_eq!(ring.push(&[1; 6]), 6);
        let mut sink = [0u8; 6];
        assert_eq!(ring.pop(&mut sink, 6), 6);
        let data = [9u8, 8, 7, 6, 5, 4];
        assert_eq!(ring.push(&data), 6);
        let mut out = [0u8; 6];
        assert_eq!(ring.pop(&mut out, 6), 6);
        assert_eq!(out, data);
    }

    #[test]
    fn push_truncates_never_rejects() {
        let ring = RingBuffer::new(8).unwrap();
        let n = ring.push(&[1; 100]);
        assert_eq!(n, 7);
        assert_eq!(ring.free_space(), 0);
    }

    #[test]
    fn pop_truncates_when_starved() {
        let ring = RingBuffer::new(8).unwrap();
        ring.push(&[1, 2, 3]);
        let mut out = [0u8; 10];
        let n = ring.pop(&mut out, 10);
        assert_eq!(n, 3);
    }

    #[test]
    fn resize_fills_silence_and_resets_state() {
        let ring = RingBuffer::new(8).unwrap();
        ring.push(&[1, 2, 3]);
        ring.resize(32, 0xAA).unwrap();
        assert_eq!(ring.capacity(), 32);
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.free_space(), 31);
        let mut out = [0u8; 4];
        // Push nothing; pop from freshly-reset indices reads nothing.
        assert_eq!(ring.pop(&mut out, 4), 0);
    }

    #[test]
    fn direct_write_region_respects_wrap_point() {
        let ring = RingBuffer::new(8).unwrap();
        ring.push(&[1; 6]);
        let mut out = [0u8; 6];
        ring.pop(&mut out, 6);
        // write_pos is now at 6, 2 bytes remain before the physical wrap.
        let region = unsafe { ring.direct_write_region(3) };
        assert!(region.is_none(), "3 bytes would cross the wrap point");
        let region = unsafe { ring.direct_write_region(2) };
        assert!(region.is_some());
    }

    #[test]
    fn s24_detects_lsb_alignment() {
        let ring = RingBuffer::new(1024).unwrap();
        // byte3 all-zero, byte0 nonzero => LSB aligned.
        let mut src = Vec::new();
        for i in 0u8..10 {
            src.extend_from_slice(&[i + 1, 0, 0, 0]);
        }
        let consumed = ring.push_24_packed(&src);
        assert_eq!(consumed, 40);
        let mut out = [0u8; 30];
        ring.pop(&mut out, 30);
        assert_eq!(&out[0..3], &[1, 0, 0]);
    }

    #[test]
    fn s24_detects_msb_alignment() {
        let ring = RingBuffer::new(1024).unwrap();
        // byte0 all-zero, byte3 nonzero => MSB aligned; valid bytes are [1..4).
        let mut src = Vec::new();
        for i in 0u8..10 {
            src.extend_from_slice(&[0, i + 1, 0, i + 2]);
        }
        let consumed = ring.push_24_packed(&src);
        assert_eq!(consumed, 40);
        let mut out = [0u8; 3];
        ring.pop(&mut out, 3);
        assert_eq!(out, [1, 0, 2]);
    }

    #[test]
    fn s24_hint_applies_until_confirmed() {
        let ring = RingBuffer::new(1024).unwrap();
        ring.set_s24_hint(S24Align::Msb);
        // All-zero probe defers detection; the hint should govern output
        // in the meantime (both alignments look identical on all-zero
        // input, so this mainly checks no panic/misbehavior occurs).
        let src = [0u8; 16];
        let consumed = ring.push_24_packed(&src);
        assert_eq!(consumed, 16);
    }

    #[test]
    fn s24_defers_then_commits_after_threshold() {
        let ring = RingBuffer::new(1 << 20).unwrap();
        // Feed all-zero samples past the deferred commit threshold in
        // batches of 64 (the detector's per-call probe window).
        let batch = vec![0u8; 64 * 4];
        let mut total = 0u64;
        while total < S24_DEFERRED_COMMIT_THRESHOLD {
            ring.push_24_packed(&batch);
            total += 64;
        }
        // SAFETY: test-only introspection via an extra push that would
        // now be driven by the committed (confirmed) mode.
        let mut src = Vec::new();
        for i in 0u8..4 {
            src.extend_from_slice(&[i + 1, 0, 0, 0]);
        }
        let consumed = ring.push_24_packed(&src);
        assert_eq!(consumed, 16);
    }

    #[test]
    fn push_16_to_32_widens_correctly() {
        let ring = RingBuffer::new(64).unwrap();
        let src = [0x34u8, 0x12, 0x78, 0x56];
        let consumed = ring.push_16_to_32(&src);
        assert_eq!(consumed, 4);
        let mut out = [0u8; 8];
        ring.pop(&mut out, 8);
        assert_eq!(&out[0..4], &[0x00, 0x00, 0x34, 0x12]);
        assert_eq!(&out[4..8], &[0x00, 0x00, 0x78, 0x56]);
    }

    #[test]
    fn push_16_to_24_widens_correctly() {
        let ring = RingBuffer::new(64).unwrap();
        let src = [0x34u8, 0x12];
        let consumed = ring.push_16_to_24(&src);
        assert_eq!(consumed, 2);
        let mut out = [0u8; 3];
        ring.pop(&mut out, 3);
        assert_eq!(out, [0x00, 0x34, 0x12]);
    }

    #[test]
    fn push_dsd_planar_interleaves_two_channels() {
        let ring = RingBuffer::new(64).unwrap();
        let src = [
            0x01, 0x02, 0x03, 0x04, // ch0
            0x11, 0x12, 0x13, 0x14, // ch1
        ];
        let consumed = ring.push_dsd_planar(&src, 2, DsdConversionMode::Passthrough);
        assert_eq!(consumed, 8);
        let mut out = [0u8; 8];
        ring.pop(&mut out, 8);
        assert_eq!(&out, &[0x01, 0x02, 0x03, 0x04, 0x11, 0x12, 0x13, 0x14]);
    }

    #[test]
    fn partial_channel_group_is_not_consumed() {
        let ring = RingBuffer::new(64).unwrap();
        // 9 bytes: one full 2-channel group (8 bytes) plus 1 stray byte.
        let src = [0u8; 9];
        let consumed = ring.push_dsd_planar(&src, 2, DsdConversionMode::Passthrough);
        assert_eq!(consumed, 8);
    }
}

#[cfg(loom)]
mod loom_tests {
    use loom::{sync::Arc, thread};

    use super::*;

    #[test]
    fn loom_concurrent_push_pop_preserves_order() {
        loom::model(|| {
            let ring = Arc::new(RingBuffer::new(4).unwrap());

            let producer_ring = ring.clone();
            let producer = thread::spawn(move || {
                producer_ring.push(&[1]);
                producer_ring.push(&[2]);
            });

            let consumer_ring = ring.clone();
            let consumer = thread::spawn(move || {
                let mut received = Vec::new();
                for _ in 0..2 {
                    let mut byte = [0u8];
                    if consumer_ring.pop(&mut byte, 1) == 1 {
                        received.push(byte[0]);
                    }
                }
                received
            });

            producer.join().unwrap();
            let received = consumer.join().unwrap();
            // Whatever was received must be a prefix of [1, 2].
            assert!(received == [] || received == [1] || received == [1, 2]);
        });
    }
}
