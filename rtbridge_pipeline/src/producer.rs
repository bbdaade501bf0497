//! Producer loop (C5): header demux, burst-fill, backpressure, and
//! per-format byte routing into the sink ring.

use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rtbridge_core::{AudioFormat, DsdCarrier, FormatHeader, PipeReader, FORMAT_HEADER_LEN, FORMAT_HEADER_MAGIC};
use rtbridge_sink::SinkController;

use crate::error::{PipelineError, Result};

const BURST_FILL_TIMEOUT: Duration = Duration::from_secs(5);
const BACKPRESSURE_TIMEOUT: Duration = Duration::from_millis(50);
const BACKPRESSURE_FILL_RATIO: f64 = 0.75;
const SILENCE_PAD_BYTES: usize = 4096;

/// The wire's per-channel sample width for a format: DSD and PCM above
/// 16 bits travel as 4-byte containers (S24_P32-style padding, or
/// DSD's 32-bit packing); 16-bit-or-below PCM travels tightly packed
/// at 2 bytes/channel (the 16->32/16->24 converters take 2-byte-LE
/// input, not a padded container).
fn frame_bytes_for(format: &AudioFormat) -> usize {
    let bytes_per_channel = if format.is_dsd || format.bit_depth > 16 { 4 } else { 2 };
    format.channels as usize * bytes_per_channel
}

/// Reassembles byte-aligned frames across `read_up_to` calls and DSD
/// sub-frame payloads across frames, since the pipe can hand back an
/// arbitrary split of either boundary.
struct FrameCarry {
    bytes: Vec<u8>,
}

impl FrameCarry {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Appends `chunk`, returns the prefix aligned to whole
    /// `frame_bytes`-sized frames, and keeps the remainder for next time.
    fn align(&mut self, chunk: &[u8], frame_bytes: usize) -> Vec<u8> {
        if frame_bytes == 0 {
            return Vec::new();
        }
        self.bytes.extend_from_slice(chunk);
        let aligned_len = (self.bytes.len() / frame_bytes) * frame_bytes;
        self.bytes.drain(..aligned_len).collect()
    }

    fn reset(&mut self) {
        self.bytes.clear();
    }
}

/// Accumulates DoP's 2-byte-per-frame DSD payload into native-sized
/// 4-byte planar groups (two consecutive DoP frames == one DSD64
/// native group), per channel.
struct DopAccumulator {
    channels: usize,
    half: Vec<Option<[u8; 2]>>,
}

impl DopAccumulator {
    fn new(channels: usize) -> Self {
        Self { channels, half: vec![None; channels.max(1)] }
    }

    fn reset(&mut self, channels: usize) {
        self.channels = channels;
        self.half = vec![None; channels.max(1)];
    }

    /// `frame_aligned` holds whole `channels * 4`-byte PCM frames.
    /// Returns the number of complete 4-byte DSD groups written,
    /// planar per channel, into `out`.
    fn extract(&mut self, frame_aligned: &[u8], out: &mut Vec<u8>) -> usize {
        out.clear();
        let channels = self.channels;
        if channels == 0 {
            return 0;
        }
        let frame_bytes = channels * 4;
        let frame_count = frame_aligned.len() / frame_bytes;
        let mut per_channel: Vec<Vec<u8>> = vec![Vec::new(); channels];
        for f in 0..frame_count {
            for ch in 0..channels {
                let off = f * frame_bytes + ch * 4;
                // Wire order is [src+2, src+1]: the embedded DSD byte pair
                // is stored high-byte-first within the 24-bit DoP payload.
                let payload = [frame_aligned[off + 2], frame_aligned[off + 1]];
                match self.half[ch].take() {
                    Some(prev) => {
                        per_channel[ch].extend_from_slice(&prev);
                        per_channel[ch].extend_from_slice(&payload);
                    }
                    None => self.half[ch] = Some(payload),
                }
            }
        }
        let group_count = per_channel.iter().map(|g| g.len() / 4).min().unwrap_or(0);
        for groups in &per_channel {
            out.extend_from_slice(&groups[..group_count * 4]);
        }
        group_count
    }
}

/// De-interleaves wire-order native DSD (4-byte groups, channel-minor)
/// into channel-major planar groups, applying the per-group byte-swap
/// that inverts the decoder's 32-bit LE packing.
fn deinterleave_native_dsd(frame_aligned: &[u8], channels: usize, out: &mut Vec<u8>) -> usize {
    out.clear();
    if channels == 0 {
        return 0;
    }
    let frame_bytes = channels * 4;
    let frame_count = frame_aligned.len() / frame_bytes;
    out.resize(frame_count * frame_bytes, 0);
    for f in 0..frame_count {
        for ch in 0..channels {
            let src_off = f * frame_bytes + ch * 4;
            let dst_off = (ch * frame_count + f) * 4;
            let mut group = [0u8; 4];
            group.copy_from_slice(&frame_aligned[src_off..src_off + 4]);
            group.reverse();
            out[dst_off..dst_off + 4].copy_from_slice(&group);
        }
    }
    frame_count
}

pub struct Producer<R> {
    reader: PipeReader<R>,
    controller: Arc<SinkController>,
    stop: Arc<AtomicBool>,
    window: usize,
    current_format: Option<AudioFormat>,
    current_carrier: DsdCarrier,
    frame_carry: FrameCarry,
    dop: DopAccumulator,
    dsd_scratch: Vec<u8>,
}

impl<R: Read> Producer<R> {
    pub fn new(source: R, controller: Arc<SinkController>, stop: Arc<AtomicBool>) -> Self {
        Self {
            reader: PipeReader::new(source),
            controller,
            stop,
            window: 64 * 1024,
            current_format: None,
            current_carrier: DsdCarrier::Pcm,
            frame_carry: FrameCarry::new(),
            dop: DopAccumulator::new(1),
            dsd_scratch: Vec::new(),
        }
    }

    /// Runs the outer demux loop until shutdown is requested or the
    /// pipe closes cleanly between headers.
    pub fn run(&mut self) -> Result<()> {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return Ok(());
            }

            let header_bytes = match self.reader.read_exact(FORMAT_HEADER_LEN) {
                Ok(b) => b,
                Err(rtbridge_core::CoreError::Eof) => return Ok(()),
                Err(e) => return Err(PipelineError::from(e)),
            };
            let mut fixed = [0u8; FORMAT_HEADER_LEN];
            fixed.copy_from_slice(&header_bytes);
            let header = FormatHeader::parse(&fixed).map_err(|_| PipelineError::HeaderDesync)?;
            let new_format = header.to_audio_format();
            let carrier = header.carrier();

            if Some(new_format) != self.current_format {
                self.controller.open(new_format)?;
                self.current_format = Some(new_format);
                self.current_carrier = carrier;
                self.frame_carry.reset();
                self.dop.reset(new_format.channels as usize);
                self.burst_fill(&new_format)?;
            } else {
                self.current_carrier = carrier;
            }

            self.steady_state(&new_format)?;
        }
    }

    /// Drains whatever audio is already queued ahead of the next
    /// header, without rate pacing, bounded by a wall-clock timeout.
    fn burst_fill(&mut self, format: &AudioFormat) -> Result<()> {
        let deadline = Instant::now() + BURST_FILL_TIMEOUT;
        loop {
            if self.stop.load(Ordering::Acquire) || Instant::now() >= deadline {
                return Ok(());
            }
            if let Ok(peeked) = self.reader.peek(FORMAT_HEADER_MAGIC.len()) {
                if peeked == FORMAT_HEADER_MAGIC {
                    return Ok(());
                }
            }
            match self.reader.read_up_to(self.window) {
                Ok(chunk) if chunk.is_empty() => self.pad_silence(format),
                Ok(chunk) => self.route(format, &chunk),
                Err(rtbridge_core::CoreError::Eof) => return Ok(()),
                Err(e) => return Err(PipelineError::from(e)),
            }
        }
    }

    /// Streams audio at the source's own pace, applying backpressure
    /// once the ring is comfortably full, until the next header appears.
    fn steady_state(&mut self, format: &AudioFormat) -> Result<()> {
        loop {
            if self.stop.load(Ordering::Acquire) {
                return Ok(());
            }
            if let Ok(peeked) = self.reader.peek(FORMAT_HEADER_MAGIC.len()) {
                if peeked == FORMAT_HEADER_MAGIC {
                    return Ok(());
                }
            }
            self.backpressure_wait();
            match self.reader.read_up_to(self.window) {
                Ok(chunk) => self.route(format, &chunk),
                Err(rtbridge_core::CoreError::Eof) => return Ok(()),
                Err(e) => return Err(PipelineError::from(e)),
            }
        }
    }

    fn backpressure_wait(&self) {
        let flow = self.controller.flow_handle();
        loop {
            if self.stop.load(Ordering::Acquire) {
                return;
            }
            if !(self.controller.is_prefilled() && self.controller.ring_fill_ratio() > BACKPRESSURE_FILL_RATIO) {
                return;
            }
            let (lock, cvar) = &*flow;
            let guard = lock.lock().unwrap();
            let _ = cvar.wait_timeout(guard, BACKPRESSURE_TIMEOUT);
        }
    }

    fn pad_silence(&self, format: &AudioFormat) {
        // Upstream samples always arrive as 4-byte containers, DSD included.
        let frame_bytes = 4 * format.channels.max(1) as usize;
        let silence = vec![0u8; SILENCE_PAD_BYTES - (SILENCE_PAD_BYTES % frame_bytes.max(1))];
        if !silence.is_empty() {
            self.controller.send_audio(&silence);
        }
    }

    fn route(&mut self, format: &AudioFormat, chunk: &[u8]) {
        // Align before handing anything to `send_audio`, since its PCM
        // conversion paths (`push_24_packed`/`push_16_to_32`/
        // `push_16_to_24`) silently drop a trailing partial sample
        // rather than buffering it for the next chunk.
        let channels = format.channels as usize;
        let frame_bytes = frame_bytes_for(format);
        let aligned = self.frame_carry.align(chunk, frame_bytes);
        if aligned.is_empty() {
            return;
        }
        if !format.is_dsd {
            self.controller.send_audio(&aligned);
            return;
        }
        match self.current_carrier {
            DsdCarrier::Dop => {
                let mut scratch = std::mem::take(&mut self.dsd_scratch);
                self.dop.extract(&aligned, &mut scratch);
                if !scratch.is_empty() {
                    self.controller.send_audio(&scratch);
                }
                self.dsd_scratch = scratch;
            }
            DsdCarrier::NativeLe | DsdCarrier::NativeBe => {
                let mut scratch = std::mem::take(&mut self.dsd_scratch);
                deinterleave_native_dsd(&aligned, channels, &mut scratch);
                if !scratch.is_empty() {
                    self.controller.send_audio(&scratch);
                }
                self.dsd_scratch = scratch;
            }
            DsdCarrier::Pcm => {
                self.controller.send_audio(&aligned);
            }
        }
    }
}
