//! Format-transition classifier for `SinkController::open`.
//!
//! Operates purely on `(is_dsd, sample_rate, clock_family, high_rate)`
//! of the previous and new format (Testable Property 3), so it's
//! deterministic and independent of controller state.

use rtbridge_core::AudioFormat;

/// DSD64 bit rate: the base unit other DSD rates are expressed as a
/// multiple of (DSD128 = 2x, DSD256 = 4x, DSD512 = 8x, ...).
const DSD64_BIT_RATE: u32 = 2_822_400;

/// PCM rate at or above which a stream is considered high-rate.
/// Left open per spec.md §9: the source's choice is heuristic, kept
/// as-spec'd rather than re-derived.
pub const PCM_HIGH_RATE_THRESHOLD: u32 = 176_400;

/// DSD bit rate at or above which a stream is considered high-rate
/// (DSD256). Same provenance note as [`PCM_HIGH_RATE_THRESHOLD`].
pub const DSD_HIGH_RATE_THRESHOLD: u32 = 11_289_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// No previous open: full connect path.
    FreshConnect,
    /// Identical format: clear ring, arm prefill, play. No stabilization.
    QuickResume,
    /// DSD to PCM, or any DSD rate change: full close/reopen.
    DsdToPcmOrDsdRateChange,
    /// PCM to PCM, different rate: full close/reopen.
    PcmRateChange,
    /// PCM to DSD, same clock family, either side high-rate: full close/reopen.
    PcmToDsdHighRate,
    /// PCM to DSD, otherwise: lightweight SDK close/reopen only.
    PcmToDsdLightweight,
}

impl TransitionKind {
    /// Whether this transition requires the ring and controller state
    /// to be fully reset (everything except `QuickResume`).
    pub fn is_full_reset(self) -> bool {
        !matches!(self, TransitionKind::QuickResume)
    }

    /// Whether this transition requires joining the worker and closing
    /// the SDK before reopening (everything except `QuickResume` and
    /// the lightweight PCM->DSD path).
    pub fn requires_sdk_close(self) -> bool {
        matches!(
            self,
            TransitionKind::DsdToPcmOrDsdRateChange
                | TransitionKind::PcmRateChange
                | TransitionKind::PcmToDsdHighRate
                | TransitionKind::PcmToDsdLightweight
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub delay_ms: u32,
}

/// DSD rate expressed as a multiple of DSD64, rounded and floored at 1.
pub fn dsd_multiplier(bit_rate: u32) -> u32 {
    ((bit_rate as f64 / DSD64_BIT_RATE as f64).round() as u32).max(1)
}

/// Classifies the transition from `previous` (`None` if this is the
/// first open) to `new`, and computes the delay before the SDK may be
/// reopened, per spec.md §4.4.
pub fn classify(previous: Option<AudioFormat>, new: AudioFormat, format_switch_delay_ms: u32) -> Transition {
    let Some(prev) = previous else {
        return Transition { kind: TransitionKind::FreshConnect, delay_ms: 0 };
    };

    if prev == new {
        return Transition { kind: TransitionKind::QuickResume, delay_ms: 0 };
    }

    let dsd_rate_change = prev.is_dsd && new.is_dsd && prev.sample_rate != new.sample_rate;
    if prev.is_dsd && (!new.is_dsd || dsd_rate_change) {
        let mult = dsd_multiplier(prev.sample_rate);
        let mut delay = 200 * mult;
        if !new.is_dsd && new.sample_rate >= PCM_HIGH_RATE_THRESHOLD {
            delay += (100.0 * (new.sample_rate as f64 / 44_100.0)) as u32;
        }
        return Transition { kind: TransitionKind::DsdToPcmOrDsdRateChange, delay_ms: delay };
    }

    if !prev.is_dsd && !new.is_dsd && prev.sample_rate != new.sample_rate {
        return Transition { kind: TransitionKind::PcmRateChange, delay_ms: 100 };
    }

    if !prev.is_dsd && new.is_dsd {
        let same_family = prev.clock_family().is_some() && prev.clock_family() == new.clock_family();
        let either_high_rate = prev.is_high_rate() || new.is_high_rate();
        if same_family && either_high_rate {
            let mult = dsd_multiplier(new.sample_rate);
            return Transition { kind: TransitionKind::PcmToDsdHighRate, delay_ms: 200 * mult };
        }
        return Transition { kind: TransitionKind::PcmToDsdLightweight, delay_ms: format_switch_delay_ms };
    }

    // PCM/DSD identical in every dimension checked above but `prev != new`
    // (e.g. channel count change): treat conservatively as a full reopen.
    Transition { kind: TransitionKind::PcmRateChange, delay_ms: 100 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtbridge_core::DsdEndianness;

    #[test]
    fn no_previous_format_is_fresh_connect() {
        let t = classify(None, AudioFormat::pcm(48_000, 24, 2), 100);
        assert_eq!(t.kind, TransitionKind::FreshConnect);
        assert_eq!(t.delay_ms, 0);
    }

    #[test]
    fn identical_format_is_quick_resume() {
        let f = AudioFormat::pcm(48_000, 24, 2);
        let t = classify(Some(f), f, 100);
        assert_eq!(t.kind, TransitionKind::QuickResume);
    }

    #[test]
    fn pcm_rate_change_is_full_reopen_100ms() {
        let prev = AudioFormat::pcm(44_100, 16, 2);
        let new = AudioFormat::pcm(48_000, 16, 2);
        let t = classify(Some(prev), new, 100);
        assert_eq!(t.kind, TransitionKind::PcmRateChange);
        assert_eq!(t.delay_ms, 100);
    }

    #[test]
    fn dsd_to_pcm_scales_with_source_multiplier() {
        let prev = AudioFormat::dsd(22_579_200, 2, DsdEndianness::DsfLsb); // DSD512, mult=8
        let new = AudioFormat::pcm(44_100, 24, 2);
        let t = classify(Some(prev), new, 100);
        assert_eq!(t.kind, TransitionKind::DsdToPcmOrDsdRateChange);
        assert_eq!(t.delay_ms, 1600);
    }

    #[test]
    fn dsd_to_high_rate_pcm_adds_extra_delay() {
        let prev = AudioFormat::dsd(2_822_400, 2, DsdEndianness::DsfLsb); // DSD64, mult=1
        let new = AudioFormat::pcm(352_800, 24, 2); // high-rate PCM, 8x 44100
        let t = classify(Some(prev), new, 100);
        assert_eq!(t.kind, TransitionKind::DsdToPcmOrDsdRateChange);
        assert_eq!(t.delay_ms, 200 + 800);
    }

    #[test]
    fn pcm_to_dsd_same_family_high_rate_full_reopen() {
        let prev = AudioFormat::pcm(352_800, 24, 2);
        let new = AudioFormat::dsd(22_579_200, 2, DsdEndianness::DsfLsb); // mult=8
        let t = classify(Some(prev), new, 100);
        assert_eq!(t.kind, TransitionKind::PcmToDsdHighRate);
        assert_eq!(t.delay_ms, 1600);
    }

    #[test]
    fn pcm_to_dsd_low_rate_is_lightweight() {
        let prev = AudioFormat::pcm(44_100, 16, 2);
        let new = AudioFormat::dsd(2_822_400, 2, DsdEndianness::DsfLsb);
        let t = classify(Some(prev), new, 150);
        assert_eq!(t.kind, TransitionKind::PcmToDsdLightweight);
        assert_eq!(t.delay_ms, 150);
    }

    #[test]
    fn classifier_is_deterministic() {
        let prev = AudioFormat::pcm(48_000, 24, 2);
        let new = AudioFormat::pcm(96_000, 24, 2);
        let t1 = classify(Some(prev), new, 100);
        let t2 = classify(Some(prev), new, 100);
        assert_eq!(t1, t2);
    }
}
