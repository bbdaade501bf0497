//! Pure byte-level format conversion kernels.
//!
//! Every converter here is a pure function `(dst, src, sample_count) ->
//! bytes_written`. These are byte gathers and bit permutes, not
//! arithmetic, so there's no vectorizable lane op to reach for the way
//! `bbx_core::simd` does for its `f32x4`/`f64x4` gain and `sin` kernels;
//! a scalar loop over 3-4 byte groups is what actually runs here.

/// Which 24 bits of a 4-byte S24_P32 container hold the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S24Align {
    /// Valid bits in `[0..3)`, byte 3 is padding.
    Lsb,
    /// Valid bits in `[1..4)`, byte 0 is padding or noise.
    Msb,
}

/// Selected once at sink open from source/target endianness combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DsdConversionMode {
    Passthrough,
    BitReverseOnly,
    ByteSwapOnly,
    BitReverseAndSwap,
}

impl DsdConversionMode {
    /// Derives the conversion mode from source endianness, target
    /// bit-order, and target byte-endianness.
    pub fn select(source_lsb_first: bool, target_lsb_first: bool, target_big_endian: bool) -> Self {
        let reverse = source_lsb_first != target_lsb_first;
        let swap = target_big_endian;
        match (reverse, swap) {
            (false, false) => DsdConversionMode::Passthrough,
            (true, false) => DsdConversionMode::BitReverseOnly,
            (false, true) => DsdConversionMode::ByteSwapOnly,
            (true, true) => DsdConversionMode::BitReverseAndSwap,
        }
    }
}

/// Per-byte bit-reversal lookup table, shared by scalar and SIMD paths.
pub const BIT_REVERSE_TABLE: [u8; 256] = build_bit_reverse_table();

const fn reverse_byte(b: u8) -> u8 {
    let mut v = b;
    v = (v & 0xF0) >> 4 | (v & 0x0F) << 4;
    v = (v & 0xCC) >> 2 | (v & 0x33) << 2;
    v = (v & 0xAA) >> 1 | (v & 0x55) << 1;
    v
}

const fn build_bit_reverse_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        table[i] = reverse_byte(i as u8);
        i += 1;
    }
    table
}

/// Index permutation for a 4-byte group byte-swap, shared by both paths.
pub const BYTE_SWAP_4: [usize; 4] = [3, 2, 1, 0];

/// 24-bit pack, LSB-aligned: input 4 bytes/sample with bits in `[0..3)`,
/// output 3 bytes taken from `[0..3)`.
pub fn pack_24_lsb(dst: &mut [u8], src: &[u8], sample_count: usize) -> usize {
    pack_24(dst, src, sample_count, S24Align::Lsb)
}

/// 24-bit pack, MSB-aligned: input 4 bytes/sample with bits in `[1..4)`,
/// output 3 bytes taken from `[1..4)`.
pub fn pack_24_msb(dst: &mut [u8], src: &[u8], sample_count: usize) -> usize {
    pack_24(dst, src, sample_count, S24Align::Msb)
}

pub fn pack_24(dst: &mut [u8], src: &[u8], sample_count: usize, align: S24Align) -> usize {
    scalar::pack_24(dst, src, sample_count, align)
}

/// 16-bit to 32-bit widen: input 2 bytes LE, output `00 00 LSB MSB`.
pub fn widen_16_to_32(dst: &mut [u8], src: &[u8], sample_count: usize) -> usize {
    scalar::widen_16_to_32(dst, src, sample_count)
}

/// 16-bit to 24-bit widen: input 2 bytes LE, output `00 LSB MSB`.
pub fn widen_16_to_24(dst: &mut [u8], src: &[u8], sample_count: usize) -> usize {
    scalar::widen_16_to_24(dst, src, sample_count)
}

/// DSD planar-to-interleaved, applying the given conversion mode to each
/// 4-byte group. `src` holds `channels` contiguous planar runs of
/// `group_count` 4-byte groups each; `dst` receives interleaved groups.
pub fn dsd_planar_to_interleaved(
    dst: &mut [u8],
    src: &[u8],
    channels: usize,
    group_count: usize,
    mode: DsdConversionMode,
) -> usize {
    scalar::dsd_planar_to_interleaved(dst, src, channels, group_count, mode)
}

/// Applies a single DSD conversion mode to one 4-byte group in place.
#[inline]
fn apply_dsd_group(group: &mut [u8; 4], mode: DsdConversionMode) {
    match mode {
        DsdConversionMode::Passthrough => {}
        DsdConversionMode::BitReverseOnly => {
            for b in group.iter_mut() {
                *b = BIT_REVERSE_TABLE[*b as usize];
            }
        }
        DsdConversionMode::ByteSwapOnly => {
            let src = *group;
            for (i, &idx) in BYTE_SWAP_4.iter().enumerate() {
                group[i] = src[idx];
            }
        }
        DsdConversionMode::BitReverseAndSwap => {
            let src = *group;
            for (i, &idx) in BYTE_SWAP_4.iter().enumerate() {
                group[i] = BIT_REVERSE_TABLE[src[idx] as usize];
            }
        }
    }
}

mod scalar {
    use super::*;

    pub fn pack_24(dst: &mut [u8], src: &[u8], sample_count: usize, align: S24Align) -> usize {
        let n = sample_count.min(src.len() / 4).min(dst.len() / 3);
        let offset = match align {
            S24Align::Lsb => 0,
            S24Align::Msb => 1,
        };
        for i in 0..n {
            let s = &src[i * 4 + offset..i * 4 + offset + 3];
            dst[i * 3..i * 3 + 3].copy_from_slice(s);
        }
        n * 3
    }

    pub fn widen_16_to_32(dst: &mut [u8], src: &[u8], sample_count: usize) -> usize {
        let n = sample_count.min(src.len() / 2).min(dst.len() / 4);
        for i in 0..n {
            let lsb = src[i * 2];
            let msb = src[i * 2 + 1];
            dst[i * 4] = 0;
            dst[i * 4 + 1] = 0;
            dst[i * 4 + 2] = lsb;
            dst[i * 4 + 3] = msb;
        }
        n * 4
    }

    pub fn widen_16_to_24(dst: &mut [u8], src: &[u8], sample_count: usize) -> usize {
        let n = sample_count.min(src.len() / 2).min(dst.len() / 3);
        for i in 0..n {
            let lsb = src[i * 2];
            let msb = src[i * 2 + 1];
            dst[i * 3] = 0;
            dst[i * 3 + 1] = lsb;
            dst[i * 3 + 2] = msb;
        }
        n * 3
    }

    pub fn dsd_planar_to_interleaved(
        dst: &mut [u8],
        src: &[u8],
        channels: usize,
        group_count: usize,
        mode: DsdConversionMode,
    ) -> usize {
        if channels == 0 {
            return 0;
        }
        let max_groups = (src.len() / 4 / channels).min(dst.len() / 4 / channels);
        let n = group_count.min(max_groups);
        for g in 0..n {
            for ch in 0..channels {
                let src_off = (ch * group_count + g) * 4;
                let dst_off = (g * channels + ch) * 4;
                let mut group = [0u8; 4];
                group.copy_from_slice(&src[src_off..src_off + 4]);
                apply_dsd_group(&mut group, mode);
                dst[dst_off..dst_off + 4].copy_from_slice(&group);
            }
        }
        n * channels * 4
    }
}
