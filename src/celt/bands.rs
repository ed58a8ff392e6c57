//! Band energy normalization and the recursive band quantizer.
//!
//! Everything in here runs identically in the encoder and the decoder; the
//! `encode` flag only selects whether symbols are written to or read from
//! the range coder.
//!
//! Upstream C: `celt/bands.c`

use log::{debug, trace};

use crate::celt::entcode::{celt_sudiv, celt_udiv, ec_ctx, ec_ilog, ec_tell_frac, BITRES};
use crate::celt::entdec::{ec_dec_bit_logp, ec_dec_bits, ec_dec_uint, ec_dec_update, ec_decode};
use crate::celt::entenc::{ec_enc_bit_logp, ec_enc_bits, ec_enc_uint, ec_encode};
use crate::celt::fixed_generic::{
    celt_ener, celt_norm, celt_sig, opus_val16, opus_val32, ADD16, ADD32, DB_SHIFT, DIV32_16,
    EPSILON, EXTEND32, EXTRACT16, FRAC_MUL16, HALF32, IMAX, IMIN, MAC16_16, MAX16, MAX32, MIN16,
    MIN32, MULT16_16, MULT16_16_P15, MULT16_16_Q14, MULT16_16_Q15, MULT16_32_Q15, NEG16,
    NORM_SCALING, PSHR32, Q15ONE, SHL16, SHL32, SHR16, SHR32, SUB16, SUB32, VSHR32,
};
use crate::celt::mathops::{
    celt_exp2, celt_exp2_frac, celt_ilog2, celt_maxabs32, celt_rcp, celt_rsqrt_norm, celt_sqrt,
    celt_zlog2, isqrt32,
};
use crate::celt::modes::OpusCustomMode;
use crate::celt::pitch::dual_inner_prod;
use crate::celt::quant_bands::eMean;
use crate::celt::rate::{
    bits2pulses, get_pulses, pulses2bits, QTHETA_OFFSET, QTHETA_OFFSET_TWOPHASE,
};
use crate::celt::vq::{alg_quant, alg_unquant, renormalise_vector, stereo_itheta};

pub const SPREAD_NONE: i32 = 0;
pub const SPREAD_LIGHT: i32 = 1;
pub const SPREAD_NORMAL: i32 = 2;
pub const SPREAD_AGGRESSIVE: i32 = 3;

/// Widest band (in coefficients) the standard mode can produce: 22 bins at LM=3.
const MAX_BAND_SIZE: usize = 176;
/// Both channels' folding history, up to the start of the last band.
const MAX_NORM: usize = 2 * 8 * 78;

/// Per-frame state threaded through the whole recursion.
///
/// The range coder is passed separately so the struct stays `Copy`.
///
/// Upstream C: celt/bands.c:struct band_ctx
#[derive(Copy, Clone)]
struct band_ctx<'a> {
    encode: i32,
    resynth: i32,
    m: &'a OpusCustomMode,
    i: i32,
    intensity: i32,
    spread: i32,
    tf_change: i32,
    remaining_bits: i32,
    bandE: &'a [celt_ener],
    seed: u32,
}

/// Upstream C: celt/bands.c:struct split_ctx
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct split_ctx {
    inv: i32,
    imid: i32,
    iside: i32,
    delta: i32,
    itheta: i32,
    qalloc: i32,
}

/// Picks the index of the first threshold above `val`, sticking to `prev`
/// while `val` stays within the hysteresis margin around its edges.
///
/// Upstream C: celt/bands.c:hysteresis_decision
pub fn hysteresis_decision(
    val: opus_val16,
    thresholds: &[opus_val16],
    hysteresis: &[opus_val16],
    prev: i32,
) -> i32 {
    let N = thresholds.len();
    let mut i = thresholds.iter().position(|&t| val < t).unwrap_or(N) as i32;
    let p = prev as usize;
    if i > prev && (val as i32) < thresholds[p] as i32 + hysteresis[p] as i32 {
        i = prev;
    }
    if i < prev && val as i32 > thresholds[p - 1] as i32 - hysteresis[p - 1] as i32 {
        i = prev;
    }
    i
}

/// Upstream C: celt/bands.c:celt_lcg_rand
#[inline]
pub fn celt_lcg_rand(seed: u32) -> u32 {
    (1664525_u32).wrapping_mul(seed).wrapping_add(1013904223)
}

/// Cosine of `x * pi / 32768` in Q15, bit-exact on every platform.
///
/// Upstream C: celt/bands.c:bitexact_cos
#[inline]
pub fn bitexact_cos(x: i16) -> i16 {
    let tmp = (4096 + x as i32 * x as i32) >> 13;
    debug_assert!(tmp <= 32767);
    let x2 = tmp as i16 as i32;
    let x2 = ((32767 - x2) + FRAC_MUL16(x2, -7651 + FRAC_MUL16(x2, 8277 + FRAC_MUL16(-626, x2))))
        as i16;
    debug_assert!(x2 <= 32766);
    1 + x2
}

/// `log2(isin / icos)` in Q11.
///
/// Upstream C: celt/bands.c:bitexact_log2tan
#[inline]
pub fn bitexact_log2tan(mut isin: i32, mut icos: i32) -> i32 {
    let lc = ec_ilog(icos as u32);
    let ls = ec_ilog(isin as u32);
    icos <<= 15 - lc;
    isin <<= 15 - ls;
    (ls - lc) * (1 << 11) + FRAC_MUL16(isin, FRAC_MUL16(isin, -2597) + 7932)
        - FRAC_MUL16(icos, FRAC_MUL16(icos, -2597) + 7932)
}

/// Computes the amplitude (square root of the energy) of every band.
///
/// `X` holds `C` channels of `shortMdctSize << LM` coefficients each; the
/// result is laid out as `bandE[i + c * nbEBands]`.
///
/// Upstream C: celt/bands.c:compute_band_energies
pub fn compute_band_energies(
    m: &OpusCustomMode,
    X: &[celt_sig],
    bandE: &mut [celt_ener],
    end: usize,
    C: usize,
    LM: i32,
) {
    let eBands = m.eBands;
    let nb = m.nbEBands;
    let N = (m.shortMdctSize << LM) as usize;
    for c in 0..C {
        for i in 0..end {
            let lo = c * N + ((eBands[i] as usize) << LM);
            let hi = c * N + ((eBands[i + 1] as usize) << LM);
            let x = &X[lo..hi];
            let maxval = celt_maxabs32(x);
            bandE[i + c * nb] = if maxval > 0 {
                let shift = celt_ilog2(maxval) - 14 + (((m.logN[i] as i32 >> BITRES) + LM + 1) >> 1);
                let sum = x.iter().fold(0, |sum, &v| {
                    let t = EXTRACT16(VSHR32(v, shift));
                    MAC16_16(sum, t, t)
                });
                // The floor keeps the normalized band strictly below unit norm.
                ADD32(EPSILON, VSHR32(celt_sqrt(sum), -shift))
            } else {
                EPSILON
            };
        }
    }
}

/// Scales every band of `freq` to unit norm (Q14) using `bandE`.
///
/// Upstream C: celt/bands.c:normalise_bands
pub fn normalise_bands(
    m: &OpusCustomMode,
    freq: &[celt_sig],
    X: &mut [celt_norm],
    bandE: &[celt_ener],
    end: usize,
    C: usize,
    M: i32,
) {
    let eBands = m.eBands;
    let nb = m.nbEBands;
    let N = (M * m.shortMdctSize) as usize;
    let M = M as usize;
    for c in 0..C {
        for i in 0..end {
            let shift = celt_zlog2(bandE[i + c * nb]) - 13;
            let E = VSHR32(bandE[i + c * nb], shift);
            let g = EXTRACT16(celt_rcp(SHL32(E, 3)));
            for j in c * N + M * eBands[i] as usize..c * N + M * eBands[i + 1] as usize {
                X[j] = MULT16_16_Q15(VSHR32(freq[j], shift - 1) as opus_val16, g);
            }
        }
    }
}

/// Applies the decoded log-energies to one channel of unit-norm bands,
/// producing MDCT coefficients.
///
/// Coefficients below band `start`, from the coded bandwidth (or
/// `N / downsample`) up, and the whole frame when `silence` is set are
/// zeroed.
///
/// Upstream C: celt/bands.c:denormalise_bands
pub fn denormalise_bands(
    m: &OpusCustomMode,
    X: &[celt_norm],
    freq: &mut [celt_sig],
    bandLogE: &[opus_val16],
    mut start: usize,
    mut end: usize,
    M: i32,
    downsample: i32,
    silence: bool,
) {
    let eBands = m.eBands;
    let N = (M * m.shortMdctSize) as usize;
    let M = M as usize;
    let mut bound = M * eBands[end] as usize;
    if downsample != 1 {
        bound = bound.min(N / downsample as usize);
    }
    if silence {
        bound = 0;
        start = 0;
        end = 0;
    }
    debug_assert!(start <= end);
    freq[..M * eBands[start] as usize].fill(0);
    for i in start..end {
        let lo = M * eBands[i] as usize;
        let hi = M * eBands[i + 1] as usize;
        let lg = ADD16(bandLogE[i], eMean(i));
        // Integer part of the log energy.
        let mut shift = 16 - (lg as i32 >> DB_SHIFT);
        let mut g: opus_val16 = if shift > 31 {
            shift = 0;
            0
        } else {
            celt_exp2_frac(lg & ((1 << DB_SHIFT) - 1))
        };
        let x = &X[lo..hi];
        let f = &mut freq[lo..hi];
        if shift < 0 {
            // Only reachable with a corrupted stream: cap the gain so the
            // product cannot overflow.
            if shift < -2 {
                g = 32767;
                shift = -2;
            }
            for (f, &x) in f.iter_mut().zip(x) {
                *f = SHL32(MULT16_16(x, g), -shift);
            }
        } else {
            for (f, &x) in f.iter_mut().zip(x) {
                *f = SHR32(MULT16_16(x, g), shift);
            }
        }
    }
    freq[bound..N].fill(0);
}

/// Injects noise into short blocks that received no pulses so transients
/// do not collapse to silence.
///
/// `X_` holds `C` channels of `size` coefficients. `logE`, `prev1logE` and
/// `prev2logE` are the current and two previous frames' band log-energies
/// (both channels' worth, `2 * nbEBands` entries for the history).
///
/// Upstream C: celt/bands.c:anti_collapse
pub fn anti_collapse(
    m: &OpusCustomMode,
    X_: &mut [celt_norm],
    collapse_masks: &[u8],
    LM: i32,
    C: usize,
    size: usize,
    start: usize,
    end: usize,
    logE: &[opus_val16],
    prev1logE: &[opus_val16],
    prev2logE: &[opus_val16],
    pulses: &[i32],
    mut seed: u32,
) {
    let eBands = m.eBands;
    let nb = m.nbEBands;
    for i in start..end {
        let N0 = (eBands[i + 1] - eBands[i]) as i32;
        debug_assert!(pulses[i] >= 0);
        // Depth in 1/8 bits.
        let depth = (celt_udiv((1 + pulses[i]) as u32, N0 as u32) >> LM) as i32;
        let thresh32 = SHR32(celt_exp2(NEG16(SHL16(depth as opus_val16, 10 - BITRES))), 1);
        let thresh = MULT16_32_Q15(16384, MIN32(32767, thresh32)) as opus_val16;
        let t = N0 << LM;
        let shift = celt_ilog2(t) >> 1;
        let sqrt_1 = celt_rsqrt_norm(SHL32(t, (7 - shift) << 1));

        for c in 0..C {
            let mut prev1 = prev1logE[c * nb + i];
            let mut prev2 = prev2logE[c * nb + i];
            if C == 1 {
                prev1 = MAX16(prev1, prev1logE[nb + i]);
                prev2 = MAX16(prev2, prev2logE[nb + i]);
            }
            let Ediff = MAX32(
                0,
                EXTEND32(logE[c * nb + i]) - EXTEND32(MIN16(prev1, prev2)),
            );
            let mut r: opus_val16 = if Ediff < 16384 {
                let r32 = SHR32(celt_exp2(-(Ediff as opus_val16)), 1);
                2 * MIN32(16383, r32) as opus_val16
            } else {
                0
            };
            if LM == 3 {
                r = MULT16_16_Q14(23170, MIN16(23169, r));
            }
            r = SHR16(MIN16(thresh, r), 1);
            r = SHR32(MULT16_16_Q15(sqrt_1, r) as opus_val32, shift) as opus_val16;

            let base = c * size + ((eBands[i] as usize) << LM);
            let mut renormalize = false;
            for k in 0..1usize << LM {
                if collapse_masks[i * C + c] as u32 & (1 << k) == 0 {
                    for j in 0..N0 as usize {
                        seed = celt_lcg_rand(seed);
                        X_[base + k + (j << LM)] = if seed & 0x8000 != 0 { r } else { -r };
                    }
                    renormalize = true;
                }
            }
            if renormalize {
                trace!("anti_collapse: band {} channel {} refilled, r={}", i, c, r);
                renormalise_vector(&mut X_[base..], N0 << LM, Q15ONE);
            }
        }
    }
}

/// Folds `Y` into `X` with weights from the two channels' band energies.
/// The side is not coded, so `Y` is left untouched.
///
/// Upstream C: celt/bands.c:intensity_stereo
fn intensity_stereo(
    m: &OpusCustomMode,
    X: &mut [celt_norm],
    Y: &[celt_norm],
    bandE: &[celt_ener],
    bandID: usize,
    N: usize,
) {
    let nb = m.nbEBands;
    let shift = celt_zlog2(MAX32(bandE[bandID], bandE[bandID + nb])) - 13;
    let left = VSHR32(bandE[bandID], shift) as opus_val16;
    let right = VSHR32(bandE[bandID + nb], shift) as opus_val16;
    let norm = (EPSILON
        + celt_sqrt(EPSILON + MULT16_16(left, left) + MULT16_16(right, right)))
        as opus_val16;
    let a1 = DIV32_16(SHL32(EXTEND32(left), 14), norm);
    let a2 = DIV32_16(SHL32(EXTEND32(right), 14), norm);
    for (x, &r) in X[..N].iter_mut().zip(&Y[..N]) {
        let l = *x;
        *x = EXTRACT16(SHR32(MAC16_16(MULT16_16(a1, l), a2, r), 14));
    }
}

/// Rotates L/R into M/S by 45 degrees.
///
/// Upstream C: celt/bands.c:stereo_split
fn stereo_split(X: &mut [celt_norm], Y: &mut [celt_norm], N: usize) {
    for (x, y) in X[..N].iter_mut().zip(&mut Y[..N]) {
        let l = MULT16_16(23170, *x);
        let r = MULT16_16(23170, *y);
        *x = EXTRACT16(SHR32(ADD32(l, r), 15));
        *y = EXTRACT16(SHR32(SUB32(r, l), 15));
    }
}

/// Turns the decoded mid (`X`, scaled by `mid`) and side (`Y`) back into
/// unit-norm left and right.
///
/// Upstream C: celt/bands.c:stereo_merge
fn stereo_merge(X: &mut [celt_norm], Y: &mut [celt_norm], mid: opus_val16, N: usize) {
    // |X+Y|^2 and |X-Y|^2 as |X|^2 + |Y|^2 +/- 2 sum(xy)
    let (xp, side) = dual_inner_prod(Y, X, Y, N);
    let xp = MULT16_32_Q15(mid, xp);
    // mid and side are Q15 here, X and Y are Q14.
    let mid2 = SHR16(mid, 1);
    let El = MULT16_16(mid2, mid2).wrapping_add(side).wrapping_sub(xp.wrapping_mul(2));
    let Er = MULT16_16(mid2, mid2).wrapping_add(side).wrapping_add(xp.wrapping_mul(2));
    // 6e-4 in Q28
    if Er < 161061 || El < 161061 {
        Y[..N].copy_from_slice(&X[..N]);
        return;
    }

    let mut kl = celt_ilog2(El) >> 1;
    let mut kr = celt_ilog2(Er) >> 1;
    let lgain = celt_rsqrt_norm(VSHR32(El, (kl - 7) << 1));
    let rgain = celt_rsqrt_norm(VSHR32(Er, (kr - 7) << 1));
    kl = kl.max(7);
    kr = kr.max(7);

    for (x, y) in X[..N].iter_mut().zip(&mut Y[..N]) {
        // Apply mid scaling (side is already scaled).
        let l = MULT16_16_P15(mid, *x);
        let r = *y;
        *x = EXTRACT16(PSHR32(MULT16_16(lgain, SUB16(l, r)), kl + 1));
        *y = EXTRACT16(PSHR32(MULT16_16(rgain, ADD16(l, r)), kr + 1));
    }
}

/// Decides how aggressively pulses should be spread in the current frame.
///
/// Builds a rough CDF of `|x|` in each band wider than 8 bins, averages it
/// over time through `average` and applies hysteresis against
/// `last_decision`. When `update_hf` is set the high-band statistics also
/// update `hf_average` and `tapset_decision`. Returns one of the `SPREAD_*`
/// values.
///
/// Upstream C: celt/bands.c:spreading_decision
pub fn spreading_decision(
    m: &OpusCustomMode,
    X: &[celt_norm],
    average: &mut i32,
    last_decision: i32,
    hf_average: &mut i32,
    tapset_decision: &mut i32,
    update_hf: bool,
    end: usize,
    C: usize,
    M: i32,
) -> i32 {
    let eBands = m.eBands;
    let nb = m.nbEBands;
    let N0 = (M * m.shortMdctSize) as usize;
    let mut sum: i32 = 0;
    let mut nbBands: i32 = 0;
    let mut hf_sum: i32 = 0;

    debug_assert!(end > 0);

    if M * (eBands[end] - eBands[end - 1]) as i32 <= 8 {
        return SPREAD_NONE;
    }
    for c in 0..C {
        for i in 0..end {
            let N = M * (eBands[i + 1] - eBands[i]) as i32;
            if N <= 8 {
                continue;
            }
            let lo = c * N0 + M as usize * eBands[i] as usize;
            let mut tcount = [0i32; 3];
            for &x in &X[lo..lo + N as usize] {
                // Q13
                let x2N = MULT16_16(MULT16_16_Q15(x, x), N as opus_val16);
                if x2N < 2048 {
                    tcount[0] += 1;
                }
                if x2N < 512 {
                    tcount[1] += 1;
                }
                if x2N < 128 {
                    tcount[2] += 1;
                }
            }
            // Only the four last bands (8 kHz and up).
            if i > nb - 4 {
                hf_sum += celt_udiv((32 * (tcount[1] + tcount[0])) as u32, N as u32) as i32;
            }
            let tmp = (2 * tcount[2] >= N) as i32
                + (2 * tcount[1] >= N) as i32
                + (2 * tcount[0] >= N) as i32;
            sum += tmp * 256;
            nbBands += 1;
        }
    }

    if update_hf {
        if hf_sum != 0 {
            hf_sum = celt_udiv(hf_sum as u32, (C as i32 * (4 - nb as i32 + end as i32)) as u32)
                as i32;
        }
        *hf_average = (*hf_average + hf_sum) >> 1;
        hf_sum = *hf_average;
        if *tapset_decision == 2 {
            hf_sum += 4;
        } else if *tapset_decision == 0 {
            hf_sum -= 4;
        }
        *tapset_decision = if hf_sum > 22 {
            2
        } else if hf_sum > 18 {
            1
        } else {
            0
        };
    }

    debug_assert!(nbBands > 0);
    debug_assert!(sum >= 0);
    sum = celt_udiv(sum as u32, nbBands as u32) as i32;
    // Recursive averaging
    sum = (sum + *average) >> 1;
    *average = sum;
    // Hysteresis
    sum = (3 * sum + (((3 - last_decision) << 7) + 64) + 2) >> 2;
    let decision = if sum < 80 {
        SPREAD_AGGRESSIVE
    } else if sum < 256 {
        SPREAD_NORMAL
    } else if sum < 384 {
        SPREAD_LIGHT
    } else {
        SPREAD_NONE
    };
    trace!(
        "spreading_decision: sum={} hf_average={} tapset={} -> {}",
        sum,
        *hf_average,
        *tapset_decision,
        decision
    );
    decision
}

/// Sub-block orderings for the Hadamard transform, indexed from `stride - 2`.
static ordery_table: [i32; 30] = [
    1, 0, 3, 0, 2, 1, 7, 0, 4, 3, 6, 1, 5, 2, 15, 0, 8, 7, 12, 3, 11, 4, 14, 1, 9, 6, 13, 2, 10, 5,
];

/// Regroups `stride` interleaved sub-blocks of `N0` bins so each sub-block
/// is contiguous.
///
/// Upstream C: celt/bands.c:deinterleave_hadamard
pub fn deinterleave_hadamard(X: &mut [celt_norm], N0: i32, stride: i32, hadamard: i32) {
    debug_assert!(stride > 0);
    let N = (N0 * stride) as usize;
    let (n0, stride) = (N0 as usize, stride as usize);
    let mut tmp = [0 as celt_norm; MAX_BAND_SIZE];
    for i in 0..stride {
        let dst = if hadamard != 0 {
            ordery_table[stride - 2 + i] as usize * n0
        } else {
            i * n0
        };
        for j in 0..n0 {
            tmp[dst + j] = X[j * stride + i];
        }
    }
    X[..N].copy_from_slice(&tmp[..N]);
}

/// Inverse of [`deinterleave_hadamard`].
///
/// Upstream C: celt/bands.c:interleave_hadamard
pub fn interleave_hadamard(X: &mut [celt_norm], N0: i32, stride: i32, hadamard: i32) {
    let N = (N0 * stride) as usize;
    let (n0, stride) = (N0 as usize, stride as usize);
    let mut tmp = [0 as celt_norm; MAX_BAND_SIZE];
    for i in 0..stride {
        let src = if hadamard != 0 {
            ordery_table[stride - 2 + i] as usize * n0
        } else {
            i * n0
        };
        for j in 0..n0 {
            tmp[j * stride + i] = X[src + j];
        }
    }
    X[..N].copy_from_slice(&tmp[..N]);
}

/// One level of the orthonormal Haar transform across pairs `stride` apart.
///
/// Upstream C: celt/bands.c:haar1
pub fn haar1(X: &mut [celt_norm], N0: i32, stride: i32) {
    let stride = stride as usize;
    let half = (N0 >> 1) as usize;
    for i in 0..stride {
        for j in 0..half {
            let idx0 = stride * 2 * j + i;
            let idx1 = idx0 + stride;
            let tmp1 = MULT16_16(23170, X[idx0]);
            let tmp2 = MULT16_16(23170, X[idx1]);
            X[idx0] = EXTRACT16(PSHR32(ADD32(tmp1, tmp2), 15));
            X[idx1] = EXTRACT16(PSHR32(SUB32(tmp1, tmp2), 15));
        }
    }
}

/// Resolution of the split angle: how many steps `qn` (even, at most 256)
/// the budget `b` can pay for.
///
/// Upstream C: celt/bands.c:compute_qn
fn compute_qn(N: i32, b: i32, offset: i32, pulse_cap: i32, stereo: i32) -> i32 {
    const EXP2_TABLE8: [i16; 8] = [16384, 17866, 19483, 21247, 23170, 25267, 27554, 30048];
    let mut N2 = 2 * N - 1;
    if stereo != 0 && N == 2 {
        N2 -= 1;
    }
    // The upper limit leaves enough bits for at least one pulse in the side
    // of a stereo split with itheta==16384; the side is never folded.
    let mut qb = celt_sudiv(b + N2 * offset, N2);
    qb = IMIN(b - pulse_cap - (4 << BITRES), qb);
    qb = IMIN(8 << BITRES, qb);
    let qn = if qb < (1 << BITRES >> 1) {
        1
    } else {
        let qn = EXP2_TABLE8[(qb & 0x7) as usize] as i32 >> (14 - (qb >> BITRES));
        ((qn + 1) >> 1) << 1
    };
    debug_assert!(qn <= 256);
    qn
}

/// Writes or reads a quantized angle `0..=qn` with the distribution that
/// matches the split kind, returning the coded value.
///
/// * stereo with `N > 2`: a step, three times likelier up to `qn / 2`;
/// * time splits (`B0 > 1`) and two-bin stereo: uniform;
/// * otherwise: triangular, peaking at `qn / 2`.
///
/// Upstream C: celt/bands.c:compute_theta
fn code_theta(ec: &mut ec_ctx, encode: i32, itheta: i32, qn: i32, N: i32, B0: i32, stereo: i32) -> i32 {
    if stereo != 0 && N > 2 {
        let p0 = 3;
        let x0 = qn / 2;
        let ft = (p0 * (x0 + 1) + x0) as u32;
        let bounds = |x: i32| {
            if x <= x0 {
                ((p0 * x) as u32, (p0 * (x + 1)) as u32)
            } else {
                ((x - 1 - x0 + (x0 + 1) * p0) as u32, (x - x0 + (x0 + 1) * p0) as u32)
            }
        };
        if encode != 0 {
            let (fl, fh) = bounds(itheta);
            ec_encode(ec, fl, fh, ft);
            itheta
        } else {
            let fs = ec_decode(ec, ft) as i32;
            let x = if fs < (x0 + 1) * p0 {
                fs / p0
            } else {
                x0 + 1 + (fs - (x0 + 1) * p0)
            };
            let (fl, fh) = bounds(x);
            ec_dec_update(ec, fl, fh, ft);
            x
        }
    } else if B0 > 1 || stereo != 0 {
        if encode != 0 {
            ec_enc_uint(ec, itheta as u32, (qn + 1) as u32);
            itheta
        } else {
            ec_dec_uint(ec, (qn + 1) as u32) as i32
        }
    } else {
        let ft = ((qn >> 1) + 1) * ((qn >> 1) + 1);
        if encode != 0 {
            let (fl, fs) = if itheta <= qn >> 1 {
                ((itheta * (itheta + 1)) >> 1, itheta + 1)
            } else {
                (ft - (((qn + 1 - itheta) * (qn + 2 - itheta)) >> 1), qn + 1 - itheta)
            };
            ec_encode(ec, fl as u32, (fl + fs) as u32, ft as u32);
            itheta
        } else {
            let fm = ec_decode(ec, ft as u32) as i32;
            let (x, fl, fs) = if fm < ((qn >> 1) * ((qn >> 1) + 1)) >> 1 {
                let x = ((isqrt32(8 * fm as u32 + 1) - 1) >> 1) as i32;
                (x, (x * (x + 1)) >> 1, x + 1)
            } else {
                let x = ((2 * (qn + 1)) as u32 - isqrt32(8 * (ft - fm - 1) as u32 + 1)) as i32 >> 1;
                (x, ft - (((qn + 1 - x) * (qn + 2 - x)) >> 1), qn + 1 - x)
            };
            ec_dec_update(ec, fl as u32, (fl + fs) as u32, ft as u32);
            x
        }
    }
}

/// Chooses, codes and applies the split angle between the two halves `X`
/// and `Y` (the two channels for `stereo`, otherwise the two halves of one
/// band). `b` is reduced by the bits spent and `fill` is narrowed when one
/// half gets all the energy.
///
/// Upstream C: celt/bands.c:compute_theta
fn compute_theta(
    ctx: &mut band_ctx,
    X: &mut [celt_norm],
    Y: &mut [celt_norm],
    N: i32,
    b: &mut i32,
    B: i32,
    B0: i32,
    LM: i32,
    stereo: i32,
    fill: &mut i32,
    ec: &mut ec_ctx,
) -> split_ctx {
    let encode = ctx.encode;
    let m = ctx.m;
    let i = ctx.i;
    let mut itheta: i32 = 0;
    let mut inv: i32 = 0;

    let pulse_cap = m.logN[i as usize] as i32 + LM * (1 << BITRES);
    let offset = (pulse_cap >> 1)
        - if stereo != 0 && N == 2 {
            QTHETA_OFFSET_TWOPHASE
        } else {
            QTHETA_OFFSET
        };
    let mut qn = compute_qn(N, *b, offset, pulse_cap, stereo);
    if stereo != 0 && i >= ctx.intensity {
        qn = 1;
    }
    if encode != 0 {
        // With unit-norm, orthogonal mid and side this one angle is
        // enough to rescale both.
        itheta = stereo_itheta(X, Y, stereo != 0, N);
    }
    let tell = ec_tell_frac(ec) as i32;
    if qn != 1 {
        if encode != 0 {
            itheta = (itheta * qn + 8192) >> 14;
        }
        itheta = code_theta(ec, encode, itheta, qn, N, B0, stereo);
        debug_assert!(itheta >= 0);
        itheta = celt_udiv((itheta * 16384) as u32, qn as u32) as i32;
        if encode != 0 && stereo != 0 {
            if itheta == 0 {
                intensity_stereo(m, X, Y, ctx.bandE, i as usize, N as usize);
            } else {
                stereo_split(X, Y, N as usize);
            }
        }
    } else if stereo != 0 {
        if encode != 0 {
            inv = (itheta > 8192) as i32;
            if inv != 0 {
                for y in &mut Y[..N as usize] {
                    *y = NEG16(*y);
                }
            }
            intensity_stereo(m, X, Y, ctx.bandE, i as usize, N as usize);
        }
        if *b > 2 << BITRES && ctx.remaining_bits > 2 << BITRES {
            if encode != 0 {
                ec_enc_bit_logp(ec, inv, 2);
            } else {
                inv = ec_dec_bit_logp(ec, 2);
            }
        } else {
            inv = 0;
        }
        itheta = 0;
    }
    let qalloc = ec_tell_frac(ec) as i32 - tell;
    *b -= qalloc;

    let (imid, iside, delta) = if itheta == 0 {
        *fill &= (1 << B) - 1;
        (32767, 0, -16384)
    } else if itheta == 16384 {
        *fill &= ((1 << B) - 1) << B;
        (0, 32767, 16384)
    } else {
        let imid = bitexact_cos(itheta as i16) as i32;
        let iside = bitexact_cos((16384 - itheta) as i16) as i32;
        // Mid/side allocation that minimizes the squared error in the band.
        let delta = FRAC_MUL16((N - 1) << 7, bitexact_log2tan(iside, imid));
        (imid, iside, delta)
    };

    split_ctx {
        inv,
        imid,
        iside,
        delta,
        itheta,
        qalloc,
    }
}

/// Single-bin band: only the sign is coded, when the budget allows.
///
/// Upstream C: celt/bands.c:quant_band_n1
fn quant_band_n1(
    ctx: &mut band_ctx,
    X: &mut [celt_norm],
    Y: Option<&mut [celt_norm]>,
    lowband_out: Option<&mut [celt_norm]>,
    ec: &mut ec_ctx,
) -> u32 {
    let encode = ctx.encode;
    for x in std::iter::once(&mut *X).chain(Y) {
        let mut sign = 0;
        if ctx.remaining_bits >= 1 << BITRES {
            if encode != 0 {
                sign = (x[0] < 0) as u32;
                ec_enc_bits(ec, sign, 1);
            } else {
                sign = ec_dec_bits(ec, 1);
            }
            ctx.remaining_bits -= 1 << BITRES;
        }
        if ctx.resynth != 0 {
            x[0] = if sign != 0 { -NORM_SCALING } else { NORM_SCALING };
        }
    }
    if let Some(out) = lowband_out {
        out[0] = SHR16(X[0], 4);
    }
    1
}

/// Codes one mono partition, splitting it in two and recursing while the
/// budget exceeds what a single PVQ codeword can use. Returns the collapse
/// mask (one bit per sub-block that ended up with energy).
///
/// Upstream C: celt/bands.c:quant_partition
fn quant_partition(
    ctx: &mut band_ctx,
    X: &mut [celt_norm],
    mut N: i32,
    mut b: i32,
    mut B: i32,
    lowband: Option<&[celt_norm]>,
    mut LM: i32,
    gain: opus_val16,
    mut fill: i32,
    ec: &mut ec_ctx,
) -> u32 {
    let B0 = B;
    let encode = ctx.encode;
    let m = ctx.m;
    let i = ctx.i;
    let spread = ctx.spread;
    let mut cm: u32;

    let cache = &m.cache.bits[m.cache.index[((LM + 1) * m.nbEBands as i32 + i) as usize] as usize..];
    // Split when we need 1.5 more bits than the largest codebook provides.
    if LM != -1 && b > cache[cache[0] as usize] as i32 + 12 && N > 2 {
        N >>= 1;
        let n = N as usize;
        LM -= 1;
        if B == 1 {
            fill = (fill & 1) | (fill << 1);
        }
        B = (B + 1) >> 1;

        let (X, Y) = X.split_at_mut(n);
        let Y = &mut Y[..n];
        let sctx = compute_theta(ctx, X, Y, N, &mut b, B, B0, LM, 0, &mut fill, ec);
        let mid = sctx.imid as opus_val16;
        let side = sctx.iside as opus_val16;
        let itheta = sctx.itheta;
        let mut delta = sctx.delta;

        // Give more bits to low-energy MDCTs than they would otherwise deserve.
        if B0 > 1 && itheta & 0x3fff != 0 {
            if itheta > 8192 {
                // Rough approximation for pre-echo masking
                delta -= delta >> (4 - LM);
            } else {
                // Forward-masking slope of 1.5 dB per 10 ms
                delta = IMIN(0, delta + ((N << BITRES) >> (5 - LM)));
            }
        }
        let mut mbits = IMAX(0, IMIN(b, (b - delta) / 2));
        let mut sbits = b - mbits;
        ctx.remaining_bits -= sctx.qalloc;

        let next_lowband2 = lowband.map(|lb| &lb[n..]);
        let mut rebalance = ctx.remaining_bits;
        if mbits >= sbits {
            cm = quant_partition(ctx, X, N, mbits, B, lowband, LM, MULT16_16_P15(gain, mid), fill, ec);
            rebalance = mbits - (rebalance - ctx.remaining_bits);
            if rebalance > 3 << BITRES && itheta != 0 {
                sbits += rebalance - (3 << BITRES);
            }
            cm |= quant_partition(
                ctx,
                Y,
                N,
                sbits,
                B,
                next_lowband2,
                LM,
                MULT16_16_P15(gain, side),
                fill >> B,
                ec,
            ) << (B0 >> 1);
        } else {
            cm = quant_partition(
                ctx,
                Y,
                N,
                sbits,
                B,
                next_lowband2,
                LM,
                MULT16_16_P15(gain, side),
                fill >> B,
                ec,
            ) << (B0 >> 1);
            rebalance = sbits - (rebalance - ctx.remaining_bits);
            if rebalance > 3 << BITRES && itheta != 16384 {
                mbits += rebalance - (3 << BITRES);
            }
            cm |= quant_partition(ctx, X, N, mbits, B, lowband, LM, MULT16_16_P15(gain, mid), fill, ec);
        }
        return cm;
    }

    let n = N as usize;
    let mut q = bits2pulses(m, i, LM, b);
    let mut curr_bits = pulses2bits(m, i, LM, q);
    ctx.remaining_bits -= curr_bits;
    // Never bust the budget.
    while ctx.remaining_bits < 0 && q > 0 {
        ctx.remaining_bits += curr_bits;
        q -= 1;
        curr_bits = pulses2bits(m, i, LM, q);
        ctx.remaining_bits -= curr_bits;
    }
    if q != bits2pulses(m, i, LM, b) {
        trace!("band {}: pulses reduced to {} to fit the budget", i, q);
    }

    if q != 0 {
        let K = get_pulses(q);
        return if encode != 0 {
            alg_quant(&mut X[..n], N, K, spread, B, ec, gain, ctx.resynth != 0)
        } else {
            alg_unquant(&mut X[..n], N, K, spread, B, ec, gain)
        };
    }

    // No pulses: fill the band anyway.
    cm = 0;
    if ctx.resynth != 0 {
        let cm_mask = ((1u64 << B) - 1) as u32;
        fill &= cm_mask as i32;
        if fill == 0 {
            X[..n].fill(0);
        } else {
            match lowband {
                None => {
                    for x in &mut X[..n] {
                        ctx.seed = celt_lcg_rand(ctx.seed);
                        *x = (ctx.seed as i32 >> 20) as celt_norm;
                    }
                    cm = cm_mask;
                }
                Some(lb) => {
                    for (x, &l) in X[..n].iter_mut().zip(&lb[..n]) {
                        ctx.seed = celt_lcg_rand(ctx.seed);
                        // About 48 dB below the folding level, 1/256 in Q10.
                        let tmp: celt_norm = if ctx.seed & 0x8000 != 0 { 4 } else { -4 };
                        *x = ADD16(l, tmp);
                    }
                    cm = fill as u32;
                }
            }
            renormalise_vector(&mut X[..n], N, gain);
        }
    }
    cm
}

const BIT_INTERLEAVE_TABLE: [u8; 16] = [0, 1, 1, 1, 2, 3, 3, 3, 2, 3, 3, 3, 2, 3, 3, 3];

const BIT_DEINTERLEAVE_TABLE: [u8; 16] = [
    0x00, 0x03, 0x0C, 0x0F, 0x30, 0x33, 0x3C, 0x3F, 0xC0, 0xC3, 0xCC, 0xCF, 0xF0, 0xF3, 0xFC, 0xFF,
];

/// Codes one mono band (or one channel of a dual-stereo band), handling
/// the time/frequency resolution changes around the partition coder.
///
/// `lowband` is the folding source for this band; it is transformed in
/// place, so callers pass a private copy. When `lowband_out` is given it
/// receives the decoded band scaled for later folding.
///
/// Upstream C: celt/bands.c:quant_band
fn quant_band(
    ctx: &mut band_ctx,
    X: &mut [celt_norm],
    N: i32,
    b: i32,
    mut B: i32,
    mut lowband: Option<&mut [celt_norm]>,
    LM: i32,
    lowband_out: Option<&mut [celt_norm]>,
    gain: opus_val16,
    mut fill: i32,
    ec: &mut ec_ctx,
) -> u32 {
    let n = N as usize;
    let N0 = N;
    let mut B0 = B;
    let mut time_divide = 0;
    let mut recombine = 0;
    let longBlocks = (B0 == 1) as i32;
    let encode = ctx.encode;
    let mut tf_change = ctx.tf_change;

    let mut N_B = celt_udiv(N as u32, B as u32) as i32;

    if N == 1 {
        return quant_band_n1(ctx, X, None, lowband_out, ec);
    }

    if tf_change > 0 {
        recombine = tf_change;
    }

    // Band recombining to increase frequency resolution.
    for k in 0..recombine {
        if encode != 0 {
            haar1(&mut X[..n], N >> k, 1 << k);
        }
        if let Some(lb) = lowband.as_deref_mut() {
            haar1(&mut lb[..n], N >> k, 1 << k);
        }
        fill = BIT_INTERLEAVE_TABLE[(fill & 0xf) as usize] as i32
            | (BIT_INTERLEAVE_TABLE[((fill >> 4) & 0xf) as usize] as i32) << 2;
    }
    B >>= recombine;
    N_B <<= recombine;

    // Increasing the time resolution.
    while N_B & 1 == 0 && tf_change < 0 {
        if encode != 0 {
            haar1(&mut X[..n], N_B, B);
        }
        if let Some(lb) = lowband.as_deref_mut() {
            haar1(&mut lb[..n], N_B, B);
        }
        fill |= fill << B;
        B <<= 1;
        N_B >>= 1;
        time_divide += 1;
        tf_change += 1;
    }
    B0 = B;
    let N_B0 = N_B;

    // Reorganize the samples in time order instead of frequency order.
    if B0 > 1 {
        if encode != 0 {
            deinterleave_hadamard(&mut X[..n], N_B >> recombine, B0 << recombine, longBlocks);
        }
        if let Some(lb) = lowband.as_deref_mut() {
            deinterleave_hadamard(&mut lb[..n], N_B >> recombine, B0 << recombine, longBlocks);
        }
    }

    let mut cm = quant_partition(ctx, &mut X[..n], N, b, B, lowband.as_deref(), LM, gain, fill, ec);

    if ctx.resynth != 0 {
        if B0 > 1 {
            interleave_hadamard(&mut X[..n], N_B >> recombine, B0 << recombine, longBlocks);
        }

        N_B = N_B0;
        B = B0;
        for _ in 0..time_divide {
            B >>= 1;
            N_B <<= 1;
            cm |= cm >> B;
            haar1(&mut X[..n], N_B, B);
        }

        for k in 0..recombine {
            cm = BIT_DEINTERLEAVE_TABLE[(cm & 0xf) as usize] as u32;
            haar1(&mut X[..n], N0 >> k, 1 << k);
        }
        B <<= recombine;

        // Scale output for later folding.
        if let Some(out) = lowband_out {
            let scale = celt_sqrt(SHL32(EXTEND32(N0 as opus_val16), 22)) as opus_val16;
            for (o, &x) in out[..n].iter_mut().zip(&X[..n]) {
                *o = MULT16_16_Q15(scale, x);
            }
        }
        cm &= ((1u64 << B) - 1) as u32;
    }
    cm
}

/// Codes one joint-stereo band as a mid/side pair.
///
/// Upstream C: celt/bands.c:quant_band_stereo
fn quant_band_stereo(
    ctx: &mut band_ctx,
    X: &mut [celt_norm],
    Y: &mut [celt_norm],
    N: i32,
    mut b: i32,
    B: i32,
    lowband: Option<&mut [celt_norm]>,
    LM: i32,
    lowband_out: Option<&mut [celt_norm]>,
    mut fill: i32,
    ec: &mut ec_ctx,
) -> u32 {
    let n = N as usize;
    let encode = ctx.encode;
    let mut cm: u32;

    if N == 1 {
        return quant_band_n1(ctx, X, Some(Y), lowband_out, ec);
    }

    let orig_fill = fill;
    let sctx = compute_theta(ctx, &mut X[..n], &mut Y[..n], N, &mut b, B, B, LM, 1, &mut fill, ec);
    let mid = sctx.imid as opus_val16;
    let side = sctx.iside as opus_val16;
    let itheta = sctx.itheta;

    if N == 2 {
        // Mid and side are orthogonal, so for two bins the side is fully
        // determined by the mid up to one sign.
        let mut mbits = b;
        let mut sbits = 0;
        if itheta != 0 && itheta != 16384 {
            sbits = 1 << BITRES;
        }
        mbits -= sbits;
        let c = itheta > 8192;
        ctx.remaining_bits -= sctx.qalloc + sbits;

        let (x2, y2) = if c {
            (&mut *Y, &mut *X)
        } else {
            (&mut *X, &mut *Y)
        };
        let mut sign = 0;
        if sbits != 0 {
            if encode != 0 {
                sign = (MULT16_16(x2[0], y2[1]) - MULT16_16(x2[1], y2[0]) < 0) as u32;
                ec_enc_bits(ec, sign, 1);
            } else {
                sign = ec_dec_bits(ec, 1);
            }
        }
        let sign = 1 - 2 * sign as i32;
        // orig_fill: the side is folded too, but itheta==16384 cleared the
        // low bits of fill.
        cm = quant_band(ctx, x2, N, mbits, B, lowband, LM, lowband_out, Q15ONE, orig_fill, ec);
        // No split for N=2, so cm is 1 or 0 and never mixes channels.
        y2[0] = (-sign * x2[1] as i32) as celt_norm;
        y2[1] = (sign * x2[0] as i32) as celt_norm;
        if ctx.resynth != 0 {
            X[0] = MULT16_16_Q15(mid, X[0]);
            X[1] = MULT16_16_Q15(mid, X[1]);
            Y[0] = MULT16_16_Q15(side, Y[0]);
            Y[1] = MULT16_16_Q15(side, Y[1]);
            for j in 0..2 {
                let tmp = X[j];
                X[j] = SUB16(tmp, Y[j]);
                Y[j] = ADD16(tmp, Y[j]);
            }
        }
    } else {
        let mut mbits = IMAX(0, IMIN(b, (b - sctx.delta) / 2));
        let mut sbits = b - mbits;
        ctx.remaining_bits -= sctx.qalloc;

        // The mid is not scaled: later bands fold from the normalized mid.
        // The high bits of fill are always zero for a stereo split, so the
        // side never folds.
        let mut rebalance = ctx.remaining_bits;
        if mbits >= sbits {
            cm = quant_band(ctx, &mut X[..n], N, mbits, B, lowband, LM, lowband_out, Q15ONE, fill, ec);
            rebalance = mbits - (rebalance - ctx.remaining_bits);
            if rebalance > 3 << BITRES && itheta != 0 {
                sbits += rebalance - (3 << BITRES);
            }
            cm |= quant_band(ctx, &mut Y[..n], N, sbits, B, None, LM, None, side, fill >> B, ec);
        } else {
            cm = quant_band(ctx, &mut Y[..n], N, sbits, B, None, LM, None, side, fill >> B, ec);
            rebalance = sbits - (rebalance - ctx.remaining_bits);
            if rebalance > 3 << BITRES && itheta != 16384 {
                mbits += rebalance - (3 << BITRES);
            }
            cm |= quant_band(ctx, &mut X[..n], N, mbits, B, lowband, LM, lowband_out, Q15ONE, fill, ec);
        }
    }

    if ctx.resynth != 0 {
        if N != 2 {
            stereo_merge(X, Y, mid, n);
        }
        if sctx.inv != 0 {
            for y in &mut Y[..n] {
                *y = NEG16(*y);
            }
        }
    }
    cm
}

/// Codes (or decodes) the fine structure of bands `start..end`.
///
/// `X_` and `Y_` are the normalized spectra (`Y_` only for stereo), laid
/// out with `M * eBands[i]` offsets. `pulses` is the per-band allocation in
/// 1/8 bits, `tf_res` the per-band time/frequency change, `total_bits` the
/// frame budget in 1/8 bits and `balance` the carried-over surplus.
/// `collapse_masks[i * C + c]` receives the per-band sub-block occupancy
/// and `seed` the folding noise state. The decoder always resynthesizes;
/// the encoder does when `resynth` is set.
///
/// Upstream C: celt/bands.c:quant_all_bands
pub fn quant_all_bands(
    encode: i32,
    m: &OpusCustomMode,
    start: i32,
    end: i32,
    X_: &mut [celt_norm],
    Y_: Option<&mut [celt_norm]>,
    collapse_masks: &mut [u8],
    bandE: &[celt_ener],
    pulses: &[i32],
    shortBlocks: i32,
    spread: i32,
    mut dual_stereo: i32,
    intensity: i32,
    tf_res: &[i32],
    total_bits: i32,
    mut balance: i32,
    ec: &mut ec_ctx,
    LM: i32,
    codedBands: i32,
    seed: &mut u32,
    resynth: i32,
) {
    let eBands = m.eBands;
    let M: i32 = 1 << LM;
    let B: i32 = if shortBlocks != 0 { M } else { 1 };
    let C: usize = if Y_.is_some() { 2 } else { 1 };
    let resynth = (encode == 0 || resynth != 0) as i32;
    let norm_offset = M * eBands[start as usize] as i32;

    debug_assert!(start <= end && end as usize <= m.nbEBands);
    // The last band never feeds a later one, so its history is not kept.
    let norm_size = (M * eBands[m.nbEBands - 1] as i32 - norm_offset) as usize;
    debug_assert!(C * norm_size <= MAX_NORM);
    let mut norm = [0 as celt_norm; MAX_NORM];
    let (norm1, norm2) = norm.split_at_mut(norm_size);

    let mut dummy_x = [0 as celt_norm; MAX_BAND_SIZE];
    let mut dummy_y = [0 as celt_norm; MAX_BAND_SIZE];
    let mut lowband_x = [0 as celt_norm; MAX_BAND_SIZE];
    let mut lowband_y = [0 as celt_norm; MAX_BAND_SIZE];

    let mut Y_ = Y_;
    let mut lowband_offset: i32 = 0;
    let mut update_lowband = true;
    let tell_start = ec_tell_frac(ec);

    let mut ctx = band_ctx {
        encode,
        resynth,
        m,
        i: 0,
        intensity,
        spread,
        tf_change: 0,
        remaining_bits: 0,
        bandE,
        seed: *seed,
    };

    debug!(
        "quant_all_bands: {} bands {}..{} C={} LM={} total_bits={} balance={}",
        if encode != 0 { "encoding" } else { "decoding" },
        start,
        end,
        C,
        LM,
        total_bits,
        balance
    );

    for i in start..end {
        let iu = i as usize;
        ctx.i = i;
        let last = i == end - 1;
        let band_lo = (M * eBands[iu] as i32) as usize;
        let N = M * eBands[iu + 1] as i32 - M * eBands[iu] as i32;
        let n = N as usize;
        debug_assert!(N > 0 && n <= MAX_BAND_SIZE);

        // How many bits this band gets.
        let tell = ec_tell_frac(ec) as i32;
        if i != start {
            balance -= tell;
        }
        let remaining_bits = total_bits - tell - 1;
        ctx.remaining_bits = remaining_bits;
        let b = if i <= codedBands - 1 {
            let curr_balance = celt_sudiv(balance, IMIN(3, codedBands - i));
            IMAX(0, IMIN(16383, IMIN(remaining_bits + 1, pulses[iu] + curr_balance)))
        } else {
            0
        };

        if resynth != 0
            && M * eBands[iu] as i32 - N >= norm_offset
            && (update_lowband || lowband_offset == 0)
        {
            lowband_offset = i;
        }

        let tf_change = tf_res[iu];
        ctx.tf_change = tf_change;

        // Conservative estimate of the collapse masks of the bands we fold
        // from; without folding the LCG fills every block.
        let mut effective_lowband: i32 = -1;
        let mut x_cm: u32;
        let mut y_cm: u32;
        if lowband_offset != 0 && (spread != SPREAD_AGGRESSIVE || B > 1 || tf_change < 0) {
            // Never repeat spectral content within one band.
            effective_lowband = IMAX(0, M * eBands[lowband_offset as usize] as i32 - norm_offset - N);
            let mut fold_start = lowband_offset as usize;
            loop {
                fold_start -= 1;
                if M * eBands[fold_start] as i32 <= effective_lowband + norm_offset {
                    break;
                }
            }
            let mut fold_end = lowband_offset as usize - 1;
            loop {
                fold_end += 1;
                if M * eBands[fold_end] as i32 >= effective_lowband + norm_offset + N {
                    break;
                }
            }
            x_cm = 0;
            y_cm = 0;
            let mut fold_i = fold_start;
            loop {
                x_cm |= collapse_masks[fold_i * C] as u32;
                y_cm |= collapse_masks[fold_i * C + C - 1] as u32;
                fold_i += 1;
                if fold_i >= fold_end {
                    break;
                }
            }
        } else {
            x_cm = ((1 << B) - 1) as u32;
            y_cm = x_cm;
        }

        if dual_stereo != 0 && i == intensity {
            // Switch off dual stereo to do intensity.
            dual_stereo = 0;
            if resynth != 0 {
                let upto = (M * eBands[iu] as i32 - norm_offset) as usize;
                for (a, &b) in norm1[..upto].iter_mut().zip(&norm2[..upto]) {
                    *a = HALF32(*a as i32 + b as i32) as celt_norm;
                }
            }
        }

        let have_lowband = effective_lowband != -1;
        if have_lowband {
            let lb = effective_lowband as usize;
            lowband_x[..n].copy_from_slice(&norm1[lb..lb + n]);
            if dual_stereo != 0 {
                lowband_y[..n].copy_from_slice(&norm2[lb..lb + n]);
            }
        }
        let out_off = (M * eBands[iu] as i32 - norm_offset) as usize;

        let x_band: &mut [celt_norm];
        let y_band: Option<&mut [celt_norm]>;
        if i >= m.effEBands {
            x_band = &mut dummy_x[..n];
            y_band = if C == 2 { Some(&mut dummy_y[..n]) } else { None };
        } else {
            x_band = &mut X_[band_lo..band_lo + n];
            y_band = Y_.as_deref_mut().map(|y| &mut y[band_lo..band_lo + n]);
        }

        match y_band {
            Some(y_band) if dual_stereo != 0 => {
                x_cm = quant_band(
                    &mut ctx,
                    x_band,
                    N,
                    b / 2,
                    B,
                    have_lowband.then_some(&mut lowband_x[..n]),
                    LM,
                    if last { None } else { Some(&mut norm1[out_off..out_off + n]) },
                    Q15ONE,
                    x_cm as i32,
                    ec,
                );
                y_cm = quant_band(
                    &mut ctx,
                    y_band,
                    N,
                    b / 2,
                    B,
                    have_lowband.then_some(&mut lowband_y[..n]),
                    LM,
                    if last { None } else { Some(&mut norm2[out_off..out_off + n]) },
                    Q15ONE,
                    y_cm as i32,
                    ec,
                );
            }
            Some(y_band) => {
                x_cm = quant_band_stereo(
                    &mut ctx,
                    x_band,
                    y_band,
                    N,
                    b,
                    B,
                    have_lowband.then_some(&mut lowband_x[..n]),
                    LM,
                    if last { None } else { Some(&mut norm1[out_off..out_off + n]) },
                    (x_cm | y_cm) as i32,
                    ec,
                );
                y_cm = x_cm;
            }
            None => {
                x_cm = quant_band(
                    &mut ctx,
                    x_band,
                    N,
                    b,
                    B,
                    have_lowband.then_some(&mut lowband_x[..n]),
                    LM,
                    if last { None } else { Some(&mut norm1[out_off..out_off + n]) },
                    Q15ONE,
                    (x_cm | y_cm) as i32,
                    ec,
                );
                y_cm = x_cm;
            }
        }
        collapse_masks[iu * C] = x_cm as u8;
        collapse_masks[iu * C + C - 1] = y_cm as u8;
        balance += pulses[iu] + tell;

        // Only bands with at least 1 bit/sample of depth become folding sources.
        update_lowband = b > N << BITRES;

        trace!(
            "band {}: N={} b={} tell={} remaining={} cm={:#04x}/{:#04x}",
            i,
            N,
            b,
            tell,
            ctx.remaining_bits,
            x_cm as u8,
            y_cm as u8
        );
    }
    *seed = ctx.seed;

    debug!(
        "quant_all_bands: done, {} of {} eighth-bits used",
        ec_tell_frac(ec) - tell_start,
        total_bits
    );
}
