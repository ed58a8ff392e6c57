//! Pyramid vector quantizer.
//!
//! Upstream C: `celt/vq.c`

use crate::celt::bands::SPREAD_NONE;
use crate::celt::cwrs::{decode_pulses, encode_pulses};
use crate::celt::entcode::{celt_udiv, ec_dec, ec_enc};
use crate::celt::fixed_generic::{
    celt_norm, opus_val16, opus_val32, ADD16, ADD32, EPSILON, EXTEND32, EXTRACT16, HALF16,
    MAC16_16, MULT16_16, MULT16_16_P15, MULT16_16_Q15, MULT16_32_Q16, NEG16, PSHR32, Q15ONE,
    SHR16, SHR32, SUB16, VSHR32,
};
use crate::celt::mathops::{
    celt_atan2p, celt_cos_norm, celt_div, celt_ilog2, celt_rcp, celt_rsqrt_norm, celt_sqrt,
};
use crate::celt::pitch::celt_inner_prod;

/// Upstream C: celt/vq.c:exp_rotation1
fn exp_rotation1(X: &mut [celt_norm], len: i32, stride: i32, c: opus_val16, s: opus_val16) {
    let ms = NEG16(s);
    let stride = stride as usize;
    let rotate = |X: &mut [celt_norm], i: usize| {
        let x1 = X[i];
        let x2 = X[i + stride];
        X[i + stride] = EXTRACT16(PSHR32(MAC16_16(MULT16_16(c, x2), s, x1), 15));
        X[i] = EXTRACT16(PSHR32(MAC16_16(MULT16_16(c, x1), ms, x2), 15));
    };
    let fwd_end = len - stride as i32;
    for i in 0..fwd_end.max(0) as usize {
        rotate(X, i);
    }
    let bwd_start = len - 2 * stride as i32 - 1;
    if bwd_start >= 0 {
        for i in (0..=bwd_start as usize).rev() {
            rotate(X, i);
        }
    }
}

/// Spreading rotation applied before search (`dir > 0`) and undone after
/// reconstruction (`dir < 0`).
///
/// Upstream C: celt/vq.c:exp_rotation
pub fn exp_rotation(X: &mut [celt_norm], mut len: i32, dir: i32, stride: i32, K: i32, spread: i32) {
    const SPREAD_FACTOR: [i32; 3] = [15, 10, 5];
    if 2 * K >= len || spread == SPREAD_NONE {
        return;
    }
    let factor = SPREAD_FACTOR[(spread - 1) as usize];
    let gain = celt_div(MULT16_16(Q15ONE, len as opus_val16), len + factor * K) as opus_val16;
    let theta = HALF16(MULT16_16_Q15(gain, gain));
    let c = celt_cos_norm(EXTEND32(theta));
    let s = celt_cos_norm(EXTEND32(SUB16(Q15ONE, theta)));

    let mut stride2 = 0;
    if len >= 8 * stride {
        stride2 = 1;
        // Rounded sqrt(len/stride).
        while (stride2 * stride2 + stride2) * stride + (stride >> 2) < len {
            stride2 += 1;
        }
    }
    len = celt_udiv(len as u32, stride as u32) as i32;
    for i in 0..stride {
        let off = (i * len) as usize;
        let sub = &mut X[off..off + len as usize];
        if dir < 0 {
            if stride2 != 0 {
                exp_rotation1(sub, len, stride2, s, c);
            }
            exp_rotation1(sub, len, 1, c, s);
        } else {
            exp_rotation1(sub, len, 1, c, NEG16(s));
            if stride2 != 0 {
                exp_rotation1(sub, len, stride2, s, NEG16(c));
            }
        }
    }
}

/// Scales the integer pulse vector `iy` (energy `Ryy`) to norm `gain` in Q14.
///
/// Upstream C: celt/vq.c:normalise_residual
fn normalise_residual(iy: &[i32], X: &mut [celt_norm], N: usize, Ryy: opus_val32, gain: opus_val16) {
    let k = celt_ilog2(Ryy) >> 1;
    let t = VSHR32(Ryy, 2 * (k - 7));
    let g = MULT16_16_P15(celt_rsqrt_norm(t), gain);
    for (x, &y) in X[..N].iter_mut().zip(iy) {
        *x = EXTRACT16(PSHR32((g as i32).wrapping_mul(y), k + 1));
    }
}

/// One bit per sub-block, set when that sub-block received a pulse.
///
/// Upstream C: celt/vq.c:extract_collapse_mask
fn extract_collapse_mask(iy: &[i32], N: i32, B: i32) -> u32 {
    if B <= 1 {
        return 1;
    }
    let N0 = celt_udiv(N as u32, B as u32) as usize;
    let mut collapse_mask: u32 = 0;
    for (i, block) in iy.chunks(N0).take(B as usize).enumerate() {
        let tmp = block.iter().fold(0, |acc, &v| acc | v);
        collapse_mask |= ((tmp != 0) as u32) << i;
    }
    collapse_mask
}

/// Greedy search for the `K`-pulse vector closest in angle to `X`.
///
/// `X` is left holding absolute values; the caller restores signs. Returns
/// the energy of the pulse vector.
///
/// Upstream C: celt/vq.c:alg_quant (search loop)
pub fn op_pvq_search(X: &mut [celt_norm], iy: &mut [i32], signx: &mut [bool], K: i32, N: i32) -> opus_val16 {
    let n = N as usize;
    let mut y = [0 as celt_norm; 176];
    debug_assert!(n <= y.len());

    for j in 0..n {
        signx[j] = X[j] <= 0;
        if signx[j] {
            X[j] = NEG16(X[j]);
        }
        iy[j] = 0;
        y[j] = 0;
    }

    let mut xy: opus_val32 = 0;
    let mut yy: opus_val16 = 0;
    let mut pulsesLeft = K;

    // Pre-search by projecting on the pyramid.
    if K > N >> 1 {
        let mut sum: opus_val32 = X[..n].iter().map(|&v| EXTEND32(v)).sum();
        // Too small: replace with a single pulse at 0.
        if sum <= K {
            X[0] = 16384;
            X[1..n].fill(0);
            sum = 16384;
        }
        let rcp = EXTRACT16(MULT16_32_Q16((K - 1) as opus_val16, celt_rcp(sum)));
        for j in 0..n {
            // Rounds towards zero.
            iy[j] = MULT16_16_Q15(X[j], rcp) as i32;
            y[j] = iy[j] as celt_norm;
            yy = EXTRACT16(MAC16_16(EXTEND32(yy), y[j], y[j]));
            xy = MAC16_16(xy, X[j], y[j]);
            y[j] *= 2;
            pulsesLeft -= iy[j];
        }
    }
    debug_assert!(pulsesLeft >= 0, "Allocated too many pulses in the quick pass");

    // Only reachable on silence; dump everything into the first bin.
    if pulsesLeft > N + 3 {
        let tmp = pulsesLeft as opus_val16;
        yy = EXTRACT16(MAC16_16(EXTEND32(yy), tmp, tmp));
        yy = EXTRACT16(MAC16_16(EXTEND32(yy), tmp, y[0]));
        iy[0] += pulsesLeft;
        pulsesLeft = 0;
    }

    for i in 0..pulsesLeft {
        let rshift = 1 + celt_ilog2(K - pulsesLeft + i + 1);
        let mut best_id = 0;
        let mut best_num: opus_val16 = -32767;
        let mut best_den: opus_val16 = 0;
        yy = ADD16(yy, 1);
        for j in 0..n {
            let mut Rxy = EXTRACT16(SHR32(ADD32(xy, EXTEND32(X[j])), rshift));
            // y[] holds twice the pulse count.
            let Ryy = ADD16(yy, y[j]);
            Rxy = MULT16_16_Q15(Rxy, Rxy);
            if MULT16_16(best_den, Rxy) > MULT16_16(Ryy, best_num) {
                best_den = Ryy;
                best_num = Rxy;
                best_id = j;
            }
        }
        xy = ADD32(xy, EXTEND32(X[best_id]));
        yy = ADD16(yy, y[best_id]);
        y[best_id] += 2;
        iy[best_id] += 1;
    }
    yy
}

/// Quantizes `X` with `K` pulses and writes the codeword. When `resynth`
/// is set, `X` is replaced by the decoded approximation scaled to `gain`.
///
/// Upstream C: celt/vq.c:alg_quant
pub fn alg_quant(
    X: &mut [celt_norm],
    N: i32,
    K: i32,
    spread: i32,
    B: i32,
    enc: &mut ec_enc,
    gain: opus_val16,
    resynth: bool,
) -> u32 {
    debug_assert!(K > 0, "alg_quant() needs at least one pulse");
    debug_assert!(N > 1, "alg_quant() needs at least two dimensions");
    let n = N as usize;
    let mut iy = [0i32; 176];
    let mut signx = [false; 176];

    exp_rotation(X, N, 1, B, K, spread);
    op_pvq_search(X, &mut iy, &mut signx, K, N);

    for j in 0..n {
        if signx[j] {
            X[j] = NEG16(X[j]);
            iy[j] = -iy[j];
        }
    }
    encode_pulses(&iy[..n], n, K, enc);

    if resynth {
        let Ryy = iy[..n].iter().fold(0, |acc: opus_val32, &v| acc.wrapping_add(v * v));
        normalise_residual(&iy, X, n, Ryy, gain);
        exp_rotation(X, N, -1, B, K, spread);
    }
    extract_collapse_mask(&iy[..n], N, B)
}

/// Decodes `K` pulses into `X`, normalized to `gain`.
///
/// Upstream C: celt/vq.c:alg_unquant
pub fn alg_unquant(
    X: &mut [celt_norm],
    N: i32,
    K: i32,
    spread: i32,
    B: i32,
    dec: &mut ec_dec,
    gain: opus_val16,
) -> u32 {
    debug_assert!(K > 0, "alg_unquant() needs at least one pulse");
    debug_assert!(N > 1, "alg_unquant() needs at least two dimensions");
    let n = N as usize;
    let mut iy = [0i32; 176];
    let Ryy = decode_pulses(&mut iy[..n], n, K, dec);
    normalise_residual(&iy, X, n, Ryy, gain);
    exp_rotation(X, N, -1, B, K, spread);
    extract_collapse_mask(&iy[..n], N, B)
}

/// Rescales `X[..N]` to norm `gain` (Q15) in Q14.
///
/// Upstream C: celt/vq.c:renormalise_vector
pub fn renormalise_vector(X: &mut [celt_norm], N: i32, gain: opus_val16) {
    let n = N as usize;
    let E = EPSILON.wrapping_add(celt_inner_prod(X, X, n));
    let k = celt_ilog2(E) >> 1;
    let t = VSHR32(E, 2 * (k - 7));
    let g = MULT16_16_P15(celt_rsqrt_norm(t), gain);
    for x in &mut X[..n] {
        *x = EXTRACT16(PSHR32(MULT16_16(g, *x), k + 1));
    }
}

/// Angle between mid and side (or between `X` and `Y`), 0..16384 for 0..pi/2.
///
/// Upstream C: celt/vq.c:stereo_itheta
pub fn stereo_itheta(X: &[celt_norm], Y: &[celt_norm], stereo: bool, N: i32) -> i32 {
    let n = N as usize;
    let mut Emid: opus_val32 = EPSILON;
    let mut Eside: opus_val32 = EPSILON;
    if stereo {
        for i in 0..n {
            let m = ADD16(SHR16(X[i], 1), SHR16(Y[i], 1));
            let s = SUB16(SHR16(X[i], 1), SHR16(Y[i], 1));
            Emid = MAC16_16(Emid, m, m);
            Eside = MAC16_16(Eside, s, s);
        }
    } else {
        Emid = Emid.wrapping_add(celt_inner_prod(X, X, n));
        Eside = Eside.wrapping_add(celt_inner_prod(Y, Y, n));
    }
    let mid = celt_sqrt(Emid) as opus_val16;
    let side = celt_sqrt(Eside) as opus_val16;
    // 0.63662 = 2/pi
    MULT16_16_Q15(20861, celt_atan2p(side, mid)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::celt::bands::{SPREAD_AGGRESSIVE, SPREAD_NORMAL};
    use crate::celt::entdec::ec_dec_init;
    use crate::celt::entenc::{ec_enc_done, ec_enc_init};

    fn energy(x: &[celt_norm]) -> i64 {
        x.iter().map(|&v| v as i64 * v as i64).sum()
    }

    #[test]
    fn rotation_round_trips_within_rounding() {
        let orig: Vec<celt_norm> = (0..32).map(|i| ((i * 977) % 4001 - 2000) as i16).collect();
        let mut x = orig.clone();
        exp_rotation(&mut x, 32, 1, 2, 3, SPREAD_AGGRESSIVE);
        assert_ne!(x, orig);
        exp_rotation(&mut x, 32, -1, 2, 3, SPREAD_AGGRESSIVE);
        for (a, b) in x.iter().zip(&orig) {
            assert!((a - b).abs() <= 32, "{a} vs {b}");
        }
    }

    #[test]
    fn quant_unquant_agree() {
        let mut buf = [0u8; 64];
        let src: Vec<celt_norm> = vec![9000, -7000, 3000, 200, -8000, 5000, 0, 1200];
        let mut xe = src.clone();
        let mut enc = ec_enc_init(&mut buf);
        let mask_e = alg_quant(&mut xe, 8, 5, SPREAD_NORMAL, 1, &mut enc, Q15ONE, true);
        ec_enc_done(&mut enc);
        assert_eq!(enc.error, 0);

        let mut xd = vec![0 as celt_norm; 8];
        let mut dec = ec_dec_init(&mut buf);
        let mask_d = alg_unquant(&mut xd, 8, 5, SPREAD_NORMAL, 1, &mut dec, Q15ONE);
        assert_eq!(mask_e, mask_d);
        assert_eq!(xe, xd);
        let e = energy(&xd);
        assert!((e - (1i64 << 28)).abs() < (1i64 << 28) / 50, "energy {e}");
        // The dominant coefficients keep their sign.
        assert!(xd[0] > 0 && xd[1] < 0 && xd[4] < 0);
    }

    #[test]
    fn collapse_mask_marks_blocks_with_pulses() {
        let iy = [0, 0, 1, 0, 0, 0, -2, 0];
        assert_eq!(extract_collapse_mask(&iy, 8, 4), 0b1010);
        assert_eq!(extract_collapse_mask(&iy, 8, 1), 1);
    }

    #[test]
    fn renormalise_hits_unit_norm() {
        let mut x = [100i16, -300, 50, 0, 20, 1];
        renormalise_vector(&mut x, 6, Q15ONE);
        let e = energy(&x);
        assert!((e - (1i64 << 28)).abs() < (1i64 << 28) / 100, "energy {e}");
    }

    #[test]
    fn itheta_extremes() {
        let x = [16384i16, 0, 0, 0];
        let z = [0i16; 4];
        assert_eq!(stereo_itheta(&x, &z, false, 4), 0);
        let t = stereo_itheta(&z, &x, false, 4);
        assert!((t - 16384).abs() < 16, "{t}");
        // Identical channels have no side.
        assert_eq!(stereo_itheta(&x, &x, true, 4), 0);
    }
}
