//! Enumeration of PVQ codebooks (combinations with replacement and signs).
//!
//! A pulse vector `y` with `sum(|y|) == K` in `N` dimensions is mapped to an
//! index in `[0, V(N,K))` and coded uniformly. Rows of the `U(N,K)` table are
//! built on the fly, so no precomputed table is required.
//!
//! Upstream C: `celt/cwrs.c`

use crate::celt::entcode::{ec_dec, ec_enc, ec_ilog};
use crate::celt::entdec::ec_dec_uint;
use crate::celt::entenc::ec_enc_uint;
use crate::celt::rate::CELT_MAX_PULSES;

const U_ROW_LEN: usize = CELT_MAX_PULSES as usize + 2;

/// Base-2 log of `val` with `frac` fractional bits, rounded up.
///
/// Upstream C: celt/cwrs.c:log2_frac
pub fn log2_frac(mut val: u32, mut frac: i32) -> i32 {
    let mut l = ec_ilog(val);
    if val & val.wrapping_sub(1) != 0 {
        if l > 16 {
            val = ((val - 1) >> (l - 16)) + 1;
        } else {
            val <<= 16 - l;
        }
        l = (l - 1) << frac;
        loop {
            let b = (val >> 16) as i32;
            l += b << frac;
            val = (val + b as u32) >> b;
            val = val.wrapping_mul(val).wrapping_add(0x7fff) >> 15;
            let more = frac > 0;
            frac -= 1;
            if !more {
                break;
            }
        }
        l + (val > 0x8000) as i32
    } else {
        (l - 1) << frac
    }
}

/// Advances a row of `U` by one dimension.
fn unext(ui: &mut [u32], len: usize, mut ui0: u32) {
    let mut j = 1;
    loop {
        let ui1 = ui[j].wrapping_add(ui[j - 1]).wrapping_add(ui0);
        ui[j - 1] = ui0;
        ui0 = ui1;
        j += 1;
        if j >= len {
            break;
        }
    }
    ui[j - 1] = ui0;
}

/// Steps a row of `U` back by one dimension.
fn uprev(ui: &mut [u32], n: usize, mut ui0: u32) {
    let mut j = 1;
    loop {
        let ui1 = ui[j].wrapping_sub(ui[j - 1]).wrapping_sub(ui0);
        ui[j - 1] = ui0;
        ui0 = ui1;
        j += 1;
        if j >= n {
            break;
        }
    }
    ui[j - 1] = ui0;
}

/// Fills `u[0..=k+1]` with `U(n, 0..=k+1)` and returns `V(n, k)`.
///
/// Upstream C: celt/cwrs.c:ncwrs_urow
fn ncwrs_urow(n: usize, k: usize, u: &mut [u32]) -> u32 {
    let len = k + 2;
    debug_assert!(len >= 3 && n >= 2);
    u[0] = 0;
    u[1] = 1;
    for (kk, slot) in u.iter_mut().enumerate().take(len).skip(2) {
        *slot = ((kk as u32) << 1) - 1;
    }
    for _ in 2..n {
        unext(&mut u[1..], k + 1, 1);
    }
    u[k].wrapping_add(u[k + 1])
}

/// Size of the PVQ codebook `V(N,K)`.
pub fn pvq_v(n: u32, k: u32) -> u32 {
    if k == 0 {
        return 1;
    }
    if n == 1 {
        return 2;
    }
    let mut u = [0u32; U_ROW_LEN];
    ncwrs_urow(n as usize, k as usize, &mut u)
}

/// Index to pulse vector. Writes `y[..n]` and returns `sum(y^2)`.
///
/// Upstream C: celt/cwrs.c:cwrsi
fn cwrsi_row(n: usize, mut k: usize, mut i: u32, y: &mut [i32], u: &mut [u32]) -> i32 {
    debug_assert!(n > 0);
    let mut yy = 0i32;
    for yj_out in y.iter_mut().take(n) {
        let mut p = u[k + 1];
        let s: i32 = -((i >= p) as i32);
        i = i.wrapping_sub(p & s as u32);
        let k0 = k;
        p = u[k];
        while p > i {
            k -= 1;
            p = u[k];
        }
        i = i.wrapping_sub(p);
        let yj = (k0 - k) as i32;
        *yj_out = (yj + s) ^ s;
        yy += yj * yj;
        uprev(u, k + 2, 0);
    }
    yy
}

/// Pulse vector to index. Returns the index and stores `V(N,K)` in `nc`.
///
/// Upstream C: celt/cwrs.c:icwrs
fn icwrs_row(n: usize, k_total: usize, nc: &mut u32, y: &[i32], u: &mut [u32]) -> u32 {
    debug_assert!(n >= 2);
    u[0] = 0;
    for (kk, slot) in u.iter_mut().enumerate().take(k_total + 2).skip(1) {
        *slot = ((kk as u32) << 1) - 1;
    }
    let mut i: u32 = (y[n - 1] < 0) as u32;
    let mut k = y[n - 1].unsigned_abs() as usize;
    let mut j = n - 2;
    i = i.wrapping_add(u[k]);
    k += y[j].unsigned_abs() as usize;
    if y[j] < 0 {
        i = i.wrapping_add(u[k + 1]);
    }
    while j > 0 {
        j -= 1;
        unext(u, k_total + 2, 0);
        i = i.wrapping_add(u[k]);
        k += y[j].unsigned_abs() as usize;
        if y[j] < 0 {
            i = i.wrapping_add(u[k + 1]);
        }
    }
    *nc = u[k].wrapping_add(u[k + 1]);
    i
}

/// Decodes codebook index `i` of `V(n, k)` into `y`. Returns `sum(y^2)`.
pub fn cwrsi(n: usize, k: i32, i: u32, y: &mut [i32]) -> i32 {
    debug_assert!(k > 0 && k <= CELT_MAX_PULSES);
    let mut u = [0u32; U_ROW_LEN];
    if n == 1 {
        y[0] = if i != 0 { -k } else { k };
        return k * k;
    }
    ncwrs_urow(n, k as usize, &mut u);
    cwrsi_row(n, k as usize, i, y, &mut u)
}

/// Codebook index of the pulse vector `y[..n]`.
pub fn icwrs(n: usize, y: &[i32]) -> u32 {
    let k: i32 = y[..n].iter().map(|v| v.abs()).sum();
    debug_assert!(k > 0 && k <= CELT_MAX_PULSES);
    if n == 1 {
        return (y[0] < 0) as u32;
    }
    let mut u = [0u32; U_ROW_LEN];
    let mut nc = 0;
    icwrs_row(n, k as usize, &mut nc, y, &mut u)
}

/// Upstream C: celt/cwrs.c:encode_pulses
pub fn encode_pulses(y: &[i32], n: usize, k: i32, enc: &mut ec_enc) {
    debug_assert!(k > 0);
    let mut u = [0u32; U_ROW_LEN];
    let mut nc = 0;
    let i = icwrs_row(n, k as usize, &mut nc, y, &mut u);
    ec_enc_uint(enc, i, nc);
}

/// Reads a pulse vector into `y[..n]` and returns its energy `sum(y^2)`.
///
/// Upstream C: celt/cwrs.c:decode_pulses
pub fn decode_pulses(y: &mut [i32], n: usize, k: i32, dec: &mut ec_dec) -> i32 {
    debug_assert!(k > 0);
    let mut u = [0u32; U_ROW_LEN];
    let nc = ncwrs_urow(n, k as usize, &mut u);
    let i = ec_dec_uint(dec, nc);
    cwrsi_row(n, k as usize, i, y, &mut u)
}

/// Bits (in `1/(1<<frac)` units) needed to code each `K` in `0..=maxk` in
/// `n` dimensions.
///
/// Upstream C: celt/cwrs.c:get_required_bits
pub fn get_required_bits(bits: &mut [i16], n: usize, maxk: usize, frac: i32) {
    debug_assert!(maxk > 0);
    bits[0] = 0;
    if n == 1 {
        for b in bits.iter_mut().take(maxk + 1).skip(1) {
            *b = (1 << frac) as i16;
        }
    } else {
        let mut u = [0u32; U_ROW_LEN];
        ncwrs_urow(n, maxk, &mut u);
        for k in 1..=maxk {
            bits[k] = log2_frac(u[k].wrapping_add(u[k + 1]), frac) as i16;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v_reference(n: u64, k: u64) -> u64 {
        // V(N,K) = V(N-1,K) + V(N,K-1) + V(N-1,K-1)
        let mut v = vec![vec![0u64; k as usize + 1]; n as usize + 1];
        for row in v.iter_mut() {
            row[0] = 1;
        }
        for nn in 1..=n as usize {
            for kk in 1..=k as usize {
                v[nn][kk] = v[nn - 1][kk] + v[nn][kk - 1] + v[nn - 1][kk - 1];
            }
        }
        v[n as usize][k as usize]
    }

    #[test]
    fn codebook_sizes_match_recurrence() {
        for n in 1..12u32 {
            for k in 0..10u32 {
                assert_eq!(pvq_v(n, k) as u64, v_reference(n as u64, k as u64), "V({n},{k})");
            }
        }
        assert_eq!(pvq_v(2, 128), 512);
    }

    #[test]
    fn log2_frac_rounds_up() {
        assert_eq!(log2_frac(1, 3), 0);
        assert_eq!(log2_frac(2, 3), 8);
        assert_eq!(log2_frac(8, 3), 24);
        assert_eq!(log2_frac(3, 3), 13);
        assert_eq!(log2_frac(5, 0), 3);
    }

    #[test]
    fn small_codebook_is_exhaustively_invertible() {
        let (n, k) = (4usize, 3i32);
        let nc = pvq_v(n as u32, k as u32);
        let mut seen = std::collections::HashSet::new();
        for i in 0..nc {
            let mut y = [0i32; 4];
            let yy = cwrsi(n, k, i, &mut y);
            assert_eq!(y.iter().map(|v| v.abs()).sum::<i32>(), k);
            assert_eq!(yy, y.iter().map(|v| v * v).sum::<i32>());
            assert!(seen.insert(y));
            assert_eq!(icwrs(n, &y), i);
        }
    }

    #[test]
    fn required_bits_for_one_dimension() {
        let mut bits = [0i16; 5];
        get_required_bits(&mut bits, 1, 4, 3);
        assert_eq!(bits, [0, 8, 8, 8, 8]);
        get_required_bits(&mut bits, 2, 4, 3);
        // V(2,k) = 4k
        assert_eq!(bits[1], 16);
        assert_eq!(bits[2], 24);
        assert_eq!(bits[4], 32);
    }
}
