//! Pulse/bit conversion tables.
//!
//! Upstream C: `celt/rate.c`, `celt/rate.h`

use crate::celt::cwrs::get_required_bits;
use crate::celt::entcode::BITRES;
use crate::celt::modes::{OpusCustomMode, PulseCache};

pub const MAX_PSEUDO: i32 = 40;
pub const LOG_MAX_PSEUDO: i32 = 6;
pub const CELT_MAX_PULSES: i32 = 128;
pub const MAX_FINE_BITS: i32 = 8;
pub const FINE_OFFSET: i32 = 21;
pub const QTHETA_OFFSET: i32 = 4;
pub const QTHETA_OFFSET_TWOPHASE: i32 = 16;

/// Maps a pseudo-pulse index to an actual pulse count.
///
/// Upstream C: celt/rate.h:get_pulses
#[inline]
pub fn get_pulses(i: i32) -> i32 {
    if i < 8 {
        i
    } else {
        (8 + (i & 7)) << ((i >> 3) - 1)
    }
}

#[inline]
fn cache_row<'a>(m: &'a OpusCustomMode, band: i32, LM: i32) -> &'a [u8] {
    let off = m.cache.index[(LM * m.nbEBands as i32 + band) as usize];
    debug_assert!(off >= 0);
    &m.cache.bits[off as usize..]
}

/// Largest pseudo-pulse count whose cost is closest to `bits` (1/8 bits).
///
/// Upstream C: celt/rate.h:bits2pulses
#[inline]
pub fn bits2pulses(m: &OpusCustomMode, band: i32, mut LM: i32, mut bits: i32) -> i32 {
    LM += 1;
    let cache = cache_row(m, band, LM);
    let mut lo: i32 = 0;
    let mut hi: i32 = cache[0] as i32;
    bits -= 1;
    for _ in 0..LOG_MAX_PSEUDO {
        let mid = (lo + hi + 1) >> 1;
        if cache[mid as usize] as i32 >= bits {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    let lo_bits = if lo == 0 { -1 } else { cache[lo as usize] as i32 };
    if bits - lo_bits <= cache[hi as usize] as i32 - bits {
        lo
    } else {
        hi
    }
}

/// Upstream C: celt/rate.h:pulses2bits
#[inline]
pub fn pulses2bits(m: &OpusCustomMode, band: i32, mut LM: i32, pulses: i32) -> i32 {
    LM += 1;
    if pulses == 0 {
        0
    } else {
        cache_row(m, band, LM)[pulses as usize] as i32 + 1
    }
}

/// Whether `V(n, k)` fits in 32 bits.
fn fits_in32(n: i32, k: i32) -> bool {
    const maxN: [i16; 15] = [
        32767, 32767, 32767, 1476, 283, 109, 60, 40, 29, 24, 20, 18, 16, 14, 13,
    ];
    const maxK: [i16; 15] = [
        32767, 32767, 32767, 32767, 1172, 238, 95, 53, 36, 27, 22, 18, 16, 15, 13,
    ];
    if n >= 14 {
        if k >= 14 {
            false
        } else {
            n <= maxN[k as usize] as i32
        }
    } else {
        k <= maxK[n as usize] as i32
    }
}

/// Builds the pulse cost cache and the per-band rate caps for `LM` up to
/// `LM`.
///
/// `index[(lm+1)*nbEBands + band]` locates the cost row for a band of width
/// `(eBands[band+1]-eBands[band]) << lm`; row entry 0 holds the largest
/// pseudo-pulse index, entry `j` the cost of `get_pulses(j)` pulses minus one.
///
/// Upstream C: celt/rate.c:compute_pulse_cache
pub fn compute_pulse_cache(eBands: &[i16], logN: &[i16], nbEBands: usize, LM: i32) -> PulseCache {
    let nb = nbEBands;
    let rows = (LM + 2) as usize;
    let mut index = vec![-1i16; nb * rows];
    let mut entries: Vec<(i32, i32, i32)> = Vec::new();
    let mut curr: i32 = 0;

    let width = |j: usize| (eBands[j + 1] - eBands[j]) as i32;

    for i in 0..rows {
        for j in 0..nb {
            let N = width(j) << i >> 1;
            // Share rows between bands of identical size.
            'search: for k in 0..=i {
                for n in 0..nb {
                    if k == i && n >= j {
                        break;
                    }
                    if N == width(n) << k >> 1 {
                        index[i * nb + j] = index[k * nb + n];
                        break 'search;
                    }
                }
            }
            if index[i * nb + j] == -1 && N != 0 {
                let mut K = 0;
                while fits_in32(N, get_pulses(K + 1)) && K < MAX_PSEUDO {
                    K += 1;
                }
                index[i * nb + j] = curr as i16;
                entries.push((N, K, curr));
                curr += K + 1;
            }
        }
    }

    let mut bits = vec![0u8; curr as usize];
    let mut tmp = [0i16; CELT_MAX_PULSES as usize + 1];
    for &(N, K, I) in &entries {
        let row = &mut bits[I as usize..];
        get_required_bits(&mut tmp, N as usize, get_pulses(K) as usize, BITRES);
        for j in 1..=K {
            row[j as usize] = (tmp[get_pulses(j) as usize] - 1) as u8;
        }
        row[0] = K as u8;
    }

    let mut caps = Vec::with_capacity(((LM + 1) * 2) as usize * nb);
    for i in 0..=LM {
        for C in 1..=2 {
            for j in 0..nb {
                let mut N0 = width(j);
                let mut max_bits;
                if N0 << i == 1 {
                    max_bits = (C * (1 + MAX_FINE_BITS)) << BITRES;
                } else {
                    let mut LM0 = 0;
                    if N0 > 2 {
                        N0 >>= 1;
                        LM0 -= 1;
                    } else if N0 <= 1 {
                        LM0 = i.min(1);
                        N0 <<= LM0;
                    }
                    let pcache = &bits[index[((LM0 + 1) as usize) * nb + j] as usize..];
                    max_bits = pcache[pcache[0] as usize] as i32 + 1;
                    let mut N = N0;
                    for k in 0..i - LM0 {
                        max_bits <<= 1;
                        let offset = ((logN[j] as i32 + ((LM0 + k) << BITRES)) >> 1) - QTHETA_OFFSET;
                        // Average theta cost is about 459/512 of qb.
                        let num = 459 * ((2 * N - 1) * offset + max_bits);
                        let den = ((2 * N - 1) << 9) - 459;
                        let qb = ((num + (den >> 1)) / den).min(57);
                        debug_assert!(qb >= 0);
                        max_bits += qb;
                        N <<= 1;
                    }
                    if C == 2 {
                        max_bits <<= 1;
                        let offset = ((logN[j] as i32 + (i << BITRES)) >> 1)
                            - if N == 2 {
                                QTHETA_OFFSET_TWOPHASE
                            } else {
                                QTHETA_OFFSET
                            };
                        let ndof = 2 * N - 1 - (N == 2) as i32;
                        let scale = if N == 2 { 512 } else { 487 };
                        let num = scale * (max_bits + ndof * offset);
                        let den = (ndof << 9) - scale;
                        let qb = ((num + (den >> 1)) / den).min(if N == 2 { 64 } else { 61 });
                        debug_assert!(qb >= 0);
                        max_bits += qb;
                    }
                    let ndof = C * N + (C == 2 && N > 2) as i32;
                    let mut offset = ((logN[j] as i32 + (i << BITRES)) >> 1) - FINE_OFFSET;
                    if N == 2 {
                        offset += 1 << BITRES >> 2;
                    }
                    let num = max_bits + ndof * offset;
                    let den = (ndof - 1) << BITRES;
                    let qb = ((num + (den >> 1)) / den).min(MAX_FINE_BITS);
                    debug_assert!(qb >= 0);
                    max_bits += (C * qb) << BITRES;
                }
                let cap = 4 * max_bits / (C * (width(j) << i)) - 64;
                debug_assert!((0..256).contains(&cap));
                caps.push(cap as u8);
            }
        }
    }

    PulseCache {
        size: curr,
        index,
        bits,
        caps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::celt::modes::opus_custom_mode_create;

    #[test]
    fn pseudo_pulses_grow_geometrically() {
        let expect = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 18, 20];
        for (i, &k) in expect.iter().enumerate() {
            assert_eq!(get_pulses(i as i32), k);
        }
        assert_eq!(get_pulses(MAX_PSEUDO), CELT_MAX_PULSES);
    }

    #[test]
    fn fits_in32_limits() {
        assert!(fits_in32(2, 128));
        assert!(fits_in32(176, 4));
        assert!(!fits_in32(176, 14));
        assert!(fits_in32(13, 15));
        assert!(!fits_in32(13, 16));
    }

    #[test]
    fn bits_and_pulses_are_consistent() {
        let m = opus_custom_mode_create(48000, 960).unwrap();
        for LM in 0..=m.maxLM {
            for band in 0..m.nbEBands as i32 {
                let row = cache_row(m, band, LM + 1);
                let maxq = row[0] as i32;
                assert_eq!(bits2pulses(m, band, LM, 0), 0);
                for q in 1..=maxq {
                    let b = pulses2bits(m, band, LM, q);
                    let back = bits2pulses(m, band, LM, b);
                    assert_eq!(pulses2bits(m, band, LM, back), b, "band {band} LM {LM} q {q}");
                    if q > 1 {
                        assert!(b >= pulses2bits(m, band, LM, q - 1));
                    }
                }
            }
        }
    }
}
