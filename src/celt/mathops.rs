//! Fixed-point math approximations.
//!
//! All of these are polynomial or table-free approximations that are exact
//! integer functions of their input, which is what keeps the band quantizer
//! reproducible between encoder and decoder.
//!
//! Upstream C: `celt/mathops.c`, `celt/mathops.h`

use crate::celt::entcode::ec_ilog;
use crate::celt::fixed_generic::{
    opus_val16, opus_val32, ADD16, DB_SHIFT, EXTEND32, EXTRACT16, MULT16_16_P15, MULT16_16_Q15,
    MULT32_32_Q31, SHL16, SHL32, SHR16, SUB16, VSHR32,
};

/// Integer log2 of a strictly positive value.
///
/// Upstream C: celt/mathops.h:celt_ilog2
#[inline]
pub fn celt_ilog2(x: opus_val32) -> i32 {
    debug_assert!(x > 0, "celt_ilog2() only defined for strictly positive numbers");
    ec_ilog(x as u32) - 1
}

/// Like [`celt_ilog2`] but returns 0 for non-positive input.
///
/// Upstream C: celt/mathops.h:celt_zlog2
#[inline]
pub fn celt_zlog2(x: opus_val32) -> i32 {
    if x <= 0 {
        0
    } else {
        celt_ilog2(x)
    }
}

/// Upstream C: celt/mathops.c:isqrt32
pub fn isqrt32(mut _val: u32) -> u32 {
    let mut g: u32 = 0;
    let mut bshift: i32 = (ec_ilog(_val) - 1) >> 1;
    let mut b: u32 = 1u32 << bshift;
    loop {
        let t: u32 = (g << 1).wrapping_add(b) << bshift;
        if t <= _val {
            g = g.wrapping_add(b);
            _val = _val.wrapping_sub(t);
        }
        b >>= 1;
        bshift -= 1;
        if bshift < 0 {
            break;
        }
    }
    g
}

/// Upstream C: celt/mathops.h:celt_maxabs32
#[inline]
pub fn celt_maxabs32(x: &[opus_val32]) -> opus_val32 {
    let mut maxval: opus_val32 = 0;
    let mut minval: opus_val32 = 0;
    for &v in x {
        maxval = maxval.max(v);
        minval = minval.min(v);
    }
    maxval.max(minval.wrapping_neg())
}

/// Square root of a Q(2k) value, returned in Q(k).
///
/// Upstream C: celt/mathops.c:celt_sqrt
pub fn celt_sqrt(mut x: opus_val32) -> opus_val32 {
    const C: [opus_val16; 5] = [23175, 11561, -3011, 1699, -664];
    if x == 0 {
        return 0;
    } else if x >= 1073741824 {
        return 32767;
    }
    let k = (celt_ilog2(x) >> 1) - 7;
    x = VSHR32(x, 2 * k);
    let n = (x - 32768) as opus_val16;
    let rt = ADD16(
        C[0],
        MULT16_16_Q15(
            n,
            ADD16(
                C[1],
                MULT16_16_Q15(
                    n,
                    ADD16(C[2], MULT16_16_Q15(n, ADD16(C[3], MULT16_16_Q15(n, C[4])))),
                ),
            ),
        ),
    );
    VSHR32(EXTEND32(rt), 7 - k)
}

/// Reciprocal approximation (Q15 input, Q16 output).
///
/// Upstream C: celt/mathops.c:celt_rcp
pub fn celt_rcp(x: opus_val32) -> opus_val32 {
    debug_assert!(x > 0, "celt_rcp() only defined for positive values");
    let i = celt_ilog2(x);
    let n = (VSHR32(x, i - 15) - 32768) as opus_val16;
    let mut r = ADD16(30840, MULT16_16_Q15(-15420, n));
    r = SUB16(
        r,
        MULT16_16_Q15(r, ADD16(MULT16_16_Q15(r, n), ADD16(r, -32768))),
    );
    r = SUB16(
        r,
        ADD16(
            1,
            MULT16_16_Q15(r, ADD16(MULT16_16_Q15(r, n), ADD16(r, -32768))),
        ),
    );
    VSHR32(EXTEND32(r), i - 16)
}

/// Upstream C: celt/mathops.h:celt_div
#[inline]
pub fn celt_div(a: opus_val32, b: opus_val32) -> opus_val32 {
    MULT32_32_Q31(a, celt_rcp(b))
}

/// Reciprocal square root of a Q16 value normalized to [0.25, 1), result in Q14.
///
/// Upstream C: celt/mathops.c:celt_rsqrt_norm
pub fn celt_rsqrt_norm(x: opus_val32) -> opus_val16 {
    let n = (x - 32768) as opus_val16;
    let r = ADD16(
        23557,
        MULT16_16_Q15(n, ADD16(-13490, MULT16_16_Q15(n, 6713))),
    );
    let r2 = MULT16_16_Q15(r, r);
    let y = SHL16(SUB16(ADD16(MULT16_16_Q15(r2, n), r2), 16384), 1);
    ADD16(
        r,
        MULT16_16_Q15(r, MULT16_16_Q15(y, SUB16(MULT16_16_Q15(y, 12288), 16384))),
    )
}

/// 2^x for the fractional part of a Q10 value, result in Q14.
///
/// Upstream C: celt/mathops.h:celt_exp2_frac
#[inline]
pub fn celt_exp2_frac(x: opus_val16) -> opus_val16 {
    const D0: opus_val16 = 16383;
    const D1: opus_val16 = 22804;
    const D2: opus_val16 = 14819;
    const D3: opus_val16 = 10204;
    let frac = SHL16(x, 4);
    ADD16(
        D0,
        MULT16_16_Q15(
            frac,
            ADD16(D1, MULT16_16_Q15(frac, ADD16(D2, MULT16_16_Q15(D3, frac)))),
        ),
    )
}

/// 2^x with a Q10 input and Q16 output.
///
/// Upstream C: celt/mathops.h:celt_exp2
#[inline]
pub fn celt_exp2(x: opus_val16) -> opus_val32 {
    let integer = SHR16(x, 10) as i32;
    if integer > 14 {
        return 0x7f000000;
    } else if integer < -15 {
        return 0;
    }
    let frac = celt_exp2_frac(SUB16(x, SHL16(integer as opus_val16, 10)));
    VSHR32(EXTEND32(frac), -integer - 2)
}

/// Base-2 log in Q(DB_SHIFT).
///
/// Upstream C: celt/mathops.h:celt_log2
pub fn celt_log2(x: opus_val32) -> opus_val16 {
    const C: [opus_val16; 5] = [-6801 + (1 << (13 - DB_SHIFT)), 15746, -5217, 2545, -1401];
    if x == 0 {
        return -32767;
    }
    let i = celt_ilog2(x);
    let n = (VSHR32(x, i - 15) - 32768 - 16384) as opus_val16;
    let frac = ADD16(
        C[0],
        MULT16_16_Q15(
            n,
            ADD16(
                C[1],
                MULT16_16_Q15(
                    n,
                    ADD16(C[2], MULT16_16_Q15(n, ADD16(C[3], MULT16_16_Q15(n, C[4])))),
                ),
            ),
        ),
    );
    ADD16(
        SHL16((i - 13) as opus_val16, DB_SHIFT),
        SHR16(frac, 14 - DB_SHIFT),
    )
}

#[inline]
fn _celt_cos_pi_2(x: opus_val16) -> opus_val16 {
    let x2 = MULT16_16_P15(x, x);
    let inner = 8277 + MULT16_16_P15(-626, x2) as i32;
    let inner = -7651 + MULT16_16_P15(x2, inner as opus_val16) as i32;
    let v = (32767 - x2 as i32) + MULT16_16_P15(x2, inner as opus_val16) as i32;
    ADD16(1, v.min(32766) as opus_val16)
}

/// cos(pi/2 * x / 32768), output in Q15. The input wraps every 131072.
///
/// Upstream C: celt/mathops.c:celt_cos_norm
pub fn celt_cos_norm(mut x: opus_val32) -> opus_val16 {
    x &= 0x0001ffff;
    if x > SHL32(1, 16) {
        x = SHL32(1, 17) - x;
    }
    if x & 0x00007fff != 0 {
        if x < SHL32(1, 15) {
            _celt_cos_pi_2(x as opus_val16)
        } else {
            -_celt_cos_pi_2((65536 - x) as opus_val16)
        }
    } else if x & 0x0000ffff != 0 {
        0
    } else if x & 0x0001ffff != 0 {
        -32767
    } else {
        32767
    }
}

/// atan(x) for x in [0, 1] (Q15), result scaled so that pi/4 maps to 25736/2.
#[inline]
fn celt_atan01(x: opus_val16) -> opus_val16 {
    const M1: i32 = 32767;
    const M2: i32 = -21;
    const M3: i32 = -11943;
    const M4: opus_val16 = 4936;
    let t = M3 + MULT16_16_P15(M4, x) as i32;
    let t = M2 + MULT16_16_P15(x, t as opus_val16) as i32;
    let t = M1 + MULT16_16_P15(x, t as opus_val16) as i32;
    MULT16_16_P15(x, t as opus_val16)
}

/// atan2() for positive arguments. The output is in Q15 with pi/2 ~ 25736.
///
/// Upstream C: celt/mathops.h:celt_atan2p
pub fn celt_atan2p(y: opus_val16, x: opus_val16) -> opus_val16 {
    if y < x {
        let arg = celt_div(SHL32(EXTEND32(y), 15), x as opus_val32).min(32767);
        SHR16(celt_atan01(EXTRACT16(arg)), 1)
    } else {
        let arg = celt_div(SHL32(EXTEND32(x), 15), y as opus_val32).min(32767);
        25736 - SHR16(celt_atan01(EXTRACT16(arg)), 1)
    }
}
