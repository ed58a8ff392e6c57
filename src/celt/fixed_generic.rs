//! Fixed-point scalar types and arithmetic primitives.
//!
//! Every helper here wraps on overflow exactly like the 32-bit C macros it is
//! named after, so encoder and decoder stay bit-exact on any platform.
//!
//! Upstream C: `celt/arch.h`, `celt/fixed_generic.h`

pub type opus_val16 = i16;
pub type opus_val32 = i32;
/// Normalized MDCT coefficient, Q14 (unit norm is `NORM_SCALING`).
pub type celt_norm = i16;
/// Raw MDCT coefficient.
pub type celt_sig = i32;
/// Band amplitude.
pub type celt_ener = i32;

pub const Q15ONE: opus_val16 = 32767;
pub const EPSILON: opus_val32 = 1;
pub const NORM_SCALING: celt_norm = 16384;
pub const DB_SHIFT: i32 = 10;

/// Upstream C: celt/fixed_generic.h:EXTRACT16
#[inline(always)]
pub fn EXTRACT16(x: opus_val32) -> opus_val16 {
    x as opus_val16
}

/// Upstream C: celt/fixed_generic.h:EXTEND32
#[inline(always)]
pub fn EXTEND32(x: opus_val16) -> opus_val32 {
    x as opus_val32
}

/// Upstream C: celt/fixed_generic.h:SHR16
#[inline(always)]
pub fn SHR16(a: opus_val16, shift: i32) -> opus_val16 {
    a >> shift
}

/// Upstream C: celt/fixed_generic.h:SHL16
#[inline(always)]
pub fn SHL16(a: opus_val16, shift: i32) -> opus_val16 {
    ((a as i32) << shift) as opus_val16
}

/// Upstream C: celt/fixed_generic.h:SHR32
#[inline(always)]
pub fn SHR32(a: opus_val32, shift: i32) -> opus_val32 {
    a >> shift
}

/// Upstream C: celt/fixed_generic.h:SHL32
#[inline(always)]
pub fn SHL32(a: opus_val32, shift: i32) -> opus_val32 {
    ((a as u32) << shift) as opus_val32
}

/// Upstream C: celt/fixed_generic.h:PSHR32
#[inline(always)]
pub fn PSHR32(a: opus_val32, shift: i32) -> opus_val32 {
    SHR32(a.wrapping_add(((1u32 << shift) >> 1) as i32), shift)
}

/// Upstream C: celt/fixed_generic.h:VSHR32
#[inline(always)]
pub fn VSHR32(a: opus_val32, shift: i32) -> opus_val32 {
    if shift > 0 {
        SHR32(a, shift)
    } else {
        SHL32(a, -shift)
    }
}

#[inline(always)]
pub fn HALF16(x: opus_val16) -> opus_val16 {
    SHR16(x, 1)
}

#[inline(always)]
pub fn HALF32(x: opus_val32) -> opus_val32 {
    SHR32(x, 1)
}

#[inline(always)]
pub fn ADD16(a: opus_val16, b: opus_val16) -> opus_val16 {
    a.wrapping_add(b)
}

#[inline(always)]
pub fn SUB16(a: opus_val16, b: opus_val16) -> opus_val16 {
    a.wrapping_sub(b)
}

#[inline(always)]
pub fn NEG16(x: opus_val16) -> opus_val16 {
    x.wrapping_neg()
}

#[inline(always)]
pub fn ADD32(a: opus_val32, b: opus_val32) -> opus_val32 {
    a.wrapping_add(b)
}

#[inline(always)]
pub fn SUB32(a: opus_val32, b: opus_val32) -> opus_val32 {
    a.wrapping_sub(b)
}

/// 16x16 multiplication into a 32-bit result. Cannot overflow.
///
/// Upstream C: celt/fixed_generic.h:MULT16_16
#[inline(always)]
pub fn MULT16_16(a: opus_val16, b: opus_val16) -> opus_val32 {
    a as opus_val32 * b as opus_val32
}

/// 16x16 multiply-add.
#[inline(always)]
pub fn MAC16_16(c: opus_val32, a: opus_val16, b: opus_val16) -> opus_val32 {
    c.wrapping_add(MULT16_16(a, b))
}

/// Signed 16 times unsigned 16.
#[inline(always)]
fn MULT16_16SU(a: opus_val16, b: u16) -> opus_val32 {
    (a as i32).wrapping_mul(b as i32)
}

#[inline(always)]
pub fn MULT16_16_Q14(a: opus_val16, b: opus_val16) -> opus_val16 {
    (MULT16_16(a, b) >> 14) as opus_val16
}

#[inline(always)]
pub fn MULT16_16_Q15(a: opus_val16, b: opus_val16) -> opus_val16 {
    (MULT16_16(a, b) >> 15) as opus_val16
}

/// Q15 multiplication with rounding.
///
/// Upstream C: celt/fixed_generic.h:MULT16_16_P15
#[inline(always)]
pub fn MULT16_16_P15(a: opus_val16, b: opus_val16) -> opus_val16 {
    (MULT16_16(a, b).wrapping_add(16384) >> 15) as opus_val16
}

/// Upstream C: celt/fixed_generic.h:MULT16_32_Q15
#[inline(always)]
pub fn MULT16_32_Q15(a: opus_val16, b: opus_val32) -> opus_val32 {
    SHL32(MULT16_16(a, (b >> 16) as opus_val16), 1)
        .wrapping_add(MULT16_16SU(a, (b & 0xffff) as u16) >> 15)
}

/// Upstream C: celt/fixed_generic.h:MULT16_32_Q16
#[inline(always)]
pub fn MULT16_32_Q16(a: opus_val16, b: opus_val32) -> opus_val32 {
    MULT16_16(a, (b >> 16) as opus_val16).wrapping_add(MULT16_16SU(a, (b & 0xffff) as u16) >> 16)
}

/// Upstream C: celt/fixed_generic.h:MULT32_32_Q31
#[inline(always)]
pub fn MULT32_32_Q31(a: opus_val32, b: opus_val32) -> opus_val32 {
    SHL32(MULT16_16((a >> 16) as opus_val16, (b >> 16) as opus_val16), 1)
        .wrapping_add(MULT16_16SU((a >> 16) as opus_val16, (b & 0xffff) as u16) >> 15)
        .wrapping_add(MULT16_16SU((b >> 16) as opus_val16, (a & 0xffff) as u16) >> 15)
}

/// Upstream C: celt/fixed_generic.h:DIV32_16
#[inline(always)]
pub fn DIV32_16(a: opus_val32, b: opus_val16) -> opus_val16 {
    (a / b as opus_val32) as opus_val16
}

#[inline(always)]
pub fn MIN16(a: opus_val16, b: opus_val16) -> opus_val16 {
    a.min(b)
}

#[inline(always)]
pub fn MAX16(a: opus_val16, b: opus_val16) -> opus_val16 {
    a.max(b)
}

#[inline(always)]
pub fn MIN32(a: opus_val32, b: opus_val32) -> opus_val32 {
    a.min(b)
}

#[inline(always)]
pub fn MAX32(a: opus_val32, b: opus_val32) -> opus_val32 {
    a.max(b)
}

#[inline(always)]
pub fn IMIN(a: i32, b: i32) -> i32 {
    a.min(b)
}

#[inline(always)]
pub fn IMAX(a: i32, b: i32) -> i32 {
    a.max(b)
}

/// Fractional 16-bit multiply used by the bit-exact trig helpers. Both
/// operands are truncated to 16 bits first.
///
/// Upstream C: celt/bands.c:FRAC_MUL16
#[inline(always)]
pub fn FRAC_MUL16(a: i32, b: i32) -> i32 {
    (16384 + (a as i16 as i32) * (b as i16 as i32)) >> 15
}
