//! Range coder state shared by the encoder and decoder.
//!
//! Upstream C: `celt/entcode.c`, `celt/entcode.h`

pub type ec_window = u32;

pub const EC_WINDOW_SIZE: i32 = ::core::mem::size_of::<ec_window>() as i32 * 8;
/// Number of bits to output at a time.
pub const EC_SYM_BITS: i32 = 8;
/// Total number of bits in each of the state registers.
pub const EC_CODE_BITS: i32 = 32;
/// Maximum symbol value.
pub const EC_SYM_MAX: u32 = (1u32 << EC_SYM_BITS) - 1;
/// Bits to shift by to move a symbol into the high-order position.
pub const EC_CODE_SHIFT: i32 = EC_CODE_BITS - EC_SYM_BITS - 1;
/// Carry bit of the high-order range symbol.
pub const EC_CODE_TOP: u32 = 1u32 << (EC_CODE_BITS - 1);
/// Low-order bit of the high-order range symbol.
pub const EC_CODE_BOT: u32 = EC_CODE_TOP >> EC_SYM_BITS;
/// Number of bits available for the last, partial symbol in the code field.
pub const EC_CODE_EXTRA: i32 = (EC_CODE_BITS - 2) % EC_SYM_BITS + 1;
/// Uniform integers above this many bits are split into range-coded and raw parts.
pub const EC_UINT_BITS: i32 = 8;
/// Resolution of fractional bit counts, in bits (1/8th of a bit).
pub const BITRES: i32 = 3;

/// Range coder context.
///
/// The same struct serves both directions; `ec_enc` and `ec_dec` are aliases
/// kept for readability at call sites. Range-coded symbols are written from
/// the front of `buf`, raw bits from the back.
pub struct ec_ctx<'a> {
    pub buf: &'a mut [u8],
    pub storage: u32,
    pub end_offs: u32,
    pub end_window: ec_window,
    pub nend_bits: i32,
    pub nbits_total: i32,
    pub offs: u32,
    pub rng: u32,
    pub val: u32,
    pub ext: u32,
    pub rem: i32,
    pub error: i32,
}

pub type ec_enc<'a> = ec_ctx<'a>;
pub type ec_dec<'a> = ec_ctx<'a>;

impl<'a> ec_ctx<'a> {
    pub(crate) fn new(buf: &'a mut [u8]) -> Self {
        let storage = buf.len() as u32;
        ec_ctx {
            buf,
            storage,
            end_offs: 0,
            end_window: 0,
            nend_bits: 0,
            nbits_total: 0,
            offs: 0,
            rng: 0,
            val: 0,
            ext: 0,
            rem: 0,
            error: 0,
        }
    }
}

/// Number of bits needed to represent `x` (0 for 0).
///
/// Upstream C: celt/entcode.h:EC_ILOG
#[inline]
pub fn ec_ilog(x: u32) -> i32 {
    (u32::BITS - x.leading_zeros()) as i32
}

/// Upstream C: celt/entcode.h:ec_range_bytes
#[inline]
pub fn ec_range_bytes(this: &ec_ctx) -> u32 {
    this.offs
}

/// Upstream C: celt/entcode.h:ec_get_error
#[inline]
pub fn ec_get_error(this: &ec_ctx) -> i32 {
    this.error
}

/// Whole bits used so far, rounded up.
///
/// Upstream C: celt/entcode.h:ec_tell
#[inline]
pub fn ec_tell(this: &ec_ctx) -> i32 {
    this.nbits_total - ec_ilog(this.rng)
}

/// Bits used so far in 1/8th bit units, rounded up.
///
/// Upstream C: celt/entcode.c:ec_tell_frac
pub fn ec_tell_frac(this: &ec_ctx) -> u32 {
    const correction: [u32; 8] = [35733, 38967, 42495, 46340, 50535, 55109, 60097, 65535];
    let nbits = (this.nbits_total << BITRES) as u32;
    let l = ec_ilog(this.rng);
    let r = this.rng >> (l - 16);
    let mut b = (r >> 12) - 8;
    b += (r > correction[b as usize]) as u32;
    let l = ((l << 3) as u32).wrapping_add(b);
    nbits.wrapping_sub(l)
}

/// Upstream C: celt/entcode.h:celt_udiv
#[inline]
pub fn celt_udiv(n: u32, d: u32) -> u32 {
    debug_assert!(d > 0);
    n / d
}

/// Upstream C: celt/entcode.h:celt_sudiv
#[inline]
pub fn celt_sudiv(n: i32, d: i32) -> i32 {
    debug_assert!(d > 0);
    n / d
}
