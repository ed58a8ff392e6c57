//! Range decoder.
//!
//! Reads past the end of the buffer yield zeros, so a truncated or corrupted
//! stream always decodes to something deterministic.
//!
//! Upstream C: `celt/entdec.c`

use crate::celt::entcode::{
    celt_udiv, ec_ctx, ec_dec, ec_ilog, ec_window, EC_CODE_BITS, EC_CODE_BOT, EC_CODE_EXTRA,
    EC_CODE_TOP, EC_SYM_BITS, EC_SYM_MAX, EC_UINT_BITS, EC_WINDOW_SIZE,
};

fn ec_read_byte(this: &mut ec_dec) -> i32 {
    if this.offs < this.storage {
        let b = this.buf[this.offs as usize];
        this.offs += 1;
        b as i32
    } else {
        0
    }
}

fn ec_read_byte_from_end(this: &mut ec_dec) -> i32 {
    if this.end_offs < this.storage {
        this.end_offs += 1;
        this.buf[(this.storage - this.end_offs) as usize] as i32
    } else {
        0
    }
}

/// Normalizes the contents of `val` and `rng` so that `rng` lies in the
/// high-order symbol.
fn ec_dec_normalize(this: &mut ec_dec) {
    while this.rng <= EC_CODE_BOT {
        this.nbits_total += EC_SYM_BITS;
        this.rng <<= EC_SYM_BITS;
        let mut sym = this.rem;
        this.rem = ec_read_byte(this);
        sym = ((sym << EC_SYM_BITS) | this.rem) >> (EC_SYM_BITS - EC_CODE_EXTRA);
        this.val = ((this.val << EC_SYM_BITS).wrapping_add(EC_SYM_MAX & !(sym as u32)))
            & (EC_CODE_TOP - 1);
    }
}

/// Upstream C: celt/entdec.c:ec_dec_init
pub fn ec_dec_init(buf: &mut [u8]) -> ec_dec<'_> {
    let mut dec = ec_ctx::new(buf);
    dec.nbits_total =
        EC_CODE_BITS + 1 - ((EC_CODE_BITS - EC_CODE_EXTRA) / EC_SYM_BITS) * EC_SYM_BITS;
    dec.rng = 1u32 << EC_CODE_EXTRA;
    dec.rem = ec_read_byte(&mut dec);
    dec.val = dec.rng - 1 - (dec.rem >> (EC_SYM_BITS - EC_CODE_EXTRA)) as u32;
    ec_dec_normalize(&mut dec);
    dec
}

/// Returns the cumulative frequency of the next symbol out of `ft`.
/// Must be followed by [`ec_dec_update`].
///
/// Upstream C: celt/entdec.c:ec_decode
pub fn ec_decode(this: &mut ec_dec, ft: u32) -> u32 {
    this.ext = celt_udiv(this.rng, ft);
    let s = this.val / this.ext;
    ft - (s + 1).min(ft)
}

/// Upstream C: celt/entdec.c:ec_decode_bin
pub fn ec_decode_bin(this: &mut ec_dec, bits: u32) -> u32 {
    this.ext = this.rng >> bits;
    let s = this.val / this.ext;
    (1u32 << bits) - (s + 1).min(1u32 << bits)
}

/// Advances past the symbol `[fl, fh)` out of `ft`.
///
/// Upstream C: celt/entdec.c:ec_dec_update
pub fn ec_dec_update(this: &mut ec_dec, fl: u32, fh: u32, ft: u32) {
    let s = this.ext.wrapping_mul(ft - fh);
    this.val = this.val.wrapping_sub(s);
    this.rng = if fl > 0 {
        this.ext.wrapping_mul(fh - fl)
    } else {
        this.rng.wrapping_sub(s)
    };
    ec_dec_normalize(this);
}

/// Upstream C: celt/entdec.c:ec_dec_bit_logp
pub fn ec_dec_bit_logp(this: &mut ec_dec, logp: u32) -> i32 {
    let r = this.rng;
    let d = this.val;
    let s = r >> logp;
    let ret = d < s;
    if !ret {
        this.val = d - s;
    }
    this.rng = if ret { s } else { r - s };
    ec_dec_normalize(this);
    ret as i32
}

/// Upstream C: celt/entdec.c:ec_dec_icdf
pub fn ec_dec_icdf(this: &mut ec_dec, icdf: &[u8], ftb: u32) -> i32 {
    let mut s = this.rng;
    let d = this.val;
    let r = s >> ftb;
    let mut ret = 0usize;
    let mut t;
    loop {
        t = s;
        s = r.wrapping_mul(icdf[ret] as u32);
        if d >= s {
            break;
        }
        ret += 1;
    }
    this.val = d - s;
    this.rng = t - s;
    ec_dec_normalize(this);
    ret as i32
}

/// Decodes a uniformly distributed integer in `[0, ft)`. Out-of-range values
/// flag `error` and saturate to `ft - 1`.
///
/// Upstream C: celt/entdec.c:ec_dec_uint
pub fn ec_dec_uint(this: &mut ec_dec, ft: u32) -> u32 {
    debug_assert!(ft > 1);
    let ft = ft - 1;
    let mut ftb = ec_ilog(ft);
    if ftb > EC_UINT_BITS {
        ftb -= EC_UINT_BITS;
        let f = (ft >> ftb) + 1;
        let s = ec_decode(this, f);
        ec_dec_update(this, s, s + 1, f);
        let t = (s << ftb) | ec_dec_bits(this, ftb as u32);
        if t <= ft {
            return t;
        }
        this.error = 1;
        ft
    } else {
        let f = ft + 1;
        let s = ec_decode(this, f);
        ec_dec_update(this, s, s + 1, f);
        s
    }
}

/// Reads raw bits from the end of the buffer.
///
/// Upstream C: celt/entdec.c:ec_dec_bits
pub fn ec_dec_bits(this: &mut ec_dec, bits: u32) -> u32 {
    let mut window: ec_window = this.end_window;
    let mut available = this.nend_bits;
    if (available as u32) < bits {
        loop {
            window |= (ec_read_byte_from_end(this) as ec_window) << available;
            available += EC_SYM_BITS;
            if available > EC_WINDOW_SIZE - EC_SYM_BITS {
                break;
            }
        }
    }
    let ret = window & ((1u32 << bits) - 1);
    window >>= bits;
    available -= bits as i32;
    this.end_window = window;
    this.nend_bits = available;
    this.nbits_total += bits as i32;
    ret
}
