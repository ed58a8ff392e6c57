//! Range encoder.
//!
//! Upstream C: `celt/entenc.c`

use crate::celt::entcode::{
    celt_udiv, ec_ctx, ec_enc, ec_ilog, ec_window, EC_CODE_BITS, EC_CODE_BOT, EC_CODE_SHIFT,
    EC_CODE_TOP, EC_SYM_BITS, EC_SYM_MAX, EC_UINT_BITS, EC_WINDOW_SIZE,
};

fn ec_write_byte(this: &mut ec_enc, value: u32) -> i32 {
    if this.offs + this.end_offs >= this.storage {
        return -1;
    }
    this.buf[this.offs as usize] = value as u8;
    this.offs += 1;
    0
}

fn ec_write_byte_at_end(this: &mut ec_enc, value: u32) -> i32 {
    if this.offs + this.end_offs >= this.storage {
        return -1;
    }
    this.end_offs += 1;
    this.buf[(this.storage - this.end_offs) as usize] = value as u8;
    0
}

/// Outputs a symbol, with a carry bit.
///
/// Runs of 0xFF are buffered in `ext` until the carry into them is known.
fn ec_enc_carry_out(this: &mut ec_enc, c: i32) {
    if c as u32 != EC_SYM_MAX {
        let carry = c >> EC_SYM_BITS;
        if this.rem >= 0 {
            this.error |= ec_write_byte(this, (this.rem + carry) as u32);
        }
        if this.ext > 0 {
            let sym = (EC_SYM_MAX.wrapping_add(carry as u32)) & EC_SYM_MAX;
            loop {
                this.error |= ec_write_byte(this, sym);
                this.ext -= 1;
                if this.ext == 0 {
                    break;
                }
            }
        }
        this.rem = (c as u32 & EC_SYM_MAX) as i32;
    } else {
        this.ext += 1;
    }
}

#[inline]
fn ec_enc_normalize(this: &mut ec_enc) {
    while this.rng <= EC_CODE_BOT {
        ec_enc_carry_out(this, (this.val >> EC_CODE_SHIFT) as i32);
        this.val = (this.val << EC_SYM_BITS) & (EC_CODE_TOP - 1);
        this.rng <<= EC_SYM_BITS;
        this.nbits_total += EC_SYM_BITS;
    }
}

/// Upstream C: celt/entenc.c:ec_enc_init
pub fn ec_enc_init(buf: &mut [u8]) -> ec_enc<'_> {
    let mut enc = ec_ctx::new(buf);
    enc.nbits_total = EC_CODE_BITS + 1;
    enc.rng = EC_CODE_TOP;
    enc.rem = -1;
    enc
}

/// Encodes a symbol occupying `[fl, fh)` out of a total of `ft`.
///
/// Upstream C: celt/entenc.c:ec_encode
pub fn ec_encode(this: &mut ec_enc, fl: u32, fh: u32, ft: u32) {
    let r = celt_udiv(this.rng, ft);
    if fl > 0 {
        this.val = this
            .val
            .wrapping_add(this.rng.wrapping_sub(r.wrapping_mul(ft - fl)));
        this.rng = r.wrapping_mul(fh - fl);
    } else {
        this.rng = this.rng.wrapping_sub(r.wrapping_mul(ft - fh));
    }
    ec_enc_normalize(this);
}

/// Upstream C: celt/entenc.c:ec_encode_bin
pub fn ec_encode_bin(this: &mut ec_enc, fl: u32, fh: u32, bits: u32) {
    let r = this.rng >> bits;
    if fl > 0 {
        this.val = this
            .val
            .wrapping_add(this.rng.wrapping_sub(r.wrapping_mul((1u32 << bits) - fl)));
        this.rng = r.wrapping_mul(fh - fl);
    } else {
        this.rng = this
            .rng
            .wrapping_sub(r.wrapping_mul((1u32 << bits) - fh));
    }
    ec_enc_normalize(this);
}

/// Encodes a bit whose probability of being one is `1/(1<<logp)`.
///
/// Upstream C: celt/entenc.c:ec_enc_bit_logp
pub fn ec_enc_bit_logp(this: &mut ec_enc, val: i32, logp: u32) {
    let mut r = this.rng;
    let l = this.val;
    let s = r >> logp;
    r -= s;
    if val != 0 {
        this.val = l.wrapping_add(r);
    }
    this.rng = if val != 0 { s } else { r };
    ec_enc_normalize(this);
}

/// Encodes a symbol given an "inverse" CDF table scaled to `1<<ftb`.
///
/// Upstream C: celt/entenc.c:ec_enc_icdf
pub fn ec_enc_icdf(this: &mut ec_enc, s: i32, icdf: &[u8], ftb: u32) {
    let r = this.rng >> ftb;
    let s = s as usize;
    if s > 0 {
        this.val = this
            .val
            .wrapping_add(this.rng.wrapping_sub(r.wrapping_mul(icdf[s - 1] as u32)));
        this.rng = r.wrapping_mul((icdf[s - 1] - icdf[s]) as u32);
    } else {
        this.rng = this.rng.wrapping_sub(r.wrapping_mul(icdf[s] as u32));
    }
    ec_enc_normalize(this);
}

/// Encodes a uniformly distributed integer in `[0, ft)`.
///
/// Upstream C: celt/entenc.c:ec_enc_uint
pub fn ec_enc_uint(this: &mut ec_enc, fl: u32, ft: u32) {
    debug_assert!(ft > 1);
    let ft = ft - 1;
    let mut ftb = ec_ilog(ft);
    if ftb > EC_UINT_BITS {
        ftb -= EC_UINT_BITS;
        let t = (ft >> ftb) + 1;
        let f = fl >> ftb;
        ec_encode(this, f, f + 1, t);
        ec_enc_bits(this, fl & ((1u32 << ftb) - 1), ftb as u32);
    } else {
        ec_encode(this, fl, fl + 1, ft + 1);
    }
}

/// Writes raw bits at the end of the buffer.
///
/// Upstream C: celt/entenc.c:ec_enc_bits
pub fn ec_enc_bits(this: &mut ec_enc, fl: u32, bits: u32) {
    let mut window: ec_window = this.end_window;
    let mut used = this.nend_bits;
    debug_assert!(bits > 0);
    if used + bits as i32 > EC_WINDOW_SIZE {
        loop {
            this.error |= ec_write_byte_at_end(this, window & EC_SYM_MAX);
            window >>= EC_SYM_BITS;
            used -= EC_SYM_BITS;
            if used < EC_SYM_BITS {
                break;
            }
        }
    }
    window |= fl << used;
    used += bits as i32;
    this.end_window = window;
    this.nend_bits = used;
    this.nbits_total += bits as i32;
}

/// Overwrites the first `nbits` bits of the stream.
///
/// Upstream C: celt/entenc.c:ec_enc_patch_initial_bits
pub fn ec_enc_patch_initial_bits(this: &mut ec_enc, val: u32, nbits: u32) {
    debug_assert!(nbits <= EC_SYM_BITS as u32);
    let shift = EC_SYM_BITS as u32 - nbits;
    let mask = ((1u32 << nbits) - 1) << shift;
    if this.offs > 0 {
        this.buf[0] = ((this.buf[0] as u32 & !mask) | (val << shift)) as u8;
    } else if this.rem >= 0 {
        this.rem = ((this.rem as u32 & !mask) | (val << shift)) as i32;
    } else if this.rng <= EC_CODE_TOP >> nbits {
        this.val = (this.val & !(mask << EC_CODE_SHIFT)) | (val << (EC_CODE_SHIFT as u32 + shift));
    } else {
        this.error = -1;
    }
}

/// Compacts the buffer to `size` bytes, moving raw bits to the new end.
///
/// Upstream C: celt/entenc.c:ec_enc_shrink
pub fn ec_enc_shrink(this: &mut ec_enc, size: u32) {
    debug_assert!(this.offs + this.end_offs <= size);
    let end = this.end_offs as usize;
    let from = (this.storage - this.end_offs) as usize;
    let to = size as usize - end;
    this.buf.copy_within(from..from + end, to);
    this.storage = size;
}

/// Flushes the encoder, writing the minimum number of bytes that identify
/// the final interval.
///
/// Upstream C: celt/entenc.c:ec_enc_done
pub fn ec_enc_done(this: &mut ec_enc) {
    let mut l = EC_CODE_BITS - ec_ilog(this.rng);
    let mut msk = (EC_CODE_TOP - 1) >> l;
    let mut end = this.val.wrapping_add(msk) & !msk;
    if (end | msk) >= this.val.wrapping_add(this.rng) {
        l += 1;
        msk >>= 1;
        end = this.val.wrapping_add(msk) & !msk;
    }
    while l > 0 {
        ec_enc_carry_out(this, (end >> EC_CODE_SHIFT) as i32);
        end = (end << EC_SYM_BITS) & (EC_CODE_TOP - 1);
        l -= EC_SYM_BITS;
    }
    if this.rem >= 0 || this.ext > 0 {
        ec_enc_carry_out(this, 0);
    }
    let mut window = this.end_window;
    let mut used = this.nend_bits;
    while used >= EC_SYM_BITS {
        this.error |= ec_write_byte_at_end(this, window & EC_SYM_MAX);
        window >>= EC_SYM_BITS;
        used -= EC_SYM_BITS;
    }
    if this.error == 0 {
        let start = this.offs as usize;
        let stop = (this.storage - this.end_offs) as usize;
        this.buf[start..stop].fill(0);
        if used > 0 {
            if this.end_offs >= this.storage {
                this.error = -1;
            } else {
                l = -l;
                if this.offs + this.end_offs >= this.storage && l < used {
                    window &= (1u32 << l) - 1;
                    this.error = -1;
                }
                let idx = (this.storage - this.end_offs - 1) as usize;
                this.buf[idx] |= window as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::celt::entcode::{ec_tell, ec_tell_frac};

    #[test]
    fn fresh_encoder_reports_one_bit() {
        let mut buf = [0u8; 16];
        let enc = ec_enc_init(&mut buf);
        assert_eq!(ec_tell(&enc), 1);
        assert_eq!(ec_tell_frac(&enc), 8);
    }

    #[test]
    fn raw_bits_cost_exactly_their_width() {
        let mut buf = [0u8; 16];
        let mut enc = ec_enc_init(&mut buf);
        let before = ec_tell(&enc);
        ec_enc_bits(&mut enc, 5, 3);
        ec_enc_bits(&mut enc, 1, 1);
        assert_eq!(ec_tell(&enc) - before, 4);
        ec_enc_done(&mut enc);
        assert_eq!(enc.error, 0);
        assert_eq!(buf[15], 0b1101);
    }

    #[test]
    fn shrink_moves_raw_bits() {
        let mut buf = [0u8; 16];
        let mut enc = ec_enc_init(&mut buf);
        ec_enc_uint(&mut enc, 3, 7);
        ec_enc_bits(&mut enc, 0xA5, 8);
        ec_enc_shrink(&mut enc, 4);
        ec_enc_done(&mut enc);
        assert_eq!(enc.error, 0);
        assert_eq!(enc.storage, 4);
        assert_eq!(buf[3], 0xA5);
    }
}
