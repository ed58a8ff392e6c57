/// Range coder checks following upstream `celt/tests/test_unit_entropy.c`.
///
/// Upstream C: celt/tests/test_unit_entropy.c
mod test_common;

use celt_bands::internals::{
    ec_dec_bit_logp, ec_dec_bits, ec_dec_icdf, ec_dec_uint, ec_dec_update, ec_decode,
    ec_decode_bin, ec_enc_bit_logp, ec_enc_bits, ec_enc_icdf, ec_enc_patch_initial_bits,
    ec_enc_uint, ec_encode, ec_encode_bin,
};
use celt_bands::{ec_dec_init, ec_enc_done, ec_enc_init, ec_tell, ec_tell_frac};
use test_common::TestRng;

/// Upstream draws from `rand()`, which tops out at 2^31-1.
const RAND_MAX: u32 = 0x7FFF_FFFF;

fn crand(rng: &mut TestRng) -> u32 {
    rng.next_u32() & RAND_MAX
}

/// A value in `0..=RAND_MAX >> shift` with the shift itself random in
/// `0..spread`, which gives sizes spread over many orders of magnitude.
fn log_uniform(rng: &mut TestRng, spread: u32) -> u32 {
    let shift = crand(rng) % spread;
    crand(rng) / ((RAND_MAX >> shift) + 1)
}

#[test]
fn uint_and_raw_bits_round_trip() {
    let mut buf = vec![0u8; 1 << 20];
    let mut enc = ec_enc_init(&mut buf);
    for ft in 2u32..1024 {
        for i in 0..ft {
            ec_enc_uint(&mut enc, i, ft);
        }
    }
    for ftb in 1u32..16 {
        for i in 0..1u32 << ftb {
            let before = ec_tell(&enc);
            ec_enc_bits(&mut enc, i, ftb);
            assert_eq!(ec_tell(&enc) - before, ftb as i32, "raw bits must cost exactly {ftb}");
        }
    }
    let used = ec_tell_frac(&enc);
    ec_enc_done(&mut enc);
    assert_eq!(enc.error, 0);

    let mut dec = ec_dec_init(&mut buf);
    for ft in 2u32..1024 {
        for i in 0..ft {
            assert_eq!(ec_dec_uint(&mut dec, ft), i, "ft={ft}");
        }
    }
    for ftb in 1u32..16 {
        for i in 0..1u32 << ftb {
            assert_eq!(ec_dec_bits(&mut dec, ftb), i, "ftb={ftb}");
        }
    }
    assert_eq!(ec_tell_frac(&dec), used);
}

/// When the buffer runs out, range-coded data wins over raw bits.
#[test]
fn overflow_prefers_range_coder_data() {
    let mut buf = [0u8; 2];
    let mut enc = ec_enc_init(&mut buf);
    ec_enc_bits(&mut enc, 0x55, 7);
    for (fl, ft) in [(1, 2), (1, 3), (1, 4), (1, 5), (2, 6), (6, 7)] {
        ec_enc_uint(&mut enc, fl, ft);
    }
    ec_enc_done(&mut enc);
    assert_ne!(enc.error, 0);

    let mut dec = ec_dec_init(&mut buf);
    assert_eq!(ec_dec_bits(&mut dec, 7), 0x05);
    for (fl, ft) in [(1, 2), (1, 3), (1, 4), (1, 5), (2, 6), (6, 7)] {
        assert_eq!(ec_dec_uint(&mut dec, ft), fl);
    }
}

#[test]
fn random_uint_streams_track_tell() {
    let seed = test_common::get_test_seed();
    let mut rng = TestRng::new(seed);
    let mut buf = vec![0u8; 10_000];

    for iter in 0..20_000 {
        let ft = log_uniform(&mut rng, 11) + 10;
        let sz = log_uniform(&mut rng, 9) as usize;
        let zeros = crand(&mut rng) % 13 == 0;

        let mut data = Vec::with_capacity(sz);
        let mut tell = vec![0u32; sz + 1];
        let mut enc = ec_enc_init(&mut buf);
        tell[0] = ec_tell_frac(&enc);
        for j in 0..sz {
            let v = if zeros { 0 } else { crand(&mut rng) % ft };
            ec_enc_uint(&mut enc, v, ft);
            data.push(v);
            tell[j + 1] = ec_tell_frac(&enc);
        }
        if crand(&mut rng) % 2 == 0 {
            while ec_tell(&enc) % 8 != 0 {
                ec_enc_uint(&mut enc, crand(&mut rng) % 2, 2);
            }
        }
        let tell_bits = ec_tell(&enc) as u32;
        ec_enc_done(&mut enc);
        assert_eq!(ec_tell(&enc) as u32, tell_bits, "seed {seed} iter {iter}");
        assert!((tell_bits + 7) / 8 >= enc.offs, "seed {seed} iter {iter}");

        let mut dec = ec_dec_init(&mut buf);
        assert_eq!(ec_tell_frac(&dec), tell[0]);
        for (j, &v) in data.iter().enumerate() {
            assert_eq!(ec_dec_uint(&mut dec, ft), v, "seed {seed} iter {iter} pos {j}");
            assert_eq!(ec_tell_frac(&dec), tell[j + 1], "seed {seed} iter {iter} pos {j}");
        }
    }
}

/// Binary symbols written with one primitive decode with any other.
#[test]
fn binary_symbol_primitives_interoperate() {
    let seed = test_common::get_test_seed();
    let mut rng = TestRng::new(seed);
    let mut buf = vec![0u8; 10_000];
    const ICDF: [u8; 2] = [1, 0];

    for iter in 0..20_000 {
        let sz = log_uniform(&mut rng, 9) as usize;
        let mut symbols = Vec::with_capacity(sz);
        let mut tell = vec![0u32; sz + 1];

        let mut enc = ec_enc_init(&mut buf);
        tell[0] = ec_tell_frac(&enc);
        for j in 0..sz {
            let bit = crand(&mut rng) / ((RAND_MAX >> 1) + 1);
            let logp = crand(&mut rng) % 15 + 1;
            let p = 1u32 << logp;
            let (fl, fh) = if bit != 0 { (p - 1, p) } else { (0, p - 1) };
            match crand(&mut rng) / ((RAND_MAX >> 2) + 1) {
                0 => ec_encode(&mut enc, fl, fh, p),
                1 => ec_encode_bin(&mut enc, fl, fh, logp),
                2 => ec_enc_bit_logp(&mut enc, bit as i32, logp),
                _ => ec_enc_icdf(&mut enc, bit as i32, &ICDF, logp),
            }
            symbols.push((bit, logp));
            tell[j + 1] = ec_tell_frac(&enc);
        }
        ec_enc_done(&mut enc);
        assert!((ec_tell(&enc) as u32 + 7) / 8 >= enc.offs);

        let mut dec = ec_dec_init(&mut buf);
        for (j, &(bit, logp)) in symbols.iter().enumerate() {
            let p = 1u32 << logp;
            let got = match crand(&mut rng) / ((RAND_MAX >> 2) + 1) {
                m @ (0 | 1) => {
                    let fs = if m == 0 {
                        ec_decode(&mut dec, p)
                    } else {
                        ec_decode_bin(&mut dec, logp)
                    };
                    let s = (fs >= p - 1) as u32;
                    let (fl, fh) = if s != 0 { (p - 1, p) } else { (0, p - 1) };
                    ec_dec_update(&mut dec, fl, fh, p);
                    s
                }
                2 => ec_dec_bit_logp(&mut dec, logp) as u32,
                _ => ec_dec_icdf(&mut dec, &ICDF, logp) as u32,
            };
            assert_eq!(got, bit, "seed {seed} iter {iter} pos {j} logp {logp}");
            assert_eq!(ec_tell_frac(&dec), tell[j + 1]);
        }
    }
}

#[test]
fn patch_initial_bits() {
    let mut buf = vec![0u8; 16];
    {
        let mut enc = ec_enc_init(&mut buf);
        for _ in 0..4 {
            ec_enc_bit_logp(&mut enc, 0, 1);
        }
        ec_enc_bit_logp(&mut enc, 0, 2);
        ec_enc_patch_initial_bits(&mut enc, 3, 2);
        assert_eq!(enc.error, 0);
        // Not enough data yet for five bits.
        ec_enc_patch_initial_bits(&mut enc, 0, 5);
        assert_ne!(enc.error, 0);
        ec_enc_done(&mut enc);
        assert_eq!(enc.offs, 1);
    }
    assert_eq!(buf[0], 192);
    {
        let mut enc = ec_enc_init(&mut buf);
        ec_enc_bit_logp(&mut enc, 0, 1);
        ec_enc_bit_logp(&mut enc, 0, 1);
        ec_enc_bit_logp(&mut enc, 1, 6);
        ec_enc_bit_logp(&mut enc, 0, 2);
        ec_enc_patch_initial_bits(&mut enc, 0, 2);
        assert_eq!(enc.error, 0);
        ec_enc_done(&mut enc);
        assert_eq!(enc.offs, 2);
    }
    assert_eq!(buf[0], 63);
}

#[test]
fn raw_bits_overfill_is_reported() {
    let mut buf = [0u8; 2];
    let mut enc = ec_enc_init(&mut buf);
    ec_enc_bit_logp(&mut enc, 0, 2);
    for _ in 0..48 {
        ec_enc_bits(&mut enc, 0, 1);
    }
    ec_enc_done(&mut enc);
    assert_ne!(enc.error, 0);

    let mut enc = ec_enc_init(&mut buf);
    for _ in 0..17 {
        ec_enc_bits(&mut enc, 0, 1);
    }
    ec_enc_done(&mut enc);
    assert_ne!(enc.error, 0);
}
