//! Fixed-point, bit-exact CELT spectral band quantizer.
//!
//! Codes the normalized MDCT spectrum of a CELT frame band by band with
//! pyramid vector quantization, recursive theta splitting and spectral
//! folding, producing the same bitstream and reconstruction as the
//! fixed-point build of libopus.
//!
//! The checked entry point is [`quant_all_bands`], driven by a
//! [`QuantBandsConfig`]. The raw routines are reachable through
//! [`internals`].

#![allow(non_snake_case)]

mod celt;
mod enums;
mod error;

use log::debug;

pub use crate::celt::bands::{
    anti_collapse, compute_band_energies, denormalise_bands, normalise_bands, spreading_decision,
    SPREAD_AGGRESSIVE, SPREAD_LIGHT, SPREAD_NONE, SPREAD_NORMAL,
};
pub use crate::celt::entcode::{ec_ctx, ec_dec, ec_enc, ec_get_error, ec_tell, ec_tell_frac};
pub use crate::celt::entdec::ec_dec_init;
pub use crate::celt::entenc::{ec_enc_done, ec_enc_init};
pub use crate::celt::fixed_generic::{celt_ener, celt_norm, celt_sig, opus_val16, opus_val32};
pub use crate::celt::modes::{opus_custom_mode_create, OpusCustomMode, PulseCache};
pub use crate::enums::{Channels, FrameSize, Spread};
pub use crate::error::{
    ErrorCode, Result, OPUS_ALLOC_FAIL, OPUS_BAD_ARG, OPUS_BUFFER_TOO_SMALL, OPUS_INTERNAL_ERROR,
    OPUS_INVALID_PACKET, OPUS_INVALID_STATE, OPUS_OK, OPUS_UNIMPLEMENTED,
};

/// Per-frame parameters for [`quant_all_bands`].
///
/// `total_bits` and `balance` are in 1/8 bit units. `resynth` only matters
/// for the encoder: the decoder always reconstructs the spectrum.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct QuantBandsConfig {
    pub encode: bool,
    pub resynth: bool,
    pub start: usize,
    pub end: usize,
    pub channels: Channels,
    pub shortBlocks: bool,
    pub spread: Spread,
    pub dual_stereo: bool,
    pub intensity: usize,
    pub total_bits: i32,
    pub balance: i32,
    pub LM: i32,
    pub codedBands: usize,
}

impl QuantBandsConfig {
    /// A full-band mono frame of `frame_size` with the usual spreading.
    pub fn new(encode: bool, frame_size: FrameSize, total_bits: i32) -> Self {
        Self {
            encode,
            resynth: false,
            start: 0,
            end: 21,
            channels: Channels::Mono,
            shortBlocks: false,
            spread: Spread::Normal,
            dual_stereo: false,
            intensity: 21,
            total_bits,
            balance: 0,
            LM: frame_size.lm(),
            codedBands: 21,
        }
    }

    /// Checks the parameters against `m` and the buffers that will be
    /// handed to [`quant_all_bands`].
    pub fn validate(
        &self,
        m: &OpusCustomMode,
        X: &[celt_norm],
        Y: Option<&[celt_norm]>,
        collapse_masks: &[u8],
        bandE: &[celt_ener],
        pulses: &[i32],
        tf_res: &[i32],
    ) -> Result<()> {
        let nb = m.nbEBands;
        let C = self.channels.count();
        if self.start >= self.end || self.end > nb {
            return Err(ErrorCode::BadArg);
        }
        if self.LM < 0 || self.LM > m.maxLM {
            return Err(ErrorCode::BadArg);
        }
        if self.codedBands < self.start || self.codedBands > self.end {
            return Err(ErrorCode::BadArg);
        }
        if self.intensity > nb || self.total_bits < 0 {
            return Err(ErrorCode::BadArg);
        }
        if Y.is_some() != (self.channels == Channels::Stereo) {
            return Err(ErrorCode::BadArg);
        }
        if self.dual_stereo && self.channels == Channels::Mono {
            return Err(ErrorCode::BadArg);
        }

        let coded = (m.eBands[self.end] as usize) << self.LM;
        if X.len() < coded || Y.is_some_and(|y| y.len() < coded) {
            return Err(ErrorCode::BufferTooSmall);
        }
        if collapse_masks.len() < C * self.end
            || pulses.len() < self.end
            || tf_res.len() < self.end
        {
            return Err(ErrorCode::BufferTooSmall);
        }
        // A band can only be recombined into as many blocks as it has.
        let max_recombine = if self.shortBlocks { self.LM } else { 0 };
        if tf_res[self.start..self.end].iter().any(|&tf| tf > max_recombine) {
            return Err(ErrorCode::BadArg);
        }
        // Only the stereo encoder reads the energies.
        if self.encode && C == 2 && bandE.len() < C * nb {
            return Err(ErrorCode::BufferTooSmall);
        }
        Ok(())
    }
}

/// Codes (`cfg.encode`) or decodes the fine structure of one frame.
///
/// `X` and `Y` hold the unit-norm spectra (`Y` only for stereo). On return
/// `collapse_masks[i * C + c]` has one bit per short block of band `i` that
/// received energy, and `seed` has advanced past the folding noise.
///
/// ```
/// use celt_bands::*;
///
/// let m = opus_custom_mode_create(48000, 960).unwrap();
/// let cfg = QuantBandsConfig::new(false, FrameSize::Ms20, 0);
/// let mut buf = [0u8; 8];
/// let mut dec = ec_dec_init(&mut buf);
/// let mut x = vec![0i16; 960];
/// let mut masks = [0u8; 21];
/// let mut seed = 0;
/// quant_all_bands(&cfg, m, &mut x, None, &mut masks, &[], &[0; 21], &[0; 21], &mut dec, &mut seed)
///     .unwrap();
/// ```
pub fn quant_all_bands(
    cfg: &QuantBandsConfig,
    m: &OpusCustomMode,
    X: &mut [celt_norm],
    Y: Option<&mut [celt_norm]>,
    collapse_masks: &mut [u8],
    bandE: &[celt_ener],
    pulses: &[i32],
    tf_res: &[i32],
    ec: &mut ec_ctx,
    seed: &mut u32,
) -> Result<()> {
    if let Err(e) = cfg.validate(m, X, Y.as_deref(), collapse_masks, bandE, pulses, tf_res) {
        debug!("quant_all_bands: rejected {:?}: {}", cfg, e);
        return Err(e);
    }
    celt::bands::quant_all_bands(
        cfg.encode as i32,
        m,
        cfg.start as i32,
        cfg.end as i32,
        X,
        Y,
        collapse_masks,
        bandE,
        pulses,
        cfg.shortBlocks as i32,
        cfg.spread.into(),
        cfg.dual_stereo as i32,
        cfg.intensity as i32,
        tf_res,
        cfg.total_bits,
        cfg.balance,
        ec,
        cfg.LM,
        cfg.codedBands as i32,
        seed,
        cfg.resynth as i32,
    );
    Ok(())
}

/// Lower-level routines, unchecked. Exposed for tests and benchmarks.
pub mod internals {
    pub use crate::celt::bands::{
        bitexact_cos, bitexact_log2tan, celt_lcg_rand, deinterleave_hadamard, haar1,
        hysteresis_decision, interleave_hadamard, quant_all_bands,
    };
    pub use crate::celt::cwrs::{cwrsi, decode_pulses, encode_pulses, icwrs, log2_frac, pvq_v};
    pub use crate::celt::entcode::{celt_sudiv, celt_udiv, ec_ilog, ec_range_bytes, BITRES};
    pub use crate::celt::entdec::{
        ec_dec_bit_logp, ec_dec_bits, ec_dec_icdf, ec_dec_uint, ec_dec_update, ec_decode,
        ec_decode_bin,
    };
    pub use crate::celt::entenc::{
        ec_enc_bit_logp, ec_enc_bits, ec_enc_icdf, ec_enc_patch_initial_bits, ec_enc_shrink,
        ec_enc_uint, ec_encode, ec_encode_bin,
    };
    pub use crate::celt::mathops::{
        celt_atan2p, celt_cos_norm, celt_exp2, celt_ilog2, celt_log2, celt_rcp, celt_rsqrt_norm,
        celt_sqrt, isqrt32,
    };
    pub use crate::celt::pitch::{celt_inner_prod, dual_inner_prod};
    pub use crate::celt::quant_bands::{amp2Log2, eMean};
    pub use crate::celt::rate::{bits2pulses, get_pulses, pulses2bits};
    pub use crate::celt::vq::{alg_quant, alg_unquant, exp_rotation, renormalise_vector};
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffers() -> (Vec<celt_norm>, Vec<u8>, Vec<i32>, Vec<i32>) {
        (vec![0; 960], vec![0; 42], vec![0; 21], vec![0; 21])
    }

    #[test]
    fn default_config_validates() {
        let m = opus_custom_mode_create(48000, 960).unwrap();
        let (x, masks, pulses, tf) = buffers();
        let cfg = QuantBandsConfig::new(true, FrameSize::Ms20, 800);
        assert_eq!(cfg.validate(m, &x, None, &masks, &[], &pulses, &tf), Ok(()));
    }

    #[test]
    fn bad_configs_are_rejected() {
        let m = opus_custom_mode_create(48000, 960).unwrap();
        let (x, masks, pulses, tf) = buffers();
        let base = QuantBandsConfig::new(false, FrameSize::Ms20, 800);
        let check = |cfg: QuantBandsConfig| cfg.validate(m, &x, None, &masks, &[], &pulses, &tf);

        assert_eq!(check(QuantBandsConfig { start: 5, end: 5, ..base }), Err(ErrorCode::BadArg));
        assert_eq!(check(QuantBandsConfig { end: 22, ..base }), Err(ErrorCode::BadArg));
        assert_eq!(check(QuantBandsConfig { LM: 4, ..base }), Err(ErrorCode::BadArg));
        assert_eq!(check(QuantBandsConfig { LM: -1, ..base }), Err(ErrorCode::BadArg));
        assert_eq!(
            check(QuantBandsConfig { start: 3, codedBands: 2, ..base }),
            Err(ErrorCode::BadArg)
        );
        assert_eq!(check(QuantBandsConfig { total_bits: -1, ..base }), Err(ErrorCode::BadArg));
        assert_eq!(check(QuantBandsConfig { dual_stereo: true, ..base }), Err(ErrorCode::BadArg));
        assert_eq!(
            check(QuantBandsConfig { channels: Channels::Stereo, ..base }),
            Err(ErrorCode::BadArg)
        );
    }

    #[test]
    fn tf_res_cannot_exceed_the_block_count() {
        let m = opus_custom_mode_create(48000, 960).unwrap();
        let (x, masks, pulses, mut tf) = buffers();
        let long = QuantBandsConfig::new(false, FrameSize::Ms20, 800);
        let short = QuantBandsConfig { shortBlocks: true, ..long };
        let check = |cfg: &QuantBandsConfig, tf: &[i32]| {
            cfg.validate(m, &x, None, &masks, &[], &pulses, tf)
        };

        tf[4] = 1;
        assert_eq!(check(&long, &tf), Err(ErrorCode::BadArg));
        assert_eq!(check(&short, &tf), Ok(()));
        tf[4] = 3;
        assert_eq!(check(&short, &tf), Ok(()));
        tf[4] = 4;
        assert_eq!(check(&short, &tf), Err(ErrorCode::BadArg));
        tf[4] = 40;
        assert_eq!(check(&short, &tf), Err(ErrorCode::BadArg));
        // Outside the coded range nothing is read.
        assert_eq!(check(&QuantBandsConfig { start: 5, ..short }, &tf), Ok(()));
        // Time splits are always allowed.
        tf[4] = -3;
        assert_eq!(check(&long, &tf), Ok(()));
    }

    #[test]
    fn short_buffers_are_rejected() {
        let m = opus_custom_mode_create(48000, 960).unwrap();
        let (x, masks, pulses, tf) = buffers();
        let cfg = QuantBandsConfig::new(false, FrameSize::Ms20, 800);
        assert_eq!(
            cfg.validate(m, &x[..799], None, &masks, &[], &pulses, &tf),
            Err(ErrorCode::BufferTooSmall)
        );
        assert_eq!(
            cfg.validate(m, &x, None, &masks[..20], &[], &pulses, &tf),
            Err(ErrorCode::BufferTooSmall)
        );
        assert_eq!(
            cfg.validate(m, &x, None, &masks, &[], &pulses[..20], &tf),
            Err(ErrorCode::BufferTooSmall)
        );

        let stereo = QuantBandsConfig { encode: true, channels: Channels::Stereo, ..cfg };
        assert_eq!(
            stereo.validate(m, &x, Some(&x), &masks, &[1; 21], &pulses, &tf),
            Err(ErrorCode::BufferTooSmall)
        );
        assert_eq!(stereo.validate(m, &x, Some(&x), &masks, &[1; 42], &pulses, &tf), Ok(()));
    }
}
