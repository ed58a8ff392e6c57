//! Band energy means and the amplitude to log-energy conversion.
//!
//! Upstream C: `celt/quant_bands.c`

use crate::celt::fixed_generic::{celt_ener, opus_val16, DB_SHIFT, SHL16, SHL32, SUB16};
use crate::celt::mathops::celt_log2;
use crate::celt::modes::OpusCustomMode;

/// Mean band log-energy in Q4 dB-like units (log2 scale, 1/16 steps).
pub static eMeans: [i8; 25] = [
    103, 100, 92, 85, 81, 77, 72, 70, 78, 75, 73, 71, 78, 74, 69, 72, 70, 74, 76, 71, 60, 60, 60,
    60, 60,
];

/// `eMeans[i]` in Q(DB_SHIFT).
#[inline]
pub fn eMean(i: usize) -> opus_val16 {
    SHL16(eMeans[i] as opus_val16, 6)
}

/// Converts band amplitudes to mean-removed base-2 log energies.
///
/// Upstream C: celt/quant_bands.c:amp2Log2
pub fn amp2Log2(
    m: &OpusCustomMode,
    effEnd: usize,
    end: usize,
    bandE: &[celt_ener],
    bandLogE: &mut [opus_val16],
    C: usize,
) {
    let nb = m.nbEBands;
    for c in 0..C {
        for i in 0..effEnd {
            bandLogE[i + c * nb] = SUB16(celt_log2(SHL32(bandE[i + c * nb], 2)), eMean(i));
        }
        for v in &mut bandLogE[c * nb + effEnd..c * nb + end] {
            *v = -((14 << DB_SHIFT) as opus_val16);
        }
    }
}
