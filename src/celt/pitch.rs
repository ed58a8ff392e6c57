//! Inner products over normalized coefficients.
//!
//! Upstream C: `celt/pitch.h`

use crate::celt::fixed_generic::{celt_norm, opus_val32, MAC16_16};

/// Upstream C: celt/pitch.h:celt_inner_prod
///
/// Fixed-point dot product of the first `N` elements of `x` and `y`,
/// accumulated with wrapping 32-bit arithmetic.
#[inline]
pub fn celt_inner_prod(x: &[celt_norm], y: &[celt_norm], N: usize) -> opus_val32 {
    x[..N]
        .iter()
        .zip(&y[..N])
        .fold(0, |xy, (&a, &b)| MAC16_16(xy, a, b))
}

/// Upstream C: celt/pitch.h:dual_inner_prod
///
/// Computes two inner products simultaneously: `(x . y01, x . y02)`.
#[inline]
pub fn dual_inner_prod(
    x: &[celt_norm],
    y01: &[celt_norm],
    y02: &[celt_norm],
    n: usize,
) -> (opus_val32, opus_val32) {
    let mut xy01: opus_val32 = 0;
    let mut xy02: opus_val32 = 0;
    for i in 0..n {
        xy01 = MAC16_16(xy01, x[i], y01[i]);
        xy02 = MAC16_16(xy02, x[i], y02[i]);
    }
    (xy01, xy02)
}
