//! Shared test infrastructure: deterministic RNG, seed management and
//! generators for normalized spectra, allocations and frame layouts.

#![allow(dead_code)]
#![allow(non_snake_case)]

use std::sync::atomic::{AtomicU32, Ordering};

use celt_bands::{
    compute_band_energies, normalise_bands, celt_ener, celt_norm, celt_sig, OpusCustomMode,
};

// ---------------------------------------------------------------------------
// Deterministic RNG: Marsaglia MWC, matches upstream fast_rand()
// ---------------------------------------------------------------------------

pub struct TestRng {
    rz: u32,
    rw: u32,
}

impl TestRng {
    /// `Rz = seed; Rw = 0;` like the upstream unit tests.
    pub fn new(seed: u32) -> Self {
        Self { rz: seed, rw: 0 }
    }

    /// `Rz = Rw = iseed;` like the upstream integration tests.
    pub fn from_iseed(iseed: u32) -> Self {
        Self {
            rz: iseed,
            rw: iseed,
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.rz = 36969u32
            .wrapping_mul(self.rz & 65535)
            .wrapping_add(self.rz >> 16);
        self.rw = 18000u32
            .wrapping_mul(self.rw & 65535)
            .wrapping_add(self.rw >> 16);
        (self.rz << 16).wrapping_add(self.rw)
    }

    /// Uniform in `0..n`.
    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }

    pub fn coin(&mut self) -> bool {
        self.next_u32() & 0x100 != 0
    }
}

// ---------------------------------------------------------------------------
// Seed management
// ---------------------------------------------------------------------------

static GLOBAL_SEED: AtomicU32 = AtomicU32::new(0);

/// Seed from `TEST_SEED`, or a fresh one that is printed for reproduction.
pub fn get_test_seed() -> u32 {
    let seed = match std::env::var("TEST_SEED") {
        Ok(val) => {
            let seed: u32 = val.parse().expect("TEST_SEED must be a valid u32");
            eprintln!("Using TEST_SEED={seed}");
            seed
        }
        Err(_) => {
            let seed = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .subsec_nanos();
            eprintln!("Random seed: {seed} (set TEST_SEED={seed} to reproduce)");
            seed
        }
    };
    GLOBAL_SEED.store(seed, Ordering::Relaxed);
    seed
}

pub fn last_seed() -> u32 {
    GLOBAL_SEED.load(Ordering::Relaxed)
}

/// Routes the crate's `log` output to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// Signal generators
// ---------------------------------------------------------------------------

/// Per-channel MDCT size for a frame of `1 << LM` short blocks.
pub fn frame_len(m: &OpusCustomMode, LM: i32) -> usize {
    (m.shortMdctSize << LM) as usize
}

/// Random MDCT coefficients for `C` channels. Some bands are made tonal
/// (a single strong peak) so both the flat and the peaky code paths run.
pub fn random_mdct(rng: &mut TestRng, m: &OpusCustomMode, LM: i32, C: usize) -> Vec<celt_sig> {
    let N = frame_len(m, LM);
    let mut freq = vec![0 as celt_sig; C * N];
    for c in 0..C {
        for i in 0..m.nbEBands {
            let lo = c * N + ((m.eBands[i] as usize) << LM);
            let hi = c * N + ((m.eBands[i + 1] as usize) << LM);
            let amp = 1 + rng.below(1 << 16) as i32;
            let tonal = rng.below(4) == 0;
            for (j, f) in freq[lo..hi].iter_mut().enumerate() {
                let noise = (rng.next_u32() as i32) >> 16;
                *f = if tonal && j != 0 {
                    noise >> 6
                } else {
                    ((noise as i64 * amp as i64) >> 15) as i32
                };
            }
        }
    }
    freq
}

/// Unit-norm bands (and their energies) for `C` channels.
pub fn random_spectrum(
    rng: &mut TestRng,
    m: &OpusCustomMode,
    LM: i32,
    C: usize,
) -> (Vec<celt_norm>, Vec<celt_ener>) {
    let freq = random_mdct(rng, m, LM, C);
    let mut bandE = vec![0 as celt_ener; C * m.nbEBands];
    compute_band_energies(m, &freq, &mut bandE, m.nbEBands, C, LM);
    let mut X = vec![0 as celt_norm; freq.len()];
    normalise_bands(m, &freq, &mut X, &bandE, m.nbEBands, C, 1 << LM);
    (X, bandE)
}

/// Spreads `total_bits` (1/8 bits) over `start..end` proportionally to the
/// band widths, the way a flat allocation curve would.
pub fn flat_allocation(
    m: &OpusCustomMode,
    start: usize,
    end: usize,
    C: usize,
    LM: i32,
    total_bits: i32,
) -> Vec<i32> {
    let width = |i: usize| C as i32 * (((m.eBands[i + 1] - m.eBands[i]) as i32) << LM);
    let total_width: i32 = (start..end).map(width).sum();
    let mut pulses = vec![0; m.nbEBands];
    for i in start..end {
        pulses[i] = (total_bits as i64 * width(i) as i64 / total_width as i64) as i32;
    }
    pulses
}

/// Per-band time/frequency changes as the bitstream can signal them.
pub const TF_SELECT_TABLE: [[i8; 8]; 4] = [
    [0, -1, 0, -1, 0, -1, 0, -1],
    [0, -1, 0, -2, 1, 0, 1, -1],
    [0, -2, 0, -3, 2, 0, 1, -1],
    [0, -2, 0, -3, 3, 0, 1, -1],
];

pub fn random_tf_res(rng: &mut TestRng, nb: usize, LM: i32, transient: bool) -> Vec<i32> {
    let tf_select = rng.below(2) as usize;
    (0..nb)
        .map(|_| {
            let res = rng.below(2) as usize;
            TF_SELECT_TABLE[LM as usize][4 * transient as usize + 2 * tf_select + res] as i32
        })
        .collect()
}

/// Sum of squares of a slice, in Q28 for unit-norm Q14 data.
pub fn energy(x: &[celt_norm]) -> i64 {
    x.iter().map(|&v| v as i64 * v as i64).sum()
}
