//! Codec mode configuration.
//!
//! The standard 48 kHz mode is built once on first use and shared
//! read-only afterwards.
//!
//! Upstream C: `celt/modes.c`, `celt/modes.h`

use std::sync::OnceLock;

use log::debug;

use crate::celt::cwrs::log2_frac;
use crate::celt::entcode::BITRES;
use crate::celt::rate::compute_pulse_cache;
use crate::error::{ErrorCode, Result};

/// Upstream C: celt/modes.h:PulseCache
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PulseCache {
    pub size: i32,
    pub index: Vec<i16>,
    pub bits: Vec<u8>,
    pub caps: Vec<u8>,
}

/// Upstream C: celt/modes.h:OpusCustomMode
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpusCustomMode {
    pub Fs: i32,
    pub nbEBands: usize,
    pub effEBands: i32,
    pub eBands: &'static [i16],
    pub maxLM: i32,
    pub nbShortMdcts: i32,
    pub shortMdctSize: i32,
    pub logN: Vec<i16>,
    pub cache: PulseCache,
}

/// Band edges (in units of the 2.5 ms short MDCT) for the 5 ms layout.
static eband5ms: [i16; 22] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 10, 12, 14, 16, 20, 24, 28, 34, 40, 48, 60, 78, 100,
];

static mode48000_960_120: OnceLock<OpusCustomMode> = OnceLock::new();

fn build_mode48000_960_120() -> OpusCustomMode {
    let Fs = 48000;
    let shortMdctSize = 120;
    let maxLM = 3;
    let nbEBands = eband5ms.len() - 1;
    let mut effEBands = nbEBands as i32;
    while eband5ms[effEBands as usize] as i32 > shortMdctSize {
        effEBands -= 1;
    }
    let logN: Vec<i16> = eband5ms
        .windows(2)
        .map(|w| log2_frac((w[1] - w[0]) as u32, BITRES) as i16)
        .collect();
    let cache = compute_pulse_cache(&eband5ms, &logN, nbEBands, maxLM);
    debug!(
        "built CELT mode Fs={} bands={} maxLM={} cache entries={}",
        Fs, nbEBands, maxLM, cache.size
    );
    OpusCustomMode {
        Fs,
        nbEBands,
        effEBands,
        eBands: &eband5ms,
        maxLM,
        nbShortMdcts: 1 << maxLM,
        shortMdctSize,
        logN,
        cache,
    }
}

/// Looks up the mode for a sample rate and frame size.
///
/// Only the standard 48 kHz layout is available; `frame_size` may be any
/// of 120, 240, 480 or 960 samples.
///
/// Upstream C: celt/modes.c:opus_custom_mode_create
pub fn opus_custom_mode_create(Fs: i32, frame_size: i32) -> Result<&'static OpusCustomMode> {
    let mode = mode48000_960_120.get_or_init(build_mode48000_960_120);
    for j in 0..4 {
        if Fs == mode.Fs && frame_size << j == mode.shortMdctSize * mode.nbShortMdcts {
            return Ok(mode);
        }
    }
    Err(ErrorCode::BadArg)
}
