//! Band decoder fuzzer.
//!
//! The first eight bytes pick the frame layout:
//!   byte 0: LM (bits 0-1), stereo, short blocks, dual stereo, spread (bits 5-6)
//!   byte 1: start band
//!   byte 2: end band
//!   byte 3: intensity band
//!   byte 4: allocation scale
//!   byte 5: tf_select
//!   bytes 6..7: per-band tf_res bits (low 16 bands)
//!   bytes 8+  : range coded payload
//!
//! Run with: cargo +nightly fuzz run decode_fuzzer
#![no_main]
#![allow(non_snake_case)]

use celt_bands::internals::BITRES;
use celt_bands::{
    celt_norm, ec_dec_init, opus_custom_mode_create, quant_all_bands, Channels, FrameSize,
    QuantBandsConfig, Spread,
};
use libfuzzer_sys::fuzz_target;

const SETUP_BYTE_COUNT: usize = 8;
const MAX_PAYLOAD: usize = 1275;

const TF_SELECT_TABLE: [[i8; 8]; 4] = [
    [0, -1, 0, -1, 0, -1, 0, -1],
    [0, -1, 0, -2, 1, 0, 1, -1],
    [0, -2, 0, -3, 2, 0, 1, -1],
    [0, -2, 0, -3, 3, 0, 1, -1],
];

fuzz_target!(|data: &[u8]| {
    if data.len() < SETUP_BYTE_COUNT {
        return;
    }
    let m = match opus_custom_mode_create(48000, 960) {
        Ok(m) => m,
        Err(_) => return,
    };
    let nb = m.nbEBands;

    let flags = data[0];
    let LM = (flags & 3) as i32;
    let stereo = flags & 4 != 0;
    let shortBlocks = LM > 0 && flags & 8 != 0;
    let start = data[1] as usize % nb;
    let end = start + 1 + data[2] as usize % (nb - start);
    let intensity = start + data[3] as usize % (end - start + 1);
    let payload_len = (data.len() - SETUP_BYTE_COUNT).min(MAX_PAYLOAD);
    let C = if stereo { 2 } else { 1 };

    let cfg = QuantBandsConfig {
        encode: false,
        resynth: false,
        start,
        end,
        channels: if stereo { Channels::Stereo } else { Channels::Mono },
        shortBlocks,
        spread: Spread::try_from(((flags >> 5) & 3) as i32).unwrap_or(Spread::Normal),
        dual_stereo: stereo && flags & 16 != 0,
        intensity,
        total_bits: (payload_len as i32) << (3 + BITRES),
        balance: 0,
        LM,
        codedBands: end,
    };
    let frame_size = match FrameSize::try_from(120 << LM) {
        Ok(f) => f,
        Err(_) => return,
    };
    debug_assert_eq!(frame_size.lm(), LM);

    let scale = (data[4] % 8) as i32;
    let pulses: Vec<i32> = (0..nb)
        .map(|i| ((C * (m.eBands[i + 1] - m.eBands[i]) as i32 * scale) << LM) << BITRES)
        .collect();
    let tf_select = (data[5] & 1) as usize;
    let tf_bits = u16::from_le_bytes([data[6], data[7]]);
    let tf_res: Vec<i32> = (0..nb)
        .map(|i| {
            let res = (tf_bits >> (i % 16)) as usize & 1;
            TF_SELECT_TABLE[LM as usize][4 * shortBlocks as usize + 2 * tf_select + res] as i32
        })
        .collect();

    let N = (m.shortMdctSize << LM) as usize;
    let mut payload = data[SETUP_BYTE_COUNT..SETUP_BYTE_COUNT + payload_len].to_vec();
    let mut dec = ec_dec_init(&mut payload);
    let mut x = vec![0 as celt_norm; N];
    let mut y = stereo.then(|| vec![0 as celt_norm; N]);
    let mut masks = vec![0u8; C as usize * nb];
    let mut seed = u32::from(data[0]);
    let _ = quant_all_bands(
        &cfg,
        m,
        &mut x,
        y.as_deref_mut(),
        &mut masks,
        &[],
        &pulses,
        &tf_res,
        &mut dec,
        &mut seed,
    );
});
