//! CELT band coding: fixed-point arithmetic, the range coder, PVQ and the
//! band quantizer built on them.
//!
//! Upstream C: `celt/`

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]
#![allow(unused_assignments)]
#![allow(clippy::too_many_arguments)]

pub mod bands;
pub mod cwrs;
pub mod entcode;
pub mod entdec;
pub mod entenc;
pub mod fixed_generic;
pub mod mathops;
pub mod modes;
pub mod pitch;
pub mod quant_bands;
pub mod rate;
pub mod vq;

