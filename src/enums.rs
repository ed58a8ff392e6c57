//! Typed enums for the frame parameters that are raw integers in the
//! bitstream definition.

use crate::celt::bands::{SPREAD_AGGRESSIVE, SPREAD_LIGHT, SPREAD_NONE, SPREAD_NORMAL};
use crate::error::ErrorCode;

/// Channel count.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Channels {
    Mono,
    /// Two channels, coded jointly or as dual mono.
    Stereo,
}

impl Channels {
    pub fn count(self) -> usize {
        match self {
            Channels::Mono => 1,
            Channels::Stereo => 2,
        }
    }
}

impl TryFrom<i32> for Channels {
    type Error = ErrorCode;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Channels::Mono),
            2 => Ok(Channels::Stereo),
            _ => Err(ErrorCode::BadArg),
        }
    }
}

impl From<Channels> for i32 {
    fn from(value: Channels) -> Self {
        value.count() as i32
    }
}

/// How much the PVQ codeword is spread before coding.
///
/// Stronger spreading suits noisy, flat spectra; `None` suits tonal ones.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Spread {
    None,
    Light,
    Normal,
    Aggressive,
}

impl TryFrom<i32> for Spread {
    type Error = ErrorCode;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            SPREAD_NONE => Ok(Spread::None),
            SPREAD_LIGHT => Ok(Spread::Light),
            SPREAD_NORMAL => Ok(Spread::Normal),
            SPREAD_AGGRESSIVE => Ok(Spread::Aggressive),
            _ => Err(ErrorCode::BadArg),
        }
    }
}

impl From<Spread> for i32 {
    fn from(value: Spread) -> Self {
        match value {
            Spread::None => SPREAD_NONE,
            Spread::Light => SPREAD_LIGHT,
            Spread::Normal => SPREAD_NORMAL,
            Spread::Aggressive => SPREAD_AGGRESSIVE,
        }
    }
}

/// Frame duration at 48 kHz. The integer form is the sample count.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FrameSize {
    /// 2.5 ms, 120 samples.
    Ms2_5,
    Ms5,
    Ms10,
    /// 20 ms, 960 samples.
    Ms20,
}

impl FrameSize {
    /// log2 of the number of short MDCTs in the frame.
    pub fn lm(self) -> i32 {
        match self {
            FrameSize::Ms2_5 => 0,
            FrameSize::Ms5 => 1,
            FrameSize::Ms10 => 2,
            FrameSize::Ms20 => 3,
        }
    }
}

impl TryFrom<i32> for FrameSize {
    type Error = ErrorCode;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            120 => Ok(FrameSize::Ms2_5),
            240 => Ok(FrameSize::Ms5),
            480 => Ok(FrameSize::Ms10),
            960 => Ok(FrameSize::Ms20),
            _ => Err(ErrorCode::BadArg),
        }
    }
}

impl From<FrameSize> for i32 {
    fn from(value: FrameSize) -> Self {
        120 << value.lm()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_roundtrip() {
        assert_eq!(i32::from(Channels::Mono), 1);
        assert_eq!(i32::from(Channels::Stereo), 2);
        assert_eq!(Channels::try_from(1).unwrap(), Channels::Mono);
        assert_eq!(Channels::try_from(2).unwrap(), Channels::Stereo);
        assert_eq!(Channels::try_from(0), Err(ErrorCode::BadArg));
        assert_eq!(Channels::try_from(3), Err(ErrorCode::BadArg));
    }

    #[test]
    fn spread_roundtrip() {
        for v in 0..4 {
            assert_eq!(i32::from(Spread::try_from(v).unwrap()), v);
        }
        assert_eq!(Spread::try_from(SPREAD_AGGRESSIVE).unwrap(), Spread::Aggressive);
        assert!(Spread::try_from(-1).is_err());
        assert!(Spread::try_from(4).is_err());
    }

    #[test]
    fn frame_size_maps_to_lm() {
        assert_eq!(FrameSize::try_from(960).unwrap().lm(), 3);
        assert_eq!(FrameSize::try_from(120).unwrap().lm(), 0);
        assert_eq!(i32::from(FrameSize::Ms10), 480);
        assert!(FrameSize::try_from(100).is_err());
        assert!(FrameSize::try_from(1920).is_err());
    }
}
