//! Error type for the checked entry points.
//!
//! The numeric values match the upstream `OPUS_*` error constants so callers
//! bridging to C APIs can convert losslessly.

use thiserror::Error;

pub const OPUS_OK: i32 = 0;
pub const OPUS_BAD_ARG: i32 = -1;
pub const OPUS_BUFFER_TOO_SMALL: i32 = -2;
pub const OPUS_INTERNAL_ERROR: i32 = -3;
pub const OPUS_INVALID_PACKET: i32 = -4;
pub const OPUS_UNIMPLEMENTED: i32 = -5;
pub const OPUS_INVALID_STATE: i32 = -6;
pub const OPUS_ALLOC_FAIL: i32 = -7;

/// Error codes.
///
/// Unknown codes are preserved in [`Unknown`](ErrorCode::Unknown) for
/// diagnostics.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Error)]
pub enum ErrorCode {
    /// One or more invalid/out of range arguments.
    #[error("invalid argument")]
    BadArg,
    /// Not enough room in a caller-provided buffer.
    #[error("buffer too small")]
    BufferTooSmall,
    /// An internal error was detected.
    #[error("internal error")]
    InternalError,
    /// The compressed data passed is corrupted.
    #[error("corrupted stream")]
    InvalidPacket,
    #[error("request not implemented")]
    Unimplemented,
    #[error("invalid state")]
    InvalidState,
    #[error("memory allocation failed")]
    AllocFail,
    #[error("unknown error ({0})")]
    Unknown(i32),
}

impl From<i32> for ErrorCode {
    fn from(value: i32) -> Self {
        match value {
            OPUS_BAD_ARG => ErrorCode::BadArg,
            OPUS_BUFFER_TOO_SMALL => ErrorCode::BufferTooSmall,
            OPUS_INTERNAL_ERROR => ErrorCode::InternalError,
            OPUS_INVALID_PACKET => ErrorCode::InvalidPacket,
            OPUS_UNIMPLEMENTED => ErrorCode::Unimplemented,
            OPUS_INVALID_STATE => ErrorCode::InvalidState,
            OPUS_ALLOC_FAIL => ErrorCode::AllocFail,
            other => ErrorCode::Unknown(other),
        }
    }
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::BadArg => OPUS_BAD_ARG,
            ErrorCode::BufferTooSmall => OPUS_BUFFER_TOO_SMALL,
            ErrorCode::InternalError => OPUS_INTERNAL_ERROR,
            ErrorCode::InvalidPacket => OPUS_INVALID_PACKET,
            ErrorCode::Unimplemented => OPUS_UNIMPLEMENTED,
            ErrorCode::InvalidState => OPUS_INVALID_STATE,
            ErrorCode::AllocFail => OPUS_ALLOC_FAIL,
            ErrorCode::Unknown(n) => n,
        }
    }
}

/// A specialized [`Result`](std::result::Result) type for this crate.
pub type Result<T> = std::result::Result<T, ErrorCode>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_from_known_values() {
        assert_eq!(ErrorCode::from(-1), ErrorCode::BadArg);
        assert_eq!(ErrorCode::from(-2), ErrorCode::BufferTooSmall);
        assert_eq!(ErrorCode::from(-4), ErrorCode::InvalidPacket);
        assert_eq!(ErrorCode::from(-7), ErrorCode::AllocFail);
        assert_eq!(ErrorCode::from(OPUS_OK), ErrorCode::Unknown(0));
        assert_eq!(ErrorCode::from(-100), ErrorCode::Unknown(-100));
    }

    #[test]
    fn error_code_roundtrip() {
        let codes = [
            ErrorCode::BadArg,
            ErrorCode::BufferTooSmall,
            ErrorCode::InternalError,
            ErrorCode::InvalidPacket,
            ErrorCode::Unimplemented,
            ErrorCode::InvalidState,
            ErrorCode::AllocFail,
            ErrorCode::Unknown(42),
        ];
        for code in codes {
            let raw: i32 = code.into();
            assert_eq!(ErrorCode::from(raw), code);
        }
    }

    #[test]
    fn error_code_display() {
        assert_eq!(format!("{}", ErrorCode::BadArg), "invalid argument");
        assert_eq!(format!("{}", ErrorCode::Unknown(99)), "unknown error (99)");
        fn assert_error<T: std::error::Error + Copy>() {}
        assert_error::<ErrorCode>();
    }
}
