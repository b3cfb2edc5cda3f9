//! # Vault Errors
//!
//! [`VaultError`] is the single failure type of the engine. Every variant flattens to a
//! stable [`ErrorCode`], which is all that crosses the memory boundary.

use std::borrow::Cow;

/// Numeric error classification exchanged with the host.
///
/// The discriminants are part of the boundary contract and never change meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    WeakParameters = 1,
    Corruption = 2,
    UnsupportedVersion = 3,
    AuthenticationFailure = 4,
    Cancelled = 5,
    AllocationFailure = 6,
    InvalidBuffer = 7,
    Entropy = 8,
    InvalidConfiguration = 9,
    Internal = 255,
}

impl ErrorCode {
    /// Raw value handed to the host.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Parses a raw value received from the host.
    #[must_use]
    pub const fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            1 => Self::WeakParameters,
            2 => Self::Corruption,
            3 => Self::UnsupportedVersion,
            4 => Self::AuthenticationFailure,
            5 => Self::Cancelled,
            6 => Self::AllocationFailure,
            7 => Self::InvalidBuffer,
            8 => Self::Entropy,
            9 => Self::InvalidConfiguration,
            255 => Self::Internal,
            _ => return None,
        })
    }
}

/// Failures of key derivation, encryption, container parsing and the boundary.
#[fv_derive::fv_error(code = ErrorCode)]
pub enum VaultError {
    /// Empty password or an iteration count outside the accepted range.
    ///
    /// Raised before any cryptographic work starts.
    #[code(WeakParameters)]
    #[error("Weak parameters{}: {message}", format_context(.context))]
    WeakParameters { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Malformed header, truncated buffer or a length that does not add up.
    #[code(Corruption)]
    #[error("Corrupted container{}: {message}", format_context(.context))]
    Corruption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The magic matched but the format version is unknown.
    #[code(UnsupportedVersion)]
    #[error("Unsupported container version {version}{}", format_context(.context))]
    UnsupportedVersion { version: u8, context: Option<Cow<'static, str>> },

    /// The authentication tag did not verify.
    ///
    /// A wrong password and tampered data are deliberately reported the same way.
    #[code(AuthenticationFailure)]
    #[error("Authentication failed{}", format_context(.context))]
    AuthenticationFailure { context: Option<Cow<'static, str>> },

    /// The caller requested cancellation; observed at a chunk boundary.
    #[code(Cancelled)]
    #[error("Operation cancelled{}", format_context(.context))]
    Cancelled { context: Option<Cow<'static, str>> },

    /// A buffer of the requested size could not be provided.
    #[code(AllocationFailure)]
    #[error("Allocation failed{}: {message}", format_context(.context))]
    Allocation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// A region handed over by the host lies outside its linear memory or was never allocated.
    #[code(InvalidBuffer)]
    #[error("Invalid buffer{}: {message}", format_context(.context))]
    InvalidBuffer { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The operating system random number generator failed.
    #[code(Entropy)]
    #[error("Entropy source unavailable{}: {message}", format_context(.context))]
    Entropy { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Engine settings out of range (chunk size, memory limits).
    #[code(InvalidConfiguration)]
    #[error("Invalid configuration{}: {message}", format_context(.context))]
    InvalidConfiguration { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// Logic errors that indicate a bug rather than bad input.
    #[code(Internal)]
    #[error("Internal vault error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl From<getrandom::Error> for VaultError {
    fn from(err: getrandom::Error) -> Self {
        Self::Entropy { message: err.to_string().into(), context: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_raw_values() {
        let codes = [
            ErrorCode::WeakParameters,
            ErrorCode::Corruption,
            ErrorCode::UnsupportedVersion,
            ErrorCode::AuthenticationFailure,
            ErrorCode::Cancelled,
            ErrorCode::AllocationFailure,
            ErrorCode::InvalidBuffer,
            ErrorCode::Entropy,
            ErrorCode::InvalidConfiguration,
            ErrorCode::Internal,
        ];
        for code in codes {
            assert_eq!(ErrorCode::from_u32(code.as_u32()), Some(code));
        }
        assert_eq!(ErrorCode::from_u32(0), None);
    }

    #[test]
    fn errors_map_to_codes() {
        let err = VaultError::UnsupportedVersion { version: 7, context: None };
        assert_eq!(err.code(), ErrorCode::UnsupportedVersion);
        assert_eq!(err.to_string(), "Unsupported container version 7");

        let err: VaultError = "session reused".into();
        assert_eq!(err.code(), ErrorCode::Internal);
    }

    #[test]
    fn authentication_failure_carries_no_detail() {
        let err = VaultError::AuthenticationFailure { context: None };
        assert_eq!(err.to_string(), "Authentication failed");
    }
}
