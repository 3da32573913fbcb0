//! Library status codes and the Win32 → status translation.
//!
//! Every failure the core reports is one of the closed `TeeError` variants.
//! Raw platform error codes never leave this crate: they go through
//! [`from_win32`] first, and anything not listed there collapses to
//! `InternalError`.

use thiserror::Error;

/// Win32 error codes the translator (and the backends) care about.
///
/// Kept here rather than pulled from `windows-sys` so the translation table
/// is available on every target.
pub mod win32 {
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_INVALID_HANDLE: u32 = 6;
    pub const ERROR_GEN_FAILURE: u32 = 31;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
    pub const ERROR_OPERATION_ABORTED: u32 = 995;
    pub const ERROR_IO_INCOMPLETE: u32 = 996;
    pub const ERROR_IO_PENDING: u32 = 997;
    pub const ERROR_DEVICE_NOT_CONNECTED: u32 = 1167;
    pub const ERROR_NOT_FOUND: u32 = 1168;
}

/// Numeric status reported for a successful call.
pub const SUCCESS: u32 = 0x000;

/// All the ways an operation of this crate can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum TeeError {
    #[error("internal error")]
    InternalError,

    #[error("device not found")]
    DeviceNotFound,

    #[error("device not ready")]
    DeviceNotReady,

    #[error("invalid parameter")]
    InvalidParameter,

    #[error("unable to complete operation")]
    OperationFailed,

    #[error("operation timed out")]
    Timeout,

    #[error("client not found")]
    ClientNotFound,

    #[error("insufficient buffer")]
    InsufficientBuffer,

    #[error("permission denied")]
    PermissionDenied,
}

pub type TeeResult<T> = Result<T, TeeError>;

impl TeeError {
    /// Stable numeric status, compatible with the C library's `TEESTATUS`.
    pub const fn code(self) -> u32 {
        match self {
            TeeError::InternalError      => 0x001,
            TeeError::DeviceNotFound     => 0x002,
            TeeError::DeviceNotReady     => 0x003,
            TeeError::InvalidParameter   => 0x004,
            TeeError::OperationFailed    => 0x005,
            TeeError::Timeout            => 0x006,
            TeeError::ClientNotFound     => 0x008,
            TeeError::InsufficientBuffer => 0x00B,
            TeeError::PermissionDenied   => 0x00C,
        }
    }
}

/// Numeric status of a finished call: [`SUCCESS`] or the error's code.
pub fn status_code<T>(res: &TeeResult<T>) -> u32 {
    match res {
        Ok(_) => SUCCESS,
        Err(e) => e.code(),
    }
}

/// Map a Win32 error code onto the library's status domain.
///
/// Total and stateless; unknown codes become `InternalError`.
pub const fn from_win32(code: u32) -> TeeError {
    match code {
        win32::ERROR_INVALID_HANDLE       => TeeError::InvalidParameter,
        win32::ERROR_INSUFFICIENT_BUFFER  => TeeError::InsufficientBuffer,
        win32::ERROR_GEN_FAILURE          => TeeError::OperationFailed,
        win32::ERROR_DEVICE_NOT_CONNECTED => TeeError::DeviceNotReady,
        win32::ERROR_NOT_FOUND            => TeeError::ClientNotFound,
        win32::ERROR_ACCESS_DENIED        => TeeError::PermissionDenied,
        _                                 => TeeError::InternalError,
    }
}
