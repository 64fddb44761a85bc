use thiserror::Error;

/// INT 13 status codes surfaced to callers in AH with the carry flag set.
///
/// Handlers return `Result<u8, Int13Status>`: `Ok(code)` completes the call
/// with the carry flag clear and AH = `code` (get-disk-type uses this for its
/// informational type code), `Err(status)` sets the carry flag and
/// AH = `status`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Int13Status {
    /// Invalid request: bad parameters, out-of-range geometry, unsupported
    /// operation, bad packet size/count/sentinel.
    #[error("invalid request")]
    Invalid = 0x01,

    /// Underlying block transfer failed.
    #[error("read/write error")]
    ReadError = 0x04,

    /// Device reset failed.
    #[error("reset failed")]
    ResetFailed = 0x05,
}

/// Per-call outcome, stored verbatim as the drive's last status and replayed
/// by the get-last-status command.
pub type CallStatus = Result<u8, Int13Status>;
