use std::collections::TryReserveError;

/// Session serialization and resumption errors.
///
/// A resumption that simply cannot proceed (cipher not offered, ALPN
/// changed, session expired) is not an error; the installer reports it as
/// `Ok(false)` and the connection falls back to a full handshake.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no active session on connection")]
    NoActiveSession,
    #[error("malformed session data: {0}")]
    MalformedData(String),
    #[error("unsupported session format version {found} (supported: {supported})")]
    VersionMismatch { found: u8, supported: u8 },
    #[error("invalid handshake state: {0}")]
    HandshakeStateError(String),
    #[error("session serialization failed: {0}")]
    SerializationFailure(#[from] TryReserveError),
    #[error("invalid session: {0}")]
    InvalidSession(String),
    #[error("random generation failed: {0}")]
    RandomFailure(String),
}

impl SessionError {
    /// Whether the error was raised while validating externally supplied bytes.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            SessionError::MalformedData(_) | SessionError::VersionMismatch { .. }
        )
    }
}
