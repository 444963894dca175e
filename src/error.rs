use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Decode failures from [`crate::audio::loader`] (C1).
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt audio: {0}")]
    Corrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Analysis failures from [`crate::analysis::analyzer`] (C4).
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("insufficient audio: duration {0:.3}s below 1.0s minimum")]
    InsufficientAudio(f64),

    #[error("numeric degenerate: {0}")]
    NumericDegenerate(String),
}

/// Soft cache failures from sidecar/persistent/memory caches (C5/C6/C7).
///
/// Never fails a job on its own; callers log and fall through to the next
/// tier.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("fingerprint_version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u16, found: u16 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Repository failures from [`crate::repository`] (C8).
///
/// `MissingFingerprintVersion` is the typed guard against the historical
/// silent-failure bug: an insert missing the schema version is rejected here,
/// not at the database layer.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("fingerprint is missing fingerprint_version")]
    MissingFingerprintVersion,

    #[error("transient conflict, retry: {0}")]
    Conflict(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl PersistError {
    /// Whether this failure is a transient DB condition worth retrying
    /// (spec §4.9.7: "Repository conflict / transient DB error: Transient,
    /// retry up to 3x with backoff"). `SQLITE_BUSY`/`SQLITE_LOCKED` are the
    /// sqlite error codes a concurrent writer actually raises; everything
    /// else from sqlite (corrupt schema, constraint violation, disk I/O) is
    /// permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            PersistError::Conflict(_) => true,
            PersistError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => {
                matches!(err.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            }
            PersistError::Sqlite(_) | PersistError::MissingFingerprintVersion => false,
        }
    }
}

/// Transport failures from [`crate::client::analyzer_client`] (C10).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("server error: {0}")]
    Server(StatusCode),

    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures surfaced by the extraction pipeline (C9), after retry/backoff has
/// been exhausted or a permanent classification was reached.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("enqueue timed out after {0:?}")]
    EnqueueTimeout(std::time::Duration),

    #[error("job exceeded its soft deadline")]
    Deadline,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("file not found: {0}")]
    FileNotFound(String),
}

impl PipelineError {
    /// Whether this failure should be retried (transient) or dead-lettered
    /// immediately (permanent), per spec §4.9.7.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::Transport(_) | PipelineError::Deadline => true,
            PipelineError::Persist(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// HTTP-facing error for the `/fingerprint` and `/health` handlers (kept from
/// the teacher, extended with `From` impls for the new module errors so a
/// single `Result<T, FingerprintError>` still flows through the handler).
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error("Audio file not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode audio: {0}")]
    DecodingError(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("Analysis failed: {0}")]
    AnalysisError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<DecodeError> for FingerprintError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::UnsupportedFormat(m) => FingerprintError::UnsupportedFormat(m),
            DecodeError::Corrupt(m) => FingerprintError::DecodingError(m),
            DecodeError::Io(e) => FingerprintError::IoError(e),
        }
    }
}

impl From<AnalysisError> for FingerprintError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Decode(d) => d.into(),
            AnalysisError::InsufficientAudio(secs) => FingerprintError::InvalidAudio(format!(
                "audio too short: {:.3}s, minimum is 1.0s",
                secs
            )),
            AnalysisError::NumericDegenerate(m) => FingerprintError::AnalysisError(m),
        }
    }
}

impl IntoResponse for FingerprintError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            FingerprintError::FileNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            FingerprintError::UnsupportedFormat(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
            FingerprintError::DecodingError(msg) => (StatusCode::BAD_REQUEST, msg),
            FingerprintError::InvalidAudio(msg) => (StatusCode::BAD_REQUEST, msg),
            FingerprintError::AnalysisError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            FingerprintError::IoError(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            FingerprintError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, FingerprintError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_sqlite_error_is_transient() {
        let ffi_err = rusqlite::ffi::Error { code: rusqlite::ErrorCode::DatabaseBusy, extended_code: 5 };
        let err = PersistError::Sqlite(rusqlite::Error::SqliteFailure(ffi_err, None));
        assert!(err.is_transient());
        assert!(PipelineError::Persist(err).is_transient());
    }

    #[test]
    fn constraint_violation_is_permanent() {
        let ffi_err = rusqlite::ffi::Error { code: rusqlite::ErrorCode::ConstraintViolation, extended_code: 19 };
        let err = PersistError::Sqlite(rusqlite::Error::SqliteFailure(ffi_err, None));
        assert!(!err.is_transient());
    }

    #[test]
    fn deadline_and_transport_are_transient() {
        assert!(PipelineError::Deadline.is_transient());
        assert!(PipelineError::Transport(TransportError::Timeout).is_transient());
    }

    #[test]
    fn missing_fingerprint_version_is_permanent() {
        assert!(!PersistError::MissingFingerprintVersion.is_transient());
    }
}
