//! Unified error types for shellcache.
//!
//! Display strings carry a stable code prefix so the proxy and CLI can
//! surface them verbatim.

use tokio_rusqlite::rusqlite;

/// Unified error types for the shellcache controller and its stores.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., malformed header value).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Network failure (connection refused, DNS, reset).
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// A shell page could not be cached, so nothing was.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// A lifecycle event arrived in a state that cannot accept it.
    #[error("INVALID_TRANSITION: cannot {event} while {state}")]
    InvalidTransition { state: &'static str, event: &'static str },

    /// Navigation failed and neither the page nor the root shell is cached.
    #[error("OFFLINE: {0}")]
    Offline(String),
}

impl Error {
    /// Whether this error came from the network rather than local state.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::HttpError(_) | Error::FetchTimeout(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Offline("https://app.test/pricing".to_string());
        assert!(err.to_string().starts_with("OFFLINE"));
        assert!(err.to_string().contains("/pricing"));
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = Error::InvalidTransition { state: "serving", event: "install" };
        assert_eq!(err.to_string(), "INVALID_TRANSITION: cannot install while serving");
    }

    #[test]
    fn test_is_network() {
        assert!(Error::HttpError("reset".into()).is_network());
        assert!(Error::FetchTimeout("20s".into()).is_network());
        assert!(!Error::Offline("/".into()).is_network());
        assert!(!Error::MigrationFailed("x".into()).is_network());
    }

    #[test]
    fn test_from_rusqlite() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(err.to_string().starts_with("CACHE_ERROR"));
    }
}
