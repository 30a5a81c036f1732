//! Structured errors for the shellcache proxy.
//!
//! Controller error codes map onto HTTP statuses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shellcache_core::Error;

/// Structured errors for the shellcache proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The incoming request could not be turned into a controller request.
    #[error("BAD_REQUEST: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Controller(#[from] Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Controller(err) => match err {
                Error::InvalidInput(_) | Error::InvalidUrl(_) => StatusCode::BAD_REQUEST,
                Error::Offline(_) => StatusCode::SERVICE_UNAVAILABLE,
                Error::FetchTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                Error::HttpError(_) | Error::FetchTooLarge(_) => StatusCode::BAD_GATEWAY,
                Error::Database(_)
                | Error::MigrationFailed(_)
                | Error::CorruptEntry(_)
                | Error::InstallFailed(_)
                | Error::InvalidTransition { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ProxyError::from(Error::Offline("/".into())), StatusCode::SERVICE_UNAVAILABLE),
            (ProxyError::from(Error::HttpError("reset".into())), StatusCode::BAD_GATEWAY),
            (ProxyError::from(Error::FetchTooLarge("big".into())), StatusCode::BAD_GATEWAY),
            (ProxyError::from(Error::FetchTimeout("slow".into())), StatusCode::GATEWAY_TIMEOUT),
            (ProxyError::from(Error::InvalidUrl("x".into())), StatusCode::BAD_REQUEST),
            (ProxyError::BadRequest("body".into()), StatusCode::BAD_REQUEST),
            (ProxyError::from(Error::CorruptEntry("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn test_controller_message_passes_through() {
        let err = ProxyError::from(Error::Offline("https://creatrid.com/blog".into()));
        assert_eq!(err.to_string(), "OFFLINE: https://creatrid.com/blog");
    }

    #[test]
    fn test_into_response_status() {
        let response = ProxyError::from(Error::Offline("/".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
