//! Research API error types

use thiserror::Error;

/// API error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::ServerError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Protocol, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Decode, message)
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Closed, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unknown, message)
    }

    /// Whether this error ends the event stream
    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            400 | 422 => Self::invalid_request(format!("Invalid request: {body}")),
            404 => Self::not_found(format!("Not found: {body}")),
            500..=599 => Self::server_error(format!("Server error: {body}")),
            _ => Self::unknown(format!("HTTP {status}: {body}")),
        }
    }

    pub(crate) fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::network(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            Self::network(format!("Connection failed: {e}"))
        } else {
            Self::unknown(format!("Request failed: {e}"))
        }
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Connection refused, reset, timed out
    Network,
    /// 5xx
    ServerError,
    /// 400 / 422
    InvalidRequest,
    /// 404, e.g. stream requested for an unknown session
    NotFound,
    /// Response arrived but does not follow the protocol (missing session id)
    Protocol,
    /// One stream frame could not be decoded; the stream continues
    Decode,
    /// Stream ended before the terminal event
    Closed,
    Unknown,
}

impl ApiErrorKind {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode)
    }
}
