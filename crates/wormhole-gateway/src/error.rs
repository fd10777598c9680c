//! Error types for the platform client.

use thiserror::Error;

use wormhole_common::error::TransportError;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The HTTP response had a non-2xx status code.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// An error from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An error from the WebSocket layer.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The gateway closed the session and it cannot be resumed.
    #[error("Gateway session invalidated")]
    InvalidSession,

    /// The gateway closed with a code that forbids reconnecting.
    #[error("Gateway closed: {code} {reason}")]
    Fatal { code: u16, reason: String },

    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    pub(crate) fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

impl From<GatewayError> for TransportError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Api { status: 403, message } => TransportError::Forbidden(message),
            GatewayError::Api { status, message } => TransportError::Api { status, message },
            GatewayError::Http(e) if e.is_timeout() => TransportError::Timeout,
            GatewayError::Http(e) if e.is_decode() => TransportError::Decode(e.to_string()),
            GatewayError::Http(e) => TransportError::Http(e.to_string()),
            GatewayError::Json(e) => TransportError::Decode(e.to_string()),
            other => TransportError::Other(other.to_string()),
        }
    }
}
