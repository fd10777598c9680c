//! Centralized error types for the wormhole relay.
//!
//! Uses `thiserror` for ergonomic error definitions. [`WormholeError`] is what
//! the relay core and the management service return; [`TransportError`] is
//! what a chat-platform transport returns and is folded into
//! [`WormholeError::Transport`] at the boundary.

/// Errors raised while talking to the chat platform.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The channel does not exist or the relay can no longer see it.
    #[error("Unknown channel")]
    UnknownChannel,

    /// The relay lacks the permission needed for the call.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The platform did not answer in time.
    #[error("Request timed out")]
    Timeout,

    /// The platform answered with a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the error means the target will never become reachable again.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::UnknownChannel | Self::Api { status: 404, .. })
    }
}

/// Core error type used across the wormhole crates.
#[derive(Debug, thiserror::Error)]
pub enum WormholeError {
    // === Resource errors ===
    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{resource} already exists")]
    AlreadyExists { resource: String },

    // === Authorization ===
    #[error("You are not an admin of this wormhole")]
    NotAdmin,

    #[error("Missing permission: {permission}")]
    MissingPermission { permission: String },

    // === Quotas and input ===
    #[error("Limit reached: {message}")]
    LimitReached { message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // === Infrastructure errors ===
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl WormholeError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Error code string for programmatic handling (CLI exit output, logs).
    pub fn error_code(&self) -> &str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::NotAdmin => "NOT_ADMIN",
            Self::MissingPermission { .. } => "MISSING_PERMISSION",
            Self::LimitReached { .. } => "LIMIT_REACHED",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure is the caller's to fix (as opposed to ours).
    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            Self::Transport(_) | Self::Database(_) | Self::Internal(_)
        )
    }
}

/// Convenience type alias for Results using WormholeError.
pub type WormholeResult<T> = Result<T, WormholeError>;
