//! Error types for the gateway
//!
//! One enum, a status code mapping, and `From` conversions for the crates
//! we talk through.

use hyper::StatusCode;

/// Main error type for gateway operations
///
/// `Clone` because a single upstream outcome is broadcast to every
/// coalesced waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Entity type the gateway does not serve. Also covers identifiers that
    /// cannot be parsed into a type and discriminator.
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    /// Network failure, timeout, 5xx or unusable payload from a source
    /// adapter or the entity store.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// 4xx from a source adapter or the entity store, surfaced verbatim.
    #[error("Upstream rejected request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    /// Cache population failed. Logged by the gateway, only returned by the
    /// explicit sync routes.
    #[error("Write-back failed: {0}")]
    WriteBackFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// An identifier that does not decode into type + discriminator.
    pub fn malformed_identifier(id: &str) -> Self {
        Self::UnknownEntityType(format!("malformed entity id '{}'", id))
    }

    /// Short machine-readable reason used in JSON error bodies
    pub fn reason(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BadRequest",
            Self::UnknownEntityType(_) => "UnknownEntityType",
            Self::UpstreamUnavailable(_) => "UpstreamUnavailable",
            Self::UpstreamRejected { .. } => "UpstreamRejected",
            Self::WriteBackFailed(_) => "WriteBackFailed",
            Self::NotFound(_) => "NotFound",
            Self::Config(_) => "ConfigurationError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownEntityType(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::UpstreamRejected { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::WriteBackFailed(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was produced by a deadline rather than a response
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable(msg) if msg.contains("timed out"))
    }

    /// Classify a non-2xx upstream response.
    pub fn from_upstream_status(status: u16, body: String) -> Self {
        if (400..500).contains(&status) {
            Self::UpstreamRejected {
                status,
                message: body,
            }
        } else {
            Self::UpstreamUnavailable(format!("status {}: {}", status, body))
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamUnavailable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::UpstreamUnavailable(format!("invalid upstream payload: {}", err))
        } else if let Some(status) = err.status() {
            Self::from_upstream_status(status.as_u16(), err.to_string())
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for GatewayError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::UpstreamUnavailable("deadline exceeded, request timed out".to_string())
    }
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
