//! Error types for the sourcemesh routing core
//!
//! Backend failures carry a classified [`ErrorKind`] and the originating
//! source name so upstream code can decide whether to retry at a higher
//! level (e.g. router-level fallback sources).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Classified error kinds for backend failures
///
/// A closed discriminator derived from the error's declared code or
/// category. Unclassifiable errors map to the `Unknown` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Connection dropped or refused mid-call
    ConnectionReset,
    /// Call exceeded its deadline
    Timeout,
    /// Backend temporarily unavailable
    ServiceUnavailable,
    /// Backend throttled the caller
    RateLimited,
    /// Requested item does not exist
    NotFound,
    /// Caller sent a malformed request
    InvalidRequest,
    /// Placeholder backend that never returns real data
    NotImplemented,
    /// Unclassifiable failure
    Unknown,
}

impl ErrorKind {
    /// Classify a backend-declared error code into a kind
    pub fn from_code(code: &str) -> Self {
        match code {
            "ECONNRESET" | "ECONNREFUSED" => ErrorKind::ConnectionReset,
            "ETIMEDOUT" | "ESOCKETTIMEDOUT" => ErrorKind::Timeout,
            "ServiceUnavailable" | "EAI_AGAIN" => ErrorKind::ServiceUnavailable,
            "ENOTFOUND" => ErrorKind::NotFound,
            _ => ErrorKind::Unknown,
        }
    }

    /// Classify an HTTP-style status code into a kind
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ErrorKind::RateLimited,
            404 => ErrorKind::NotFound,
            400 => ErrorKind::InvalidRequest,
            408 | 504 => ErrorKind::Timeout,
            502 | 503 => ErrorKind::ServiceUnavailable,
            501 => ErrorKind::NotImplemented,
            _ => ErrorKind::Unknown,
        }
    }

    /// Canonical code string for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionReset => "ECONNRESET",
            ErrorKind::Timeout => "ETIMEDOUT",
            ErrorKind::ServiceUnavailable => "ServiceUnavailable",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::NotFound => "ENOTFOUND",
            ErrorKind::InvalidRequest => "InvalidRequest",
            ErrorKind::NotImplemented => "NotImplemented",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }
}

/// A failure declared by a concrete backend
///
/// Every fallible `DataSource` call resolves to one of these before the
/// self-healing layer sees it.
#[derive(Error, Debug, Clone)]
#[error("source '{source_name}' failed ({}): {message}", .kind.as_str())]
pub struct SourceError {
    /// Name of the backend that failed
    pub source_name: String,
    /// Classified error kind
    pub kind: ErrorKind,
    /// Human-readable failure description
    pub message: String,
    /// Raw backend error code, if one was declared
    pub code: Option<String>,
    /// HTTP-style status, if one was declared
    pub status: Option<u16>,
}

impl SourceError {
    /// Create a new source error with an explicit kind
    pub fn new(source_name: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            kind,
            message: message.into(),
            code: None,
            status: None,
        }
    }

    /// Create a source error classified from a raw backend code
    pub fn from_code(
        source_name: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let code = code.into();
        Self {
            source_name: source_name.into(),
            kind: ErrorKind::from_code(&code),
            message: message.into(),
            code: Some(code),
            status: None,
        }
    }

    /// Marker error for placeholder backends that never return real data
    pub fn not_implemented(source_name: impl Into<String>, operation: &str) -> Self {
        Self::new(
            source_name,
            ErrorKind::NotImplemented,
            format!("operation '{}' is not implemented", operation),
        )
    }

    /// Attach an HTTP-style status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Extract structured context for the failure ledger
    pub fn context_value(&self) -> Value {
        let mut ctx = serde_json::Map::new();
        ctx.insert("kind".to_string(), json!(self.kind.as_str()));
        if let Some(code) = &self.code {
            ctx.insert("code".to_string(), json!(code));
        }
        if let Some(status) = self.status {
            ctx.insert("status".to_string(), json!(status));
        }
        Value::Object(ctx)
    }
}

/// Main error type for the routing core
#[derive(Error, Debug)]
pub enum MeshError {
    /// No registered source passed its health probe for the capability
    #[error("no healthy source for capability '{capability}'")]
    NoHealthySource { capability: String },

    /// A backend call failed after passing through self-healing
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The reentrancy guard fired during a healing attempt
    #[error("recursive healing loop detected in context '{context}'")]
    HealingLoop { context: String },

    /// The selected source is a placeholder for this operation
    #[error("source '{source_name}' does not implement operation '{operation}'")]
    NotImplemented {
        source_name: String,
        operation: String,
    },

    /// A source with this name is already registered
    #[error("source '{name}' is already registered")]
    DuplicateSource { name: String },

    /// Configuration errors
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Serialization errors
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("routing error: {0}")]
    Generic(String),
}

impl MeshError {
    /// The classified kind carried by this error, if any
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            MeshError::Source(err) => Some(err.kind),
            MeshError::NotImplemented { .. } => Some(ErrorKind::NotImplemented),
            _ => None,
        }
    }

    /// The originating source name, if any
    pub fn source_name(&self) -> Option<&str> {
        match self {
            MeshError::Source(err) => Some(&err.source_name),
            MeshError::NotImplemented { source_name, .. } => Some(source_name),
            _ => None,
        }
    }
}

/// Result type alias for routing operations
pub type Result<T> = std::result::Result<T, MeshError>;

/// Convert anyhow errors to MeshError
impl From<anyhow::Error> for MeshError {
    fn from(err: anyhow::Error) -> Self {
        MeshError::Generic(err.to_string())
    }
}
