//! Error types for idmctl
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for idmctl operations
///
/// The variants separate the three ways a server call can go wrong:
/// the network never delivered a response (`Transport`), the server
/// rejected the request (`Status`), or the server answered 2xx with a body
/// that breaks the expected contract (`InvalidResponse`).
#[derive(Error, Debug)]
pub enum IdmError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A target name or URL did not match any stored target
    #[error("No target found for '{0}'")]
    TargetNotFound(String),

    /// A command needs a current target but none is selected
    #[error("No current target. Use `idmctl target <url>` to select one")]
    NoCurrentTarget,

    /// Network-level failure (DNS, connection refused, TLS)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status, with the rendered response body
    #[error("{}", render_status(.status, .body))]
    Status {
        /// Status line, e.g. `404 Not Found`
        status: String,
        /// Best-effort rendering of the response body
        body: String,
    },

    /// Server answered successfully but the body is not what was expected
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authorization was denied or the redirect was malformed
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// A second authorization-code flow was started while one is pending
    #[error("An authorization is already in progress")]
    AuthorizationInProgress,

    /// No redirect arrived within the configured wait
    #[error("Timed out after {0}s waiting for the authorization redirect")]
    AuthorizationTimeout(u64),

    /// Multipart upload preparation errors
    #[error("File upload error: {0}")]
    FileUpload(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn render_status(status: &str, body: &str) -> String {
    if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}\n{}", status, body.trim_end())
    }
}

/// Result type alias for idmctl operations
///
/// Uses `anyhow::Error` so call sites can attach context; callers that need
/// to classify a failure use `downcast_ref::<IdmError>()`.
pub type Result<T> = anyhow::Result<T>;
