//! Error types for lookups, the result cache and output templates

use thiserror::Error;

/// Failure of a remote lookup. Never escapes the checker: it is turned
/// into an `ErrorInfo` and rendered as an `ERR` record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("failed to resolve external IP: {0}")]
    SelfResolution(String),

    #[error("{0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Well-formed answer in which the provider reports its own error
    /// (rate limiting, reserved range, ...)
    #[error("{0}")]
    Provider(String),
}

/// Cache file I/O failure. Load failures degrade to an empty cache,
/// save failures are logged.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Misconfigured output template. This is the only error that stops a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("invalid template {template:?}: {message}")]
    Syntax { template: String, message: String },

    #[error("unknown placeholder {{{name}}} in template {template:?}")]
    UnknownPlaceholder { template: String, name: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    #[error("invalid country code {0:?}: expected two ASCII letters")]
    InvalidCountryCode(String),
}
