//! Error types for Fathom.
//!
//! Library crates use [`FathomError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Fathom operations.
#[derive(Debug, thiserror::Error)]
pub enum FathomError {
    /// Empty or missing query; rejected before any work starts.
    #[error("input error: {message}")]
    Input { message: String },

    /// The language-model capability failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The planner could not obtain a well-formed subtask list.
    #[error("planning error: {message}")]
    Planning { message: String },

    /// The pipeline exceeded its overall time budget.
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error during a page fetch.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FathomError>;

impl FathomError {
    /// Create an input error from any displayable message.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input {
            message: msg.into(),
        }
    }

    /// Create a planning error from any displayable message.
    pub fn planning(msg: impl Into<String>) -> Self {
        Self::Planning {
            message: msg.into(),
        }
    }

    /// Create a timeout error from any displayable message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failure of the language-model capability.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// Provider unreachable or misconfigured (e.g. API key absent).
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Upstream rate limit hit.
    #[error("provider rate limited: {0}")]
    RateLimited(String),

    /// Account quota or credits exhausted.
    #[error("provider quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other non-success response.
    #[error("provider returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The response could not be decoded or carried no text.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the capability cannot be reached at all, as opposed to a
    /// transient or per-call failure.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
