//! Failure taxonomy for a build attempt.
//!
//! Internal helpers work in `anyhow::Result` and attach context as they go.
//! Each stage of the orchestrator converts what escapes it into one of the
//! typed variants below, so the caller can tell *where* a build died without
//! parsing messages.

use std::fmt;
use thiserror::Error;

/// Fatal error for one build attempt.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Bad or missing input paths, malformed template, unknown version.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Mount, copy or composite failure, or missing boot structure.
    #[error("media synthesis failed: {0}")]
    Media(String),

    /// Passphrase generator unavailable or returned nothing.
    #[error("credential generation failed: {0}")]
    Generation(String),

    /// The external build engine exited non-zero.
    #[error("build engine exited with code {code}\n--- last engine log lines ---\n{log_tail}")]
    BuildEngine { code: i32, log_tail: String },

    /// Archive creation or registry registration failed.
    #[error("packaging failed: {0}")]
    Packaging(String),

    /// Another build holds the output directory.
    #[error("output directory is leased: {0}")]
    Lease(String),
}

impl BuildError {
    pub fn validation(err: impl fmt::Display) -> Self {
        Self::Validation(err.to_string())
    }

    /// Wrap an `anyhow` chain as a media error, keeping every context layer.
    ///
    /// A `BuildError` already inside the chain is returned as is.
    pub fn media(err: anyhow::Error) -> Self {
        match err.downcast::<BuildError>() {
            Ok(inner) => inner,
            Err(err) => Self::Media(format!("{:#}", err)),
        }
    }

    pub fn generation(err: anyhow::Error) -> Self {
        Self::Generation(format!("{:#}", err))
    }

    pub fn packaging(err: anyhow::Error) -> Self {
        Self::Packaging(format!("{:#}", err))
    }

    /// Short, stable name of the variant for reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Media(_) => "MediaError",
            Self::Generation(_) => "GenerationError",
            Self::BuildEngine { .. } => "BuildEngineError",
            Self::Packaging(_) => "PackagingError",
            Self::Lease(_) => "LeaseError",
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

/// Non-fatal problem found while cleaning up. Logged and reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupWarning {
    pub message: String,
}

impl CleanupWarning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cleanup warning: {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_media_keeps_context_chain() {
        let err = anyhow!("no boot files").context("composing image");
        let msg = BuildError::media(err).to_string();
        assert!(msg.contains("composing image"));
        assert!(msg.contains("no boot files"));
    }

    #[test]
    fn test_engine_error_shows_log_tail() {
        let err = BuildError::BuildEngine {
            code: 1,
            log_tail: "==> winrm timeout".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("code 1"));
        assert!(msg.contains("winrm timeout"));
        assert_eq!(err.kind(), "BuildEngineError");
    }
}
