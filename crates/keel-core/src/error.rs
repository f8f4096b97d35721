//! Error taxonomy shared by the composer, the release engine and the registrar.
//!
//! Wrapped causes stay `anyhow::Error` so the full context chain survives;
//! the variant is what callers branch on.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to resolve chart '{reference}': {cause:#}")]
    ChartResolution {
        reference: String,
        cause: anyhow::Error,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("timed out after {}s waiting for lock {}", .waited.as_secs(), .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("{context}: {cause:#}")]
    TransientInfra {
        context: String,
        cause: anyhow::Error,
    },

    #[error("{context}: {cause:#}")]
    Internal {
        context: String,
        cause: anyhow::Error,
    },
}

impl EngineError {
    pub fn internal(context: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        EngineError::Internal {
            context: context.into(),
            cause: cause.into(),
        }
    }

    pub fn transient(context: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        EngineError::TransientInfra {
            context: context.into(),
            cause: cause.into(),
        }
    }

    /// Coarse classification used by the response projector.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::Configuration(_) => ErrorKind::Configuration,
            EngineError::ChartResolution { .. } => ErrorKind::ChartResolution,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::LockTimeout { .. } => ErrorKind::LockTimeout,
            EngineError::Cancelled(_) => ErrorKind::Cancelled,
            EngineError::TransientInfra { .. } => ErrorKind::TransientInfra,
            EngineError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }

    /// The wrapped underlying failure, if this error carries one.
    pub fn cause(&self) -> Option<&anyhow::Error> {
        match self {
            EngineError::ChartResolution { cause, .. }
            | EngineError::TransientInfra { cause, .. }
            | EngineError::Internal { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Configuration,
    ChartResolution,
    NotFound,
    Conflict,
    LockTimeout,
    Cancelled,
    TransientInfra,
    Internal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::Validation("release name is empty".to_string());
        assert_eq!(err.to_string(), "validation failed: release name is empty");

        let err = EngineError::NotFound("release 'redis-v5'".to_string());
        assert_eq!(err.to_string(), "release 'redis-v5' not found");

        let err = EngineError::LockTimeout {
            path: PathBuf::from("/tmp/repositories.lock"),
            waited: Duration::from_secs(30),
        };
        assert_eq!(
            err.to_string(),
            "timed out after 30s waiting for lock /tmp/repositories.lock"
        );
    }

    #[test]
    fn test_wrapped_cause_keeps_context_chain() {
        let cause = anyhow::anyhow!("connection refused").context("dial control plane");
        let err = EngineError::transient("install redis-v5", cause);

        let message = err.to_string();
        assert!(message.starts_with("install redis-v5: dial control plane"));
        assert!(message.contains("connection refused"));
        assert!(err.cause().is_some());
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            EngineError::Conflict("x".into()).kind(),
            ErrorKind::Conflict
        );
        assert!(EngineError::NotFound("x".into()).is_not_found());
        assert!(!EngineError::internal("op", anyhow::anyhow!("boom")).is_not_found());
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::LockTimeout).unwrap();
        assert_eq!(json, "\"lock_timeout\"");
    }
}
