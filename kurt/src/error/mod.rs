//! Error types for hosts and the CLI

use crate::interp::RuntimeError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, KurtError>;

/// Anything that can go wrong between reading a file and printing a result
#[derive(Debug, Error)]
pub enum KurtError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("{0}")]
    Runtime(#[from] RuntimeError),
}

impl KurtError {
    /// The runtime error underneath, if this is one
    pub fn runtime(&self) -> Option<&RuntimeError> {
        match self {
            KurtError::Runtime(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::ErrorKind;

    #[test]
    fn test_runtime_passthrough() {
        let err: KurtError = RuntimeError::cycle("a").into();
        assert_eq!(err.runtime().map(|e| e.kind), Some(ErrorKind::CycleError));
        assert_eq!(err.to_string(), "dictionary a cannot become its own ancestor");
    }

    #[test]
    fn test_json_error() {
        let err: KurtError = serde_json::from_str::<serde_json::Value>("[").unwrap_err().into();
        assert!(err.to_string().starts_with("JSON error:"));
        assert!(err.runtime().is_none());
    }
}
