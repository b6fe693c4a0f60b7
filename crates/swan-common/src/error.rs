use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds surfaced by the deal pipeline.
///
/// `InvalidArgument` and `MalformedManifest` are raised before any deal is
/// proposed. `ExternalInvocation` is scoped to a single row and never aborts a
/// batch on its own.
#[derive(Debug, Error)]
pub enum DealError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed manifest at line {line}: {reason}")]
    MalformedManifest { line: u64, reason: String },

    #[error("deal invocation failed: {0}")]
    ExternalInvocation(String),

    #[error("failed to write ledger {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("publish failed: {0}")]
    Publish(String),
}

impl DealError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        DealError::InvalidArgument(msg.into())
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DealError::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DealError>;
