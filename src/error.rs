use std::path::PathBuf;

use thiserror::Error;

/// Library error type for agent-state operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The state file could not be replaced with the new status.
    #[error("failed to write status to {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to start the publisher thread.
    #[error("failed to spawn status publisher thread")]
    Spawn(#[source] std::io::Error),

    /// A status name that is not part of the configured catalog.
    #[error("unknown status '{0}'")]
    UnknownStatus(String),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),

    /// Configuration parsed but violates a runtime invariant.
    #[error("invalid configuration: {0:#}")]
    Invalid(anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
