use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Can't parse Dockerfile: {0}")]
    Parse(String),

    #[error("Path {0} appears in more than one set of file updates")]
    OverlappingUpdates(String),

    #[error("Path {0} is outside the build context")]
    OutsideContext(String),

    #[error("Container {0} is not running")]
    NotRunning(String),

    #[error("Can't query state of container {container}: {reason}")]
    Inspect { container: String, reason: String },

    /// An archive transfer or a delete command failed. Filesystem changes applied
    /// by earlier actions of the same batch are kept.
    #[error("Failed to {action} {paths:?}: {reason}")]
    Transfer {
        action: String,
        paths: Vec<String>,
        reason: String,
    },

    #[error("Can't restart container {container}: {reason}")]
    Restart { container: String, reason: String },

    #[error("Container {container} did not restart within {waited:?}")]
    RestartTimeout { container: String, waited: Duration },

    #[error("Container {0} reported a start before stopping")]
    RestartOrder(String),

    #[error("Restart confirmation of container {0} was cancelled")]
    RestartCancelled(String),

    #[error("Event stream of container {container} closed: {reason}")]
    EventStreamClosed { container: String, reason: String },
}

impl SyncError {
    pub(crate) fn transfer(action: impl Into<String>, paths: Vec<String>, cause: anyhow::Error) -> Self {
        SyncError::Transfer {
            action: action.into(),
            paths,
            reason: format!("{:#}", cause),
        }
    }
}
