//! Error types for the recursive watcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher operations.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Watched root {path} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("Watcher for {path} is already running")]
    AlreadyStarted { path: PathBuf },

    #[error("Failed to spawn {name} thread: {reason}")]
    ThreadSpawn { name: String, reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
