//! Provider error types
//!
//! Two failure classes: configuration errors are fatal and abort
//! `open_browser`; everything else is a delegate failure from chromiumoxide
//! or the filesystem, propagated unchanged (no retry, no recovery).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Config file missing, unreadable, or malformed. Fatal for the open call.
    #[error("failed to load browser config from {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Lookup for a session id with no open browser. Explicit by design:
    /// the registry never reports a miss as an empty success.
    #[error("no open browser for session {0:?}")]
    SessionNotFound(String),

    /// `open_browser` called for an id that is still open.
    #[error("session {0:?} already has an open browser")]
    SessionAlreadyOpen(String),

    #[error("timed out after {0:?} waiting for page load")]
    NavigationTimeout(Duration),

    /// A CDP command could not be assembled from its parameters.
    #[error("failed to build browser command: {0}")]
    Command(String),

    /// Any failure surfaced by the underlying CDP client.
    #[error("browser operation failed: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization failures: HAR output or the screen-size probe result.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_names_the_command_not_the_launch() {
        let err = ProviderError::Command("windowId is required".to_string());
        let message = err.to_string();
        assert!(message.contains("windowId is required"));
        assert!(!message.contains("launch"));
    }
}
