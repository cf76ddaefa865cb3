//! Per-session browser state and the registry that tracks it.
//!
//! One session is one browser process tracked under a host-assigned
//! identifier. Handles exist iff the session is open; there is no idle
//! cleanup — an abandoned session keeps its browser process alive until
//! `close_browser` or `dispose`.

use crate::config::HarOutputConfig;
use crate::error::ProviderError;
use crate::har::HarRecorder;
use chromiumoxide::{Browser, Page};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Available screen dimensions recorded at open time via a JS probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    /// True iff a window of `width` × `height` fits on this screen.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.width && height <= self.height
    }
}

/// Everything tracked for one open browser.
pub struct Session {
    /// Browser must stay alive for the lifetime of the session.
    pub browser: Browser,
    /// CDP event loop; aborted when the session closes.
    pub handler_task: JoinHandle<()>,
    pub page: Page,
    pub screen: ScreenSize,
    /// Present iff HAR capture was configured for this session, together
    /// with the output paths to write at close time.
    pub har: Option<(HarRecorder, HarOutputConfig)>,
}

/// Session-id-keyed registry owned by the provider. Lookups for unknown ids
/// fail explicitly with [`ProviderError::SessionNotFound`]; opening an id
/// that is already tracked fails with [`ProviderError::SessionAlreadyOpen`].
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<RwLock<Session>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn get(&self, id: &str) -> Result<Arc<RwLock<Session>>, ProviderError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ProviderError::SessionNotFound(id.to_string()))
    }

    /// Insert a freshly-opened session. Fails if the id is still open; the
    /// caller owns tearing down the session it tried to insert.
    pub async fn insert(&self, id: &str, session: Session) -> Result<(), ProviderError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(ProviderError::SessionAlreadyOpen(id.to_string()));
        }
        tracing::info!(session_id = %id, "Tracking new browser session");
        sessions.insert(id.to_string(), Arc::new(RwLock::new(session)));
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Result<Arc<RwLock<Session>>, ProviderError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| ProviderError::SessionNotFound(id.to_string()))
    }

    /// Snapshot of currently-open session ids (used by `dispose`).
    pub async fn open_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }
}
