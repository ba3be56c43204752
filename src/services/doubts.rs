//! Doubt board — saved Q&A pairs per chapter.
//!
//! The backend records every answered chat turn as a doubt. The board
//! fetches a chapter's list on first use and serves it from cache after
//! that; a forced fetch bypasses the cache. `spawn_refresh_task` wires the
//! board to a chat session so a newly saved doubt triggers a forced fetch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::chat::ChatEvent;
use crate::gateway::types::Doubt;
use crate::gateway::{GatewayError, TutorGateway};

pub struct DoubtBoard {
    gateway: Arc<dyn TutorGateway>,
    cache: Mutex<HashMap<String, Vec<Doubt>>>,
}

impl DoubtBoard {
    pub fn new(gateway: Arc<dyn TutorGateway>) -> Self {
        Self { gateway, cache: Mutex::new(HashMap::new()) }
    }

    /// Cached list for `chapter_id`, if it has been fetched.
    #[must_use]
    pub fn cached(&self, chapter_id: &str) -> Option<Vec<Doubt>> {
        self.lock().get(chapter_id).cloned()
    }

    /// Doubts for `chapter_id`, from cache unless `force` is set.
    ///
    /// # Errors
    ///
    /// The gateway error on a failed fetch. The chapter is then cached as
    /// empty so later unforced reads do not retry.
    pub async fn doubts(&self, chapter_id: &str, force: bool) -> Result<Vec<Doubt>, GatewayError> {
        if !force {
            if let Some(doubts) = self.cached(chapter_id) {
                return Ok(doubts);
            }
        }

        debug!(chapter_id, force, "doubts: fetching");
        match self.gateway.fetch_doubts(chapter_id).await {
            Ok(list) => {
                self.lock().insert(chapter_id.to_owned(), list.doubts.clone());
                Ok(list.doubts)
            }
            Err(e) => {
                warn!(error = %e, chapter_id, "doubts: fetch failed");
                self.lock().insert(chapter_id.to_owned(), Vec::new());
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Doubt>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Force-refresh a chapter's doubts whenever the chat reports a saved one.
/// The task ends when every sender for `events` is dropped.
pub fn spawn_refresh_task(board: Arc<DoubtBoard>, mut events: broadcast::Receiver<ChatEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ChatEvent::DoubtSaved { chapter_id }) => {
                    // Failure is already logged and cached by the board.
                    let _ = board.doubts(&chapter_id, true).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "doubts: refresh events lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!("doubts: refresh task stopped");
    })
}

#[cfg(test)]
#[path = "doubts_test.rs"]
mod tests;
