//! Bindings between the moderation engine and node storage.
//!
//! The engine only knows the [`ContentSource`] and [`ResolutionSink`]
//! traits; here they are realized against the node's own post store.

use crate::storage::Storage;
use agora_moderation::{
    ContentId, ContentSource, Error as ModerationError, Outcome, ResolutionSink,
    Result as ModerationResult,
};
use std::sync::Arc;

/// Content source answering from the node's post store.
///
/// A hidden post no longer exists for moderation purposes, so removed
/// content cannot be re-reported.
pub struct StorageContentSource {
    storage: Arc<Storage>,
}

impl StorageContentSource {
    /// Create a source over shared node storage.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl ContentSource for StorageContentSource {
    fn exists(&self, content_id: &ContentId) -> ModerationResult<bool> {
        let post = self
            .storage
            .get_post(content_id.as_str())
            .map_err(|e| ModerationError::StoreUnavailable(e.to_string()))?;
        Ok(post.map(|p| !p.hidden).unwrap_or(false))
    }
}

/// Resolution sink that applies outcomes to stored posts.
///
/// `Remove` sets the post's hidden flag; `Keep` leaves it untouched. The
/// sink is fire-and-forget, so a storage fault here is logged rather than
/// propagated — the resolved session itself is already durable.
pub struct StorageResolutionSink {
    storage: Arc<Storage>,
}

impl StorageResolutionSink {
    /// Create a sink over shared node storage.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl ResolutionSink for StorageResolutionSink {
    fn apply_outcome(&self, content_id: &ContentId, outcome: Outcome) {
        match outcome {
            Outcome::Keep => {
                tracing::info!(content = %content_id, "community vote kept post");
            }
            Outcome::Remove => match self.storage.set_hidden(content_id.as_str(), true) {
                Ok(()) => {
                    tracing::info!(content = %content_id, "community vote removed post");
                }
                Err(e) => {
                    tracing::error!(content = %content_id, error = %e, "failed to hide removed post");
                }
            },
        }
    }
}
