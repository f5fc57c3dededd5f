//! Error types for the moderation engine.

use crate::types::{ContentId, Principal, Timestamp};
use thiserror::Error;

/// Result type for moderation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in moderation operations.
///
/// Everything except [`Error::StoreUnavailable`] is an expected business
/// outcome: returned to the caller, never retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The content source does not know this content.
    #[error("content not found: {0}")]
    ContentNotFound(ContentId),

    /// A vote session already exists for this content, open or resolved.
    #[error("content already reported: {0}")]
    AlreadyReported(ContentId),

    /// No vote session exists for this content.
    #[error("no vote session for content: {0}")]
    SessionNotFound(ContentId),

    /// The voting window has closed, or the session is already resolved.
    #[error("voting closed for content: {0}")]
    VotingClosed(ContentId),

    /// This principal's vote for this content is already counted.
    #[error("{principal} already voted on {content_id}")]
    AlreadyVoted {
        content_id: ContentId,
        principal: Principal,
    },

    /// The voting window has not ended; resolution is premature.
    #[error("voting on {content_id} still active until {end_time}")]
    VotingStillActive {
        content_id: ContentId,
        end_time: Timestamp,
    },

    /// The session is already resolved. Benign: repeated resolve calls are
    /// expected from independent triggers and surface the stored outcome.
    #[error("vote on {0} already resolved")]
    AlreadyResolved(ContentId),

    /// The persistence layer failed. The caller may retry with backoff.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}
