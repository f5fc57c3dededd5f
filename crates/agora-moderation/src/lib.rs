//! Community-vote content moderation for the Agora feed.
//!
//! Any principal can flag a piece of content, which opens a 24-hour vote
//! session. While the window is open every principal gets exactly one
//! vote: keep or remove. After the window closes, anyone may trigger
//! resolution; the outcome is decided once, deterministically, however
//! many callers race to resolve, and handed to a [`ResolutionSink`].
//!
//! # Architecture
//!
//! - **Types**: [`VoteSession`], [`Principal`], [`ContentId`], [`Outcome`]
//! - **Store**: [`ModerationStore`] — per-content serialized state,
//!   with the in-memory [`MemoryStore`] implementation
//! - **Engine**: [`ModerationEngine`] — the report → vote → resolve
//!   state machine over a store and two collaborators
//!
//! The crate is deliberately free of I/O and runtime dependencies; hosts
//! wire in their own [`ContentSource`], [`ResolutionSink`], and clock.

pub mod engine;
pub mod error;
pub mod store;
pub mod types;

pub use engine::{ContentSource, ModerationEngine, Resolution, ResolutionSink};
pub use error::{Error, Result};
pub use store::{MemoryStore, ModerationStore};
pub use types::{
    ContentId, Outcome, Principal, Timestamp, VoteChoice, VoteSession, VOTE_WINDOW_SECS,
};
