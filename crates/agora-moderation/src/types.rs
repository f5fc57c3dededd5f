//! Core moderation types.

use serde::{Deserialize, Serialize};

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Default voting window: 24 hours.
pub const VOTE_WINDOW_SECS: u64 = 86_400;

/// Opaque identity of a caller (e.g. a wallet address).
///
/// The engine assumes nothing about its structure beyond equality and
/// hashability. Whoever hands it in is trusted to have authenticated it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Create a principal from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Principal {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of a piece of content under moderation.
///
/// Opaque to the engine; the node derives these from a content hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Create a content id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single vote: keep the content up, or remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    /// The content should stay.
    Keep,
    /// The content should be taken down.
    Remove,
}

impl VoteChoice {
    /// Map the wire form: `in_favor = true` means "keep".
    pub const fn from_in_favor(in_favor: bool) -> Self {
        if in_favor {
            Self::Keep
        } else {
            Self::Remove
        }
    }

    /// Wire form of this choice.
    pub const fn in_favor(self) -> bool {
        matches!(self, Self::Keep)
    }
}

/// Terminal decision of a vote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The content stays visible.
    Keep,
    /// The content is taken down.
    Remove,
}

impl Outcome {
    /// Decide the outcome from a final tally.
    ///
    /// `Keep` requires a strict majority of keep votes. **A tie removes**:
    /// on `yes == no` the community did not clearly vote to keep, so the
    /// content comes down. This is a policy choice, not arithmetic — see
    /// the pinned cases in the tests before changing it.
    ///
    /// # Examples
    ///
    /// ```
    /// use agora_moderation::Outcome;
    ///
    /// assert_eq!(Outcome::from_tally(3, 1), Outcome::Keep);
    /// assert_eq!(Outcome::from_tally(1, 3), Outcome::Remove);
    /// assert_eq!(Outcome::from_tally(2, 2), Outcome::Remove); // tie removes
    /// assert_eq!(Outcome::from_tally(0, 0), Outcome::Remove); // no votes removes
    /// ```
    pub const fn from_tally(yes_votes: u64, no_votes: u64) -> Self {
        if yes_votes > no_votes {
            Self::Keep
        } else {
            Self::Remove
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keep => f.write_str("keep"),
            Self::Remove => f.write_str("remove"),
        }
    }
}

/// Per-content record of a moderation vote: its window and tally.
///
/// Created by the first accepted report, mutated by votes while the window
/// is open, terminally marked `resolved` exactly once. Never deleted — a
/// resolved session is permanent audit history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSession {
    /// The content under moderation.
    pub content_id: ContentId,

    /// When the session was opened.
    pub start_time: Timestamp,

    /// When voting closes. `start_time + window`.
    pub end_time: Timestamp,

    /// Votes to keep the content.
    pub yes_votes: u64,

    /// Votes to remove the content.
    pub no_votes: u64,

    /// Set once, at resolution. Monotonic.
    pub resolved: bool,
}

impl VoteSession {
    /// Open a fresh session at `now` with the given window.
    pub fn open(content_id: ContentId, now: Timestamp, window_secs: u64) -> Self {
        Self {
            content_id,
            start_time: now,
            end_time: now + window_secs,
            yes_votes: 0,
            no_votes: 0,
            resolved: false,
        }
    }

    /// Whether votes are still being accepted at `now`.
    pub fn is_open(&self, now: Timestamp) -> bool {
        !self.resolved && now < self.end_time
    }

    /// Decide the outcome from the current tally.
    ///
    /// Only meaningful once the session is resolved (or the window has
    /// closed and the tally is frozen).
    pub fn outcome(&self) -> Outcome {
        Outcome::from_tally(self.yes_votes, self.no_votes)
    }
}
