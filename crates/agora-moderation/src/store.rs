//! Moderation store: per-content serialized vote state.
//!
//! The store is the sole owner of mutable moderation state. Every mutation
//! of a single content id runs inside that id's critical section, so the
//! per-content history is linearizable; distinct content ids proceed in
//! parallel. The engine on top holds no state of its own.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::error::{Error, Result};
use crate::types::{ContentId, Principal, Timestamp, VoteChoice, VoteSession};

/// Storage contract for vote sessions and membership records.
///
/// Implementations serialize all mutations of a single content id: two
/// concurrent votes by different principals must both be counted, two by
/// the same principal must yield exactly one success, and the resolved
/// flag flips false→true for exactly one caller.
pub trait ModerationStore: Send + Sync {
    /// Insert a freshly opened session and record its reporter as one
    /// atomic unit. A session never exists without its reporter.
    ///
    /// Fails with [`Error::AlreadyReported`] if any session — open or
    /// resolved — already exists for the content.
    fn open_session(&self, session: VoteSession, reporter: &Principal) -> Result<VoteSession>;

    /// Count a vote and return the updated snapshot.
    ///
    /// The window guard (`!resolved && now < end_time`), the double-vote
    /// check, and the tally increment run in one critical section;
    /// checking the window outside it would let a vote slip in behind a
    /// concurrent resolution.
    fn record_vote(
        &self,
        content_id: &ContentId,
        voter: &Principal,
        choice: VoteChoice,
        now: Timestamp,
    ) -> Result<VoteSession>;

    /// Flip `resolved` false→true.
    ///
    /// Exactly one caller wins and receives the frozen-tally snapshot;
    /// every other caller gets [`Error::AlreadyResolved`].
    fn mark_resolved(&self, content_id: &ContentId) -> Result<VoteSession>;

    /// Snapshot of the session, or [`Error::SessionNotFound`].
    fn get(&self, content_id: &ContentId) -> Result<VoteSession>;

    /// Whether this principal reported the content.
    fn has_reported(&self, content_id: &ContentId, principal: &Principal) -> Result<bool>;

    /// Whether this principal's vote is counted for the content.
    fn has_voted(&self, content_id: &ContentId, principal: &Principal) -> Result<bool>;

    /// All sessions, open and resolved, ordered by start time.
    fn list_sessions(&self) -> Result<Vec<VoteSession>>;
}

/// All moderation state for one content id.
#[derive(Debug)]
struct Slot {
    session: VoteSession,
    reporters: HashSet<Principal>,
    votes: HashMap<Principal, VoteChoice>,
}

type SlotMap = HashMap<ContentId, Arc<Mutex<Slot>>>;

/// In-memory [`ModerationStore`] with process lifetime.
///
/// Session creation takes the outer write lock; everything else takes the
/// outer read lock plus the slot's own mutex, so votes on different
/// content ids never contend with each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RwLock<SlotMap>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, content_id: &ContentId) -> Result<Arc<Mutex<Slot>>> {
        let slots = self.slots.read().map_err(|_| poisoned())?;
        slots
            .get(content_id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(content_id.clone()))
    }
}

/// A poisoned lock means a writer panicked mid-mutation; surface it as a
/// persistence fault rather than propagating the panic.
fn poisoned() -> Error {
    Error::StoreUnavailable("lock poisoned".to_string())
}

fn lock_slot(slot: &Mutex<Slot>) -> Result<MutexGuard<'_, Slot>> {
    slot.lock().map_err(|_| poisoned())
}

impl ModerationStore for MemoryStore {
    fn open_session(&self, session: VoteSession, reporter: &Principal) -> Result<VoteSession> {
        let mut slots = self.slots.write().map_err(|_| poisoned())?;
        let content_id = session.content_id.clone();
        if slots.contains_key(&content_id) {
            return Err(Error::AlreadyReported(content_id));
        }

        tracing::debug!(content = %content_id, reporter = %reporter, "vote session opened");
        let slot = Slot {
            session: session.clone(),
            reporters: HashSet::from([reporter.clone()]),
            votes: HashMap::new(),
        };
        slots.insert(content_id, Arc::new(Mutex::new(slot)));
        Ok(session)
    }

    fn record_vote(
        &self,
        content_id: &ContentId,
        voter: &Principal,
        choice: VoteChoice,
        now: Timestamp,
    ) -> Result<VoteSession> {
        let slot = self.slot(content_id)?;
        let mut slot = lock_slot(&slot)?;

        if !slot.session.is_open(now) {
            return Err(Error::VotingClosed(content_id.clone()));
        }
        if slot.votes.contains_key(voter) {
            return Err(Error::AlreadyVoted {
                content_id: content_id.clone(),
                principal: voter.clone(),
            });
        }

        slot.votes.insert(voter.clone(), choice);
        match choice {
            VoteChoice::Keep => slot.session.yes_votes += 1,
            VoteChoice::Remove => slot.session.no_votes += 1,
        }
        Ok(slot.session.clone())
    }

    fn mark_resolved(&self, content_id: &ContentId) -> Result<VoteSession> {
        let slot = self.slot(content_id)?;
        let mut slot = lock_slot(&slot)?;

        if slot.session.resolved {
            return Err(Error::AlreadyResolved(content_id.clone()));
        }
        slot.session.resolved = true;
        Ok(slot.session.clone())
    }

    fn get(&self, content_id: &ContentId) -> Result<VoteSession> {
        let slot = self.slot(content_id)?;
        let slot = lock_slot(&slot)?;
        Ok(slot.session.clone())
    }

    fn has_reported(&self, content_id: &ContentId, principal: &Principal) -> Result<bool> {
        match self.slot(content_id) {
            Ok(slot) => Ok(lock_slot(&slot)?.reporters.contains(principal)),
            Err(Error::SessionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn has_voted(&self, content_id: &ContentId, principal: &Principal) -> Result<bool> {
        match self.slot(content_id) {
            Ok(slot) => Ok(lock_slot(&slot)?.votes.contains_key(principal)),
            Err(Error::SessionNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list_sessions(&self) -> Result<Vec<VoteSession>> {
        let slots = self.slots.read().map_err(|_| poisoned())?;
        let mut sessions = Vec::with_capacity(slots.len());
        for slot in slots.values() {
            sessions.push(lock_slot(slot)?.session.clone());
        }
        sessions.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        Ok(sessions)
    }
}
