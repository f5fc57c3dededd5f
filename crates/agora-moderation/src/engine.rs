//! Moderation engine: the report → vote → resolve state machine.
//!
//! Flagging content opens a time-boxed vote session. While the window is
//! open, each principal gets one vote: keep or remove. Once the window
//! closes anyone may resolve; the first resolver to win the resolved
//! check-and-set computes the outcome and notifies the sink, every later
//! call is a read.
//!
//! Per content id:
//!
//! ```text
//! NonExistent --report--> Open(start = now, end = now + window)
//! Open --cast_vote--> Open                    (now < end, not resolved)
//! Open --resolve, now <  end--> Open          (rejected, VotingStillActive)
//! Open --resolve, now >= end--> Resolved(outcome)
//! Resolved --report/cast_vote/resolve--> Resolved  (rejected / read-only)
//! ```
//!
//! The engine holds no mutable state: it orchestrates the store (which
//! owns all serialization) and the two collaborators below, so one
//! instance is freely shared across any number of concurrent callers.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::ModerationStore;
use crate::types::{ContentId, Outcome, Principal, Timestamp, VoteChoice, VoteSession, VOTE_WINDOW_SECS};

/// Read-side view of the content being moderated.
///
/// The engine never creates or deletes content; it only asks whether the
/// target of a report exists.
pub trait ContentSource: Send + Sync {
    /// Whether the content is known (and still moderatable).
    fn exists(&self, content_id: &ContentId) -> Result<bool>;
}

/// Consumer of final outcomes.
///
/// Fire-and-forget: invoked at most once per resolution by this engine.
/// A sink reachable from more than one engine instance must be
/// idempotent itself.
pub trait ResolutionSink: Send + Sync {
    /// Apply the outcome to the content (e.g. flag a removed post).
    fn apply_outcome(&self, content_id: &ContentId, outcome: Outcome);
}

/// A resolved session together with its computed outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Frozen-tally snapshot of the session.
    pub session: VoteSession,
    /// The terminal decision.
    pub outcome: Outcome,
}

/// Orchestrates moderation operations over a [`ModerationStore`].
pub struct ModerationEngine<S> {
    store: S,
    content: Arc<dyn ContentSource>,
    sink: Arc<dyn ResolutionSink>,
    window_secs: u64,
}

impl<S: ModerationStore> ModerationEngine<S> {
    /// Create an engine with the default 24h voting window.
    pub fn new(store: S, content: Arc<dyn ContentSource>, sink: Arc<dyn ResolutionSink>) -> Self {
        Self {
            store,
            content,
            sink,
            window_secs: VOTE_WINDOW_SECS,
        }
    }

    /// Override the voting window.
    #[must_use]
    pub fn with_window(mut self, window_secs: u64) -> Self {
        self.window_secs = window_secs;
        self
    }

    /// The configured voting window in seconds.
    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    /// Flag content and open its vote session.
    ///
    /// Fails `ContentNotFound` if the content source denies existence, and
    /// `AlreadyReported` if any session exists — a resolved session is not
    /// reopened by a new report.
    pub fn report(
        &self,
        content_id: &ContentId,
        reporter: &Principal,
        now: Timestamp,
    ) -> Result<VoteSession> {
        if !self.content.exists(content_id)? {
            return Err(Error::ContentNotFound(content_id.clone()));
        }

        let session = VoteSession::open(content_id.clone(), now, self.window_secs);
        let session = self.store.open_session(session, reporter)?;
        tracing::info!(
            content = %content_id,
            reporter = %reporter,
            end_time = session.end_time,
            "content reported, vote session open"
        );
        Ok(session)
    }

    /// Cast one vote. `in_favor = true` votes to keep the content.
    ///
    /// No side effects beyond the tally.
    pub fn cast_vote(
        &self,
        content_id: &ContentId,
        voter: &Principal,
        in_favor: bool,
        now: Timestamp,
    ) -> Result<VoteSession> {
        let choice = VoteChoice::from_in_favor(in_favor);
        let session = self.store.record_vote(content_id, voter, choice, now)?;
        tracing::debug!(
            content = %content_id,
            voter = %voter,
            ?choice,
            yes = session.yes_votes,
            no = session.no_votes,
            "vote counted"
        );
        Ok(session)
    }

    /// Resolve a session whose window has closed.
    ///
    /// The caller that wins the resolved check-and-set computes the outcome
    /// from the frozen tally and notifies the sink; repeated calls are
    /// idempotent reads of the stored result and never notify again.
    pub fn resolve(&self, content_id: &ContentId, now: Timestamp) -> Result<Resolution> {
        let session = self.store.get(content_id)?;
        if now < session.end_time {
            return Err(Error::VotingStillActive {
                content_id: content_id.clone(),
                end_time: session.end_time,
            });
        }

        match self.store.mark_resolved(content_id) {
            Ok(session) => {
                let outcome = session.outcome();
                tracing::info!(
                    content = %content_id,
                    yes = session.yes_votes,
                    no = session.no_votes,
                    %outcome,
                    "vote session resolved"
                );
                self.sink.apply_outcome(content_id, outcome);
                Ok(Resolution { session, outcome })
            }
            Err(Error::AlreadyResolved(_)) => {
                let session = self.store.get(content_id)?;
                let outcome = session.outcome();
                tracing::debug!(content = %content_id, %outcome, "resolve replay, returning stored outcome");
                Ok(Resolution { session, outcome })
            }
            Err(e) => Err(e),
        }
    }

    /// Snapshot of the session for this content.
    pub fn session(&self, content_id: &ContentId) -> Result<VoteSession> {
        self.store.get(content_id)
    }

    /// All sessions, open and resolved.
    pub fn sessions(&self) -> Result<Vec<VoteSession>> {
        self.store.list_sessions()
    }

    /// Whether this principal reported the content.
    pub fn has_reported(&self, content_id: &ContentId, principal: &Principal) -> Result<bool> {
        self.store.has_reported(content_id, principal)
    }

    /// Whether this principal voted on the content.
    pub fn has_voted(&self, content_id: &ContentId, principal: &Principal) -> Result<bool> {
        self.store.has_voted(content_id, principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::collections::HashSet;
    use std::sync::{Barrier, Mutex};
    use std::thread;

    /// Content source backed by a fixed id set.
    struct FixedContent(HashSet<ContentId>);

    impl FixedContent {
        fn with(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self(ids.iter().map(|id| ContentId::from(*id)).collect()))
        }
    }

    impl ContentSource for FixedContent {
        fn exists(&self, content_id: &ContentId) -> Result<bool> {
            Ok(self.0.contains(content_id))
        }
    }

    /// Sink that records every notification it receives.
    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<(ContentId, Outcome)>>);

    impl RecordingSink {
        fn notifications(&self) -> Vec<(ContentId, Outcome)> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ResolutionSink for RecordingSink {
        fn apply_outcome(&self, content_id: &ContentId, outcome: Outcome) {
            self.0.lock().unwrap().push((content_id.clone(), outcome));
        }
    }

    fn engine_over(ids: &[&str]) -> (ModerationEngine<MemoryStore>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = ModerationEngine::new(
            MemoryStore::new(),
            FixedContent::with(ids),
            Arc::clone(&sink) as Arc<dyn ResolutionSink>,
        );
        (engine, sink)
    }

    #[test]
    fn report_unknown_content_rejected() {
        let (engine, _) = engine_over(&[]);
        let err = engine.report(&"ghost".into(), &"alice".into(), 0).unwrap_err();
        assert_eq!(err, Error::ContentNotFound("ghost".into()));
        assert_eq!(
            engine.session(&"ghost".into()).unwrap_err(),
            Error::SessionNotFound("ghost".into())
        );
    }

    #[test]
    fn report_vote_and_resolve_tie_removes() {
        // Report at t=0, one keep, one remove, a replayed keep; the tie
        // resolves to remove and the sink hears about it exactly once.
        let (engine, sink) = engine_over(&["42"]);

        let session = engine.report(&"42".into(), &"reporter".into(), 0).unwrap();
        assert_eq!(session.start_time, 0);
        assert_eq!(session.end_time, 86_400);
        assert_eq!((session.yes_votes, session.no_votes), (0, 0));
        assert!(!session.resolved);

        engine.cast_vote(&"42".into(), &"a".into(), true, 10).unwrap();
        engine.cast_vote(&"42".into(), &"b".into(), false, 20).unwrap();
        let err = engine.cast_vote(&"42".into(), &"a".into(), true, 30).unwrap_err();
        assert_eq!(
            err,
            Error::AlreadyVoted {
                content_id: "42".into(),
                principal: "a".into(),
            }
        );

        let session = engine.session(&"42".into()).unwrap();
        assert_eq!((session.yes_votes, session.no_votes), (1, 1));

        let err = engine.resolve(&"42".into(), 86_000).unwrap_err();
        assert_eq!(
            err,
            Error::VotingStillActive {
                content_id: "42".into(),
                end_time: 86_400,
            }
        );
        assert!(!engine.session(&"42".into()).unwrap().resolved);

        let resolution = engine.resolve(&"42".into(), 86_500).unwrap();
        assert_eq!(resolution.outcome, Outcome::Remove);
        assert!(resolution.session.resolved);
        assert_eq!(sink.notifications(), vec![("42".into(), Outcome::Remove)]);
    }

    #[test]
    fn no_votes_resolves_remove() {
        let (engine, sink) = engine_over(&["7"]);
        engine.report(&"7".into(), &"reporter".into(), 0).unwrap();

        let resolution = engine.resolve(&"7".into(), 90_000).unwrap();
        assert_eq!(resolution.outcome, Outcome::Remove);
        assert_eq!((resolution.session.yes_votes, resolution.session.no_votes), (0, 0));
        assert_eq!(sink.notifications().len(), 1);
    }

    #[test]
    fn keep_majority_resolves_keep() {
        let (engine, sink) = engine_over(&["c"]);
        engine.report(&"c".into(), &"r".into(), 0).unwrap();
        engine.cast_vote(&"c".into(), &"a".into(), true, 1).unwrap();
        engine.cast_vote(&"c".into(), &"b".into(), true, 2).unwrap();
        engine.cast_vote(&"c".into(), &"d".into(), false, 3).unwrap();

        let resolution = engine.resolve(&"c".into(), 86_400).unwrap();
        assert_eq!(resolution.outcome, Outcome::Keep);
        assert_eq!(sink.notifications(), vec![("c".into(), Outcome::Keep)]);
    }

    #[test]
    fn double_report_rejected_session_unchanged() {
        let (engine, _) = engine_over(&["9"]);
        let first = engine.report(&"9".into(), &"alice".into(), 0).unwrap();

        let err = engine.report(&"9".into(), &"bob".into(), 100).unwrap_err();
        assert_eq!(err, Error::AlreadyReported("9".into()));
        assert_eq!(engine.session(&"9".into()).unwrap(), first);
        assert!(!engine.has_reported(&"9".into(), &"bob".into()).unwrap());
    }

    #[test]
    fn resolve_unknown_session() {
        let (engine, _) = engine_over(&["c"]);
        assert_eq!(
            engine.resolve(&"c".into(), 100_000).unwrap_err(),
            Error::SessionNotFound("c".into())
        );
    }

    #[test]
    fn resolve_is_idempotent_and_notifies_once() {
        let (engine, sink) = engine_over(&["c"]);
        engine.report(&"c".into(), &"r".into(), 0).unwrap();
        engine.cast_vote(&"c".into(), &"a".into(), false, 5).unwrap();

        let first = engine.resolve(&"c".into(), 86_400).unwrap();
        let second = engine.resolve(&"c".into(), 90_000).unwrap();
        let third = engine.resolve(&"c".into(), 100_000).unwrap();

        assert_eq!(first.outcome, Outcome::Remove);
        assert_eq!(second, first);
        assert_eq!(third, first);
        assert_eq!(sink.notifications().len(), 1);
    }

    #[test]
    fn resolved_session_is_read_only() {
        let (engine, _) = engine_over(&["c"]);
        engine.report(&"c".into(), &"r".into(), 0).unwrap();
        engine.resolve(&"c".into(), 86_400).unwrap();

        assert_eq!(
            engine.cast_vote(&"c".into(), &"late".into(), true, 86_500).unwrap_err(),
            Error::VotingClosed("c".into())
        );
        assert_eq!(
            engine.report(&"c".into(), &"again".into(), 90_000).unwrap_err(),
            Error::AlreadyReported("c".into())
        );
    }

    #[test]
    fn votes_rejected_once_window_closes() {
        let (engine, _) = engine_over(&["c"]);
        let session = engine.report(&"c".into(), &"r".into(), 0).unwrap();

        assert_eq!(
            engine
                .cast_vote(&"c".into(), &"a".into(), true, session.end_time)
                .unwrap_err(),
            Error::VotingClosed("c".into())
        );
    }

    #[test]
    fn short_window_override() {
        let sink = Arc::new(RecordingSink::default());
        let engine = ModerationEngine::new(
            MemoryStore::new(),
            FixedContent::with(&["c"]),
            Arc::clone(&sink) as Arc<dyn ResolutionSink>,
        )
        .with_window(60);

        let session = engine.report(&"c".into(), &"r".into(), 1_000).unwrap();
        assert_eq!(session.end_time, 1_060);

        engine.cast_vote(&"c".into(), &"a".into(), true, 1_059).unwrap();
        let resolution = engine.resolve(&"c".into(), 1_060).unwrap();
        assert_eq!(resolution.outcome, Outcome::Keep);
    }

    #[test]
    fn concurrent_resolvers_notify_sink_once() {
        let (engine, sink) = engine_over(&["c"]);
        engine.report(&"c".into(), &"r".into(), 0).unwrap();
        engine.cast_vote(&"c".into(), &"a".into(), false, 5).unwrap();

        let engine = Arc::new(engine);
        let resolvers = 8;
        let barrier = Arc::new(Barrier::new(resolvers));
        let handles: Vec<_> = (0..resolvers)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    engine.resolve(&"c".into(), 86_400)
                })
            })
            .collect();

        for handle in handles {
            let resolution = handle.join().unwrap().unwrap();
            assert_eq!(resolution.outcome, Outcome::Remove);
        }
        assert_eq!(sink.notifications(), vec![("c".into(), Outcome::Remove)]);
    }
}
