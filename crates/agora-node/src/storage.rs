//! Persistent storage using RocksDB.
//!
//! One database holds both the feed posts and the moderation records.
//! Keys are prefixed strings with JSON values:
//!
//! - `post:{id}` — [`Post`]
//! - `session:{content_id}` — [`VoteSession`]
//! - `report:{content_id}:{principal}` — report timestamp
//! - `vote:{content_id}:{principal}` — recorded [`VoteChoice`]

use crate::error::{Error, Result};
use crate::models::Post;
use agora_moderation::{
    ContentId, Error as ModerationError, ModerationStore, Principal, Timestamp, VoteChoice,
    VoteSession,
};
use rocksdb::{Options, DB};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage backend for node data.
pub struct Storage {
    db: DB,
}

impl Storage {
    /// Open or create storage at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    // --- Posts ---

    /// Store a post.
    pub fn put_post(&self, post: &Post) -> Result<()> {
        let key = format!("post:{}", post.id);
        let value = serde_json::to_vec(post)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Get a post by ID.
    pub fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let key = format!("post:{}", id);
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// List all posts, newest first.
    pub fn list_posts(&self) -> Result<Vec<Post>> {
        let prefix = b"post:";
        let mut posts = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                let post: Post = serde_json::from_slice(&value)?;
                posts.push(post);
            } else {
                break;
            }
        }

        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    /// Set the removal flag on a post.
    pub fn set_hidden(&self, id: &str, hidden: bool) -> Result<()> {
        let mut post = self
            .get_post(id)?
            .ok_or_else(|| Error::NotFound(format!("post {id}")))?;
        post.hidden = hidden;
        self.put_post(&post)
    }

    // --- Moderation records ---

    /// Store a vote session snapshot.
    pub fn put_session(&self, session: &VoteSession) -> Result<()> {
        let key = format!("session:{}", session.content_id);
        let value = serde_json::to_vec(session)?;
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    /// Get the vote session for a content id.
    pub fn get_session(&self, content_id: &ContentId) -> Result<Option<VoteSession>> {
        let key = format!("session:{}", content_id);
        match self.db.get(key.as_bytes())? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// List all vote sessions.
    pub fn list_sessions(&self) -> Result<Vec<VoteSession>> {
        let prefix = b"session:";
        let mut sessions = Vec::new();

        let iter = self.db.prefix_iterator(prefix);
        for item in iter {
            let (key, value) = item?;
            if key.starts_with(prefix) {
                let session: VoteSession = serde_json::from_slice(&value)?;
                sessions.push(session);
            } else {
                break;
            }
        }

        Ok(sessions)
    }

    /// Record who reported a content id and when.
    pub fn put_report(
        &self,
        content_id: &ContentId,
        principal: &Principal,
        reported_at: Timestamp,
    ) -> Result<()> {
        let key = format!("report:{}:{}", content_id, principal);
        self.db.put(key.as_bytes(), serde_json::to_vec(&reported_at)?)?;
        Ok(())
    }

    /// Check whether a principal reported a content id.
    pub fn has_report(&self, content_id: &ContentId, principal: &Principal) -> Result<bool> {
        let key = format!("report:{}:{}", content_id, principal);
        Ok(self.db.get(key.as_bytes())?.is_some())
    }

    /// Record a principal's vote on a content id.
    pub fn put_vote(
        &self,
        content_id: &ContentId,
        principal: &Principal,
        choice: VoteChoice,
    ) -> Result<()> {
        let key = format!("vote:{}:{}", content_id, principal);
        self.db.put(key.as_bytes(), serde_json::to_vec(&choice)?)?;
        Ok(())
    }

    /// Check whether a principal voted on a content id.
    pub fn has_vote(&self, content_id: &ContentId, principal: &Principal) -> Result<bool> {
        let key = format!("vote:{}:{}", content_id, principal);
        Ok(self.db.get(key.as_bytes())?.is_some())
    }
}

/// Durable [`ModerationStore`] over [`Storage`].
///
/// RocksDB gives atomicity per write but not the check-and-set sequences
/// the store contract needs, so a per-content-id lock table provides the
/// critical sections: all mutations of one content id run under that id's
/// lock, distinct ids in parallel. The table only grows — sessions are
/// never deleted.
///
/// Because the resolved flag is written here before the resolution sink
/// fires, a restart never replays a resolution.
pub struct PersistentStore {
    storage: Arc<Storage>,
    locks: Mutex<HashMap<ContentId, Arc<Mutex<()>>>>,
}

impl PersistentStore {
    /// Create a store over shared node storage.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn key_lock(&self, content_id: &ContentId) -> std::result::Result<Arc<Mutex<()>>, ModerationError> {
        let mut locks = self.locks.lock().map_err(|_| poisoned())?;
        Ok(Arc::clone(
            locks
                .entry(content_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        ))
    }
}

fn poisoned() -> ModerationError {
    ModerationError::StoreUnavailable("lock poisoned".to_string())
}

/// Storage faults surface as the retryable persistence error.
fn unavailable(e: Error) -> ModerationError {
    match e {
        Error::Moderation(inner) => inner,
        other => ModerationError::StoreUnavailable(other.to_string()),
    }
}

impl ModerationStore for PersistentStore {
    fn open_session(
        &self,
        session: VoteSession,
        reporter: &Principal,
    ) -> std::result::Result<VoteSession, ModerationError> {
        let lock = self.key_lock(&session.content_id)?;
        let _guard = lock.lock().map_err(|_| poisoned())?;

        if self
            .storage
            .get_session(&session.content_id)
            .map_err(unavailable)?
            .is_some()
        {
            return Err(ModerationError::AlreadyReported(session.content_id));
        }

        self.storage.put_session(&session).map_err(unavailable)?;
        self.storage
            .put_report(&session.content_id, reporter, session.start_time)
            .map_err(unavailable)?;
        tracing::debug!(content = %session.content_id, reporter = %reporter, "vote session persisted");
        Ok(session)
    }

    fn record_vote(
        &self,
        content_id: &ContentId,
        voter: &Principal,
        choice: VoteChoice,
        now: Timestamp,
    ) -> std::result::Result<VoteSession, ModerationError> {
        let lock = self.key_lock(content_id)?;
        let _guard = lock.lock().map_err(|_| poisoned())?;

        let mut session = self
            .storage
            .get_session(content_id)
            .map_err(unavailable)?
            .ok_or_else(|| ModerationError::SessionNotFound(content_id.clone()))?;

        if !session.is_open(now) {
            return Err(ModerationError::VotingClosed(content_id.clone()));
        }
        if self.storage.has_vote(content_id, voter).map_err(unavailable)? {
            return Err(ModerationError::AlreadyVoted {
                content_id: content_id.clone(),
                principal: voter.clone(),
            });
        }

        self.storage
            .put_vote(content_id, voter, choice)
            .map_err(unavailable)?;
        match choice {
            VoteChoice::Keep => session.yes_votes += 1,
            VoteChoice::Remove => session.no_votes += 1,
        }
        self.storage.put_session(&session).map_err(unavailable)?;
        Ok(session)
    }

    fn mark_resolved(
        &self,
        content_id: &ContentId,
    ) -> std::result::Result<VoteSession, ModerationError> {
        let lock = self.key_lock(content_id)?;
        let _guard = lock.lock().map_err(|_| poisoned())?;

        let mut session = self
            .storage
            .get_session(content_id)
            .map_err(unavailable)?
            .ok_or_else(|| ModerationError::SessionNotFound(content_id.clone()))?;

        if session.resolved {
            return Err(ModerationError::AlreadyResolved(content_id.clone()));
        }
        session.resolved = true;
        self.storage.put_session(&session).map_err(unavailable)?;
        Ok(session)
    }

    fn get(&self, content_id: &ContentId) -> std::result::Result<VoteSession, ModerationError> {
        self.storage
            .get_session(content_id)
            .map_err(unavailable)?
            .ok_or_else(|| ModerationError::SessionNotFound(content_id.clone()))
    }

    fn has_reported(
        &self,
        content_id: &ContentId,
        principal: &Principal,
    ) -> std::result::Result<bool, ModerationError> {
        self.storage
            .has_report(content_id, principal)
            .map_err(unavailable)
    }

    fn has_voted(
        &self,
        content_id: &ContentId,
        principal: &Principal,
    ) -> std::result::Result<bool, ModerationError> {
        self.storage
            .has_vote(content_id, principal)
            .map_err(unavailable)
    }

    fn list_sessions(&self) -> std::result::Result<Vec<VoteSession>, ModerationError> {
        let mut sessions = self.storage.list_sessions().map_err(unavailable)?;
        sessions.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_moderation::VOTE_WINDOW_SECS;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::tempdir;

    fn open_store(dir: &tempfile::TempDir) -> PersistentStore {
        PersistentStore::new(Arc::new(Storage::open(dir.path()).unwrap()))
    }

    #[test]
    fn post_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let post = Post::new("alice".into(), "first post".into(), 100);
        storage.put_post(&post).unwrap();

        let loaded = storage.get_post(&post.id).unwrap().unwrap();
        assert_eq!(post, loaded);
        assert!(storage.get_post("missing").unwrap().is_none());
    }

    #[test]
    fn list_posts_newest_first() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        storage.put_post(&Post::new("a".into(), "old".into(), 100)).unwrap();
        storage.put_post(&Post::new("b".into(), "new".into(), 200)).unwrap();

        let posts = storage.list_posts().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].body, "new");
        assert_eq!(posts[1].body, "old");
    }

    #[test]
    fn set_hidden_flags_post() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let post = Post::new("alice".into(), "objectionable".into(), 100);
        storage.put_post(&post).unwrap();

        storage.set_hidden(&post.id, true).unwrap();
        assert!(storage.get_post(&post.id).unwrap().unwrap().hidden);

        assert!(storage.set_hidden("missing", true).is_err());
    }

    #[test]
    fn session_and_records_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();

        let session = VoteSession::open("c1".into(), 0, VOTE_WINDOW_SECS);
        storage.put_session(&session).unwrap();
        assert_eq!(storage.get_session(&"c1".into()).unwrap().unwrap(), session);
        assert!(storage.get_session(&"c2".into()).unwrap().is_none());

        storage.put_report(&"c1".into(), &"alice".into(), 0).unwrap();
        assert!(storage.has_report(&"c1".into(), &"alice".into()).unwrap());
        assert!(!storage.has_report(&"c1".into(), &"bob".into()).unwrap());

        storage.put_vote(&"c1".into(), &"bob".into(), VoteChoice::Remove).unwrap();
        assert!(storage.has_vote(&"c1".into(), &"bob".into()).unwrap());
        assert!(!storage.has_vote(&"c1".into(), &"alice".into()).unwrap());
    }

    #[test]
    fn store_contract_basics() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        let session = store
            .open_session(VoteSession::open("c1".into(), 0, VOTE_WINDOW_SECS), &"alice".into())
            .unwrap();
        assert!(store.has_reported(&"c1".into(), &"alice".into()).unwrap());

        let err = store
            .open_session(VoteSession::open("c1".into(), 50, VOTE_WINDOW_SECS), &"bob".into())
            .unwrap_err();
        assert_eq!(err, ModerationError::AlreadyReported("c1".into()));
        assert_eq!(store.get(&"c1".into()).unwrap(), session);

        let s = store
            .record_vote(&"c1".into(), &"bob".into(), VoteChoice::Keep, 10)
            .unwrap();
        assert_eq!((s.yes_votes, s.no_votes), (1, 0));

        let err = store
            .record_vote(&"c1".into(), &"bob".into(), VoteChoice::Remove, 20)
            .unwrap_err();
        assert!(matches!(err, ModerationError::AlreadyVoted { .. }));

        let err = store
            .record_vote(&"c1".into(), &"carol".into(), VoteChoice::Keep, VOTE_WINDOW_SECS)
            .unwrap_err();
        assert_eq!(err, ModerationError::VotingClosed("c1".into()));

        let s = store.mark_resolved(&"c1".into()).unwrap();
        assert!(s.resolved);
        assert_eq!(
            store.mark_resolved(&"c1".into()).unwrap_err(),
            ModerationError::AlreadyResolved("c1".into())
        );
    }

    #[test]
    fn resolved_flag_survives_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = open_store(&dir);
            store
                .open_session(VoteSession::open("c1".into(), 0, VOTE_WINDOW_SECS), &"alice".into())
                .unwrap();
            store
                .record_vote(&"c1".into(), &"bob".into(), VoteChoice::Remove, 10)
                .unwrap();
            store.mark_resolved(&"c1".into()).unwrap();
        }

        let store = open_store(&dir);
        let session = store.get(&"c1".into()).unwrap();
        assert!(session.resolved);
        assert_eq!((session.yes_votes, session.no_votes), (0, 1));
        assert!(store.has_voted(&"c1".into(), &"bob".into()).unwrap());

        // A resolved session rejects late arrivals after restart too.
        let err = store
            .record_vote(&"c1".into(), &"carol".into(), VoteChoice::Keep, 20)
            .unwrap_err();
        assert_eq!(err, ModerationError::VotingClosed("c1".into()));
    }

    #[test]
    fn concurrent_votes_all_counted() {
        let dir = tempdir().unwrap();
        let store = Arc::new(open_store(&dir));
        store
            .open_session(VoteSession::open("c1".into(), 0, VOTE_WINDOW_SECS), &"alice".into())
            .unwrap();

        let voters = 8;
        let barrier = Arc::new(Barrier::new(voters));
        let handles: Vec<_> = (0..voters)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.record_vote(
                        &"c1".into(),
                        &Principal::new(format!("voter-{i}")),
                        VoteChoice::Keep,
                        10,
                    )
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(store.get(&"c1".into()).unwrap().yes_votes, voters as u64);
    }

    #[test]
    fn list_sessions_ordered() {
        let dir = tempdir().unwrap();
        let store = open_store(&dir);

        store
            .open_session(VoteSession::open("later".into(), 200, 60), &"a".into())
            .unwrap();
        store
            .open_session(VoteSession::open("earlier".into(), 100, 60), &"b".into())
            .unwrap();

        let sessions = store.list_sessions().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].content_id, "earlier".into());
    }
}
