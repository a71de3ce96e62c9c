//! Bounded per-user session cache
//!
//! Holds at most `max_sessions_per_user` active sessions per user. Mutations
//! for one user are serialized on that user's map entry, so unrelated users
//! never contend on a global lock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::session::Session;

/// In-memory cache of active sessions, sharded by user
pub struct SessionCache {
    users: DashMap<String, HashMap<String, Session>>,
    max_sessions_per_user: usize,
}

impl SessionCache {
    pub fn new(max_sessions_per_user: usize) -> Self {
        Self {
            users: DashMap::new(),
            max_sessions_per_user: max_sessions_per_user.max(1),
        }
    }

    /// Look up a session. No side effects.
    pub fn get(&self, user_id: &str, session_id: &str) -> Option<Session> {
        self.users
            .get(user_id)
            .and_then(|sessions| sessions.get(session_id).cloned())
    }

    /// Insert or overwrite a session.
    ///
    /// Inserting a new id for a user already at capacity first evicts one
    /// victim; its id is returned so the caller can mark the session ended
    /// durably. Eviction and insertion happen under the same user entry.
    pub fn insert(&self, session: Session) -> Option<String> {
        let mut entry = self.users.entry(session.user_id.clone()).or_default();
        let sessions = entry.value_mut();

        let mut evicted = None;
        if !sessions.contains_key(&session.id) && sessions.len() >= self.max_sessions_per_user {
            if let Some(victim) = select_victim(sessions) {
                sessions.remove(&victim);
                debug!("Evicted session {} for user {}", victim, session.user_id);
                evicted = Some(victim);
            }
        }

        sessions.insert(session.id.clone(), session);
        evicted
    }

    /// Remove a session. Missing entries are ignored.
    pub fn remove(&self, user_id: &str, session_id: &str) {
        let now_empty = match self.users.get_mut(user_id) {
            Some(mut entry) => {
                entry.remove(session_id);
                entry.is_empty()
            }
            None => return,
        };

        if now_empty {
            self.users.remove_if(user_id, |_, sessions| sessions.is_empty());
        }
    }

    /// Bump activity and message count for an existing entry.
    ///
    /// Returns false when the session is not cached; the caller re-creates
    /// the entry on the next resolve instead.
    pub fn touch(&self, user_id: &str, session_id: &str, now: DateTime<Utc>) -> bool {
        if let Some(mut entry) = self.users.get_mut(user_id) {
            if let Some(session) = entry.get_mut(session_id) {
                session.touch(now);
                return true;
            }
        }
        false
    }

    /// Number of cached sessions for one user
    pub fn user_session_count(&self, user_id: &str) -> usize {
        self.users
            .get(user_id)
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }

    /// Cached session ids for one user, unordered
    pub fn user_session_ids(&self, user_id: &str) -> Vec<String> {
        self.users
            .get(user_id)
            .map(|sessions| sessions.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// Deterministic eviction rule: minimum last-activity timestamp, ties broken
/// by the lexicographically smaller session id.
fn select_victim(sessions: &HashMap<String, Session>) -> Option<String> {
    sessions
        .values()
        .min_by(|a, b| {
            a.last_activity
                .cmp(&b.last_activity)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|session| session.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChainFactory, FixedChainFactory, ReplyChain, UserContext};
    use std::sync::Arc;

    async fn test_chain() -> Arc<dyn ReplyChain> {
        FixedChainFactory::new("ok")
            .build(&UserContext::anonymous("u1"))
            .await
            .unwrap()
    }

    fn session_with(
        id: &str,
        user_id: &str,
        last_activity: DateTime<Utc>,
        chain: Arc<dyn ReplyChain>,
    ) -> Session {
        let mut session = Session::resumed(id, user_id, 0, chain);
        session.last_activity = last_activity;
        session
    }

    #[tokio::test]
    async fn test_get_and_insert() {
        let cache = SessionCache::new(2);
        let chain = test_chain().await;

        let session = Session::new("u1", chain);
        let id = session.id.clone();
        assert!(cache.insert(session).is_none());

        let found = cache.get("u1", &id).unwrap();
        assert_eq!(found.id, id);
        assert!(cache.get("u1", "missing").is_none());
        assert!(cache.get("u2", &id).is_none());
    }

    #[tokio::test]
    async fn test_capacity_invariant_holds() {
        let cache = SessionCache::new(2);
        let chain = test_chain().await;

        for _ in 0..5 {
            cache.insert(Session::new("u1", Arc::clone(&chain)));
            assert!(cache.user_session_count("u1") <= 2);
        }
        assert_eq!(cache.user_session_count("u1"), 2);
    }

    #[tokio::test]
    async fn test_evicts_stalest_session() {
        let cache = SessionCache::new(2);
        let chain = test_chain().await;
        let now = Utc::now();

        let t1 = now - chrono::Duration::minutes(10);
        let t2 = now - chrono::Duration::minutes(5);

        cache.insert(session_with("s-old", "u1", t1, Arc::clone(&chain)));
        cache.insert(session_with("s-mid", "u1", t2, Arc::clone(&chain)));

        let evicted = cache.insert(session_with("s-new", "u1", now, chain));
        assert_eq!(evicted.as_deref(), Some("s-old"));
        assert!(cache.get("u1", "s-old").is_none());
        assert!(cache.get("u1", "s-mid").is_some());
        assert!(cache.get("u1", "s-new").is_some());
    }

    #[tokio::test]
    async fn test_eviction_tie_breaks_on_smaller_id() {
        let cache = SessionCache::new(2);
        let chain = test_chain().await;
        let t = Utc::now() - chrono::Duration::minutes(1);

        cache.insert(session_with("s-b", "u1", t, Arc::clone(&chain)));
        cache.insert(session_with("s-a", "u1", t, Arc::clone(&chain)));

        let evicted = cache.insert(Session::new("u1", chain));
        assert_eq!(evicted.as_deref(), Some("s-a"));
    }

    #[tokio::test]
    async fn test_reinserting_same_id_never_evicts() {
        let cache = SessionCache::new(2);
        let chain = test_chain().await;
        let now = Utc::now();

        cache.insert(session_with("s-1", "u1", now, Arc::clone(&chain)));
        cache.insert(session_with("s-2", "u1", now, Arc::clone(&chain)));

        let evicted = cache.insert(session_with("s-1", "u1", now, chain));
        assert!(evicted.is_none());
        assert_eq!(cache.user_session_count("u1"), 2);
    }

    #[tokio::test]
    async fn test_users_are_independent() {
        let cache = SessionCache::new(1);
        let chain = test_chain().await;

        cache.insert(Session::new("u1", Arc::clone(&chain)));
        let evicted = cache.insert(Session::new("u2", chain));

        assert!(evicted.is_none());
        assert_eq!(cache.user_session_count("u1"), 1);
        assert_eq!(cache.user_session_count("u2"), 1);
    }

    #[tokio::test]
    async fn test_touch_updates_entry() {
        let cache = SessionCache::new(2);
        let chain = test_chain().await;

        let session = Session::new("u1", chain);
        let id = session.id.clone();
        cache.insert(session);

        let later = Utc::now() + chrono::Duration::seconds(10);
        assert!(cache.touch("u1", &id, later));

        let found = cache.get("u1", &id).unwrap();
        assert_eq!(found.message_count, 1);
        assert_eq!(found.last_activity, later);
    }

    #[tokio::test]
    async fn test_touch_missing_is_noop() {
        let cache = SessionCache::new(2);
        assert!(!cache.touch("u1", "missing", Utc::now()));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let cache = SessionCache::new(2);
        let chain = test_chain().await;

        let session = Session::new("u1", chain);
        let id = session.id.clone();
        cache.insert(session);

        cache.remove("u1", &id);
        assert_eq!(cache.user_session_count("u1"), 0);
        // Removing again, or removing for an unknown user, never fails.
        cache.remove("u1", &id);
        cache.remove("u9", &id);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_respect_capacity() {
        let cache = Arc::new(SessionCache::new(2));
        let chain = test_chain().await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let chain = Arc::clone(&chain);
            handles.push(tokio::spawn(async move {
                cache.insert(Session::new("u1", chain));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.user_session_count("u1"), 2);
    }
}
