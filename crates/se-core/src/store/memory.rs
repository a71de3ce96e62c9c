//! In-memory turn store
//!
//! Zero-setup [`TurnStore`] used by tests and as the CLI default when no
//! database path is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::session::Turn;
use crate::store::{TurnRecord, TurnStore};

#[derive(Default)]
struct StoredSession {
    records: Vec<TurnRecord>,
    created_at: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    ended: bool,
}

/// In-memory turn store, keyed by (user, session)
#[derive(Default)]
pub struct MemoryTurnStore {
    sessions: RwLock<HashMap<(String, String), StoredSession>>,
}

impl MemoryTurnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw record directly, letting tests seed malformed shapes
    pub async fn push_record(&self, user_id: &str, session_id: &str, record: TurnRecord) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key(user_id, session_id))
            .or_default()
            .records
            .push(record);
    }

    /// Whether the session has been marked ended
    pub async fn is_ended(&self, user_id: &str, session_id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .get(&key(user_id, session_id))
            .map(|s| s.ended)
            .unwrap_or(false)
    }

    /// Number of stored turns for a session
    pub async fn turn_count(&self, user_id: &str, session_id: &str) -> usize {
        let sessions = self.sessions.read().await;
        sessions
            .get(&key(user_id, session_id))
            .map(|s| s.records.len())
            .unwrap_or(0)
    }

    /// Last recorded activity timestamp for a session
    pub async fn last_activity(&self, user_id: &str, session_id: &str) -> Option<DateTime<Utc>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&key(user_id, session_id))
            .and_then(|s| s.last_activity)
    }
}

fn key(user_id: &str, session_id: &str) -> (String, String) {
    (user_id.to_string(), session_id.to_string())
}

#[async_trait]
impl TurnStore for MemoryTurnStore {
    async fn append_turn(&self, user_id: &str, session_id: &str, turn: &Turn) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key(user_id, session_id))
            .or_default()
            .records
            .push(TurnRecord::from_turn(turn));
        Ok(())
    }

    async fn load_turns(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<TurnRecord>> {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(&key(user_id, session_id)) else {
            return Ok(Vec::new());
        };

        let start = session.records.len().saturating_sub(limit);
        Ok(session.records[start..].to_vec())
    }

    async fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(key(user_id, session_id)).or_default();
        session.created_at = Some(created_at);
        session.last_activity.get_or_insert(created_at);
        Ok(())
    }

    async fn update_activity(
        &self,
        user_id: &str,
        session_id: &str,
        last_activity: DateTime<Utc>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(key(user_id, session_id))
            .or_default()
            .last_activity = Some(last_activity);
        Ok(())
    }

    async fn end_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(key(user_id, session_id)).or_default().ended = true;
        Ok(())
    }
}
