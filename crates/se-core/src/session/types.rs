//! Session and turn types

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::llm::ReplyChain;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// An active conversation resident in the cache.
///
/// The cache is a disposable view: losing a `Session` loses no conversation
/// data, only the cost of rebuilding the chain and reloading history.
#[derive(Clone)]
pub struct Session {
    /// Unique session identifier
    pub id: String,
    /// Owning user
    pub user_id: String,
    /// Session creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last turn timestamp, drives eviction ordering
    pub last_activity: DateTime<Utc>,
    /// Completed turns since this entry was cached
    pub message_count: usize,
    /// Session status
    pub status: SessionStatus,
    /// Reply chain bound to this user's context
    pub chain: Arc<dyn ReplyChain>,
}

impl Session {
    /// Create a new session for a user
    pub fn new(user_id: impl Into<String>, chain: Arc<dyn ReplyChain>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            created_at: now,
            last_activity: now,
            message_count: 0,
            status: SessionStatus::Active,
            chain,
        }
    }

    /// Rebuild a cache entry for a session resumed from the durable log
    pub fn resumed(
        id: impl Into<String>,
        user_id: impl Into<String>,
        message_count: usize,
        chain: Arc<dyn ReplyChain>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            created_at: now,
            last_activity: now,
            message_count,
            status: SessionStatus::Active,
            chain,
        }
    }

    /// Record a completed turn against this entry
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.message_count += 1;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .field("last_activity", &self.last_activity)
            .field("message_count", &self.message_count)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// One durably recorded user/assistant exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Monotonic position within the session
    pub turn_number: u32,
    pub user_text: String,
    pub assistant_text: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        turn_number: u32,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) -> Self {
        Self {
            turn_number,
            user_text: user_text.into(),
            assistant_text: assistant_text.into(),
            timestamp: Utc::now(),
        }
    }
}
