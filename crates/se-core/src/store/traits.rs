//! Durable turn log interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::Turn;

/// One role-tagged half of a stored turn, as raw as the store keeps it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEntry {
    pub role: String,
    pub text: String,
}

impl TurnEntry {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}

/// A raw turn record as returned by the store.
///
/// Role tags stay free-form here; the history loader decides the closed
/// [`Role`](crate::llm::Role) enum at this boundary and drops what it does
/// not recognize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub turn_number: u32,
    pub entries: Vec<TurnEntry>,
    pub timestamp: DateTime<Utc>,
}

impl TurnRecord {
    /// Record shape written for a completed exchange
    pub fn from_turn(turn: &Turn) -> Self {
        Self {
            turn_number: turn.turn_number,
            entries: vec![
                TurnEntry::new("user", turn.user_text.clone()),
                TurnEntry::new("assistant", turn.assistant_text.clone()),
            ],
            timestamp: turn.timestamp,
        }
    }
}

/// Durable, append-capable log of conversation turns and session metadata,
/// keyed by (user, session).
///
/// Implementations own the durable records; the in-memory session cache is
/// only ever a derived view over them.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Append one exchange to the session's log
    async fn append_turn(&self, user_id: &str, session_id: &str, turn: &Turn) -> Result<()>;

    /// Most recent `limit` turns, oldest first.
    ///
    /// A session with no recorded turns yields an empty list, not an error.
    async fn load_turns(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<TurnRecord>>;

    /// Record session creation metadata
    async fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Bump the session's last-activity timestamp
    async fn update_activity(
        &self,
        user_id: &str,
        session_id: &str,
        last_activity: DateTime<Utc>,
    ) -> Result<()>;

    /// Mark the session ended. Its turns stay in the log permanently.
    async fn end_session(&self, user_id: &str, session_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_turn() {
        let turn = Turn::new(3, "hi", "hello");
        let record = TurnRecord::from_turn(&turn);

        assert_eq!(record.turn_number, 3);
        assert_eq!(record.entries.len(), 2);
        assert_eq!(record.entries[0].role, "user");
        assert_eq!(record.entries[0].text, "hi");
        assert_eq!(record.entries[1].role, "assistant");
        assert_eq!(record.entries[1].text, "hello");
    }
}
