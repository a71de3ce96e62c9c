//! SQLite-backed turn store
//!
//! Local durable implementation of the turn log. Turn halves are stored as
//! a JSON payload column, so records written by older versions or by hand
//! come back as raw role tags instead of hard failures.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::error::Result;
use crate::session::Turn;
use crate::store::{TurnEntry, TurnRecord, TurnStore};

/// SQLite-based turn store
pub struct SqliteTurnStore {
    conn: Mutex<Connection>,
}

impl SqliteTurnStore {
    /// Create a new turn store with the given database path
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory turn store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize database tables
    fn init_tables(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS turns (
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                turn_number INTEGER NOT NULL,
                entries TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_id, session_id, turn_number)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS chat_sessions (
                user_id TEXT NOT NULL,
                session_id TEXT NOT NULL,
                created_at TEXT,
                last_activity TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                PRIMARY KEY (user_id, session_id)
            )",
            [],
        )?;

        Ok(())
    }

    /// Session status column, for inspection and tests
    pub fn session_status(&self, user_id: &str, session_id: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT status FROM chat_sessions WHERE user_id = ?1 AND session_id = ?2",
        )?;

        let result = stmt.query_row(params![user_id, session_id], |row| row.get(0));
        match result {
            Ok(status) => Ok(Some(status)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TurnStore for SqliteTurnStore {
    async fn append_turn(&self, user_id: &str, session_id: &str, turn: &Turn) -> Result<()> {
        let record = TurnRecord::from_turn(turn);
        let entries_json = serde_json::to_string(&record.entries)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO turns (user_id, session_id, turn_number, entries, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                session_id,
                record.turn_number,
                entries_json,
                record.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    async fn load_turns(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<TurnRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT turn_number, entries, created_at FROM turns
             WHERE user_id = ?1 AND session_id = ?2
             ORDER BY turn_number DESC LIMIT ?3",
        )?;

        let rows = stmt.query_map(params![user_id, session_id, limit as i64], |row| {
            let turn_number: i64 = row.get(0)?;
            let entries_json: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            Ok((turn_number, entries_json, created_at))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (turn_number, entries_json, created_at) = row?;

            // A corrupt payload degrades to an empty record; the history
            // loader skips it instead of failing the whole fetch.
            let entries: Vec<TurnEntry> = match serde_json::from_str(&entries_json) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!("Skipping unreadable turn {} payload: {}", turn_number, e);
                    Vec::new()
                }
            };

            let timestamp = DateTime::parse_from_rfc3339(&created_at)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            records.push(TurnRecord {
                turn_number: turn_number as u32,
                entries,
                timestamp,
            });
        }

        // Rows come back newest first; callers expect oldest first.
        records.reverse();
        Ok(records)
    }

    async fn create_session(
        &self,
        user_id: &str,
        session_id: &str,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO chat_sessions (user_id, session_id, created_at, last_activity, status)
             VALUES (?1, ?2, ?3, ?3, 'active')
             ON CONFLICT (user_id, session_id) DO UPDATE SET created_at = excluded.created_at",
            params![user_id, session_id, created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    async fn update_activity(
        &self,
        user_id: &str,
        session_id: &str,
        last_activity: DateTime<Utc>,
    ) -> Result<()> {
        // Upsert: the activity update may race ahead of session creation.
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO chat_sessions (user_id, session_id, last_activity, status)
             VALUES (?1, ?2, ?3, 'active')
             ON CONFLICT (user_id, session_id) DO UPDATE SET last_activity = excluded.last_activity",
            params![user_id, session_id, last_activity.to_rfc3339()],
        )?;
        Ok(())
    }

    async fn end_session(&self, user_id: &str, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO chat_sessions (user_id, session_id, status)
             VALUES (?1, ?2, 'ended')
             ON CONFLICT (user_id, session_id) DO UPDATE SET status = 'ended'",
            params![user_id, session_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_load() {
        let store = SqliteTurnStore::in_memory().unwrap();
        store
            .append_turn("u1", "s1", &Turn::new(0, "hi", "hello"))
            .await
            .unwrap();
        store
            .append_turn("u1", "s1", &Turn::new(1, "still there?", "yes"))
            .await
            .unwrap();

        let records = store.load_turns("u1", "s1", 25).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].turn_number, 0);
        assert_eq!(records[0].entries[0].role, "user");
        assert_eq!(records[0].entries[0].text, "hi");
        assert_eq!(records[1].entries[1].text, "yes");
    }

    #[tokio::test]
    async fn test_load_limit_keeps_latest() {
        let store = SqliteTurnStore::in_memory().unwrap();
        for i in 0..6 {
            store
                .append_turn("u1", "s1", &Turn::new(i, format!("q{}", i), format!("a{}", i)))
                .await
                .unwrap();
        }

        let records = store.load_turns("u1", "s1", 3).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].turn_number, 3);
        assert_eq!(records[2].turn_number, 5);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = SqliteTurnStore::in_memory().unwrap();
        store
            .append_turn("u1", "s1", &Turn::new(0, "hi", "hello"))
            .await
            .unwrap();
        store
            .append_turn("u2", "s1", &Turn::new(0, "hey", "hi there"))
            .await
            .unwrap();

        let records = store.load_turns("u1", "s1", 25).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].entries[0].text, "hi");
    }

    #[tokio::test]
    async fn test_corrupt_payload_degrades_to_empty_record() {
        let store = SqliteTurnStore::in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO turns (user_id, session_id, turn_number, entries, created_at)
                 VALUES ('u1', 's1', 0, 'not json', ?1)",
                params![Utc::now().to_rfc3339()],
            )
            .unwrap();
        }

        let records = store.load_turns("u1", "s1", 25).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].entries.is_empty());
    }

    #[tokio::test]
    async fn test_session_lifecycle_metadata() {
        let store = SqliteTurnStore::in_memory().unwrap();
        store.create_session("u1", "s1", Utc::now()).await.unwrap();
        assert_eq!(
            store.session_status("u1", "s1").unwrap(),
            Some("active".to_string())
        );

        store.end_session("u1", "s1").await.unwrap();
        assert_eq!(
            store.session_status("u1", "s1").unwrap(),
            Some("ended".to_string())
        );
    }

    #[tokio::test]
    async fn test_activity_update_before_creation() {
        let store = SqliteTurnStore::in_memory().unwrap();
        // Background jobs may apply out of issue order.
        store.update_activity("u1", "s1", Utc::now()).await.unwrap();
        store.create_session("u1", "s1", Utc::now()).await.unwrap();

        assert_eq!(
            store.session_status("u1", "s1").unwrap(),
            Some("active".to_string())
        );
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turns.db");
        let path = path.to_str().unwrap();

        {
            let store = SqliteTurnStore::new(path).unwrap();
            store
                .append_turn("u1", "s1", &Turn::new(0, "hi", "hello"))
                .await
                .unwrap();
        }

        let store = SqliteTurnStore::new(path).unwrap();
        let records = store.load_turns("u1", "s1", 25).await.unwrap();
        assert_eq!(records.len(), 1);
    }
}
