//! Conversation history reconstruction
//!
//! Rebuilds the ordered, role-tagged message sequence for a session from the
//! durable turn log. Each turn expands to its user half then its assistant
//! half. Malformed halves and unknown role tags are dropped in place; a bad
//! record never fails the whole load.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::llm::{ChatMessage, Role};
use crate::store::{TurnRecord, TurnStore};

/// Loads bounded conversation history from the turn store
pub struct HistoryLoader {
    store: Arc<dyn TurnStore>,
    max_messages: usize,
}

impl HistoryLoader {
    pub fn new(store: Arc<dyn TurnStore>, max_messages: usize) -> Self {
        Self {
            store,
            max_messages,
        }
    }

    /// Load up to `max_messages` most recent messages, oldest first.
    ///
    /// A session with no recorded turns yields an empty history.
    pub async fn load(&self, user_id: &str, session_id: &str) -> Result<Vec<ChatMessage>> {
        let records = self
            .store
            .load_turns(user_id, session_id, self.max_messages)
            .await?;

        let mut messages = Vec::new();
        for record in &records {
            expand_record(record, &mut messages);
        }

        // Keep the most recent messages when the log overflows the cap.
        if messages.len() > self.max_messages {
            messages.drain(..messages.len() - self.max_messages);
        }

        Ok(messages)
    }
}

/// Expand one raw turn record into its well-formed halves
fn expand_record(record: &TurnRecord, out: &mut Vec<ChatMessage>) {
    let mut emitted = false;

    for entry in &record.entries {
        let Some(role) = Role::parse(&entry.role) else {
            debug!(
                "Dropping turn {} entry with unknown role tag: {}",
                record.turn_number, entry.role
            );
            continue;
        };

        if entry.text.trim().is_empty() {
            debug!("Dropping empty half of turn {}", record.turn_number);
            continue;
        }

        out.push(ChatMessage {
            role,
            text: entry.text.clone(),
        });
        emitted = true;
    }

    if !emitted {
        debug!("Skipping turn {} with no well-formed halves", record.turn_number);
    }
}
