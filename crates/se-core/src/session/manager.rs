//! Session lifecycle
//!
//! `SessionManager` is the single entry point for the messaging path: it
//! resolves the (session, chain, history) triple for each inbound message
//! and records completed turns back into the cache and the write-behind
//! queue.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::llm::{ChainFactory, ChatMessage, ContextSource, ReplyChain};
use crate::session::{
    HistoryLoader, PersistenceWriter, Session, SessionCache, Turn, WriteJob,
};
use crate::store::TurnStore;

/// Everything a caller needs to serve one message
pub struct ResolvedSession {
    pub session_id: String,
    pub chain: Arc<dyn ReplyChain>,
    pub history: Vec<ChatMessage>,
}

impl ResolvedSession {
    /// Turn number for the exchange about to happen.
    ///
    /// Every completed turn contributes two history messages, so the next
    /// turn sits at half the loaded history length.
    pub fn next_turn_number(&self) -> u32 {
        (self.history.len() / 2) as u32
    }
}

/// Session manager that handles session lifecycle
pub struct SessionManager {
    /// In-memory cache of active sessions, bounded per user
    cache: SessionCache,
    /// History reconstruction from the durable log
    history: HistoryLoader,
    /// Write-behind path into the durable log
    writer: PersistenceWriter,
    /// Builds reply chains from user context
    chains: Arc<dyn ChainFactory>,
    /// Supplies profile and mood context per user
    contexts: Arc<dyn ContextSource>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn TurnStore>,
        chains: Arc<dyn ChainFactory>,
        contexts: Arc<dyn ContextSource>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            cache: SessionCache::new(config.max_sessions_per_user),
            history: HistoryLoader::new(Arc::clone(&store), config.max_history_messages),
            writer: PersistenceWriter::new(store, config.writer_workers, config.writer_queue),
            chains,
            contexts,
        }
    }

    /// Resolve the session an inbound message belongs to.
    ///
    /// `None` starts a new conversation; `Some` resumes one, always
    /// reloading its history fresh from the turn log. Only a failure that
    /// leaves no usable (session, chain, history) triple surfaces, as
    /// [`Error::ServiceUnavailable`]; an empty history is not an error.
    pub async fn resolve(
        &self,
        user_id: &str,
        session_id: Option<&str>,
    ) -> Result<ResolvedSession> {
        match session_id {
            None => self.start_session(user_id).await,
            Some(id) => self.resume_session(user_id, id).await,
        }
    }

    async fn start_session(&self, user_id: &str) -> Result<ResolvedSession> {
        // Chain construction comes first: a factory failure must leave
        // nothing cached and nothing evicted.
        let chain = self.build_chain(user_id).await?;

        let session = Session::new(user_id, Arc::clone(&chain));
        let session_id = session.id.clone();
        let created_at = session.created_at;

        if let Some(victim) = self.cache.insert(session) {
            self.writer.enqueue(WriteJob::MarkEnded {
                user_id: user_id.to_string(),
                session_id: victim,
            });
        }

        self.writer.enqueue(WriteJob::CreateSession {
            user_id: user_id.to_string(),
            session_id: session_id.clone(),
            created_at,
        });

        info!("Created chat session {} for user {}", session_id, user_id);
        Ok(ResolvedSession {
            session_id,
            chain,
            history: Vec::new(),
        })
    }

    async fn resume_session(&self, user_id: &str, session_id: &str) -> Result<ResolvedSession> {
        // History is always reloaded from the store; the cache only ever
        // reuses the chain handle, never in-memory history.
        let history = self
            .history
            .load(user_id, session_id)
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("history load failed: {}", e)))?;

        if let Some(session) = self.cache.get(user_id, session_id) {
            debug!("Session {} found in cache for user {}", session_id, user_id);
            return Ok(ResolvedSession {
                session_id: session_id.to_string(),
                chain: session.chain,
                history,
            });
        }

        let chain = self.build_chain(user_id).await?;
        let session = Session::resumed(session_id, user_id, history.len() / 2, Arc::clone(&chain));
        if let Some(victim) = self.cache.insert(session) {
            self.writer.enqueue(WriteJob::MarkEnded {
                user_id: user_id.to_string(),
                session_id: victim,
            });
        }

        debug!("Rebuilt chain for cold session {} of user {}", session_id, user_id);
        Ok(ResolvedSession {
            session_id: session_id.to_string(),
            chain,
            history,
        })
    }

    async fn build_chain(&self, user_id: &str) -> Result<Arc<dyn ReplyChain>> {
        let context = self
            .contexts
            .user_context(user_id)
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("user context failed: {}", e)))?;

        self.chains
            .build(&context)
            .await
            .map_err(|e| Error::ServiceUnavailable(format!("chain build failed: {}", e)))
    }

    /// Record a completed exchange.
    ///
    /// Cache state updates in caller order; the two durable writes go
    /// through the write-behind queue and may land in either order. Never
    /// fails visibly.
    pub fn record_turn(
        &self,
        user_id: &str,
        session_id: &str,
        user_text: &str,
        assistant_text: &str,
        turn_number: u32,
    ) {
        let now = Utc::now();

        self.writer.enqueue(WriteJob::AppendTurn {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            turn: Turn {
                turn_number,
                user_text: user_text.to_string(),
                assistant_text: assistant_text.to_string(),
                timestamp: now,
            },
        });
        self.writer.enqueue(WriteJob::UpdateActivity {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            last_activity: now,
        });

        if !self.cache.touch(user_id, session_id, now) {
            debug!(
                "Recorded turn for uncached session {} of user {}",
                session_id, user_id
            );
        }
    }

    /// Explicitly end a session.
    ///
    /// The cache entry goes away immediately; the durable record is marked
    /// ended best-effort. Turns stay in the log either way.
    pub fn end_session(&self, user_id: &str, session_id: &str) {
        self.cache.remove(user_id, session_id);
        self.writer.enqueue(WriteJob::MarkEnded {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
        });
        info!("Ended chat session {} for user {}", session_id, user_id);
    }

    /// Number of cached sessions for one user
    pub fn cached_session_count(&self, user_id: &str) -> usize {
        self.cache.user_session_count(user_id)
    }

    /// Cached session state, if resident
    pub fn cached_session(&self, user_id: &str, session_id: &str) -> Option<Session> {
        self.cache.get(user_id, session_id)
    }

    /// Drain write-behind jobs enqueued so far. Test and shutdown aid.
    pub async fn flush_writes(&self) {
        self.writer.flush().await;
    }
}
