//! Session management module
//!
//! The conversational core: a bounded per-user cache of active sessions, a
//! lifecycle manager resolving (session, chain, history) per message,
//! history reconstruction from the durable log, and write-behind
//! persistence.

mod cache;
mod history;
mod manager;
mod types;
mod writer;

pub use cache::SessionCache;
pub use history::HistoryLoader;
pub use manager::{ResolvedSession, SessionManager};
pub use types::{Session, SessionStatus, Turn};
pub use writer::{PersistenceWriter, WriteJob};
