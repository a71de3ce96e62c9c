//! se-core: StressEase Gateway Core Library
//!
//! 会話セッション管理のコア機能を提供します。
//! ユーザーごとの上限付きセッションキャッシュ、履歴の再構築、
//! 永続化のライトビハインド処理を含みます。

pub mod config;
pub mod error;
pub mod llm;
pub mod session;
pub mod store;

pub use config::{ChatConfig, Config, LlmConfig, StoreConfig};
pub use error::{Error, Result};
pub use llm::{
    ChainFactory, ChatMessage, ContextSource, FixedChainFactory, GeminiChainFactory,
    GeminiClient, ReplyChain, Role, StaticContextSource, UserContext,
};
pub use session::{
    HistoryLoader, PersistenceWriter, ResolvedSession, Session, SessionCache, SessionManager,
    SessionStatus, Turn, WriteJob,
};
pub use store::{MemoryTurnStore, SqliteTurnStore, TurnEntry, TurnRecord, TurnStore};
