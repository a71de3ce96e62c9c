//! LLM chain layer
//!
//! Role-tagged message types, the Gemini HTTP client, and the reply chain
//! traits the session manager consumes.

mod chain;
mod client;
mod types;

pub use chain::{
    ChainFactory, ContextSource, FixedChain, FixedChainFactory, GeminiChainFactory, ReplyChain,
    StaticContextSource, UserContext,
};
pub use client::GeminiClient;
pub use types::*;
