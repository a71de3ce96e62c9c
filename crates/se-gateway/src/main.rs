//! se-gateway: StressEase Gateway Main Binary
//!
//! Main entry point for the StressEase chat gateway.
//!
//! Usage:
//!   se-gateway               - Start interactive chat (CLI mode)
//!   se-gateway --user <id>   - Chat as a specific user id
//!   se-gateway --help        - Show help

mod cli;

use std::sync::Arc;

use se_core::{
    ChainFactory, Config, ContextSource, FixedChainFactory, GeminiChainFactory, GeminiClient,
    SessionManager, SqliteTurnStore, StaticContextSource, TurnStore,
};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Interactive chat mode
    Chat { user_id: String },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args();

    match &mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("se-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Chat { .. } => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting se-gateway...");
    tracing::info!("Model: {}", config.llm.model);

    // Open the turn store
    if let Some(parent) = std::path::Path::new(&config.store.db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store: Arc<dyn TurnStore> = Arc::new(
        SqliteTurnStore::new(&config.store.db_path)
            .map_err(|e| anyhow::anyhow!("Failed to open turn store: {}", e))?,
    );

    // Pick the chain factory: Gemini when a key is configured, a canned
    // echo chain otherwise so the gateway still runs offline.
    let chains: Arc<dyn ChainFactory> = if config.llm.api_key.is_empty() {
        tracing::warn!("GEMINI_API_KEY not set, replies will be canned text");
        Arc::new(FixedChainFactory::new(
            "(オフラインモード) なるほど。もう少し詳しく聞かせてください。",
        ))
    } else {
        let client = GeminiClient::new(&config)
            .map_err(|e| anyhow::anyhow!("Failed to create LLM client: {}", e))?;
        Arc::new(GeminiChainFactory::new(client))
    };

    let contexts: Arc<dyn ContextSource> = Arc::new(StaticContextSource::new());
    let manager = SessionManager::new(store, chains, contexts, &config.chat);

    let RunMode::Chat { user_id } = mode else {
        unreachable!()
    };

    tracing::info!("Running in CLI mode");
    cli::run_cli(manager, &config, user_id).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    let mut args = std::env::args().skip(1);
    let mut user_id = "local".to_string();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-V" => return RunMode::Version,
            "--user" | "-u" => {
                if let Some(id) = args.next() {
                    user_id = id;
                }
            }
            _ => {}
        }
    }

    RunMode::Chat { user_id }
}

fn print_help() {
    println!("se-gateway - StressEase chat gateway");
    println!();
    println!("USAGE:");
    println!("  se-gateway [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -u, --user <id>   Chat as a specific user id (default: local)");
    println!("  -h, --help        Show this help");
    println!("  -V, --version     Show version");
    println!();
    println!("ENVIRONMENT:");
    println!("  GEMINI_API_KEY    Gemini API key (offline echo mode without it)");
    println!("  LLM_MODEL         Model name (default: gemini-2.0-flash)");
    println!("  DB_PATH           SQLite turn log path (default: data/se-gateway.db)");
}
