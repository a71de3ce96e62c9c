//! Configuration management
//!
//! 設定は以下の優先順位で読み込まれます:
//! 1. 環境変数
//! 2. se-gateway.toml 設定ファイル
//! 3. デフォルト値
//!
//! 設定ファイル内では `${VAR_NAME}` 形式で環境変数を展開できます。

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Error;

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API key (empty means the gateway runs without a model backend)
    #[serde(default)]
    pub api_key: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL (optional, for custom endpoints)
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

/// Chat session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Active sessions kept in memory per user
    #[serde(default = "default_max_sessions_per_user")]
    pub max_sessions_per_user: usize,

    /// Messages reloaded from the turn log when resuming a session
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,

    /// Longest message accepted at the gateway boundary, in characters
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Background persistence workers
    #[serde(default = "default_writer_workers")]
    pub writer_workers: usize,

    /// Queued persistence jobs before new ones are dropped
    #[serde(default = "default_writer_queue")]
    pub writer_queue: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_sessions_per_user: default_max_sessions_per_user(),
            max_history_messages: default_max_history_messages(),
            max_message_length: default_max_message_length(),
            writer_workers: default_writer_workers(),
            writer_queue: default_writer_queue(),
        }
    }
}

fn default_max_sessions_per_user() -> usize {
    2
}

fn default_max_history_messages() -> usize {
    25
}

fn default_max_message_length() -> usize {
    1000
}

fn default_writer_workers() -> usize {
    4
}

fn default_writer_queue() -> usize {
    64
}

/// Turn store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "data/se-gateway.db".to_string()
}

/// Main configuration for se-gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Chat session configuration
    #[serde(default)]
    pub chat: ChatConfig,

    /// Turn store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// 設定ファイルから環境変数を展開する
    ///
    /// `${VAR_NAME}` 形式の文字列を環境変数の値に置換します。
    /// 環境変数が存在しない場合は空文字列になります。
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next(); // '{' を消費

                let mut var_name = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '}' {
                        chars.next(); // '}' を消費
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// TOML 設定ファイルから設定を読み込む
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let expanded_content = Self::expand_env_vars(&toml_content);

        let mut config: Config = toml::from_str(&expanded_content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;

        // 既存の環境変数で上書き（環境変数が優先）
        config.apply_env_overrides();

        Ok(config)
    }

    /// デフォルトパスから設定を読み込む
    ///
    /// `./se-gateway.toml` が存在すればそれを使い、
    /// 見つからない場合は環境変数のみで構成します。
    pub fn load() -> crate::Result<Self> {
        if Path::new("se-gateway.toml").exists() {
            return Self::from_toml_file("se-gateway.toml");
        }

        Ok(Self::from_env())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// 環境変数で設定を上書きする
    fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            if !api_key.is_empty() {
                self.llm.api_key = api_key;
            }
        }

        if let Ok(model) = std::env::var("LLM_MODEL") {
            if !model.is_empty() {
                self.llm.model = model;
            }
        }

        // Only use LLM_BASE_URL if explicitly set and non-empty (respect TOML config)
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            if !base_url.is_empty() {
                self.llm.base_url = Some(base_url);
            }
        }

        if let Ok(path) = std::env::var("DB_PATH") {
            if !path.is_empty() {
                self.store.db_path = path;
            }
        }
    }
}
