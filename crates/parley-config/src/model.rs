// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! Unknown keys are ignored: `config.yml` is shared with the chat
//! application, which carries keys this crate does not interpret.

use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

/// Settings read from `config.yml`, with environment variable overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BotConfig {
    /// Telegram Bot API token.
    #[serde(default)]
    pub telegram_token: Option<String>,

    /// OpenAI API key.
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Use the chat completions API instead of the legacy completions API.
    #[serde(default = "default_true", deserialize_with = "lenient_bool")]
    pub use_chatgpt_api: bool,

    /// Usernames allowed to talk to the bot. Empty means everyone.
    /// Accepts a YAML list or a comma-separated string.
    #[serde(default, deserialize_with = "string_or_list")]
    pub allowed_telegram_usernames: Vec<String>,

    /// Seconds of inactivity after which a new dialog is started.
    #[serde(default = "default_new_dialog_timeout")]
    pub new_dialog_timeout: u64,

    #[serde(default = "default_true", deserialize_with = "lenient_bool")]
    pub enable_message_streaming: bool,

    #[serde(default = "default_return_n_generated_images")]
    pub return_n_generated_images: u32,

    #[serde(default = "default_n_chat_modes_per_page")]
    pub n_chat_modes_per_page: u32,

    /// Price in USD per 1000 chat completion tokens.
    #[serde(default = "default_chatgpt_price")]
    pub chatgpt_price_per_1000_tokens: f64,

    /// Price in USD per 1000 legacy completion tokens.
    #[serde(default = "default_gpt_price")]
    pub gpt_price_per_1000_tokens: f64,

    /// Price in USD per minute of transcribed audio.
    #[serde(default = "default_whisper_price")]
    pub whisper_price_per_1_min: f64,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            openai_api_key: None,
            use_chatgpt_api: true,
            allowed_telegram_usernames: Vec::new(),
            new_dialog_timeout: default_new_dialog_timeout(),
            enable_message_streaming: true,
            return_n_generated_images: default_return_n_generated_images(),
            n_chat_modes_per_page: default_n_chat_modes_per_page(),
            chatgpt_price_per_1000_tokens: default_chatgpt_price(),
            gpt_price_per_1000_tokens: default_gpt_price(),
            whisper_price_per_1_min: default_whisper_price(),
            log_level: default_log_level(),
            storage: StorageConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_new_dialog_timeout() -> u64 {
    600
}

fn default_return_n_generated_images() -> u32 {
    1
}

fn default_n_chat_modes_per_page() -> u32 {
    5
}

fn default_chatgpt_price() -> f64 {
    0.002
}

fn default_gpt_price() -> f64 {
    0.02
}

fn default_whisper_price() -> f64 {
    0.006
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Which persistence backend to construct.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    /// Document store (MongoDB).
    #[default]
    Mongodb,
    /// Embedded relational store (SQLite).
    Sqlite,
}

/// Storage backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// MongoDB database name.
    #[serde(default = "default_database_name")]
    pub database_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            database_name: default_database_name(),
        }
    }
}

fn default_database_path() -> String {
    "chatgpt_telegram_bot.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_database_name() -> String {
    "chatgpt_telegram_bot".to_string()
}

/// Connection settings for the document store, derived from [`Settings`](crate::Settings).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MongoConfig {
    /// Connection string, e.g. `mongodb://mongo:27017`.
    pub uri: String,
    pub database_name: String,
}

/// Accept a list, or a comma-separated string as set through the environment.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Csv(String),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::List(items) => items,
        Raw::Csv(s) => s.split(',').map(|item| item.trim().to_string()).collect(),
    };
    Ok(items.into_iter().filter(|item| !item.is_empty()).collect())
}

/// Accept `true`/`false` as well as the string spellings found in env files.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Int(i) => Ok(i != 0),
        Raw::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, found `{other}`"
            ))),
        },
    }
}
