// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The assembled settings object and its derived values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::value::{Dict, Value};

use crate::model::{BotConfig, MongoConfig};

/// Port used when `MONGODB_PORT` is absent from `config.env`.
pub const DEFAULT_MONGODB_PORT: &str = "27017";

/// Host name of the document store inside the deployment network.
pub const MONGODB_HOST: &str = "mongo";

/// Key/value pairs read from `config.env`.
///
/// Only the file is consulted; process environment variables of the same
/// name have no effect on these values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    values: BTreeMap<String, String>,
}

impl Secrets {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// `MONGODB_PORT` from the file, or the default port.
    pub fn mongodb_port(&self) -> &str {
        self.get("MONGODB_PORT").unwrap_or(DEFAULT_MONGODB_PORT)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An opaque catalog document (chat modes or models), keyed by entry name.
///
/// Entries are handed to the chat layer as-is; their inner structure is
/// not interpreted here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    entries: Dict,
}

impl Catalog {
    pub fn new(entries: Dict) -> Self {
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entry names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_dict(&self) -> &Dict {
        &self.entries
    }
}

/// Everything the application reads from the configuration directory.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: BotConfig,
    pub secrets: Secrets,
    pub chat_modes: Catalog,
    pub models: Catalog,
    config_dir: PathBuf,
}

impl Settings {
    pub fn new(
        config_dir: impl Into<PathBuf>,
        config: BotConfig,
        secrets: Secrets,
        chat_modes: Catalog,
        models: Catalog,
    ) -> Self {
        Self {
            config,
            secrets,
            chat_modes,
            models,
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// `mongodb://mongo:<port>`, with the port taken from `config.env`.
    pub fn mongodb_uri(&self) -> String {
        format!("mongodb://{MONGODB_HOST}:{}", self.secrets.mongodb_port())
    }

    pub fn mongo_config(&self) -> MongoConfig {
        MongoConfig {
            uri: self.mongodb_uri(),
            database_name: self.config.storage.database_name.clone(),
        }
    }

    /// `<config_dir>/../static/help_group_chat.mp4`.
    pub fn help_group_chat_video_path(&self) -> PathBuf {
        let root = match self.config_dir.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.config_dir.join(".."),
        };
        root.join("static").join("help_group_chat.mp4")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(dir: &str, secrets: Secrets) -> Settings {
        Settings::new(
            dir,
            BotConfig::default(),
            secrets,
            Catalog::default(),
            Catalog::default(),
        )
    }

    #[test]
    fn mongodb_uri_uses_default_port() {
        let settings = settings_with("/srv/bot/config", Secrets::default());
        assert_eq!(settings.mongodb_uri(), "mongodb://mongo:27017");
    }

    #[test]
    fn mongodb_uri_uses_port_from_secrets() {
        let mut values = BTreeMap::new();
        values.insert("MONGODB_PORT".to_string(), "27018".to_string());
        let settings = settings_with("/srv/bot/config", Secrets::new(values));
        assert_eq!(settings.mongodb_uri(), "mongodb://mongo:27018");

        let mongo = settings.mongo_config();
        assert_eq!(mongo.uri, "mongodb://mongo:27018");
        assert_eq!(mongo.database_name, "chatgpt_telegram_bot");
    }

    #[test]
    fn help_video_lives_next_to_config_dir() {
        let settings = settings_with("/srv/bot/config", Secrets::default());
        assert_eq!(
            settings.help_group_chat_video_path(),
            PathBuf::from("/srv/bot/static/help_group_chat.mp4")
        );
    }

    #[test]
    fn catalog_lookup() {
        let mut entries = Dict::new();
        entries.insert("assistant".to_string(), Value::from("General Assistant"));
        let catalog = Catalog::new(entries);
        assert!(catalog.contains("assistant"));
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["assistant"]);
        assert!(catalog.get("artist").is_none());
    }
}
