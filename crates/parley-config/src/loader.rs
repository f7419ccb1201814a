// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Everything lives in one configuration directory (`./config` unless
//! `PARLEY_CONFIG_DIR` says otherwise):
//!
//! - `config.yml`: bot settings, overridden by environment variables
//! - `config.env`: dotenv secrets (only `MONGODB_PORT` is interpreted)
//! - `chat_modes.yml`, `models.yml`: catalogs, passed through unparsed

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    value::{Dict, Uncased},
    Figment,
};
use tracing::{debug, warn};

use crate::diagnostic::ConfigError;
use crate::model::BotConfig;
use crate::settings::{Catalog, Secrets, Settings};

/// Directory searched when `PARLEY_CONFIG_DIR` is unset.
pub const DEFAULT_CONFIG_DIR: &str = "config";

/// Environment variable naming the configuration directory.
pub const CONFIG_DIR_ENV: &str = "PARLEY_CONFIG_DIR";

pub const CONFIG_FILE: &str = "config.yml";
pub const SECRETS_FILE: &str = "config.env";
pub const CHAT_MODES_FILE: &str = "chat_modes.yml";
pub const MODELS_FILE: &str = "models.yml";

/// Environment variables that override `config.yml`, with their config keys.
///
/// `TELEGRAM_USERNAMES` is listed here on purpose: older deployments let
/// the file win for the username list as they do for prices, but the list
/// now follows the env-wins rule. Only [`PRICE_ENV_FALLBACKS`] keep the
/// file-first order.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("TELEGRAM_TOKEN", "telegram_token"),
    ("OPENAI_API_KEY", "openai_api_key"),
    ("USE_CHATGPT_API", "use_chatgpt_api"),
    ("TELEGRAM_USERNAMES", "allowed_telegram_usernames"),
    ("NEW_DIALOG_TIMEOUT", "new_dialog_timeout"),
    ("MESSAGE STREAMING", "enable_message_streaming"),
    ("RETURN_N_GENERATED_IMAGES", "return_n_generated_images"),
    ("CHAT_MODES_PER_PAGE", "n_chat_modes_per_page"),
    ("PARLEY_LOG_LEVEL", "log_level"),
    ("STORAGE_BACKEND", "storage.backend"),
    ("SQLITE_DATABASE_PATH", "storage.database_path"),
    ("MONGODB_DATABASE", "storage.database_name"),
];

/// Price variables sit *below* `config.yml`: a price in the file wins.
const PRICE_ENV_FALLBACKS: &[(&str, &str)] = &[
    ("CHATGPT_PRICE_PER_1000_TOKENS", "chatgpt_price_per_1000_tokens"),
    ("GPT_PRICE_PER_1000_TOKENS", "gpt_price_per_1000_tokens"),
    ("WHISPER_PRICE_PER_1_MIN", "whisper_price_per_1_min"),
];

/// The configuration directory: `PARLEY_CONFIG_DIR`, or `./config`.
pub fn config_dir_from_env() -> PathBuf {
    std::env::var_os(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR))
}

/// Load every configuration source in `config_dir` into [`Settings`].
///
/// Does not run semantic validation; see [`crate::load_and_validate`].
pub fn load_settings(config_dir: &Path) -> Result<Settings, Vec<ConfigError>> {
    let config_file = config_dir.join(CONFIG_FILE);
    let config = load_config_from_path(&config_file).map_err(|err| {
        let sources = std::fs::read_to_string(&config_file)
            .map(|content| vec![(config_file.display().to_string(), content)])
            .unwrap_or_default();
        crate::diagnostic::figment_to_config_errors(err, &sources)
    })?;

    let secrets = load_secrets(&config_dir.join(SECRETS_FILE)).map_err(|e| vec![e])?;

    let mut errors = Vec::new();
    let chat_modes = load_catalog(&config_dir.join(CHAT_MODES_FILE))
        .map_err(|e| errors.push(e))
        .ok();
    let models = load_catalog(&config_dir.join(MODELS_FILE))
        .map_err(|e| errors.push(e))
        .ok();

    match (chat_modes, models) {
        (Some(chat_modes), Some(models)) => Ok(Settings::new(
            config_dir,
            config,
            secrets,
            chat_modes,
            models,
        )),
        _ => Err(errors),
    }
}

/// Load bot settings from `path` with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. Price environment variables
/// 3. `config.yml`, when present and well-formed
/// 4. All other environment variables
pub fn load_config_from_path(path: &Path) -> Result<BotConfig, figment::Error> {
    build_figment(path).extract()
}

/// Load bot settings from a YAML string only (no environment lookup).
pub fn load_config_from_str(yaml_content: &str) -> Result<BotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BotConfig::default()))
        .merge(Yaml::string(yaml_content))
        .extract()
}

/// Build the Figment used for config loading (exposed for diagnostic use).
pub fn build_figment(config_file: &Path) -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(BotConfig::default()))
        .merge(env_provider(PRICE_ENV_FALLBACKS));

    if config_file_is_usable(config_file) {
        figment = figment.merge(Yaml::file_exact(config_file));
    }

    figment.merge(env_provider(ENV_OVERRIDES))
}

/// A missing or malformed config file is skipped, leaving defaults and
/// environment values in effect. A well-formed file with wrongly typed
/// values is kept so extraction reports the bad key.
fn config_file_is_usable(path: &Path) -> bool {
    if !path.is_file() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return false;
    }

    match Figment::from(Yaml::file_exact(path)).extract::<Dict>() {
        Ok(_) => true,
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "ignoring malformed config file"
            );
            false
        }
    }
}

/// Create an environment provider for an explicit variable-to-key table.
///
/// Uses `Env::filter_map()` so that variable names need no shared prefix
/// and may contain characters (like spaces) that `Env::split` would mangle.
fn env_provider(table: &'static [(&'static str, &'static str)]) -> Env {
    Env::raw().filter_map(move |key| {
        table
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, path)| Uncased::from(*path))
    })
}

/// Read `config.env` as dotenv key/value pairs. A missing file yields no secrets.
pub fn load_secrets(path: &Path) -> Result<Secrets, ConfigError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() => {
            debug!(path = %path.display(), "secrets file not found");
            return Ok(Secrets::default());
        }
        Err(err) => {
            return Err(ConfigError::Secrets {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    let mut values = BTreeMap::new();
    for item in iter {
        let (key, value) = item.map_err(|err| ConfigError::Secrets {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        values.insert(key, value);
    }

    Ok(Secrets::new(values))
}

/// Read a catalog file. Missing or malformed catalogs are fatal.
pub fn load_catalog(path: &Path) -> Result<Catalog, ConfigError> {
    Figment::from(Yaml::file_exact(path))
        .extract::<Dict>()
        .map(Catalog::new)
        .map_err(|err| ConfigError::Catalog {
            path: path.display().to_string(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use tracing_test::traced_test;

    #[test]
    fn load_from_str_overrides_defaults() {
        let config = load_config_from_str(
            "telegram_token: abc\nnew_dialog_timeout: 30\nstorage:\n  backend: sqlite\n",
        )
        .unwrap();
        assert_eq!(config.telegram_token.as_deref(), Some("abc"));
        assert_eq!(config.new_dialog_timeout, 30);
        assert_eq!(config.storage.backend, crate::model::StorageBackend::Sqlite);
        assert_eq!(config.n_chat_modes_per_page, 5);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = load_config_from_str("some_future_key: 1\n").unwrap();
        assert_eq!(config, BotConfig::default());
    }

    #[test]
    fn wrong_type_in_wellformed_file_is_an_error() {
        let err = load_config_from_str("new_dialog_timeout: soon\n").unwrap_err();
        let errors = crate::diagnostic::figment_to_config_errors(err, &[]);
        assert!(matches!(
            &errors[0],
            ConfigError::InvalidType { key, .. } if key == "new_dialog_timeout"
        ));
    }

    #[test]
    #[traced_test]
    fn malformed_file_warns_and_uses_defaults() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(CONFIG_FILE, "telegram_token: [unclosed\n")?;
            let config = load_config_from_path(Path::new(CONFIG_FILE))?;
            assert_eq!(config, BotConfig::default());
            Ok(())
        });
        assert!(logs_contain("ignoring malformed config file"));
    }

    #[test]
    fn non_mapping_file_is_treated_as_malformed() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(CONFIG_FILE, "- just\n- a list\n")?;
            let config = load_config_from_path(Path::new(CONFIG_FILE))?;
            assert_eq!(config, BotConfig::default());
            Ok(())
        });
    }

    #[test]
    fn secrets_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let secrets = load_secrets(&dir.path().join(SECRETS_FILE)).unwrap();
        assert!(secrets.is_empty());
        assert_eq!(secrets.mongodb_port(), "27017");
    }

    #[test]
    fn secrets_parse_dotenv_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SECRETS_FILE);
        std::fs::write(
            &path,
            "# deployment\nMONGODB_PORT=27018\nMONGO_PASSWORD=\"s3cret\"\n",
        )
        .unwrap();
        let secrets = load_secrets(&path).unwrap();
        assert_eq!(secrets.mongodb_port(), "27018");
        assert_eq!(secrets.get("MONGO_PASSWORD"), Some("s3cret"));
        assert_eq!(secrets.len(), 2);
    }

    #[test]
    fn catalog_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_catalog(&dir.path().join(MODELS_FILE)).unwrap_err();
        assert!(matches!(err, ConfigError::Catalog { .. }));
    }

    #[test]
    fn catalog_entries_are_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHAT_MODES_FILE);
        std::fs::write(
            &path,
            "assistant:\n  name: General Assistant\n  parse_mode: html\ncode_assistant:\n  name: Code Assistant\n",
        )
        .unwrap();
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        let assistant = catalog.get("assistant").and_then(|v| v.as_dict()).unwrap();
        assert_eq!(
            assistant.get("parse_mode").and_then(|v| v.as_str()),
            Some("html")
        );
    }
}
