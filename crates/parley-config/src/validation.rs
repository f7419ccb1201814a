// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks semantic constraints that serde cannot express, such as
//! positive timeouts and non-negative prices.

use crate::diagnostic::ConfigError;
use crate::model::{BotConfig, StorageBackend};
use crate::settings::Settings;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns all collected validation errors (does not fail fast).
pub fn validate_config(config: &BotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.new_dialog_timeout == 0 {
        errors.push(ConfigError::Validation {
            message: "new_dialog_timeout must be greater than zero".to_string(),
        });
    }

    if config.n_chat_modes_per_page == 0 {
        errors.push(ConfigError::Validation {
            message: "n_chat_modes_per_page must be at least 1".to_string(),
        });
    }

    if config.return_n_generated_images == 0 {
        errors.push(ConfigError::Validation {
            message: "return_n_generated_images must be at least 1".to_string(),
        });
    }

    for (key, price) in [
        (
            "chatgpt_price_per_1000_tokens",
            config.chatgpt_price_per_1000_tokens,
        ),
        ("gpt_price_per_1000_tokens", config.gpt_price_per_1000_tokens),
        ("whisper_price_per_1_min", config.whisper_price_per_1_min),
    ] {
        if !price.is_finite() || price < 0.0 {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be a non-negative number, got {price}"),
            });
        }
    }

    if !LOG_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "log_level `{}` is not one of: {}",
                config.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    match config.storage.backend {
        StorageBackend::Sqlite if config.storage.database_path.trim().is_empty() => {
            errors.push(ConfigError::Validation {
                message: "storage.database_path must not be empty".to_string(),
            });
        }
        StorageBackend::Mongodb if config.storage.database_name.trim().is_empty() => {
            errors.push(ConfigError::Validation {
                message: "storage.database_name must not be empty".to_string(),
            });
        }
        _ => {}
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the assembled settings, including values derived from secrets.
pub fn validate_settings(settings: &Settings) -> Result<(), Vec<ConfigError>> {
    let mut errors = match validate_config(&settings.config) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    let port = settings.secrets.mongodb_port();
    if settings.config.storage.backend == StorageBackend::Mongodb
        && port.parse::<u16>().map_or(true, |p| p == 0)
    {
        errors.push(ConfigError::Validation {
            message: format!("MONGODB_PORT `{port}` is not a valid port number"),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&BotConfig::default()).is_ok());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = BotConfig::default();
        config.new_dialog_timeout = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("new_dialog_timeout"));
    }

    #[test]
    fn collects_every_error() {
        let mut config = BotConfig::default();
        config.n_chat_modes_per_page = 0;
        config.return_n_generated_images = 0;
        config.whisper_price_per_1_min = -1.0;
        config.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn empty_sqlite_path_only_matters_for_sqlite() {
        let mut config = BotConfig::default();
        config.storage.database_path = " ".to_string();
        assert!(validate_config(&config).is_ok());

        config.storage.backend = StorageBackend::Sqlite;
        assert!(validate_config(&config).is_err());
    }
}
