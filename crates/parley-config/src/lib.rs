// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for Parley.
//!
//! Reads `config.yml` with environment variable overrides, a dotenv
//! secrets file, and the chat mode and model catalogs, all from a single
//! configuration directory. Errors render as miette diagnostics.
//!
//! # Usage
//!
//! ```no_run
//! use parley_config::load_and_validate_default;
//!
//! let settings = load_and_validate_default().expect("config errors");
//! println!("storage backend: {}", settings.config.storage.backend);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod settings;
pub mod validation;

use std::path::Path;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{
    config_dir_from_env, load_catalog, load_config_from_path, load_config_from_str,
    load_secrets, load_settings,
};
pub use model::{BotConfig, MongoConfig, StorageBackend, StorageConfig};
pub use settings::{Catalog, Secrets, Settings};

/// Load every source in `config_dir` and validate the result.
///
/// Returns either valid [`Settings`] or every diagnostic collected.
pub fn load_and_validate(config_dir: &Path) -> Result<Settings, Vec<ConfigError>> {
    let settings = loader::load_settings(config_dir)?;
    validation::validate_settings(&settings)?;
    Ok(settings)
}

/// [`load_and_validate`] on `PARLEY_CONFIG_DIR`, or `./config`.
pub fn load_and_validate_default() -> Result<Settings, Vec<ConfigError>> {
    load_and_validate(&config_dir_from_env())
}
