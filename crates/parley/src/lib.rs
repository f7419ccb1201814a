// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parley: configuration loading and user/dialog persistence for a chat bot.
//!
//! Load [`Settings`] once at startup, then hand them to [`open_store`] to get
//! the backend named by `storage.backend`:
//!
//! ```no_run
//! # async fn run() -> Result<(), parley::ParleyError> {
//! let settings = parley::load_and_validate_default().map_err(|errors| {
//!     parley::render_errors(&errors);
//!     parley::ParleyError::Config(format!("{} configuration error(s)", errors.len()))
//! })?;
//! parley::init_tracing(&settings.config.log_level);
//! let store = parley::open_store(&settings).await?;
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod telemetry;

use std::sync::Arc;

use tracing::info;

pub use parley_config::{
    load_and_validate, load_and_validate_default, render_errors, BotConfig, Catalog,
    ConfigError, Secrets, Settings, StorageBackend, StorageConfig,
};
pub use parley_core::{
    AttributeValue, Dialog, DialogId, DialogMessage, DialogStore, HealthStatus, NewUser,
    ParleyError, PluginAdapter, User, UserId,
};
pub use parley_mongo::MongoStorage;
pub use parley_storage::SqliteStorage;
pub use telemetry::init_tracing;

/// Build the store selected by `storage.backend` and initialize it.
///
/// The backend is fixed for the lifetime of the returned handle.
pub async fn open_store(settings: &Settings) -> Result<Arc<dyn DialogStore>, ParleyError> {
    let backend = settings.config.storage.backend;
    let store: Arc<dyn DialogStore> = match backend {
        StorageBackend::Mongodb => Arc::new(MongoStorage::new(settings.mongo_config())),
        StorageBackend::Sqlite => Arc::new(SqliteStorage::new(settings.config.storage.clone())),
    };
    store.initialize().await?;
    info!(backend = %backend, store = store.name(), "dialog store ready");
    Ok(store)
}
