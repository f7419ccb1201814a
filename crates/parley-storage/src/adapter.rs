// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the DialogStore trait.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use parley_config::StorageConfig;
use parley_core::types::now;
use parley_core::{
    AttributeValue, Dialog, DialogId, DialogMessage, DialogStore, HealthStatus, NewUser,
    ParleyError, PluginAdapter, User, UserId,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed dialog store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules. The database is opened on the first call to
/// [`DialogStore::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
    closed: AtomicBool,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    ///
    /// The database connection is not opened until `initialize` is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the open Database, or an error if not initialized or closed.
    fn db(&self) -> Result<&Database, ParleyError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ParleyError::storage("storage closed"));
        }
        self.db
            .get()
            .ok_or_else(|| ParleyError::storage("storage not initialized -- call initialize() first"))
    }

    /// Read a dialog record, defaulting to the user's current dialog.
    pub async fn get_dialog(
        &self,
        user_id: UserId,
        dialog_id: Option<&DialogId>,
    ) -> Result<Dialog, ParleyError> {
        queries::dialogs::get_dialog(self.db()?, user_id, dialog_id.cloned()).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if self.db.get().is_some() && !self.closed.load(Ordering::Acquire) {
            self.close().await?;
            debug!("shutdown: database closed");
        }
        Ok(())
    }
}

#[async_trait]
impl DialogStore for SqliteStorage {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let path = self.config.database_path.clone();
        let db = Database::open_with_options(&path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| ParleyError::storage("storage already initialized"))?;
        info!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        let db = self.db()?;
        if self.config.wal_mode {
            db.checkpoint().await?;
            debug!("WAL checkpoint complete");
        }
        db.close().await?;
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool, ParleyError> {
        queries::users::user_exists(self.db()?, user_id).await
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<(), ParleyError> {
        let inserted = queries::users::create_user(self.db()?, new_user, now()).await?;
        debug!(user_id = %new_user.id, inserted, "create_user");
        Ok(())
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, ParleyError> {
        queries::users::get_user(self.db()?, user_id).await
    }

    async fn start_dialog(&self, user_id: UserId) -> Result<DialogId, ParleyError> {
        let dialog_id =
            queries::dialogs::start_dialog(self.db()?, user_id, DialogId::generate(), now())
                .await?;
        debug!(user_id = %user_id, dialog_id = %dialog_id, "dialog started");
        Ok(dialog_id)
    }

    async fn get_attribute(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<AttributeValue, ParleyError> {
        queries::users::get_attribute(self.db()?, user_id, key).await
    }

    async fn set_attribute(
        &self,
        user_id: UserId,
        key: &str,
        value: AttributeValue,
    ) -> Result<(), ParleyError> {
        queries::users::set_attribute(self.db()?, user_id, key, value).await?;
        debug!(user_id = %user_id, key, "attribute set");
        Ok(())
    }

    async fn get_dialog_messages(
        &self,
        user_id: UserId,
        dialog_id: Option<&DialogId>,
    ) -> Result<Vec<DialogMessage>, ParleyError> {
        queries::dialogs::get_dialog_messages(self.db()?, user_id, dialog_id.cloned()).await
    }

    async fn set_dialog_messages(
        &self,
        user_id: UserId,
        messages: &[DialogMessage],
        dialog_id: Option<&DialogId>,
    ) -> Result<(), ParleyError> {
        let dialog_id = queries::dialogs::set_dialog_messages(
            self.db()?,
            user_id,
            messages.iter().map(DialogMessage::normalized).collect(),
            dialog_id.cloned(),
        )
        .await?;
        debug!(
            user_id = %user_id,
            dialog_id = %dialog_id,
            n_messages = messages.len(),
            "dialog messages replaced"
        );
        Ok(())
    }
}
