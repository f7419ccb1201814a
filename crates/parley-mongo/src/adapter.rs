// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MongoDB implementation of the DialogStore trait.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Client, Collection, Database, IndexModel};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use parley_config::MongoConfig;
use parley_core::types::now;
use parley_core::{
    validate_key, validate_write, AttributeValue, Dialog, DialogId, DialogMessage, DialogStore,
    HealthStatus, NewUser, ParleyError, PluginAdapter, User, UserId,
};

use crate::convert;

/// Collection holding one document per user, keyed by the numeric user id.
pub const USER_COLLECTION: &str = "user";

/// Collection holding one document per dialog, keyed by the dialog UUID.
pub const DIALOG_COLLECTION: &str = "dialog";

const DUPLICATE_KEY: i32 = 11000;

struct Handles {
    client: Client,
    db: Database,
    users: Collection<Document>,
    dialogs: Collection<Document>,
}

/// MongoDB-backed dialog store.
///
/// The client is created on [`DialogStore::initialize`]. Single-document
/// updates are atomic; `start_dialog` inserts the dialog and then points
/// the user at it without a multi-document transaction.
pub struct MongoStorage {
    config: MongoConfig,
    handles: OnceCell<Handles>,
    closed: AtomicBool,
}

impl MongoStorage {
    pub fn new(config: MongoConfig) -> Self {
        Self {
            config,
            handles: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn handles(&self) -> Result<&Handles, ParleyError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ParleyError::storage("storage closed"));
        }
        self.handles
            .get()
            .ok_or_else(|| ParleyError::storage("storage not initialized -- call initialize() first"))
    }

    /// Resolve `dialog_id`, defaulting to the user's current dialog. Only
    /// dialogs owned by the user resolve.
    async fn resolve_dialog(
        &self,
        user_id: UserId,
        dialog_id: Option<&DialogId>,
    ) -> Result<DialogId, ParleyError> {
        let h = self.handles()?;
        let user = h
            .users
            .find_one(doc! { "_id": user_id.0 })
            .projection(doc! { "current_dialog_id": 1 })
            .await
            .map_err(ParleyError::storage)?
            .ok_or_else(|| ParleyError::user_not_found(user_id))?;

        let dialog_id = match dialog_id {
            Some(id) => id.clone(),
            None => match user.get("current_dialog_id") {
                Some(Bson::String(id)) => DialogId(id.clone()),
                _ => {
                    return Err(ParleyError::dialog_not_found(&DialogId(format!(
                        "<current of user {user_id}>"
                    ))));
                }
            },
        };

        let owned = h
            .dialogs
            .count_documents(doc! { "_id": dialog_id.as_str(), "user_id": user_id.0 })
            .limit(1)
            .await
            .map_err(ParleyError::storage)?;
        if owned == 0 {
            return Err(ParleyError::dialog_not_found(&dialog_id));
        }
        Ok(dialog_id)
    }

    /// Read a dialog record, defaulting to the user's current dialog.
    pub async fn get_dialog(
        &self,
        user_id: UserId,
        dialog_id: Option<&DialogId>,
    ) -> Result<Dialog, ParleyError> {
        let dialog_id = self.resolve_dialog(user_id, dialog_id).await?;
        let doc = self
            .handles()?
            .dialogs
            .find_one(doc! { "_id": dialog_id.as_str() })
            .await
            .map_err(ParleyError::storage)?
            .ok_or_else(|| ParleyError::dialog_not_found(&dialog_id))?;
        convert::dialog_from_document(&doc)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY
    )
}

#[async_trait]
impl PluginAdapter for MongoStorage {
    fn name(&self) -> &str {
        "mongodb"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let h = self.handles()?;
        match h.db.run_command(doc! { "ping": 1 }).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if self.handles.get().is_some() && !self.closed.load(Ordering::Acquire) {
            self.close().await?;
            debug!("shutdown: client closed");
        }
        Ok(())
    }
}

#[async_trait]
impl DialogStore for MongoStorage {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let client = Client::with_uri_str(&self.config.uri)
            .await
            .map_err(ParleyError::storage)?;
        let db = client.database(&self.config.database_name);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(ParleyError::storage)?;

        let users = db.collection::<Document>(USER_COLLECTION);
        let dialogs = db.collection::<Document>(DIALOG_COLLECTION);
        dialogs
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).build())
            .await
            .map_err(ParleyError::storage)?;

        self.handles
            .set(Handles {
                client,
                db,
                users,
                dialogs,
            })
            .map_err(|_| ParleyError::storage("storage already initialized"))?;
        info!(database = %self.config.database_name, "MongoDB storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        let h = self.handles()?;
        self.closed.store(true, Ordering::Release);
        h.client.clone().shutdown().await;
        Ok(())
    }

    async fn user_exists(&self, user_id: UserId) -> Result<bool, ParleyError> {
        let count = self
            .handles()?
            .users
            .count_documents(doc! { "_id": user_id.0 })
            .limit(1)
            .await
            .map_err(ParleyError::storage)?;
        Ok(count > 0)
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<(), ParleyError> {
        let user = User::from_new(new_user, now());
        let result = self
            .handles()?
            .users
            .update_one(
                doc! { "_id": user.id.0 },
                doc! { "$setOnInsert": convert::user_fields(&user) },
            )
            .upsert(true)
            .await;
        match result {
            Ok(result) => {
                debug!(user_id = %user.id, inserted = result.upserted_id.is_some(), "create_user");
                Ok(())
            }
            // A concurrent upsert of the same id won the race.
            Err(e) if is_duplicate_key(&e) => Ok(()),
            Err(e) => Err(ParleyError::storage(e)),
        }
    }

    async fn get_user(&self, user_id: UserId) -> Result<User, ParleyError> {
        let doc = self
            .handles()?
            .users
            .find_one(doc! { "_id": user_id.0 })
            .await
            .map_err(ParleyError::storage)?
            .ok_or_else(|| ParleyError::user_not_found(user_id))?;
        convert::user_from_document(&doc)
    }

    async fn start_dialog(&self, user_id: UserId) -> Result<DialogId, ParleyError> {
        let h = self.handles()?;
        let user = h
            .users
            .find_one(doc! { "_id": user_id.0 })
            .projection(doc! { "current_chat_mode": 1 })
            .await
            .map_err(ParleyError::storage)?
            .ok_or_else(|| ParleyError::user_not_found(user_id))?;
        let chat_mode = match user.get("current_chat_mode") {
            Some(Bson::String(mode)) => mode.clone(),
            _ => parley_core::DEFAULT_CHAT_MODE.to_string(),
        };

        let dialog = Dialog::start(user_id, chat_mode, now());
        h.dialogs
            .insert_one(convert::dialog_to_document(&dialog))
            .await
            .map_err(ParleyError::storage)?;

        let result = h
            .users
            .update_one(
                doc! { "_id": user_id.0 },
                doc! { "$set": { "current_dialog_id": dialog.id.as_str() } },
            )
            .await
            .map_err(ParleyError::storage)?;
        if result.matched_count == 0 {
            return Err(ParleyError::user_not_found(user_id));
        }

        debug!(user_id = %user_id, dialog_id = %dialog.id, "dialog started");
        Ok(dialog.id)
    }

    async fn get_attribute(
        &self,
        user_id: UserId,
        key: &str,
    ) -> Result<AttributeValue, ParleyError> {
        validate_key(key)?;
        let doc = self
            .handles()?
            .users
            .find_one(doc! { "_id": user_id.0 })
            .projection(doc! { key: 1 })
            .await
            .map_err(ParleyError::storage)?
            .ok_or_else(|| ParleyError::user_not_found(user_id))?;

        match doc.get(key) {
            Some(value) => convert::attribute_from_bson(key, value),
            None => Err(ParleyError::AttributeNotSet {
                user_id,
                key: key.to_string(),
            }),
        }
    }

    async fn set_attribute(
        &self,
        user_id: UserId,
        key: &str,
        value: AttributeValue,
    ) -> Result<(), ParleyError> {
        validate_write(key, &value)?;
        let value = convert::attribute_to_bson(&value.normalized());
        let result = self
            .handles()?
            .users
            .update_one(doc! { "_id": user_id.0 }, doc! { "$set": { key: value } })
            .await
            .map_err(ParleyError::storage)?;
        if result.matched_count == 0 {
            return Err(ParleyError::user_not_found(user_id));
        }
        debug!(user_id = %user_id, key, "attribute set");
        Ok(())
    }

    async fn get_dialog_messages(
        &self,
        user_id: UserId,
        dialog_id: Option<&DialogId>,
    ) -> Result<Vec<DialogMessage>, ParleyError> {
        let dialog_id = self.resolve_dialog(user_id, dialog_id).await?;
        let doc = self
            .handles()?
            .dialogs
            .find_one(doc! { "_id": dialog_id.as_str(), "user_id": user_id.0 })
            .projection(doc! { "messages": 1 })
            .await
            .map_err(ParleyError::storage)?
            .ok_or_else(|| ParleyError::dialog_not_found(&dialog_id))?;
        convert::messages_from_document(&doc)
    }

    async fn set_dialog_messages(
        &self,
        user_id: UserId,
        messages: &[DialogMessage],
        dialog_id: Option<&DialogId>,
    ) -> Result<(), ParleyError> {
        let dialog_id = self.resolve_dialog(user_id, dialog_id).await?;
        let result = self
            .handles()?
            .dialogs
            .update_one(
                doc! { "_id": dialog_id.as_str(), "user_id": user_id.0 },
                doc! { "$set": { "messages": convert::messages_to_bson(messages) } },
            )
            .await
            .map_err(ParleyError::storage)?;
        if result.matched_count == 0 {
            return Err(ParleyError::dialog_not_found(&dialog_id));
        }
        debug!(
            user_id = %user_id,
            dialog_id = %dialog_id,
            n_messages = messages.len(),
            "dialog messages replaced"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MongoConfig {
        MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database_name: "parley_test".to_string(),
        }
    }

    #[test]
    fn mongo_storage_implements_plugin_adapter() {
        let storage = MongoStorage::new(config());
        assert_eq!(storage.name(), "mongodb");
        assert_eq!(storage.version(), semver::Version::new(0, 1, 0));
    }

    #[tokio::test]
    async fn operations_before_initialize_are_storage_errors() {
        let storage = MongoStorage::new(config());
        let err = storage.user_exists(UserId(1)).await.unwrap_err();
        assert!(matches!(err, ParleyError::Storage { .. }));
        let err = storage.health_check().await.unwrap_err();
        assert!(matches!(err, ParleyError::Storage { .. }));
        // Nothing to release yet.
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn key_validation_happens_before_any_io() {
        let storage = MongoStorage::new(config());
        let err = storage
            .set_attribute(UserId(1), "$where", 1i64.into())
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidAttribute { .. }));
        let err = storage
            .set_attribute(UserId(1), "n_used_tokens", "x".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidAttribute { .. }));
        let err = storage
            .set_attribute(UserId(1), "ratio", AttributeValue::Float(f64::NAN))
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidAttribute { .. }));
        let err = storage.get_attribute(UserId(1), "a.b").await.unwrap_err();
        assert!(matches!(err, ParleyError::InvalidAttribute { .. }));
    }
}
