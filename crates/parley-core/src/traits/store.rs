// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The user/dialog persistence contract shared by every backend.

use async_trait::async_trait;

use crate::attribute::AttributeValue;
use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DialogId, DialogMessage, NewUser, User, UserId};

/// Persistence backend for users and their dialogs.
///
/// Both the document store and the relational store implement this trait
/// with identical semantics. Every method except [`create_user`] and
/// [`user_exists`] fails with [`ParleyError::NotFound`] when the user does
/// not exist.
///
/// Methods taking `dialog_id: Option<&DialogId>` resolve `None` to the
/// user's current dialog. A user without a current dialog, or an explicit
/// id that does not belong to the user, fails with `NotFound`.
///
/// [`create_user`]: DialogStore::create_user
/// [`user_exists`]: DialogStore::user_exists
#[async_trait]
pub trait DialogStore: PluginAdapter {
    /// Opens connections and applies the schema.
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), ParleyError>;

    /// Returns whether a user record exists.
    async fn user_exists(&self, user_id: UserId) -> Result<bool, ParleyError>;

    /// Like [`user_exists`](DialogStore::user_exists), but fails with
    /// `NotFound` instead of returning `false`.
    async fn ensure_user_exists(&self, user_id: UserId) -> Result<(), ParleyError> {
        if self.user_exists(user_id).await? {
            Ok(())
        } else {
            Err(ParleyError::user_not_found(user_id))
        }
    }

    /// Inserts a default-initialised user unless one with the same id exists.
    async fn create_user(&self, new_user: &NewUser) -> Result<(), ParleyError>;

    /// Reads the full user record.
    async fn get_user(&self, user_id: UserId) -> Result<User, ParleyError>;

    /// Starts a new dialog in the user's current chat mode and makes it the
    /// user's current dialog.
    async fn start_dialog(&self, user_id: UserId) -> Result<DialogId, ParleyError>;

    /// Reads one attribute. Fails with `AttributeNotSet` if it was never written.
    async fn get_attribute(&self, user_id: UserId, key: &str)
        -> Result<AttributeValue, ParleyError>;

    /// Writes (inserts or replaces) one attribute.
    async fn set_attribute(
        &self,
        user_id: UserId,
        key: &str,
        value: AttributeValue,
    ) -> Result<(), ParleyError>;

    /// Reads a dialog's message list.
    async fn get_dialog_messages(
        &self,
        user_id: UserId,
        dialog_id: Option<&DialogId>,
    ) -> Result<Vec<DialogMessage>, ParleyError>;

    /// Replaces a dialog's message list wholesale.
    async fn set_dialog_messages(
        &self,
        user_id: UserId,
        messages: &[DialogMessage],
        dialog_id: Option<&DialogId>,
    ) -> Result<(), ParleyError>;
}
