// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by both store backends.

use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::attribute::AttributeValue;

/// Chat mode assigned to newly created users.
pub const DEFAULT_CHAT_MODE: &str = "assistant";

/// Externally assigned user identifier (the chat platform's user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Generated dialog identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId(pub String);

impl DialogId {
    /// A fresh random (UUID v4) dialog id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Current time, truncated to millisecond precision.
///
/// BSON datetimes carry milliseconds only; truncating here keeps
/// timestamps identical across both backends.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Health status reported by store health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Store is fully operational.
    Healthy,
    /// Store is not operational.
    Unhealthy(String),
}

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum EntityKind {
    User,
    Dialog,
}

/// Parameters for [`DialogStore::create_user`](crate::DialogStore::create_user).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: UserId,
    pub chat_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewUser {
    /// A new user with empty name fields.
    pub fn new(id: impl Into<UserId>, chat_id: i64) -> Self {
        Self {
            id: id.into(),
            chat_id,
            username: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_name(mut self, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        self.first_name = first_name.into();
        self.last_name = last_name.into();
        self
    }
}

/// A registered chat participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub chat_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub last_interaction: DateTime<Utc>,
    pub first_seen: DateTime<Utc>,
    pub current_dialog_id: Option<DialogId>,
    pub current_chat_mode: String,
    pub n_used_tokens: i64,
}

impl User {
    /// Default-initialised user record for `new_user`, stamped with `at`.
    pub fn from_new(new_user: &NewUser, at: DateTime<Utc>) -> Self {
        Self {
            id: new_user.id,
            chat_id: new_user.chat_id,
            username: new_user.username.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            last_interaction: at,
            first_seen: at,
            current_dialog_id: None,
            current_chat_mode: DEFAULT_CHAT_MODE.to_string(),
            n_used_tokens: 0,
        }
    }

    /// Value of a built-in field.
    pub fn attribute(&self, field: UserField) -> AttributeValue {
        match field {
            UserField::ChatId => AttributeValue::Integer(self.chat_id),
            UserField::Username => AttributeValue::Text(self.username.clone()),
            UserField::FirstName => AttributeValue::Text(self.first_name.clone()),
            UserField::LastName => AttributeValue::Text(self.last_name.clone()),
            UserField::LastInteraction => AttributeValue::Timestamp(self.last_interaction),
            UserField::FirstSeen => AttributeValue::Timestamp(self.first_seen),
            UserField::CurrentDialogId => self.current_dialog_id.clone().into(),
            UserField::CurrentChatMode => AttributeValue::Text(self.current_chat_mode.clone()),
            UserField::NUsedTokens => AttributeValue::Integer(self.n_used_tokens),
        }
    }
}

/// The built-in user fields every record carries from creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum UserField {
    ChatId,
    Username,
    FirstName,
    LastName,
    LastInteraction,
    FirstSeen,
    CurrentDialogId,
    CurrentChatMode,
    #[strum(serialize = "n_used_tokens")]
    NUsedTokens,
}

/// The value shape a built-in field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Text,
    NullableText,
    Timestamp,
}

impl UserField {
    pub const ALL: [UserField; 9] = [
        UserField::ChatId,
        UserField::Username,
        UserField::FirstName,
        UserField::LastName,
        UserField::LastInteraction,
        UserField::FirstSeen,
        UserField::CurrentDialogId,
        UserField::CurrentChatMode,
        UserField::NUsedTokens,
    ];

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn kind(self) -> FieldKind {
        match self {
            UserField::ChatId | UserField::NUsedTokens => FieldKind::Integer,
            UserField::Username
            | UserField::FirstName
            | UserField::LastName
            | UserField::CurrentChatMode => FieldKind::Text,
            UserField::CurrentDialogId => FieldKind::NullableText,
            UserField::LastInteraction | UserField::FirstSeen => FieldKind::Timestamp,
        }
    }

    /// Look up a built-in field by attribute key.
    pub fn from_key(key: &str) -> Option<Self> {
        key.parse().ok()
    }
}

/// One exchange in a dialog: the user's message, the bot's reply, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogMessage {
    pub user: String,
    pub bot: String,
    pub date: DateTime<Utc>,
}

impl DialogMessage {
    /// `date` is cut to millisecond precision, as both backends store it.
    pub fn new(user: impl Into<String>, bot: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            user: user.into(),
            bot: bot.into(),
            date: date.trunc_subsecs(3),
        }
    }

    /// The message as it will read back from storage.
    pub fn normalized(&self) -> Self {
        Self::new(self.user.clone(), self.bot.clone(), self.date)
    }
}

/// One conversation session belonging to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialog {
    pub id: DialogId,
    pub user_id: UserId,
    pub chat_mode: String,
    pub start_time: DateTime<Utc>,
    pub messages: Vec<DialogMessage>,
}

impl Dialog {
    /// A new, empty dialog with a freshly generated id.
    pub fn start(user_id: UserId, chat_mode: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: DialogId::generate(),
            user_id,
            chat_mode: chat_mode.into(),
            start_time: at,
            messages: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_defaults() {
        let at = now();
        let user = User::from_new(&NewUser::new(1, 100).with_username("alice"), at);
        assert_eq!(user.current_chat_mode, "assistant");
        assert_eq!(user.n_used_tokens, 0);
        assert!(user.current_dialog_id.is_none());
        assert_eq!(user.first_seen, at);
        assert_eq!(user.username, "alice");
        assert_eq!(user.first_name, "");
    }

    #[test]
    fn now_has_millisecond_precision() {
        let t = now();
        assert_eq!(t.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn generated_dialog_ids_are_distinct() {
        let a = DialogId::generate();
        let b = DialogId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn user_field_keys() {
        assert_eq!(UserField::from_key("n_used_tokens"), Some(UserField::NUsedTokens));
        assert_eq!(UserField::from_key("current_dialog_id"), Some(UserField::CurrentDialogId));
        assert_eq!(UserField::from_key("favourite_colour"), None);
        for field in UserField::ALL {
            assert_eq!(UserField::from_key(field.as_str()), Some(field));
        }
    }

    #[test]
    fn user_attribute_reads_built_in_fields() {
        let mut user = User::from_new(&NewUser::new(5, 50), now());
        assert_eq!(user.attribute(UserField::CurrentDialogId), AttributeValue::Null);
        user.current_dialog_id = Some(DialogId("d".into()));
        assert_eq!(
            user.attribute(UserField::CurrentDialogId),
            AttributeValue::Text("d".into())
        );
        assert_eq!(user.attribute(UserField::ChatId), AttributeValue::Integer(50));
    }

    #[test]
    fn message_dates_are_kept_to_the_millisecond() {
        let precise = DateTime::from_timestamp(1_767_225_600, 123_456_789).unwrap();
        let message = DialogMessage::new("hi", "hello", precise);
        assert_eq!(message.date.timestamp_subsec_nanos(), 123_000_000);

        let literal = DialogMessage {
            user: "hi".into(),
            bot: "hello".into(),
            date: precise,
        };
        assert_eq!(literal.normalized(), message);
    }

    #[test]
    fn entity_kind_display() {
        assert_eq!(EntityKind::User.to_string(), "user");
        assert_eq!(EntityKind::Dialog.to_string(), "dialog");
    }
}
