// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley persistence layer.

use thiserror::Error;

use crate::types::{DialogId, EntityKind, UserId};

/// The primary error type returned by every store backend.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors surfaced at store construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation referenced a user or dialog that does not exist.
    #[error("{entity} {id} does not exist")]
    NotFound { entity: EntityKind, id: String },

    /// The requested attribute was never written for an existing user.
    #[error("user {user_id} does not have a value for {key}")]
    AttributeNotSet { user_id: UserId, key: String },

    /// The attribute key is reserved, or the value does not fit the field.
    #[error("invalid attribute `{key}`: {reason}")]
    InvalidAttribute { key: String, reason: String },

    /// Storage backend errors (connection failure, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ParleyError {
    /// Error for a user id with no record.
    pub fn user_not_found(user_id: UserId) -> Self {
        Self::NotFound {
            entity: EntityKind::User,
            id: user_id.to_string(),
        }
    }

    /// Error for a dialog id with no record (or one owned by another user).
    pub fn dialog_not_found(dialog_id: &DialogId) -> Self {
        Self::NotFound {
            entity: EntityKind::Dialog,
            id: dialog_id.to_string(),
        }
    }

    /// Wrap a backend driver error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Returns `true` for [`ParleyError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` for [`ParleyError::AttributeNotSet`].
    pub fn is_attribute_not_set(&self) -> bool {
        matches!(self, Self::AttributeNotSet { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_entity_and_id() {
        let err = ParleyError::user_not_found(UserId(42));
        assert_eq!(err.to_string(), "user 42 does not exist");
        assert!(err.is_not_found());

        let err = ParleyError::dialog_not_found(&DialogId("d-1".into()));
        assert_eq!(err.to_string(), "dialog d-1 does not exist");
    }

    #[test]
    fn attribute_not_set_display() {
        let err = ParleyError::AttributeNotSet {
            user_id: UserId(7),
            key: "nonexistent_key".into(),
        };
        assert!(err.is_attribute_not_set());
        assert!(!err.is_not_found());
        assert_eq!(
            err.to_string(),
            "user 7 does not have a value for nonexistent_key"
        );
    }

    #[test]
    fn storage_wraps_source() {
        let err = ParleyError::storage(std::io::Error::other("disk gone"));
        assert!(err.to_string().contains("disk gone"));
        let _: &dyn std::error::Error = &err;
    }
}
