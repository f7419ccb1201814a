// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley persistence layer.
//!
//! This crate provides the domain types, the error type, and the
//! [`DialogStore`] contract that the SQLite and MongoDB backends implement.

pub mod attribute;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use attribute::{validate_key, validate_write, AttributeValue};
pub use error::ParleyError;
pub use types::{
    Dialog, DialogId, DialogMessage, EntityKind, FieldKind, HealthStatus, NewUser, User,
    UserField, UserId, DEFAULT_CHAT_MODE,
};

pub use traits::{DialogStore, PluginAdapter};
