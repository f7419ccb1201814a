// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MongoDB persistence backend for Parley.
//!
//! Users live in the `user` collection keyed by their numeric id, dialogs in
//! the `dialog` collection keyed by a UUID string. Documents use native BSON
//! types so data written by earlier deployments reads back unchanged.

pub mod adapter;
pub mod convert;

pub use adapter::MongoStorage;
