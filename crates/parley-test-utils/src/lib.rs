// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! [`contract`] holds the behavioural checks shared by every
//! [`DialogStore`](parley_core::DialogStore) backend, so the SQLite and
//! MongoDB suites assert exactly the same semantics.

pub mod contract;

pub use contract::{run_all, seeded_user, unique_user_id};
