// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row mapping between SQLite columns and domain types.
//!
//! Timestamps are stored as RFC 3339 text with millisecond precision so
//! that lexical and chronological order agree. Message lists and the
//! free-form attribute map are stored as JSON text.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Type, ValueRef};
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use parley_core::types::{Dialog, DialogId, DialogMessage, User, UserId};
use parley_core::AttributeValue;

/// Free-form user attributes, keyed by attribute name.
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Column list matching [`user_from_row`].
pub const USER_COLUMNS: &str = "id, chat_id, username, first_name, last_name, \
     last_interaction, first_seen, current_dialog_id, current_chat_mode, n_used_tokens";

/// A value stored in a TEXT column as JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T: Serialize> ToSql for Json<T> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        serde_json::to_string(&self.0)
            .map(ToSqlOutput::from)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
    }
}

impl<T: DeserializeOwned> FromSql for Json<T> {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        serde_json::from_str(text)
            .map(Json)
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

pub fn timestamp_to_sql(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Read an RFC 3339 timestamp column.
pub fn timestamp_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Build a [`User`] from a row selected with [`USER_COLUMNS`].
pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        chat_id: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        last_interaction: timestamp_from_row(row, 5)?,
        first_seen: timestamp_from_row(row, 6)?,
        current_dialog_id: row.get::<_, Option<String>>(7)?.map(DialogId),
        current_chat_mode: row.get(8)?,
        n_used_tokens: row.get(9)?,
    })
}

/// Convert a value for a typed user column. Callers check the kind first.
pub fn column_value(value: &AttributeValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Integer(i64::from(*b)),
        AttributeValue::Integer(i) => Value::Integer(*i),
        AttributeValue::Float(f) => Value::Real(*f),
        AttributeValue::Text(s) => Value::Text(s.clone()),
        AttributeValue::Timestamp(at) => Value::Text(timestamp_to_sql(at)),
    }
}
