// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversion between BSON documents and domain types.
//!
//! Field names match the collections written by earlier deployments, so
//! existing `user` and `dialog` data is read as-is. Integers may be stored
//! as either Int32 or Int64.

use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc, Bson, Document};

use parley_core::{AttributeValue, Dialog, DialogId, DialogMessage, ParleyError, User, UserId};

pub fn datetime_to_bson(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

pub fn datetime_from_bson(at: bson::DateTime) -> Result<DateTime<Utc>, ParleyError> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).ok_or_else(|| {
        ParleyError::Serialization(format!("timestamp {} is out of range", at.timestamp_millis()))
    })
}

pub fn attribute_to_bson(value: &AttributeValue) -> Bson {
    match value {
        AttributeValue::Null => Bson::Null,
        AttributeValue::Bool(b) => Bson::Boolean(*b),
        AttributeValue::Integer(i) => Bson::Int64(*i),
        AttributeValue::Float(f) => Bson::Double(*f),
        AttributeValue::Text(s) => Bson::String(s.clone()),
        AttributeValue::Timestamp(at) => Bson::DateTime(datetime_to_bson(*at)),
    }
}

pub fn attribute_from_bson(key: &str, value: &Bson) -> Result<AttributeValue, ParleyError> {
    match value {
        Bson::Null => Ok(AttributeValue::Null),
        Bson::Boolean(b) => Ok(AttributeValue::Bool(*b)),
        Bson::Int32(i) => Ok(AttributeValue::Integer(i64::from(*i))),
        Bson::Int64(i) => Ok(AttributeValue::Integer(*i)),
        Bson::Double(f) => Ok(AttributeValue::Float(*f)),
        Bson::String(s) => Ok(AttributeValue::Text(s.clone())),
        Bson::DateTime(at) => Ok(AttributeValue::Timestamp(datetime_from_bson(*at)?)),
        other => Err(ParleyError::Serialization(format!(
            "attribute `{key}` holds unsupported BSON type {:?}",
            other.element_type()
        ))),
    }
}

fn field<'a>(doc: &'a Document, key: &str) -> Result<&'a Bson, ParleyError> {
    doc.get(key)
        .ok_or_else(|| ParleyError::Serialization(format!("document is missing `{key}`")))
}

fn integer(doc: &Document, key: &str) -> Result<i64, ParleyError> {
    match field(doc, key)? {
        Bson::Int32(i) => Ok(i64::from(*i)),
        Bson::Int64(i) => Ok(*i),
        other => Err(ParleyError::Serialization(format!(
            "`{key}` should be an integer, found {:?}",
            other.element_type()
        ))),
    }
}

fn text(doc: &Document, key: &str) -> Result<String, ParleyError> {
    match doc.get(key) {
        None | Some(Bson::Null) => Ok(String::new()),
        Some(Bson::String(s)) => Ok(s.clone()),
        Some(other) => Err(ParleyError::Serialization(format!(
            "`{key}` should be a string, found {:?}",
            other.element_type()
        ))),
    }
}

fn timestamp(doc: &Document, key: &str) -> Result<DateTime<Utc>, ParleyError> {
    match field(doc, key)? {
        Bson::DateTime(at) => datetime_from_bson(*at),
        other => Err(ParleyError::Serialization(format!(
            "`{key}` should be a datetime, found {:?}",
            other.element_type()
        ))),
    }
}

/// The `user` document for a new record, without its `_id`.
pub fn user_fields(user: &User) -> Document {
    doc! {
        "chat_id": user.chat_id,
        "username": user.username.as_str(),
        "first_name": user.first_name.as_str(),
        "last_name": user.last_name.as_str(),
        "last_interaction": datetime_to_bson(user.last_interaction),
        "first_seen": datetime_to_bson(user.first_seen),
        "current_dialog_id": Bson::Null,
        "current_chat_mode": user.current_chat_mode.as_str(),
        "n_used_tokens": user.n_used_tokens,
    }
}

pub fn user_from_document(doc: &Document) -> Result<User, ParleyError> {
    let current_dialog_id = match doc.get("current_dialog_id") {
        None | Some(Bson::Null) => None,
        Some(Bson::String(id)) => Some(DialogId(id.clone())),
        Some(other) => {
            return Err(ParleyError::Serialization(format!(
                "`current_dialog_id` should be a string, found {:?}",
                other.element_type()
            )));
        }
    };

    Ok(User {
        id: UserId(integer(doc, "_id")?),
        chat_id: integer(doc, "chat_id")?,
        username: text(doc, "username")?,
        first_name: text(doc, "first_name")?,
        last_name: text(doc, "last_name")?,
        last_interaction: timestamp(doc, "last_interaction")?,
        first_seen: timestamp(doc, "first_seen")?,
        current_dialog_id,
        current_chat_mode: text(doc, "current_chat_mode")?,
        n_used_tokens: integer(doc, "n_used_tokens")?,
    })
}

/// BSON datetimes hold milliseconds, so `date` is stored as
/// [`DialogMessage::normalized`] would have it.
pub fn message_to_document(message: &DialogMessage) -> Document {
    doc! {
        "user": message.user.as_str(),
        "bot": message.bot.as_str(),
        "date": datetime_to_bson(message.date),
    }
}

pub fn messages_to_bson(messages: &[DialogMessage]) -> Bson {
    Bson::Array(
        messages
            .iter()
            .map(|m| Bson::Document(message_to_document(m)))
            .collect(),
    )
}

pub fn message_from_document(doc: &Document) -> Result<DialogMessage, ParleyError> {
    Ok(DialogMessage {
        user: text(doc, "user")?,
        bot: text(doc, "bot")?,
        date: timestamp(doc, "date")?,
    })
}

/// Decode the `messages` array of a dialog document.
pub fn messages_from_document(doc: &Document) -> Result<Vec<DialogMessage>, ParleyError> {
    let Some(messages) = doc.get("messages") else {
        return Ok(Vec::new());
    };
    let Bson::Array(items) = messages else {
        return Err(ParleyError::Serialization(
            "`messages` should be an array".to_string(),
        ));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => message_from_document(d),
            other => Err(ParleyError::Serialization(format!(
                "message should be a document, found {:?}",
                other.element_type()
            ))),
        })
        .collect()
}

pub fn dialog_to_document(dialog: &Dialog) -> Document {
    doc! {
        "_id": dialog.id.as_str(),
        "user_id": dialog.user_id.0,
        "chat_mode": dialog.chat_mode.as_str(),
        "start_time": datetime_to_bson(dialog.start_time),
        "messages": messages_to_bson(&dialog.messages),
    }
}

pub fn dialog_from_document(doc: &Document) -> Result<Dialog, ParleyError> {
    let id = match field(doc, "_id")? {
        Bson::String(id) => DialogId(id.clone()),
        other => {
            return Err(ParleyError::Serialization(format!(
                "dialog `_id` should be a string, found {:?}",
                other.element_type()
            )));
        }
    };
    Ok(Dialog {
        id,
        user_id: UserId(integer(doc, "user_id")?),
        chat_mode: text(doc, "chat_mode")?,
        start_time: timestamp(doc, "start_time")?,
        messages: messages_from_document(doc)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::now;
    use parley_core::NewUser;

    #[test]
    fn user_document_round_trip() {
        let user = User::from_new(&NewUser::new(UserId(11), 110).with_username("bob"), now());
        let mut doc = doc! { "_id": user.id.0 };
        doc.extend(user_fields(&user));
        assert_eq!(user_from_document(&doc).unwrap(), user);
    }

    #[test]
    fn legacy_int32_fields_are_accepted() {
        let at = bson::DateTime::from_millis(1_700_000_000_000);
        let doc = doc! {
            "_id": 5_i32,
            "chat_id": 50_i32,
            "username": "legacy",
            "first_name": "",
            "last_name": "",
            "last_interaction": at,
            "first_seen": at,
            "current_dialog_id": "abc",
            "current_chat_mode": "assistant",
            "n_used_tokens": 0_i32,
        };
        let user = user_from_document(&doc).unwrap();
        assert_eq!(user.id, UserId(5));
        assert_eq!(user.current_dialog_id, Some(DialogId("abc".into())));
    }

    #[test]
    fn attribute_values_map_to_native_bson() {
        let at = now();
        let cases = [
            AttributeValue::Null,
            AttributeValue::Bool(true),
            AttributeValue::Integer(i64::MAX),
            AttributeValue::Float(0.5),
            AttributeValue::Text("x".into()),
            AttributeValue::Timestamp(at),
        ];
        for value in cases {
            let bson = attribute_to_bson(&value);
            assert_eq!(attribute_from_bson("k", &bson).unwrap(), value);
        }
        assert!(attribute_from_bson("k", &Bson::Array(vec![])).is_err());
    }

    #[test]
    fn message_date_reads_back_normalized() {
        let precise = DateTime::from_timestamp(1_767_225_600, 123_456_789).unwrap();
        let message = DialogMessage {
            user: "hi".into(),
            bot: "hello".into(),
            date: precise,
        };
        let back = message_from_document(&message_to_document(&message)).unwrap();
        assert_eq!(back, message.normalized());
        assert_eq!(back.date.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn dialog_document_round_trip() {
        let mut dialog = Dialog::start(UserId(3), "assistant", now());
        dialog.messages = vec![DialogMessage::new("hi", "hello", now())];
        let doc = dialog_to_document(&dialog);
        assert!(matches!(doc.get("messages"), Some(Bson::Array(items)) if items.len() == 1));
        assert_eq!(dialog_from_document(&doc).unwrap(), dialog);
    }
}
