// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed user attribute values and key validation.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParleyError;
use crate::types::{DialogId, FieldKind, UserField};

/// The value of a single user attribute.
///
/// Serialized with an explicit type tag so timestamps survive a trip
/// through JSON unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl AttributeValue {
    /// Short name of the value's type, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Null => "null",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Integer(_) => "integer",
            AttributeValue::Float(_) => "float",
            AttributeValue::Text(_) => "text",
            AttributeValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            AttributeValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Interpret the value as a dialog reference (`Null` means none).
    pub fn as_dialog_id(&self) -> Option<DialogId> {
        self.as_str().map(|s| DialogId(s.to_string()))
    }

    /// The value as it will read back from storage: timestamps are cut
    /// to millisecond precision.
    pub fn normalized(self) -> Self {
        match self {
            AttributeValue::Timestamp(at) => AttributeValue::Timestamp(at.trunc_subsecs(3)),
            other => other,
        }
    }

    /// Whether this value can be stored in a built-in field of `kind`.
    pub fn fits(&self, kind: FieldKind) -> bool {
        matches!(
            (kind, self),
            (FieldKind::Integer, AttributeValue::Integer(_))
                | (FieldKind::Text, AttributeValue::Text(_))
                | (FieldKind::NullableText, AttributeValue::Text(_) | AttributeValue::Null)
                | (FieldKind::Timestamp, AttributeValue::Timestamp(_))
        )
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        AttributeValue::Bool(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        AttributeValue::Integer(v)
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        AttributeValue::Float(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        AttributeValue::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        AttributeValue::Text(v)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(v: DateTime<Utc>) -> Self {
        AttributeValue::Timestamp(v)
    }
}

impl From<DialogId> for AttributeValue {
    fn from(v: DialogId) -> Self {
        AttributeValue::Text(v.0)
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(AttributeValue::Null, Into::into)
    }
}

/// Reject keys that would address the record identity or be read as a
/// path/operator by the document store.
pub fn validate_key(key: &str) -> Result<(), ParleyError> {
    let reason = if key.is_empty() {
        Some("key must not be empty")
    } else if key == "_id" || key == "id" {
        Some("the user identity cannot be read or written as an attribute")
    } else if key.starts_with('$') {
        Some("key must not start with `$`")
    } else if key.contains('.') {
        Some("key must not contain `.`")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ParleyError::InvalidAttribute {
            key: key.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Validate a write: the key must be allowed, floats must be finite and,
/// for a built-in field, the value must fit the field's kind. Returns the
/// built-in field, if any.
pub fn validate_write(key: &str, value: &AttributeValue) -> Result<Option<UserField>, ParleyError> {
    validate_key(key)?;
    if let AttributeValue::Float(v) = value {
        if !v.is_finite() {
            return Err(ParleyError::InvalidAttribute {
                key: key.to_string(),
                reason: format!("float value {v} is not finite"),
            });
        }
    }
    let Some(field) = UserField::from_key(key) else {
        return Ok(None);
    };
    if value.fits(field.kind()) {
        Ok(Some(field))
    } else {
        Err(ParleyError::InvalidAttribute {
            key: key.to_string(),
            reason: format!("expected {:?}, got {}", field.kind(), value.kind()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_write_checks_builtin_kinds() {
        assert_eq!(
            validate_write("n_used_tokens", &AttributeValue::Integer(1)).unwrap(),
            Some(UserField::NUsedTokens)
        );
        assert_eq!(validate_write("custom", &AttributeValue::Bool(true)).unwrap(), None);
        assert!(validate_write("n_used_tokens", &AttributeValue::Text("1".into())).is_err());
        assert!(validate_write("_id", &AttributeValue::Integer(1)).is_err());
    }

    #[test]
    fn non_finite_floats_rejected() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = validate_write("ratio", &AttributeValue::Float(v)).unwrap_err();
            assert!(matches!(err, ParleyError::InvalidAttribute { .. }), "{v}");
        }
        assert_eq!(validate_write("ratio", &AttributeValue::Float(0.25)).unwrap(), None);
    }

    #[test]
    fn reserved_keys_rejected() {
        for key in ["", "_id", "id", "$set", "a.b"] {
            let err = validate_key(key).expect_err("key should be rejected");
            assert!(matches!(err, ParleyError::InvalidAttribute { .. }), "{key}");
        }
        validate_key("n_used_tokens").unwrap();
        validate_key("favourite_colour").unwrap();
    }

    #[test]
    fn tagged_json_keeps_timestamps() {
        let at = crate::types::now();
        let json = serde_json::to_string(&AttributeValue::Timestamp(at)).unwrap();
        assert!(json.contains("\"type\":\"timestamp\""));
        let back: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AttributeValue::Timestamp(at));
    }

    #[test]
    fn normalized_truncates_timestamps() {
        let at = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let value = AttributeValue::Timestamp(at).normalized();
        assert_eq!(
            value.as_timestamp().unwrap().timestamp_subsec_nanos(),
            123_000_000
        );
        assert_eq!(AttributeValue::Integer(7).normalized(), AttributeValue::Integer(7));
    }

    #[test]
    fn fits_field_kinds() {
        assert!(AttributeValue::Integer(0).fits(FieldKind::Integer));
        assert!(!AttributeValue::Text("0".into()).fits(FieldKind::Integer));
        assert!(AttributeValue::Null.fits(FieldKind::NullableText));
        assert!(!AttributeValue::Null.fits(FieldKind::Text));
    }

    #[test]
    fn option_conversion() {
        let none: Option<DialogId> = None;
        assert!(AttributeValue::from(none).is_null());
        let some = AttributeValue::from(Some(DialogId("x".into())));
        assert_eq!(some.as_dialog_id(), Some(DialogId("x".into())));
    }
}
