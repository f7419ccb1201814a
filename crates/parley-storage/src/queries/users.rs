// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User CRUD operations and attribute access.

use chrono::{DateTime, Utc};
use parley_core::{
    validate_key, validate_write, AttributeValue, NewUser, ParleyError, UserField, UserId,
};
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};
use crate::models::{column_value, timestamp_to_sql, user_from_row, AttributeMap, Json, User, USER_COLUMNS};

/// Whether a user row exists.
pub async fn user_exists(db: &Database, user_id: UserId) -> Result<bool, ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM user WHERE id = ?1)",
                params![user_id.0],
                |row| row.get(0),
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a default-initialised user unless the id is taken.
///
/// Returns `true` when a row was inserted.
pub async fn create_user(
    db: &Database,
    new_user: &NewUser,
    at: DateTime<Utc>,
) -> Result<bool, ParleyError> {
    let user = User::from_new(new_user, at);
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO user
                     (id, chat_id, username, first_name, last_name,
                      last_interaction, first_seen, current_dialog_id,
                      current_chat_mode, n_used_tokens)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9)",
                params![
                    user.id.0,
                    user.chat_id,
                    user.username,
                    user.first_name,
                    user.last_name,
                    timestamp_to_sql(&user.last_interaction),
                    timestamp_to_sql(&user.first_seen),
                    user.current_chat_mode,
                    user.n_used_tokens,
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Read the full user record.
pub async fn get_user(db: &Database, user_id: UserId) -> Result<User, ParleyError> {
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {USER_COLUMNS} FROM user WHERE id = ?1"),
                params![user_id.0],
                user_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?
        .ok_or_else(|| ParleyError::user_not_found(user_id))
}

/// Read one attribute: a typed column for built-in fields, otherwise an
/// entry of the JSON attribute map.
pub async fn get_attribute(
    db: &Database,
    user_id: UserId,
    key: &str,
) -> Result<AttributeValue, ParleyError> {
    validate_key(key)?;

    if let Some(field) = UserField::from_key(key) {
        let user = get_user(db, user_id).await?;
        return Ok(user.attribute(field));
    }

    let attributes = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT attributes FROM user WHERE id = ?1",
                params![user_id.0],
                |row| row.get::<_, Json<AttributeMap>>(0),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?
        .ok_or_else(|| ParleyError::user_not_found(user_id))?;

    attributes
        .0
        .get(key)
        .cloned()
        .ok_or_else(|| ParleyError::AttributeNotSet {
            user_id,
            key: key.to_string(),
        })
}

/// Write one attribute.
///
/// Built-in fields are typed columns and reject values of the wrong kind.
/// Other keys are merged into the JSON attribute map inside a transaction.
pub async fn set_attribute(
    db: &Database,
    user_id: UserId,
    key: &str,
    value: AttributeValue,
) -> Result<(), ParleyError> {
    let field = validate_write(key, &value)?;
    let value = value.normalized();

    let updated = match field {
        Some(field) => {
            // Column names come from `UserField`, never from the caller.
            let sql = format!("UPDATE user SET {} = ?1 WHERE id = ?2", field.as_str());
            let column = column_value(&value);
            db.connection()
                .call(move |conn| {
                    let changed = conn.execute(&sql, params![column, user_id.0])?;
                    Ok(changed > 0)
                })
                .await
                .map_err(map_tr_err)?
        }
        None => {
            let key = key.to_string();
            db.connection()
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let current = tx
                        .query_row(
                            "SELECT attributes FROM user WHERE id = ?1",
                            params![user_id.0],
                            |row| row.get::<_, Json<AttributeMap>>(0),
                        )
                        .optional()?;
                    let Some(Json(mut attributes)) = current else {
                        return Ok(false);
                    };
                    attributes.insert(key, value);
                    tx.execute(
                        "UPDATE user SET attributes = ?1 WHERE id = ?2",
                        params![Json(&attributes), user_id.0],
                    )?;
                    tx.commit()?;
                    Ok(true)
                })
                .await
                .map_err(map_tr_err)?
        }
    };

    if updated {
        Ok(())
    } else {
        Err(ParleyError::user_not_found(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::types::now;

    async fn test_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn create_is_idempotent_and_keeps_first_values() {
        let db = test_db().await;
        let first = NewUser::new(UserId(1), 10).with_username("alice");
        let second = NewUser::new(UserId(1), 99).with_username("mallory");

        assert!(create_user(&db, &first, now()).await.unwrap());
        assert!(!create_user(&db, &second, now()).await.unwrap());

        let user = get_user(&db, UserId(1)).await.unwrap();
        assert_eq!(user.chat_id, 10);
        assert_eq!(user.username, "alice");
        assert_eq!(user.current_chat_mode, "assistant");
        assert_eq!(user.current_dialog_id, None);
    }

    #[tokio::test]
    async fn exists_reflects_creation() {
        let db = test_db().await;
        assert!(!user_exists(&db, UserId(5)).await.unwrap());
        create_user(&db, &NewUser::new(UserId(5), 5), now()).await.unwrap();
        assert!(user_exists(&db, UserId(5)).await.unwrap());
    }

    #[tokio::test]
    async fn typed_column_rejects_wrong_kind() {
        let db = test_db().await;
        create_user(&db, &NewUser::new(UserId(1), 1), now()).await.unwrap();

        let err = set_attribute(&db, UserId(1), "n_used_tokens", "many".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidAttribute { .. }));

        let err = set_attribute(&db, UserId(1), "username", AttributeValue::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidAttribute { .. }));
    }

    #[tokio::test]
    async fn custom_attributes_live_in_json_map() {
        let db = test_db().await;
        create_user(&db, &NewUser::new(UserId(1), 1), now()).await.unwrap();

        set_attribute(&db, UserId(1), "current_model", "gpt-4".into())
            .await
            .unwrap();
        set_attribute(&db, UserId(1), "n_generated_images", 3i64.into())
            .await
            .unwrap();

        assert_eq!(
            get_attribute(&db, UserId(1), "current_model").await.unwrap(),
            AttributeValue::Text("gpt-4".into())
        );
        assert_eq!(
            get_attribute(&db, UserId(1), "n_generated_images").await.unwrap(),
            AttributeValue::Integer(3)
        );
    }

    #[tokio::test]
    async fn set_attribute_on_missing_user_is_not_found() {
        let db = test_db().await;
        let err = set_attribute(&db, UserId(404), "n_used_tokens", 1i64.into())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = set_attribute(&db, UserId(404), "anything", 1i64.into())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
