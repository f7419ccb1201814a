// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dialog operations: starting dialogs and reading/replacing message lists.

use chrono::{DateTime, Utc};
use parley_core::{ParleyError, UserId};
use rusqlite::{params, OptionalExtension, Transaction};

use crate::database::{map_tr_err, Database};
use crate::models::{timestamp_from_row, timestamp_to_sql, Dialog, DialogId, DialogMessage, Json};

/// Outcome of resolving a dialog for a user inside one connection call.
enum Resolved<T> {
    NoUser,
    NoDialog(Option<DialogId>),
    Found(T),
}

impl<T> Resolved<T> {
    fn into_result(self, user_id: UserId) -> Result<T, ParleyError> {
        match self {
            Resolved::Found(value) => Ok(value),
            Resolved::NoUser => Err(ParleyError::user_not_found(user_id)),
            Resolved::NoDialog(Some(dialog_id)) => Err(ParleyError::dialog_not_found(&dialog_id)),
            Resolved::NoDialog(None) => Err(ParleyError::dialog_not_found(&DialogId(format!(
                "<current of user {user_id}>"
            )))),
        }
    }
}

/// Resolve `dialog_id`, defaulting to the user's current dialog. Only
/// dialogs owned by the user resolve.
fn resolve_dialog(
    tx: &Transaction<'_>,
    user_id: UserId,
    dialog_id: Option<DialogId>,
) -> rusqlite::Result<Resolved<DialogId>> {
    let current: Option<Option<String>> = tx
        .query_row(
            "SELECT current_dialog_id FROM user WHERE id = ?1",
            params![user_id.0],
            |row| row.get(0),
        )
        .optional()?;
    let Some(current) = current else {
        return Ok(Resolved::NoUser);
    };

    let Some(dialog_id) = dialog_id.or(current.map(DialogId)) else {
        return Ok(Resolved::NoDialog(None));
    };

    let owned: bool = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM dialog WHERE id = ?1 AND user_id = ?2)",
        params![dialog_id.as_str(), user_id.0],
        |row| row.get(0),
    )?;
    if owned {
        Ok(Resolved::Found(dialog_id))
    } else {
        Ok(Resolved::NoDialog(Some(dialog_id)))
    }
}

/// Create a dialog in the user's current chat mode and make it current.
///
/// The user lookup, dialog insert and user update commit together.
pub async fn start_dialog(
    db: &Database,
    user_id: UserId,
    dialog_id: DialogId,
    at: DateTime<Utc>,
) -> Result<DialogId, ParleyError> {
    let started = dialog_id.clone();
    let inserted = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let chat_mode: Option<String> = tx
                .query_row(
                    "SELECT current_chat_mode FROM user WHERE id = ?1",
                    params![user_id.0],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(chat_mode) = chat_mode else {
                return Ok(false);
            };
            tx.execute(
                "INSERT INTO dialog (id, user_id, chat_mode, start_time, messages)
                 VALUES (?1, ?2, ?3, ?4, '[]')",
                params![dialog_id.as_str(), user_id.0, chat_mode, timestamp_to_sql(&at)],
            )?;
            tx.execute(
                "UPDATE user SET current_dialog_id = ?1 WHERE id = ?2",
                params![dialog_id.as_str(), user_id.0],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if inserted {
        Ok(started)
    } else {
        Err(ParleyError::user_not_found(user_id))
    }
}

/// Read a dialog's full record.
pub async fn get_dialog(
    db: &Database,
    user_id: UserId,
    dialog_id: Option<DialogId>,
) -> Result<Dialog, ParleyError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let dialog_id = match resolve_dialog(&tx, user_id, dialog_id)? {
                Resolved::Found(id) => id,
                Resolved::NoUser => return Ok(Resolved::NoUser),
                Resolved::NoDialog(id) => return Ok(Resolved::NoDialog(id)),
            };
            let dialog = tx.query_row(
                "SELECT id, user_id, chat_mode, start_time, messages FROM dialog WHERE id = ?1",
                params![dialog_id.as_str()],
                |row| {
                    Ok(Dialog {
                        id: DialogId(row.get(0)?),
                        user_id: UserId(row.get(1)?),
                        chat_mode: row.get(2)?,
                        start_time: timestamp_from_row(row, 3)?,
                        messages: row.get::<_, Json<Vec<DialogMessage>>>(4)?.0,
                    })
                },
            )?;
            Ok(Resolved::Found(dialog))
        })
        .await
        .map_err(map_tr_err)?
        .into_result(user_id)
}

/// Read the message list of a dialog.
pub async fn get_dialog_messages(
    db: &Database,
    user_id: UserId,
    dialog_id: Option<DialogId>,
) -> Result<Vec<DialogMessage>, ParleyError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let dialog_id = match resolve_dialog(&tx, user_id, dialog_id)? {
                Resolved::Found(id) => id,
                Resolved::NoUser => return Ok(Resolved::NoUser),
                Resolved::NoDialog(id) => return Ok(Resolved::NoDialog(id)),
            };
            let Json(messages) = tx.query_row(
                "SELECT messages FROM dialog WHERE id = ?1",
                params![dialog_id.as_str()],
                |row| row.get::<_, Json<Vec<DialogMessage>>>(0),
            )?;
            Ok(Resolved::Found(messages))
        })
        .await
        .map_err(map_tr_err)?
        .into_result(user_id)
}

/// Replace the message list of a dialog wholesale.
pub async fn set_dialog_messages(
    db: &Database,
    user_id: UserId,
    messages: Vec<DialogMessage>,
    dialog_id: Option<DialogId>,
) -> Result<DialogId, ParleyError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let dialog_id = match resolve_dialog(&tx, user_id, dialog_id)? {
                Resolved::Found(id) => id,
                Resolved::NoUser => return Ok(Resolved::NoUser),
                Resolved::NoDialog(id) => return Ok(Resolved::NoDialog(id)),
            };
            tx.execute(
                "UPDATE dialog SET messages = ?1 WHERE id = ?2",
                params![Json(&messages), dialog_id.as_str()],
            )?;
            tx.commit()?;
            Ok(Resolved::Found(dialog_id))
        })
        .await
        .map_err(map_tr_err)?
        .into_result(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::users;
    use parley_core::types::now;
    use parley_core::NewUser;

    async fn db_with_user(user_id: i64) -> Database {
        let db = Database::open_in_memory().await.unwrap();
        users::create_user(&db, &NewUser::new(UserId(user_id), user_id), now())
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn start_dialog_snapshots_chat_mode() {
        let db = db_with_user(1).await;
        users::set_attribute(&db, UserId(1), "current_chat_mode", "code_assistant".into())
            .await
            .unwrap();

        let id = start_dialog(&db, UserId(1), DialogId::generate(), now())
            .await
            .unwrap();
        let dialog = get_dialog(&db, UserId(1), None).await.unwrap();
        assert_eq!(dialog.id, id);
        assert_eq!(dialog.chat_mode, "code_assistant");
        assert!(dialog.messages.is_empty());

        let user = users::get_user(&db, UserId(1)).await.unwrap();
        assert_eq!(user.current_dialog_id, Some(id));
    }

    #[tokio::test]
    async fn start_dialog_for_missing_user_leaves_no_row() {
        let db = Database::open_in_memory().await.unwrap();
        let err = start_dialog(&db, UserId(9), DialogId::generate(), now())
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let count: i64 = db
            .connection()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM dialog", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn messages_without_current_dialog_are_not_found() {
        let db = db_with_user(1).await;
        let err = get_dialog_messages(&db, UserId(1), None).await.unwrap_err();
        assert!(matches!(
            err,
            ParleyError::NotFound {
                entity: parley_core::EntityKind::Dialog,
                ..
            }
        ));
        let err = set_dialog_messages(&db, UserId(1), Vec::new(), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn messages_round_trip_in_order() {
        let db = db_with_user(1).await;
        start_dialog(&db, UserId(1), DialogId::generate(), now())
            .await
            .unwrap();
        let messages = vec![
            DialogMessage::new("one", "1", now()),
            DialogMessage::new("two", "2", now()),
        ];
        set_dialog_messages(&db, UserId(1), messages.clone(), None)
            .await
            .unwrap();
        assert_eq!(
            get_dialog_messages(&db, UserId(1), None).await.unwrap(),
            messages
        );
    }
}
