// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Behavioural checks every [`DialogStore`] must pass.
//!
//! Each check takes an initialized store, works on freshly generated user
//! ids, and panics on the first violated expectation. Backends call
//! [`run_all`] from their integration tests, or individual checks when a
//! failure needs isolating.

use chrono::{DateTime, Utc};
use tracing::debug;

use parley_core::types::now;
use parley_core::{
    AttributeValue, DialogId, DialogMessage, DialogStore, EntityKind, NewUser, ParleyError,
    UserId,
};

/// A user id unlikely to collide with other runs against a shared database.
pub fn unique_user_id() -> UserId {
    let bits = uuid::Uuid::new_v4().as_u128() as u64;
    UserId((bits >> 1) as i64)
}

/// Create a user with a fresh id and return the id.
pub async fn seeded_user(store: &dyn DialogStore) -> UserId {
    let id = unique_user_id();
    store
        .create_user(&NewUser::new(id, id.0).with_username("contract"))
        .await
        .expect("create_user");
    id
}

fn sample_messages(n: usize) -> Vec<DialogMessage> {
    (0..n)
        .map(|i| DialogMessage::new(format!("question {i}"), format!("answer {i}"), now()))
        .collect()
}

/// Messages whose dates carry sub-millisecond digits, built without the
/// truncating constructor.
fn precise_messages(n: usize) -> Vec<DialogMessage> {
    (0..n)
        .map(|i| DialogMessage {
            user: format!("question {i}"),
            bot: format!("answer {i}"),
            date: DateTime::from_timestamp(1_767_225_600 + i as i64, 123_456_789)
                .expect("valid timestamp"),
        })
        .collect()
}

fn assert_user_not_found<T: std::fmt::Debug>(result: Result<T, ParleyError>, op: &str) {
    match result {
        Err(ParleyError::NotFound {
            entity: EntityKind::User,
            ..
        }) => {}
        other => panic!("{op}: expected user NotFound, got {other:?}"),
    }
}

fn assert_dialog_not_found<T: std::fmt::Debug>(result: Result<T, ParleyError>, op: &str) {
    match result {
        Err(ParleyError::NotFound {
            entity: EntityKind::Dialog,
            ..
        }) => {}
        other => panic!("{op}: expected dialog NotFound, got {other:?}"),
    }
}

/// Creating a user twice leaves one record with the first call's fields.
pub async fn create_user_is_idempotent(store: &dyn DialogStore) {
    let id = unique_user_id();
    store
        .create_user(&NewUser::new(id, 1).with_username("first").with_name("A", "B"))
        .await
        .expect("first create");
    store
        .create_user(&NewUser::new(id, 2).with_username("second").with_name("C", "D"))
        .await
        .expect("second create");

    let user = store.get_user(id).await.expect("get_user");
    assert_eq!(user.chat_id, 1);
    assert_eq!(user.username, "first");
    assert_eq!(user.first_name, "A");
    assert_eq!(user.last_name, "B");
}

/// A new user carries every built-in field with its default.
pub async fn new_user_has_defaults(store: &dyn DialogStore) {
    let before = now();
    let id = seeded_user(store).await;
    let user = store.get_user(id).await.expect("get_user");

    assert_eq!(user.id, id);
    assert_eq!(user.current_dialog_id, None);
    assert_eq!(user.current_chat_mode, parley_core::DEFAULT_CHAT_MODE);
    assert_eq!(user.n_used_tokens, 0);
    assert!(user.first_seen >= before);
    assert_eq!(user.first_seen, user.last_interaction);

    for key in ["chat_id", "username", "first_seen", "current_chat_mode", "n_used_tokens"] {
        store
            .get_attribute(id, key)
            .await
            .unwrap_or_else(|e| panic!("built-in {key} should be readable: {e}"));
    }
    assert_eq!(
        store.get_attribute(id, "current_dialog_id").await.expect("current_dialog_id"),
        AttributeValue::Null
    );
}

/// `user_exists` and `ensure_user_exists` agree with creation.
pub async fn existence_checks(store: &dyn DialogStore) {
    let id = unique_user_id();
    assert!(!store.user_exists(id).await.expect("user_exists"));
    assert_user_not_found(store.ensure_user_exists(id).await, "ensure_user_exists");

    store.create_user(&NewUser::new(id, 0)).await.expect("create_user");
    assert!(store.user_exists(id).await.expect("user_exists"));
    store.ensure_user_exists(id).await.expect("ensure_user_exists");
}

/// Every operation except creation fails with `NotFound` for an unknown user.
pub async fn unknown_user_is_not_found(store: &dyn DialogStore) {
    let id = unique_user_id();
    assert_user_not_found(store.get_user(id).await, "get_user");
    assert_user_not_found(store.start_dialog(id).await, "start_dialog");
    assert_user_not_found(store.get_attribute(id, "n_used_tokens").await, "get_attribute");
    assert_user_not_found(
        store.get_attribute(id, "custom_key").await,
        "get_attribute(custom)",
    );
    assert_user_not_found(
        store.set_attribute(id, "n_used_tokens", 1i64.into()).await,
        "set_attribute",
    );
    assert_user_not_found(
        store.set_attribute(id, "custom_key", true.into()).await,
        "set_attribute(custom)",
    );
    assert_user_not_found(store.get_dialog_messages(id, None).await, "get_dialog_messages");
    assert_user_not_found(
        store.set_dialog_messages(id, &[], None).await,
        "set_dialog_messages",
    );
    assert!(!store.user_exists(id).await.expect("user_exists"));
}

/// A started dialog becomes current and has no messages.
pub async fn start_dialog_becomes_current(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    let dialog_id = store.start_dialog(id).await.expect("start_dialog");

    let current = store
        .get_attribute(id, "current_dialog_id")
        .await
        .expect("current_dialog_id");
    assert_eq!(current.as_dialog_id(), Some(dialog_id.clone()));
    assert!(store
        .get_dialog_messages(id, None)
        .await
        .expect("messages")
        .is_empty());
    assert!(store
        .get_dialog_messages(id, Some(&dialog_id))
        .await
        .expect("messages by id")
        .is_empty());
}

/// Message lists round-trip in order, for empty and multi-element inputs.
pub async fn dialog_messages_round_trip(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    store.start_dialog(id).await.expect("start_dialog");

    let messages = sample_messages(3);
    store
        .set_dialog_messages(id, &messages, None)
        .await
        .expect("set three");
    assert_eq!(store.get_dialog_messages(id, None).await.expect("get"), messages);

    store
        .set_dialog_messages(id, &[], None)
        .await
        .expect("set empty");
    assert!(store.get_dialog_messages(id, None).await.expect("get").is_empty());

    let single = sample_messages(1);
    store
        .set_dialog_messages(id, &single, None)
        .await
        .expect("set one");
    assert_eq!(store.get_dialog_messages(id, None).await.expect("get"), single);

    // Both backends keep message dates to the millisecond.
    let precise = precise_messages(2);
    store
        .set_dialog_messages(id, &precise, None)
        .await
        .expect("set precise");
    let expected: Vec<DialogMessage> = precise.iter().map(DialogMessage::normalized).collect();
    assert_eq!(store.get_dialog_messages(id, None).await.expect("get"), expected);
}

/// Earlier dialogs stay addressable by id after a new one starts.
pub async fn historical_dialogs_stay_addressable(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    let first = store.start_dialog(id).await.expect("first dialog");
    let old = sample_messages(2);
    store
        .set_dialog_messages(id, &old, None)
        .await
        .expect("fill first");

    let second = store.start_dialog(id).await.expect("second dialog");
    assert_ne!(first, second);
    assert!(store.get_dialog_messages(id, None).await.expect("current").is_empty());
    assert_eq!(
        store.get_dialog_messages(id, Some(&first)).await.expect("by id"),
        old
    );

    let replaced = sample_messages(1);
    store
        .set_dialog_messages(id, &replaced, Some(&first))
        .await
        .expect("write old dialog");
    assert_eq!(
        store.get_dialog_messages(id, Some(&first)).await.expect("by id"),
        replaced
    );
    assert!(store.get_dialog_messages(id, None).await.expect("current").is_empty());
}

/// Dialogs of another user, unknown ids, and a missing current dialog
/// all resolve to a dialog `NotFound`.
pub async fn dialog_resolution_failures(store: &dyn DialogStore) {
    let owner = seeded_user(store).await;
    let other = seeded_user(store).await;

    assert_dialog_not_found(store.get_dialog_messages(other, None).await, "no current (get)");
    assert_dialog_not_found(
        store.set_dialog_messages(other, &sample_messages(1), None).await,
        "no current (set)",
    );

    let owned = store.start_dialog(owner).await.expect("start_dialog");
    assert_dialog_not_found(
        store.get_dialog_messages(other, Some(&owned)).await,
        "foreign (get)",
    );
    assert_dialog_not_found(
        store
            .set_dialog_messages(other, &sample_messages(1), Some(&owned))
            .await,
        "foreign (set)",
    );
    assert!(store
        .get_dialog_messages(owner, Some(&owned))
        .await
        .expect("owner still reads")
        .is_empty());

    let bogus = DialogId::generate();
    assert_dialog_not_found(
        store.get_dialog_messages(owner, Some(&bogus)).await,
        "unknown (get)",
    );
    assert_dialog_not_found(
        store.set_dialog_messages(owner, &[], Some(&bogus)).await,
        "unknown (set)",
    );

    // Pointing the user at nothing leaves no current dialog.
    store
        .set_attribute(owner, "current_dialog_id", AttributeValue::Null)
        .await
        .expect("clear current dialog");
    assert_dialog_not_found(store.get_dialog_messages(owner, None).await, "cleared (get)");
}

/// Reading a key that was never written fails with `AttributeNotSet`.
pub async fn missing_attribute_is_not_set(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    match store.get_attribute(id, "nonexistent_key").await {
        Err(err) if err.is_attribute_not_set() => {}
        other => panic!("expected AttributeNotSet, got {other:?}"),
    }
}

/// `n_used_tokens` round-trips for zero and large counters.
pub async fn token_counter_round_trip(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    for value in [0_i64, 1, 4_294_967_296, i64::MAX] {
        store
            .set_attribute(id, "n_used_tokens", value.into())
            .await
            .expect("set n_used_tokens");
        assert_eq!(
            store.get_attribute(id, "n_used_tokens").await.expect("get"),
            AttributeValue::Integer(value)
        );
    }
    assert_eq!(store.get_user(id).await.expect("get_user").n_used_tokens, i64::MAX);
}

/// Free-form attributes keep their type and can be overwritten.
pub async fn custom_attributes_round_trip(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    let at: DateTime<Utc> = now();
    let cases = [
        ("current_model", AttributeValue::Text("gpt-4".into())),
        ("n_generated_images", AttributeValue::Integer(3)),
        ("n_transcribed_seconds", AttributeValue::Float(12.5)),
        ("is_admin", AttributeValue::Bool(true)),
        ("last_payment", AttributeValue::Timestamp(at)),
        ("referrer", AttributeValue::Null),
    ];

    for (key, value) in &cases {
        store
            .set_attribute(id, key, value.clone())
            .await
            .unwrap_or_else(|e| panic!("set {key}: {e}"));
    }
    for (key, value) in &cases {
        let read = store
            .get_attribute(id, key)
            .await
            .unwrap_or_else(|e| panic!("get {key}: {e}"));
        assert_eq!(&read, value, "attribute {key}");
    }

    store
        .set_attribute(id, "current_model", "gpt-3.5-turbo".into())
        .await
        .expect("overwrite");
    assert_eq!(
        store.get_attribute(id, "current_model").await.expect("get"),
        AttributeValue::Text("gpt-3.5-turbo".into())
    );
}

/// Built-in fields are writable and timestamps come back at millisecond precision.
pub async fn builtin_fields_are_writable(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    store
        .set_attribute(id, "current_chat_mode", "code_assistant".into())
        .await
        .expect("set chat mode");

    let precise = DateTime::from_timestamp(1_767_225_600, 123_456_789).expect("valid timestamp");
    store
        .set_attribute(id, "last_interaction", precise.into())
        .await
        .expect("set last_interaction");

    let user = store.get_user(id).await.expect("get_user");
    assert_eq!(user.current_chat_mode, "code_assistant");
    assert_eq!(user.last_interaction.timestamp(), precise.timestamp());
    assert_eq!(user.last_interaction.timestamp_subsec_nanos(), 123_000_000);
}

/// Identity and operator-like keys are rejected before touching storage.
pub async fn reserved_keys_are_rejected(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    for key in ["_id", "id", "$set", "a.b", ""] {
        match store.set_attribute(id, key, 1i64.into()).await {
            Err(ParleyError::InvalidAttribute { .. }) => {}
            other => panic!("set {key:?}: expected InvalidAttribute, got {other:?}"),
        }
        match store.get_attribute(id, key).await {
            Err(ParleyError::InvalidAttribute { .. }) => {}
            other => panic!("get {key:?}: expected InvalidAttribute, got {other:?}"),
        }
    }
}

/// NaN and infinities are refused, and the user's other attributes stay
/// readable and writable afterwards.
pub async fn non_finite_floats_are_rejected(store: &dyn DialogStore) {
    let id = seeded_user(store).await;
    store
        .set_attribute(id, "current_model", "gpt-4".into())
        .await
        .expect("set current_model");

    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        match store.set_attribute(id, "ratio", AttributeValue::Float(value)).await {
            Err(ParleyError::InvalidAttribute { .. }) => {}
            other => panic!("set ratio={value}: expected InvalidAttribute, got {other:?}"),
        }
    }

    assert_eq!(
        store.get_attribute(id, "current_model").await.expect("get current_model"),
        AttributeValue::Text("gpt-4".into())
    );
    match store.get_attribute(id, "ratio").await {
        Err(ParleyError::AttributeNotSet { .. }) => {}
        other => panic!("get ratio: expected AttributeNotSet, got {other:?}"),
    }
    store
        .set_attribute(id, "ratio", AttributeValue::Float(0.5))
        .await
        .expect("set finite ratio");
}

/// The store reports healthy once initialized.
pub async fn reports_healthy(store: &dyn DialogStore) {
    let status = store.health_check().await.expect("health_check");
    assert_eq!(status, parley_core::HealthStatus::Healthy);
}

/// Run every check in sequence.
pub async fn run_all(store: &dyn DialogStore) {
    debug!(backend = store.name(), "running dialog store contract");
    reports_healthy(store).await;
    create_user_is_idempotent(store).await;
    new_user_has_defaults(store).await;
    existence_checks(store).await;
    unknown_user_is_not_found(store).await;
    start_dialog_becomes_current(store).await;
    dialog_messages_round_trip(store).await;
    historical_dialogs_stay_addressable(store).await;
    dialog_resolution_failures(store).await;
    missing_attribute_is_not_set(store).await;
    token_counter_round_trip(store).await;
    custom_attributes_round_trip(store).await;
    builtin_fields_are_writable(store).await;
    reserved_keys_are_rejected(store).await;
    non_finite_floats_are_rejected(store).await;
}
