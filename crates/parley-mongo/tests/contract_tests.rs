// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The shared dialog store contract, run against a live MongoDB server.
//!
//! Ignored by default. Run with
//! `PARLEY_TEST_MONGODB_URI=mongodb://localhost:27017 cargo test -p parley-mongo -- --ignored`.

use parley_config::MongoConfig;
use parley_core::{DialogStore, HealthStatus, PluginAdapter};
use parley_mongo::MongoStorage;
use parley_test_utils::contract;

const URI_ENV: &str = "PARLEY_TEST_MONGODB_URI";

async fn open_store() -> MongoStorage {
    let uri = std::env::var(URI_ENV)
        .unwrap_or_else(|_| panic!("{URI_ENV} must point at a disposable MongoDB server"));
    let storage = MongoStorage::new(MongoConfig {
        uri,
        database_name: format!("parley_test_{}", database_suffix()),
    });
    storage.initialize().await.unwrap();
    storage
}

fn database_suffix() -> String {
    contract::unique_user_id().0.unsigned_abs().to_string()
}

#[tokio::test]
#[ignore = "requires a MongoDB server"]
async fn mongo_satisfies_dialog_store_contract() {
    let store = open_store().await;
    contract::run_all(&store).await;
    store.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a MongoDB server"]
async fn dialog_snapshots_chat_mode_at_start() {
    let store = open_store().await;
    let id = contract::seeded_user(&store).await;

    let first = store.start_dialog(id).await.unwrap();
    store
        .set_attribute(id, "current_chat_mode", "artist".into())
        .await
        .unwrap();
    let second = store.start_dialog(id).await.unwrap();

    assert_eq!(store.get_dialog(id, Some(&first)).await.unwrap().chat_mode, "assistant");
    assert_eq!(store.get_dialog(id, Some(&second)).await.unwrap().chat_mode, "artist");
    store.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a MongoDB server"]
async fn closed_store_rejects_operations() {
    let store = open_store().await;
    assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    store.close().await.unwrap();
    assert!(store.user_exists(contract::unique_user_id()).await.is_err());
}
