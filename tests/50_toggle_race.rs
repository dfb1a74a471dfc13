mod common;

use std::sync::Arc;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use c6admin_api::actions::ActionRegistry;
use c6admin_api::auth::Principal;
use c6admin_api::database::{RecordStore, StoreError};
use c6admin_api::dispatch::{DispatchError, Dispatcher};
use c6admin_api::schema::SchemaLoader;
use c6admin_api::types::RecordKey;

use common::{token, ADMIN, ALEX};

#[tokio::test]
async fn concurrent_toggles_from_one_snapshot_apply_once() -> Result<()> {
    let store = Arc::new(common::seeded_store().await);
    let dispatcher = Dispatcher::new(store.clone(), store.clone(), ActionRegistry::with_defaults());
    let schema = common::schema_loader().get_schema("users").await?;
    let record = store.find(&schema, &RecordKey::Int(ALEX)).await?;
    let root = Principal::root(ADMIN, "admin");
    let empty = json!({});

    let (a, b) = futures::join!(
        dispatcher.dispatch(&root, &schema, &record, "flag_enabled", &empty),
        dispatcher.dispatch(&root, &schema, &record, "flag_enabled", &empty),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(DispatchError::Delegated(StoreError::Conflict(_))))));

    let fresh = store.find(&schema, &RecordKey::Int(ALEX)).await?;
    assert_eq!(fresh.get("flag_enabled"), Some(&json!(false)));
    Ok(())
}

#[tokio::test]
async fn concurrent_http_toggles_never_lose_an_update() -> Result<()> {
    let app = common::app().await;
    let admin = token(ADMIN, "admin");
    let uri = "/api/crud6/users/2/flag_enabled";

    let (a, b) = futures::join!(app.put(uri, &admin, None), app.put(uri, &admin, None));

    let statuses = [a.0, b.0];
    assert!(statuses.iter().all(|s| *s == StatusCode::OK || *s == StatusCode::CONFLICT));
    let applied = statuses.iter().filter(|s| **s == StatusCode::OK).count();
    assert!(applied >= 1);

    // Each applied toggle flips the flag exactly once
    let expected = applied % 2 == 0;
    assert_eq!(app.user_field(ALEX, "flag_enabled").await, Value::Bool(expected));
    Ok(())
}
