mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{token, ADMIN, ALEX, SAM};

const ENABLED: &str = "/api/crud6/users/2/flag_enabled";

#[tokio::test]
async fn empty_body_toggles_the_flag() -> Result<()> {
    let app = common::app().await;
    let admin = token(ADMIN, "admin");

    let (status, body) = app.put(ENABLED, &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["record"]["flag_enabled"], false);
    assert!(body["data"]["record"].get("password").is_none());
    assert_eq!(app.user_field(ALEX, "flag_enabled").await, false);
    Ok(())
}

#[tokio::test]
async fn toggle_marker_twice_is_identity() -> Result<()> {
    let app = common::app().await;
    let admin = token(ADMIN, "admin");

    let (status, _) = app.put(ENABLED, &admin, Some(json!({ "toggle": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.user_field(ALEX, "flag_enabled").await, false);

    let (status, _) = app.put(ENABLED, &admin, Some(json!({ "toggle": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.user_field(ALEX, "flag_enabled").await, true);
    Ok(())
}

#[tokio::test]
async fn explicit_string_values_are_coerced_and_idempotent() -> Result<()> {
    let app = common::app().await;
    let admin = token(ADMIN, "admin");

    for _ in 0..2 {
        let (status, body) = app.put(ENABLED, &admin, Some(json!({ "flag_enabled": "0" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["record"]["flag_enabled"], false);
    }

    let (status, _) = app.put(ENABLED, &admin, Some(json!({ "flag_enabled": 1 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.user_field(ALEX, "flag_enabled").await, true);
    Ok(())
}

#[tokio::test]
async fn malformed_boolean_is_a_validation_error() -> Result<()> {
    let app = common::app().await;
    let admin = token(ADMIN, "admin");

    let (status, body) = app.put(ENABLED, &admin, Some(json!({ "flag_enabled": "maybe" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["flag_enabled"].is_string());
    assert_eq!(app.user_field(ALEX, "flag_enabled").await, true);
    Ok(())
}

#[tokio::test]
async fn plain_fields_pass_through() -> Result<()> {
    let app = common::app().await;
    let admin = token(ADMIN, "admin");

    let (status, body) = app
        .put("/api/crud6/users/2/first_name", &admin, Some(json!({ "first_name": "Alexandra" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["record"]["first_name"], "Alexandra");

    let (status, _) = app
        .put("/api/crud6/users/2/email", &admin, Some(json!({ "email": "not-an-email" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn readonly_fields_are_rejected() -> Result<()> {
    let app = common::app().await;
    let admin = token(ADMIN, "admin");

    let (status, _) = app
        .put("/api/crud6/users/2/password_last_set", &admin, Some(json!({ "password_last_set": null })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn unknown_names_and_records_are_not_found() -> Result<()> {
    let app = common::app().await;
    let admin = token(ADMIN, "admin");

    let (status, _) = app.put("/api/crud6/users/2/nickname", &admin, Some(json!({ "nickname": "al" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.put("/api/crud6/users/99/flag_enabled", &admin, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.put("/api/crud6/gadgets/1/flag_enabled", &admin, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn callers_without_permission_are_forbidden() -> Result<()> {
    let app = common::app().await;
    let sam = token(SAM, "sam");

    let (status, body) = app.put(ENABLED, &sam, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(app.user_field(ALEX, "flag_enabled").await, true);
    Ok(())
}

#[tokio::test]
async fn action_names_work_through_the_field_route() -> Result<()> {
    let app = common::app().await;
    let alex = token(ALEX, "alex");

    // alex holds update_user_field through Group Administrator
    let (status, body) = app.put("/api/crud6/users/3/toggle_enabled", &alex, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["record"]["flag_enabled"], true);
    Ok(())
}
