mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let app = common::app().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["database"], "memory");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_token() -> Result<()> {
    let app = common::app().await;

    let (status, body) = app.send(Method::PUT, "/api/crud6/users/2/flag_enabled", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error_code"], "UNAUTHORIZED");

    let (status, _) = app.get("/api/users/1/permissions", "not-a-jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing changed
    assert_eq!(app.user_field(common::ALEX, "flag_enabled").await, true);
    Ok(())
}
