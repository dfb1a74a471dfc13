#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use c6admin_api::actions::ActionRegistry;
use c6admin_api::auth::{generate_jwt, Claims};
use c6admin_api::database::MemoryStore;
use c6admin_api::handlers::{router, AppState};
use c6admin_api::schema::FileSchemaLoader;
use c6admin_api::types::RecordKey;

pub const ADMIN: i64 = 1;
pub const ALEX: i64 = 2;
pub const SAM: i64 = 3;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

fn user(id: i64, user_name: &str, first_name: &str, enabled: bool) -> Value {
    json!({
        "id": id,
        "user_name": user_name,
        "first_name": first_name,
        "last_name": "Tester",
        "email": format!("{}@example.com", user_name),
        "locale": "en_US",
        "group_id": null,
        "flag_verified": true,
        "flag_enabled": enabled,
        "password": "$2y$10$hash",
        "password_last_set": "2024-01-01T00:00:00Z",
        "created_at": "2024-01-01T00:00:00Z"
    })
}

/// Users, roles and permissions:
///
/// - admin (1): Site Administrator, User
/// - alex (2): User, Group Administrator
/// - sam (3): no roles
///
/// Site Administrator grants update_user_field, uri_user, uri_permissions,
/// delete_user; User grants uri_user; Group Administrator grants
/// update_user_field and uri_user.
pub async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let rows = store
        .seed(json!({
            "users": [
                user(ADMIN, "admin", "Ada", true),
                user(ALEX, "alex", "Alex", true),
                user(SAM, "sam", "Sam", false),
            ],
            "roles": [
                { "id": 1, "slug": "site-admin", "name": "Site Administrator", "description": "" },
                { "id": 2, "slug": "user", "name": "User", "description": "" },
                { "id": 3, "slug": "group-admin", "name": "Group Administrator", "description": "" }
            ],
            "permissions": [
                { "id": 10, "slug": "update_user_field", "name": "Edit user field", "conditions": "always()", "description": "" },
                { "id": 11, "slug": "uri_user", "name": "View users", "conditions": "always()", "description": "" },
                { "id": 12, "slug": "uri_permissions", "name": "View permissions", "conditions": "always()", "description": "" },
                { "id": 13, "slug": "delete_user", "name": "Delete user", "conditions": "always()", "description": "" },
                { "id": 14, "slug": "view_system_info", "name": "View system info", "conditions": "always()", "description": "" }
            ],
            "role_users": [
                { "user_id": 1, "role_id": 1 },
                { "user_id": 1, "role_id": 2 },
                { "user_id": 2, "role_id": 2 },
                { "user_id": 2, "role_id": 3 }
            ],
            "permission_roles": [
                { "role_id": 1, "permission_id": 10 },
                { "role_id": 1, "permission_id": 11 },
                { "role_id": 1, "permission_id": 12 },
                { "role_id": 1, "permission_id": 13 },
                { "role_id": 2, "permission_id": 11 },
                { "role_id": 3, "permission_id": 10 },
                { "role_id": 3, "permission_id": 11 }
            ]
        }))
        .await;
    assert_eq!(rows, 22);
    store
}

pub fn schema_loader() -> FileSchemaLoader {
    FileSchemaLoader::new(vec![PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schema/crud6")], true)
}

pub async fn app() -> TestApp {
    let store = Arc::new(seeded_store().await);
    let state = AppState::new(Arc::new(schema_loader()), store.clone(), ActionRegistry::with_defaults());
    TestApp {
        router: router(state),
        store,
    }
}

pub fn token(user_id: i64, user_name: &str) -> String {
    generate_jwt(Claims::new(&RecordKey::Int(user_id), user_name.to_string(), "user".to_string()))
        .expect("development config carries a JWT secret")
}

impl TestApp {
    /// Send one request through the router; returns status and parsed JSON body
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(token), body).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(token), body).await
    }

    pub async fn user_field(&self, id: i64, field: &str) -> Value {
        self.store
            .get("users", "id", &RecordKey::Int(id))
            .await
            .and_then(|row| row.get(field).cloned())
            .unwrap_or(Value::Null)
    }
}

/// Values of `column` across the rows of a list response
pub fn column(body: &Value, column: &str) -> Vec<Value> {
    body["data"]["rows"]
        .as_array()
        .map(|rows| rows.iter().map(|r| r[column].clone()).collect())
        .unwrap_or_default()
}
