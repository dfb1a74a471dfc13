use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use serde_json::Value;

use crate::actions::password_reset::ACTION_KEY;
use crate::auth::Principal;
use crate::filter::Page;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

use super::crud6::outcome_body;
use super::{load_record, provenance_page};

/// GET /api/users/:id/permissions - Permissions a user holds, with the roles granting each
pub async fn permissions_get(
    Path(id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Page> {
    let page = provenance_page(&state, &principal, "users", &id, "permissions", &params).await?;
    Ok(ApiResponse::success(page))
}

/// POST /api/users/:id/password-reset - Force a password change at next login
pub async fn password_reset_post(
    Path(id): Path<String>,
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    let payload = body.map(|Json(v)| v).unwrap_or_else(|| Value::Object(Default::default()));
    let (schema, record) = load_record(&state, "users", &id).await?;
    let outcome = state
        .dispatcher
        .dispatch(&principal, &schema, &record, ACTION_KEY, &payload)
        .await?;
    Ok(ApiResponse::success(outcome_body(outcome)))
}
