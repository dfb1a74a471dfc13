use axum::{
    extract::{Extension, Path},
    Json,
};
use serde_json::Value;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::handlers::protected::load_record;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

use super::outcome_body;

/// POST /api/crud6/:model/:id/a/:action - Run a schema-declared action
pub async fn post(
    Path((model, id, action)): Path<(String, String, String)>,
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    let payload = body.map(|Json(v)| v).unwrap_or_else(|| Value::Object(Default::default()));
    let (schema, record) = load_record(&state, &model, &id).await?;

    // Only action keys here; field names go through PUT
    if schema.action(&action).is_none() {
        return Err(ApiError::not_found(format!(
            "Action '{}' not found on '{}'",
            action, model
        )));
    }

    let outcome = state
        .dispatcher
        .dispatch(&principal, &schema, &record, &action, &payload)
        .await?;

    Ok(ApiResponse::success(outcome_body(outcome)))
}
