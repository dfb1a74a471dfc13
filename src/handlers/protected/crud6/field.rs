use axum::{
    extract::{Extension, Path},
    Json,
};
use serde_json::Value;

use crate::auth::Principal;
use crate::handlers::protected::load_record;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

use super::outcome_body;

/// PUT /api/crud6/:model/:id/:name - Update one field, or run the action named `name`
///
/// Body: `{ "<field>": <value> }`, `{ "toggle": true }`, or empty to toggle a
/// boolean toggle field.
pub async fn put(
    Path((model, id, name)): Path<(String, String, String)>,
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    body: Option<Json<Value>>,
) -> ApiResult<Value> {
    let payload = body.map(|Json(v)| v).unwrap_or_else(|| Value::Object(Default::default()));
    let (schema, record) = load_record(&state, &model, &id).await?;

    let outcome = state
        .dispatcher
        .dispatch(&principal, &schema, &record, &name, &payload)
        .await?;

    Ok(ApiResponse::success(outcome_body(outcome)))
}
