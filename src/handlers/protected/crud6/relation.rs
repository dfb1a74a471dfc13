use axum::{
    extract::{Extension, Path},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::dispatch::RelateOp;
use crate::handlers::protected::load_record;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::types::RecordKey;

#[derive(Debug, Deserialize)]
pub struct RelateBody {
    pub related_ids: Vec<RecordKey>,
}

/// POST /api/crud6/:model/:id/:relation - Attach `related_ids`
pub async fn post(
    Path((model, id, relation)): Path<(String, String, String)>,
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<RelateBody>,
) -> ApiResult<Value> {
    relate(state, principal, model, id, relation, body, RelateOp::Attach).await
}

/// DELETE /api/crud6/:model/:id/:relation - Detach `related_ids`
pub async fn delete(
    Path((model, id, relation)): Path<(String, String, String)>,
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
    Json(body): Json<RelateBody>,
) -> ApiResult<Value> {
    relate(state, principal, model, id, relation, body, RelateOp::Detach).await
}

async fn relate(
    state: AppState,
    principal: Principal,
    model: String,
    id: String,
    relation: String,
    body: RelateBody,
    op: RelateOp,
) -> ApiResult<Value> {
    let (schema, record) = load_record(&state, &model, &id).await?;
    let changed = state
        .dispatcher
        .relate(&principal, &schema, &record, &relation, &body.related_ids, op)
        .await?;

    Ok(ApiResponse::success(json!({
        "operation": op,
        "relation": relation,
        "requested": body.related_ids.len(),
        "changed": changed,
    })))
}
