use axum::extract::{Extension, Path, Query};

use crate::auth::Principal;
use crate::filter::Page;
use crate::handlers::protected::provenance_page;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/crud6/:model/:id/:relation/via - Targets of a two-hop relation,
/// each with the intermediates that link it to the owner
pub async fn get(
    Path((model, id, relation)): Path<(String, String, String)>,
    Query(params): Query<Vec<(String, String)>>,
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Page> {
    let page = provenance_page(&state, &principal, &model, &id, &relation, &params).await?;
    Ok(ApiResponse::success(page))
}
