use axum::extract::{Extension, Path, Query};

use crate::auth::Principal;
use crate::filter::Page;
use crate::handlers::AppState;
use crate::middleware::{ApiResponse, ApiResult};

use super::provenance_page;

/// GET /api/permissions/:id/users - Users holding a permission, with the roles granting it
pub async fn users_get(
    Path(id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    Extension(state): Extension<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Page> {
    let page = provenance_page(&state, &principal, "permissions", &id, "users", &params).await?;
    Ok(ApiResponse::success(page))
}
