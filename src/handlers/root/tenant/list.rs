// GET /api/root/tenant - list tenants (paged)

use axum::extract::{Query, State};
use serde::Deserialize;

use crate::gateway::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::{TenantRecord, TenantStatus};

#[derive(Debug, Deserialize)]
pub struct ListTenantsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<TenantStatus>,
}

pub async fn tenant_list(
    State(state): State<AppState>,
    Query(query): Query<ListTenantsQuery>,
) -> ApiResult<Vec<TenantRecord>> {
    let records = state
        .lifecycle
        .list(
            query.status,
            query.limit.unwrap_or(50),
            query.offset.unwrap_or(0),
        )
        .await?;
    Ok(ApiResponse::success(records))
}
