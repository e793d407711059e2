// DELETE /api/root/tenant/:tenant - retire a tenant

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use crate::gateway::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::TenantRecord;

#[derive(Debug, Deserialize)]
pub struct DeleteTenantQuery {
    pub drop_schema: Option<bool>,
}

/// Moves the record to DELETING, optionally drops the physical schema, then
/// marks DELETED. A failed drop leaves the record DELETING; repeating the
/// call retries the drop.
pub async fn tenant_delete(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Query(query): Query<DeleteTenantQuery>,
) -> ApiResult<TenantRecord> {
    let record = state
        .lifecycle
        .delete(&tenant, query.drop_schema.unwrap_or(false))
        .await?;
    Ok(ApiResponse::success(record))
}
