// PUT /api/root/tenant/:tenant - update mutable tenant fields

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::gateway::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::TenantRecord;

#[derive(Debug, Deserialize)]
pub struct UpdateTenantRequest {
    pub display_name: String,
}

/// Only the display name is mutable; tenant_id and schema_name are fixed at
/// creation, and status changes go through the status endpoint.
pub async fn tenant_update(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(req): Json<UpdateTenantRequest>,
) -> ApiResult<TenantRecord> {
    let record = state
        .lifecycle
        .update_display_name(&tenant, &req.display_name)
        .await?;
    Ok(ApiResponse::success(record))
}
