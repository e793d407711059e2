// PUT /api/root/tenant/:tenant/status - administrative status transition

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::gateway::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::{TenantRecord, TenantStatus};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TenantStatus,
}

/// Legal targets are ACTIVE, SUSPENDED, and DELETING, subject to the
/// transition table; requesting the current status is an idempotent no-op.
pub async fn tenant_update_status(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<TenantRecord> {
    let record = state.lifecycle.update_status(&tenant, req.status).await?;
    Ok(ApiResponse::success(record))
}
