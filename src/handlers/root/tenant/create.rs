// POST /api/root/tenant - provision a new tenant

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::gateway::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::TenantRecord;

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub display_name: Option<String>,
}

/// Provisions the tenant record, its schema, and seed objects as one unit;
/// the response carries an ACTIVE record, and a failed attempt surfaces
/// TENANT_PROVISIONING_FAILED with the record retired as DELETED.
pub async fn tenant_create(
    State(state): State<AppState>,
    Json(req): Json<CreateTenantRequest>,
) -> ApiResult<TenantRecord> {
    let record = state
        .lifecycle
        .create(&req.name, req.display_name.as_deref())
        .await?;
    Ok(ApiResponse::created(record))
}
