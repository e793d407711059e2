// GET /api/root/tenant/:tenant - show one tenant record

use axum::extract::{Path, State};

use crate::gateway::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::TenantRecord;

/// Returns the record in any status, DELETED included; the directory keeps
/// retired rows for audit history.
pub async fn tenant_show(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> ApiResult<TenantRecord> {
    let record = state.lifecycle.get(&tenant).await?;
    Ok(ApiResponse::success(record))
}
