// GET /api/root/tenant/:tenant/exists

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::gateway::AppState;
use crate::middleware::{ApiResponse, ApiResult};

pub async fn tenant_exists(
    State(state): State<AppState>,
    Path(tenant): Path<String>,
) -> ApiResult<Value> {
    let exists = state.lifecycle.exists(&tenant).await?;
    Ok(ApiResponse::success(json!({
        "tenant_id": tenant,
        "exists": exists,
    })))
}
