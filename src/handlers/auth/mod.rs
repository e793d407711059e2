use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::{context, TenancyError, TenantContext};

/// GET /api/auth/whoami - the caller's established tenant context.
/// Reads the ambient carrier rather than request extensions, so it also
/// proves the context scope is live for this request.
pub async fn whoami() -> ApiResult<TenantContext> {
    let ctx = context::current().ok_or(TenancyError::MissingTenantContext)?;
    Ok(ApiResponse::success(ctx))
}
