// Downstream service boundary. A service behind the gateway re-establishes
// its tenant context from the gateway-signed identity header alone; the
// signature is the trust boundary and the directory is not consulted on
// this path.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::auth::{InternalSigner, INTERNAL_IDENTITY_HEADER};
use crate::error::ApiError;
use crate::tenancy::context;

/// Re-establish the tenant context from the gateway's signed attachment.
/// Mount this on every tenant-scoped route of a downstream service.
pub async fn internal_context_middleware(
    State(signer): State<Arc<InternalSigner>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = headers
        .get(INTERNAL_IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing internal identity"))?;

    let ctx = signer.verify(token).map_err(ApiError::from)?;

    request.extensions_mut().insert(ctx.clone());
    context::scope(ctx, next.run(request)).await.map_err(ApiError::from)
}
