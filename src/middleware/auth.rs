// Edge Resolver middleware. Verifies the bearer token, resolves the tenant
// against the directory, and establishes the tenant context scope around the
// rest of the request. Any failure rejects before downstream dispatch.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::gateway::AppState;
use crate::tenancy::{context, TenancyError, TenantContext};

/// Signed internal identity for the current request, minted at the edge and
/// attached to anything forwarded downstream.
#[derive(Clone)]
pub struct InternalIdentity(pub String);

/// Authenticate a request and bind it to exactly one tenant. The context
/// scope wraps `next.run`, so every handler and every task it spawns with
/// inheritance sees the same ambient tenant until the response is produced.
pub async fn edge_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(&headers).map_err(ApiError::unauthorized)?;

    let claims = state.verifier.verify(&token).map_err(reject)?;

    // Status is re-checked against the directory on every new request, so a
    // suspension is honored within the cache staleness bound; in-flight
    // requests that already hold a context are allowed to complete.
    let record = state.directory.resolve(&claims.tenant_id).await.map_err(reject)?;

    let ctx = TenantContext::new(&record, &claims);
    let identity = state.signer.sign(&ctx).map_err(reject)?;

    tracing::debug!(
        "Resolved tenant '{}' (schema {}) for subject '{}'",
        ctx.tenant_id,
        ctx.schema_name,
        ctx.subject_id
    );

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(ctx.clone());
    request.extensions_mut().insert(InternalIdentity(identity));

    context::scope(ctx, next.run(request)).await.map_err(ApiError::from)
}

/// Authenticate the administrative surface: a valid bearer token carrying
/// the `root` role. Lifecycle administration operates on the directory
/// itself and runs outside any tenant data context.
pub async fn root_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(&headers).map_err(ApiError::unauthorized)?;
    let claims = state.verifier.verify(&token).map_err(ApiError::from)?;

    if !claims.has_role("root") {
        return Err(ApiError::forbidden("root role required"));
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Extract the bearer token from the Authorization header
fn extract_bearer(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty bearer token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// Resolution failures at the edge are authentication rejections, never
/// 404s; an unknown tenant id in a validly signed token reveals nothing
/// about which tenants exist.
fn reject(err: TenancyError) -> ApiError {
    if matches!(err, TenancyError::TenantNotFound(_)) {
        return ApiError::Coded {
            status: 403,
            code: err.code(),
            message: err.to_string(),
        };
    }
    err.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_token() {
        let headers = headers_with_auth("Bearer abc.def.ghi");
        assert_eq!(extract_bearer(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn rejects_missing_and_malformed_headers() {
        assert!(extract_bearer(&HeaderMap::new()).is_err());
        assert!(extract_bearer(&headers_with_auth("Basic dXNlcg==")).is_err());
        assert!(extract_bearer(&headers_with_auth("Bearer ")).is_err());
    }

    #[test]
    fn unknown_tenant_rejects_as_forbidden() {
        let err = reject(TenancyError::TenantNotFound("ghost_1".to_string()));
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.error_code(), "TENANT_NOT_FOUND");
    }
}
