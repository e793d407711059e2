// Gateway assembly: shared state, route table, and the forwarding dispatch
// that carries signed tenant identity to downstream services.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{any, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth::{InternalSigner, TokenVerifier, INTERNAL_IDENTITY_HEADER};
use crate::config;
use crate::database::DatabaseManager;
use crate::error::ApiError;
use crate::handlers;
use crate::middleware::{edge_auth_middleware, root_auth_middleware, InternalIdentity};
use crate::tenancy::lifecycle::PgSchemaProvisioner;
use crate::tenancy::store::PgDirectoryStore;
use crate::tenancy::{
    DirectoryStore, SchemaProvisioner, TenantDirectory, TenantLifecycleManager,
};

/// Shared gateway state. Everything is Arc-backed so the state clones
/// cheaply into each request.
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<TenantDirectory>,
    pub lifecycle: Arc<TenantLifecycleManager>,
    pub verifier: Arc<TokenVerifier>,
    pub signer: Arc<InternalSigner>,
    pub http: reqwest::Client,
    pub downstreams: Arc<HashMap<String, String>>,
}

impl AppState {
    /// Assemble state over explicit backends. Tests and embedded setups use
    /// this directly with in-memory implementations.
    pub fn assemble(
        store: Arc<dyn DirectoryStore>,
        provisioner: Arc<dyn SchemaProvisioner>,
        downstreams: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let cfg = config::config();
        let directory = Arc::new(TenantDirectory::new(
            store.clone(),
            Duration::from_secs(cfg.directory.cache_ttl_secs),
        ));
        let lifecycle = Arc::new(TenantLifecycleManager::new(
            store,
            provisioner,
            directory.clone(),
        ));
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.gateway.forward_timeout_secs))
            .build()?;

        Ok(Self {
            directory,
            lifecycle,
            verifier: Arc::new(TokenVerifier::from_config()?),
            signer: Arc::new(InternalSigner::from_config()?),
            http,
            downstreams: Arc::new(downstreams),
        })
    }
}

/// Production state: Postgres-backed directory store and provisioner over
/// the shared platform database.
pub async fn build_state() -> Result<AppState, anyhow::Error> {
    let pool = DatabaseManager::registry_pool().await?;
    let store: Arc<dyn DirectoryStore> = Arc::new(PgDirectoryStore::new(pool.clone()));
    let provisioner: Arc<dyn SchemaProvisioner> = Arc::new(PgSchemaProvisioner::new(pool));
    AppState::assemble(store, provisioner, config::config().gateway.downstreams.clone())
}

/// Build the gateway router.
pub fn app(state: AppState) -> Router {
    use crate::handlers::root::tenant;

    // Administrative surface: lifecycle management, root role required.
    let admin = Router::new()
        .route(
            "/api/root/tenant",
            post(tenant::tenant_create).get(tenant::tenant_list),
        )
        .route(
            "/api/root/tenant/:tenant",
            get(tenant::tenant_show)
                .put(tenant::tenant_update)
                .delete(tenant::tenant_delete),
        )
        .route(
            "/api/root/tenant/:tenant/status",
            put(tenant::tenant_update_status),
        )
        .route(
            "/api/root/tenant/:tenant/exists",
            get(tenant::tenant_exists),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            root_auth_middleware,
        ));

    // Tenant-scoped surface: context established at the edge.
    let protected = Router::new()
        .route("/api/auth/whoami", get(handlers::auth::whoami))
        .route("/gw/:service/*rest", any(forward))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            edge_auth_middleware,
        ));

    let mut router = Router::new()
        .route("/", get(root_banner))
        .route("/health", get(health))
        .merge(admin)
        .merge(protected);

    if config::config().security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Run the gateway server.
pub async fn serve(port: u16) -> Result<(), anyhow::Error> {
    let state = build_state().await?;
    let app = app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Atrium gateway listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Forward a tenant-scoped request to a named downstream service. The
/// client's Authorization header is not propagated; the gateway-signed
/// internal identity is the only identity downstream sees.
pub async fn forward(
    State(state): State<AppState>,
    Path((service, rest)): Path<(String, String)>,
    request: Request,
) -> Result<Response, ApiError> {
    let base = state
        .downstreams
        .get(&service)
        .ok_or_else(|| ApiError::not_found(format!("unknown downstream service '{}'", service)))?
        .clone();

    let identity = request
        .extensions()
        .get::<InternalIdentity>()
        .cloned()
        .ok_or_else(|| ApiError::internal_server_error("internal identity not established"))?;

    let (parts, body) = request.into_parts();
    let max_body = config::config().gateway.max_forward_body_bytes;
    let bytes = axum::body::to_bytes(body, max_body)
        .await
        .map_err(|_| ApiError::bad_request("request body too large"))?;

    let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
        .map_err(|_| ApiError::bad_request("unsupported method"))?;

    let mut url = format!("{}/{}", base, rest);
    if let Some(query) = parts.uri.query() {
        url.push('?');
        url.push_str(query);
    }

    let mut outbound = state
        .http
        .request(method, &url)
        .header(INTERNAL_IDENTITY_HEADER, identity.0)
        .body(bytes.to_vec());
    if let Some(content_type) = parts
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
    {
        outbound = outbound.header("content-type", content_type);
    }

    let upstream = outbound.send().await.map_err(|e| {
        tracing::error!("Forward to '{}' failed: {}", service, e);
        ApiError::bad_gateway(format!("downstream service '{}' unavailable", service))
    })?;

    let status = StatusCode::from_u16(upstream.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = upstream
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = upstream
        .bytes()
        .await
        .map_err(|e| ApiError::bad_gateway(e.to_string()))?;

    let mut builder = Response::builder().status(status);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    builder
        .body(Body::from(body))
        .map_err(|e| ApiError::internal_server_error(e.to_string()))
}

async fn root_banner() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Atrium Gateway",
            "version": version,
            "description": "Multi-tenant edge gateway for the Atrium platform",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "whoami": "/api/auth/whoami (tenant-scoped)",
                "forward": "/gw/:service/*path (tenant-scoped)",
                "root": "/api/root/tenant[...] (restricted, requires root role)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.directory.ping().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "directory": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "directory unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "directory_error": e.to_string()
                }
            })),
        ),
    }
}
