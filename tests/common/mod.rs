#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use atrium_gateway::gateway::{app, AppState};
use atrium_gateway::tenancy::lifecycle::MemorySchemaProvisioner;
use atrium_gateway::tenancy::store::MemoryDirectoryStore;
use atrium_gateway::tenancy::{DirectoryStore, SchemaProvisioner, TenantRecord};

/// In-process gateway over in-memory backends. No database required; the
/// Postgres store and provisioner implement the same seams.
pub struct TestHarness {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<MemoryDirectoryStore>,
    pub provisioner: Arc<MemorySchemaProvisioner>,
}

pub fn harness() -> TestHarness {
    harness_with_downstreams(HashMap::new())
}

pub fn harness_with_downstreams(downstreams: HashMap<String, String>) -> TestHarness {
    let store = Arc::new(MemoryDirectoryStore::new());
    let provisioner = Arc::new(MemorySchemaProvisioner::new());
    let state = AppState::assemble(
        store.clone() as Arc<dyn DirectoryStore>,
        provisioner.clone() as Arc<dyn SchemaProvisioner>,
        downstreams,
    )
    .expect("failed to assemble test state");

    TestHarness {
        app: app(state.clone()),
        state,
        store,
        provisioner,
    }
}

/// Mint a bearer token with the dev-config secret the harness verifies with.
pub fn bearer_for(tenant_id: &str, subject: &str, roles: &[&str]) -> String {
    atrium_gateway::auth::issue_token(
        tenant_id,
        subject,
        roles.iter().map(|s| s.to_string()).collect(),
    )
    .expect("failed to mint token")
}

/// Provision a tenant straight through the lifecycle manager.
pub async fn seed_tenant(harness: &TestHarness, name: &str) -> TenantRecord {
    harness
        .state
        .lifecycle
        .create(name, None)
        .await
        .expect("failed to seed tenant")
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub fn get(path: &str, token: Option<&str>) -> Request<Body> {
    request("GET", path, token, None)
}

pub fn request(
    method: &str,
    path: &str,
    token: Option<&str>,
    json_body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match json_body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request build failed"),
        None => builder.body(Body::empty()).expect("request build failed"),
    }
}
