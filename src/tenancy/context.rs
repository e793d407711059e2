// Request-scoped tenant context, propagated as a task-local value. The
// carrier is scoped around a future rather than tied to a thread, so it
// survives await points and worker hand-offs as long as inheritance is
// explicit at spawn time.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthClaims;

use super::error::TenancyError;
use super::model::TenantRecord;

tokio::task_local! {
    static CURRENT_TENANT: TenantContext;
}

/// The binding of one in-flight request to its tenant. Never persisted and
/// never shared between concurrent requests; dropped when its scope unwinds,
/// whether the request succeeded, failed, or was cancelled.
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    pub tenant_id: String,
    pub schema_name: String,
    pub subject_id: String,
    pub issued_at: DateTime<Utc>,
}

impl TenantContext {
    /// Build a context from a freshly resolved directory record and the
    /// verified claims of the request. The caller is responsible for having
    /// resolved the record through the directory, which enforces that only
    /// ACTIVE tenants get this far.
    pub fn new(record: &TenantRecord, claims: &AuthClaims) -> Self {
        Self {
            tenant_id: record.tenant_id.clone(),
            schema_name: record.schema_name.clone(),
            subject_id: claims.subject_id.clone(),
            issued_at: Utc::now(),
        }
    }

    /// Rebuild a context from gateway-attached identity on a downstream hop.
    pub fn from_parts(
        tenant_id: impl Into<String>,
        schema_name: impl Into<String>,
        subject_id: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            schema_name: schema_name.into(),
            subject_id: subject_id.into(),
            issued_at,
        }
    }
}

/// Read the ambient tenant context. Absent outside any established scope;
/// callers must treat absence as "unauthenticated" and never substitute a
/// default tenant.
pub fn current() -> Option<TenantContext> {
    CURRENT_TENANT.try_with(|ctx| ctx.clone()).ok()
}

/// Establish `ctx` for the duration of `fut`, restoring the prior ambient
/// context when the future completes. Nested establishment is allowed for
/// internal same-tenant calls; nesting a different tenant is a contract
/// violation and fails before the future runs.
pub async fn scope<F>(ctx: TenantContext, fut: F) -> Result<F::Output, TenancyError>
where
    F: Future,
{
    if let Some(established) = current() {
        if established.tenant_id != ctx.tenant_id {
            return Err(TenancyError::TenantContextConflict {
                established: established.tenant_id,
                requested: ctx.tenant_id,
            });
        }
    }
    Ok(CURRENT_TENANT.scope(ctx, fut).await)
}

/// Spawn a task that inherits the caller's tenant context, if any.
/// Propagation is by explicit inheritance at task creation, not by thread
/// identity; a spawn from an unscoped caller produces an unscoped task.
pub fn spawn_inheriting<F>(fut: F) -> tokio::task::JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current() {
        Some(ctx) => tokio::spawn(CURRENT_TENANT.scope(ctx, fut)),
        None => tokio::spawn(fut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(tenant: &str) -> TenantContext {
        TenantContext::from_parts(tenant, format!("t_{tenant}"), "user-1", Utc::now())
    }

    #[tokio::test]
    async fn absent_outside_scope() {
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn scope_establishes_and_restores() {
        let result = scope(ctx("acme"), async {
            let inner = current().expect("context inside scope");
            assert_eq!(inner.tenant_id, "acme");
            assert_eq!(inner.schema_name, "t_acme");
        })
        .await;
        assert!(result.is_ok());
        assert!(current().is_none());
    }

    #[tokio::test]
    async fn nested_same_tenant_is_allowed() {
        scope(ctx("acme"), async {
            let nested = scope(ctx("acme"), async {
                current().map(|c| c.tenant_id)
            })
            .await
            .unwrap();
            assert_eq!(nested.as_deref(), Some("acme"));
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn nested_different_tenant_conflicts() {
        scope(ctx("acme"), async {
            let err = scope(ctx("globex"), async {}).await.unwrap_err();
            match err {
                TenancyError::TenantContextConflict {
                    established,
                    requested,
                } => {
                    assert_eq!(established, "acme");
                    assert_eq!(requested, "globex");
                }
                other => panic!("unexpected error: {other}"),
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn survives_await_points() {
        scope(ctx("acme"), async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            assert_eq!(current().unwrap().tenant_id, "acme");
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn spawn_inheriting_carries_context() {
        scope(ctx("acme"), async {
            let handle = spawn_inheriting(async { current().map(|c| c.tenant_id) });
            assert_eq!(handle.await.unwrap().as_deref(), Some("acme"));
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn plain_spawn_does_not_leak_context() {
        scope(ctx("acme"), async {
            let handle = tokio::spawn(async { current() });
            assert!(handle.await.unwrap().is_none());
        })
        .await
        .unwrap();
    }
}
