// The one seam where tenant data access is dispatched. Every operation
// re-reads the ambient context and binds search_path inside its own
// transaction; nothing about the schema choice is cached between operations,
// so no statement can outlive the context that routed it.

use sqlx::postgres::{PgQueryResult, PgRow};
use sqlx::{PgPool, Postgres, Transaction};

use crate::database::quote_identifier;

use super::context;
use super::error::TenancyError;

/// Routes data-access operations to the schema named in the active tenant
/// context. With no established context every operation fails with
/// `MissingTenantContext`; there is no default schema to fall back to.
#[derive(Clone)]
pub struct SchemaRouter {
    pool: PgPool,
}

impl SchemaRouter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The schema the current operation must execute against.
    pub fn active_schema(&self) -> Result<String, TenancyError> {
        context::current()
            .map(|ctx| ctx.schema_name)
            .ok_or(TenancyError::MissingTenantContext)
    }

    /// Begin a transaction bound to the active tenant's schema. `SET LOCAL`
    /// scopes the search_path to this transaction only; concurrent requests
    /// on other connections are unaffected.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, TenancyError> {
        let schema = self.active_schema()?;
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!(
            "SET LOCAL search_path TO {}",
            quote_identifier(&schema)
        ))
        .execute(&mut *tx)
        .await?;
        Ok(tx)
    }

    /// Execute a single statement against the tenant's schema.
    pub async fn execute(&self, sql: &str) -> Result<PgQueryResult, TenancyError> {
        let mut tx = self.begin().await?;
        let result = sqlx::query(sql).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Fetch all rows for a single query against the tenant's schema.
    pub async fn fetch_all(&self, sql: &str) -> Result<Vec<PgRow>, TenancyError> {
        let mut tx = self.begin().await?;
        let rows = sqlx::query(sql).fetch_all(&mut *tx).await?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Fetch at most one row for a single query against the tenant's schema.
    pub async fn fetch_optional(&self, sql: &str) -> Result<Option<PgRow>, TenancyError> {
        let mut tx = self.begin().await?;
        let row = sqlx::query(sql).fetch_optional(&mut *tx).await?;
        tx.commit().await?;
        Ok(row)
    }

    /// Fully qualified, quoted name for a table in the tenant's schema, for
    /// callers composing SQL outside a routed transaction.
    pub fn qualify(&self, table: &str) -> Result<String, TenancyError> {
        let schema = self.active_schema()?;
        Ok(format!(
            "{}.{}",
            quote_identifier(&schema),
            quote_identifier(table)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::context::{self, TenantContext};
    use chrono::Utc;

    fn router() -> SchemaRouter {
        // Lazy pool: never connects in these tests.
        let pool = PgPool::connect_lazy("postgres://atrium@localhost/atrium").unwrap();
        SchemaRouter::new(pool)
    }

    fn ctx(tenant: &str) -> TenantContext {
        TenantContext::from_parts(tenant, format!("t_{tenant}"), "user-1", Utc::now())
    }

    #[tokio::test]
    async fn no_context_means_no_schema() {
        let router = router();
        assert!(matches!(
            router.active_schema(),
            Err(TenancyError::MissingTenantContext)
        ));
        assert!(matches!(
            router.qualify("orders"),
            Err(TenancyError::MissingTenantContext)
        ));
    }

    #[tokio::test]
    async fn routes_to_ambient_schema() {
        let router = router();
        context::scope(ctx("acme_1"), async move {
            assert_eq!(router.active_schema().unwrap(), "t_acme_1");
            assert_eq!(router.qualify("orders").unwrap(), "\"t_acme_1\".\"orders\"");
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn rereads_context_per_operation() {
        let router = router();

        // Outside any scope: fails.
        assert!(router.active_schema().is_err());

        // Inside a scope: routed. The same router instance observes the
        // change because nothing is cached across operations.
        context::scope(ctx("acme_1"), {
            let router = router.clone();
            async move {
                assert_eq!(router.active_schema().unwrap(), "t_acme_1");
            }
        })
        .await
        .unwrap();

        // Back outside: fails again.
        assert!(router.active_schema().is_err());
    }
}
