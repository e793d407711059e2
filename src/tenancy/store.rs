// Directory persistence seam. The gateway and services read through
// TenantDirectory; only the lifecycle manager writes. Two backends: the
// Postgres registry table, and an in-memory map for tests and local
// development.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::error::TenancyError;
use super::model::{TenantRecord, TenantStatus};

/// Persistence operations behind the Tenant Directory. Reads are concurrent;
/// status writes go through `cas_status`, which only applies when the
/// caller's `expected_version` still matches (per-tenant serialization).
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Liveness probe against the backing store.
    async fn ping(&self) -> Result<(), TenancyError>;

    async fn fetch(&self, tenant_id: &str) -> Result<Option<TenantRecord>, TenancyError>;

    async fn insert(&self, record: &TenantRecord) -> Result<(), TenancyError>;

    /// Compare-and-swap the status. Returns the updated record, or `None`
    /// when `expected_version` no longer matches (a concurrent writer won).
    async fn cas_status(
        &self,
        tenant_id: &str,
        expected_version: i64,
        status: TenantStatus,
    ) -> Result<Option<TenantRecord>, TenancyError>;

    async fn set_display_name(
        &self,
        tenant_id: &str,
        display_name: &str,
    ) -> Result<Option<TenantRecord>, TenancyError>;

    async fn list(
        &self,
        status: Option<TenantStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TenantRecord>, TenancyError>;

    /// Number of tenant ids ever allocated for a base name, DELETED rows
    /// included. Failed identifiers are never reused.
    async fn count_name_allocations(&self, base: &str) -> Result<i64, TenancyError>;
}

const RECORD_COLUMNS: &str =
    "tenant_id, display_name, schema_name, status, version, created_at, updated_at";

/// Directory store backed by the `tenants` registry table.
pub struct PgDirectoryStore {
    pool: PgPool,
}

impl PgDirectoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &PgRow) -> Result<TenantRecord, TenancyError> {
        let status_raw: String = row.try_get("status")?;
        let status = TenantStatus::from_str(&status_raw)
            .map_err(|e| TenancyError::Store(sqlx::Error::Decode(e.into())))?;

        Ok(TenantRecord {
            tenant_id: row.try_get("tenant_id")?,
            display_name: row.try_get("display_name")?,
            schema_name: row.try_get("schema_name")?,
            status,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl DirectoryStore for PgDirectoryStore {
    async fn ping(&self) -> Result<(), TenancyError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch(&self, tenant_id: &str) -> Result<Option<TenantRecord>, TenancyError> {
        let query = format!("SELECT {} FROM tenants WHERE tenant_id = $1", RECORD_COLUMNS);
        let row = sqlx::query(&query)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn insert(&self, record: &TenantRecord) -> Result<(), TenancyError> {
        sqlx::query(
            r#"
            INSERT INTO tenants
                (tenant_id, display_name, schema_name, status, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.tenant_id)
        .bind(&record.display_name)
        .bind(&record.schema_name)
        .bind(record.status.as_str())
        .bind(record.version)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn cas_status(
        &self,
        tenant_id: &str,
        expected_version: i64,
        status: TenantStatus,
    ) -> Result<Option<TenantRecord>, TenancyError> {
        let query = format!(
            r#"
            UPDATE tenants
            SET status = $3, version = version + 1, updated_at = $4
            WHERE tenant_id = $1 AND version = $2
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(tenant_id)
            .bind(expected_version)
            .bind(status.as_str())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn set_display_name(
        &self,
        tenant_id: &str,
        display_name: &str,
    ) -> Result<Option<TenantRecord>, TenancyError> {
        let query = format!(
            r#"
            UPDATE tenants
            SET display_name = $2, updated_at = $3
            WHERE tenant_id = $1
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(tenant_id)
            .bind(display_name)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn list(
        &self,
        status: Option<TenantStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TenantRecord>, TenancyError> {
        let rows = match status {
            Some(status) => {
                let query = format!(
                    "SELECT {} FROM tenants WHERE status = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                    RECORD_COLUMNS
                );
                sqlx::query(&query)
                    .bind(status.as_str())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query = format!(
                    "SELECT {} FROM tenants ORDER BY created_at DESC LIMIT $1 OFFSET $2",
                    RECORD_COLUMNS
                );
                sqlx::query(&query)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn count_name_allocations(&self, base: &str) -> Result<i64, TenancyError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM tenants WHERE tenant_id LIKE $1")
            .bind(format!("{}\\_%", base))
            .fetch_one(&self.pool)
            .await?;

        Ok(row.try_get("n")?)
    }
}

/// In-memory directory store for tests and local development. Mirrors the
/// Postgres store's compare-and-swap semantics.
#[derive(Default)]
pub struct MemoryDirectoryStore {
    records: RwLock<HashMap<String, TenantRecord>>,
}

impl MemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn ping(&self) -> Result<(), TenancyError> {
        Ok(())
    }

    async fn fetch(&self, tenant_id: &str) -> Result<Option<TenantRecord>, TenancyError> {
        let records = self.records.read().unwrap();
        Ok(records.get(tenant_id).cloned())
    }

    async fn insert(&self, record: &TenantRecord) -> Result<(), TenancyError> {
        let mut records = self.records.write().unwrap();
        records.insert(record.tenant_id.clone(), record.clone());
        Ok(())
    }

    async fn cas_status(
        &self,
        tenant_id: &str,
        expected_version: i64,
        status: TenantStatus,
    ) -> Result<Option<TenantRecord>, TenancyError> {
        let mut records = self.records.write().unwrap();
        match records.get_mut(tenant_id) {
            Some(record) if record.version == expected_version => {
                record.status = status;
                record.version += 1;
                record.updated_at = Utc::now();
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_display_name(
        &self,
        tenant_id: &str,
        display_name: &str,
    ) -> Result<Option<TenantRecord>, TenancyError> {
        let mut records = self.records.write().unwrap();
        match records.get_mut(tenant_id) {
            Some(record) => {
                record.display_name = display_name.to_string();
                record.updated_at = Utc::now();
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        status: Option<TenantStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TenantRecord>, TenancyError> {
        let records = self.records.read().unwrap();
        let mut all: Vec<TenantRecord> = records
            .values()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(all
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_name_allocations(&self, base: &str) -> Result<i64, TenancyError> {
        let prefix = format!("{}_", base);
        let records = self.records.read().unwrap();
        Ok(records
            .keys()
            .filter(|id| id.starts_with(&prefix))
            .count() as i64)
    }
}
