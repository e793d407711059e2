// Tenant lifecycle: PENDING -> ACTIVE <-> SUSPENDED -> DELETING -> DELETED.
// The manager owns all directory writes and the physical schema side effects
// behind them. Status writes are serialized per tenant with optimistic
// versioning; DDL runs under an advisory lock keyed on the schema name so
// create and delete cannot race on one identifier.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::database::{is_valid_schema_name, quote_identifier};

use super::directory::TenantDirectory;
use super::error::TenancyError;
use super::model::{
    derive_schema_name, sanitize_name, validate_tenant_name, TenantRecord, TenantStatus,
};
use super::store::DirectoryStore;

/// Physical schema provisioning and teardown.
#[async_trait]
pub trait SchemaProvisioner: Send + Sync {
    /// Create the schema and its seed objects.
    async fn provision(&self, schema_name: &str) -> Result<(), TenancyError>;

    /// Drop the schema and everything in it.
    async fn drop_schema(&self, schema_name: &str) -> Result<(), TenancyError>;
}

/// Provisioner that issues DDL against the shared Postgres database. Each
/// operation runs in one transaction holding `pg_advisory_xact_lock` on the
/// schema name, which serializes create/drop for the same identifier.
pub struct PgSchemaProvisioner {
    pool: PgPool,
}

impl PgSchemaProvisioner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn seed_statements(schema_ident: &str) -> Vec<String> {
        vec![
            format!(
                "CREATE TABLE {}.tenant_settings (\
                 key TEXT PRIMARY KEY, \
                 value JSONB NOT NULL DEFAULT '{{}}'::jsonb, \
                 updated_at TIMESTAMPTZ NOT NULL DEFAULT now())",
                schema_ident
            ),
            format!(
                "CREATE TABLE {}.audit_log (\
                 id BIGSERIAL PRIMARY KEY, \
                 occurred_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
                 subject_id TEXT NOT NULL, \
                 action TEXT NOT NULL, \
                 detail JSONB)",
                schema_ident
            ),
        ]
    }
}

#[async_trait]
impl SchemaProvisioner for PgSchemaProvisioner {
    async fn provision(&self, schema_name: &str) -> Result<(), TenancyError> {
        if !is_valid_schema_name(schema_name) {
            return Err(TenancyError::InvalidTenantName(format!(
                "invalid schema name: {}",
                schema_name
            )));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(schema_name)
            .execute(&mut *tx)
            .await?;

        let ident = quote_identifier(schema_name);
        sqlx::query(&format!("CREATE SCHEMA {}", ident))
            .execute(&mut *tx)
            .await?;
        for stmt in Self::seed_statements(&ident) {
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }
        tx.commit().await?;

        info!("Provisioned schema: {}", schema_name);
        Ok(())
    }

    async fn drop_schema(&self, schema_name: &str) -> Result<(), TenancyError> {
        if !is_valid_schema_name(schema_name) {
            return Err(TenancyError::InvalidTenantName(format!(
                "invalid schema name: {}",
                schema_name
            )));
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(schema_name)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "DROP SCHEMA IF EXISTS {} CASCADE",
            quote_identifier(schema_name)
        ))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Dropped schema: {}", schema_name);
        Ok(())
    }
}

/// In-memory provisioner for tests and local development. Tracks provisioned
/// schemas and supports fault injection on either operation.
#[derive(Default)]
pub struct MemorySchemaProvisioner {
    schemas: Mutex<HashSet<String>>,
    fail_provision: AtomicBool,
    fail_drop: AtomicBool,
}

impl MemorySchemaProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_provision(&self, fail: bool) {
        self.fail_provision.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_drop(&self, fail: bool) {
        self.fail_drop.store(fail, Ordering::SeqCst);
    }

    pub fn has_schema(&self, schema_name: &str) -> bool {
        self.schemas.lock().unwrap().contains(schema_name)
    }
}

#[async_trait]
impl SchemaProvisioner for MemorySchemaProvisioner {
    async fn provision(&self, schema_name: &str) -> Result<(), TenancyError> {
        if self.fail_provision.load(Ordering::SeqCst) {
            return Err(TenancyError::TenantProvisioning {
                tenant_id: schema_name.to_string(),
                reason: "injected provisioning failure".to_string(),
            });
        }
        self.schemas.lock().unwrap().insert(schema_name.to_string());
        Ok(())
    }

    async fn drop_schema(&self, schema_name: &str) -> Result<(), TenancyError> {
        if self.fail_drop.load(Ordering::SeqCst) {
            return Err(TenancyError::TenantProvisioning {
                tenant_id: schema_name.to_string(),
                reason: "injected drop failure".to_string(),
            });
        }
        self.schemas.lock().unwrap().remove(schema_name);
        Ok(())
    }
}

/// Administrative status targets accepted by `update_status`. Internal
/// transitions (out of PENDING, into DELETED) belong to `create`/`delete`.
fn is_admin_target(target: TenantStatus) -> bool {
    matches!(
        target,
        TenantStatus::Active | TenantStatus::Suspended | TenantStatus::Deleting
    )
}

/// State machine over the Tenant Directory plus the physical schema side
/// effects of each transition.
pub struct TenantLifecycleManager {
    store: Arc<dyn DirectoryStore>,
    provisioner: Arc<dyn SchemaProvisioner>,
    directory: Arc<TenantDirectory>,
}

impl TenantLifecycleManager {
    pub fn new(
        store: Arc<dyn DirectoryStore>,
        provisioner: Arc<dyn SchemaProvisioner>,
        directory: Arc<TenantDirectory>,
    ) -> Self {
        Self {
            store,
            provisioner,
            directory,
        }
    }

    /// Provision a new tenant. Allocates a fresh identifier, writes the
    /// PENDING record, creates the schema and seed objects, and activates.
    /// On provisioning failure the record is marked DELETED so no
    /// half-provisioned tenant is ever resolvable; the caller may retry with
    /// the same name and will get a fresh identifier.
    pub async fn create(
        &self,
        name: &str,
        display_name: Option<&str>,
    ) -> Result<TenantRecord, TenancyError> {
        validate_tenant_name(name)?;

        let tenant_id = self.allocate_tenant_id(name).await?;
        let schema_name = derive_schema_name(&tenant_id);
        let now = Utc::now();

        let record = TenantRecord {
            tenant_id: tenant_id.clone(),
            display_name: display_name.unwrap_or(name).to_string(),
            schema_name: schema_name.clone(),
            status: TenantStatus::Pending,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&record).await?;

        if let Err(err) = self.provisioner.provision(&schema_name).await {
            warn!(
                "Schema provisioning failed for tenant '{}': {}",
                tenant_id, err
            );
            // The identifier is burned; the record stays as an audit row.
            self.force_status(&tenant_id, TenantStatus::Deleted).await?;
            self.directory.invalidate(&tenant_id).await;
            return Err(TenancyError::TenantProvisioning {
                tenant_id,
                reason: err.to_string(),
            });
        }

        let active = self.force_status(&tenant_id, TenantStatus::Active).await?;
        self.directory.invalidate(&tenant_id).await;
        info!("Created tenant '{}' (schema {})", tenant_id, schema_name);
        Ok(active)
    }

    /// Apply an administrative status transition. Same-status calls are
    /// idempotent no-ops returning the unchanged record. Only
    /// `ACTIVE <-> SUSPENDED` and `{ACTIVE,SUSPENDED} -> DELETING` are legal
    /// here. Under a concurrent write, the loser observes the post-state and
    /// either succeeds idempotently or fails with an illegal transition.
    pub async fn update_status(
        &self,
        tenant_id: &str,
        target: TenantStatus,
    ) -> Result<TenantRecord, TenancyError> {
        let record = self.require(tenant_id).await?;
        if record.status == target {
            return Ok(record);
        }

        let legal = is_admin_target(target)
            && matches!(
                record.status,
                TenantStatus::Active | TenantStatus::Suspended
            )
            && record.status.can_transition_to(target);
        if !legal {
            return Err(TenancyError::IllegalTenantTransition {
                from: record.status,
                to: target,
            });
        }

        match self
            .store
            .cas_status(tenant_id, record.version, target)
            .await?
        {
            Some(updated) => {
                self.directory.invalidate(tenant_id).await;
                info!(
                    "Tenant '{}' transitioned {} -> {}",
                    tenant_id, record.status, updated.status
                );
                Ok(updated)
            }
            None => {
                // Lost the race; judge against the post-state.
                let post = self.require(tenant_id).await?;
                if post.status == target {
                    Ok(post)
                } else {
                    Err(TenancyError::IllegalTenantTransition {
                        from: post.status,
                        to: target,
                    })
                }
            }
        }
    }

    /// Delete a tenant: move to DELETING, optionally drop the schema, then
    /// mark DELETED. If the drop fails the record stays DELETING and the
    /// call is retryable; the lifecycle never claims a deletion it did not
    /// perform. Deleting an already-DELETED tenant is a no-op.
    pub async fn delete(
        &self,
        tenant_id: &str,
        drop_schema: bool,
    ) -> Result<TenantRecord, TenancyError> {
        let record = self.require(tenant_id).await?;

        let deleting = match record.status {
            TenantStatus::Deleted => return Ok(record),
            TenantStatus::Deleting => record,
            TenantStatus::Active | TenantStatus::Suspended => {
                self.update_status(tenant_id, TenantStatus::Deleting).await?
            }
            TenantStatus::Pending => {
                return Err(TenancyError::IllegalTenantTransition {
                    from: TenantStatus::Pending,
                    to: TenantStatus::Deleting,
                })
            }
        };

        if drop_schema {
            if let Err(err) = self.provisioner.drop_schema(&deleting.schema_name).await {
                warn!(
                    "Schema drop failed for tenant '{}' (left DELETING): {}",
                    tenant_id, err
                );
                self.directory.invalidate(tenant_id).await;
                return Err(TenancyError::TenantProvisioning {
                    tenant_id: tenant_id.to_string(),
                    reason: format!("schema drop failed: {}", err),
                });
            }
        }

        match self
            .store
            .cas_status(tenant_id, deleting.version, TenantStatus::Deleted)
            .await?
        {
            Some(done) => {
                self.directory.invalidate(tenant_id).await;
                info!("Deleted tenant '{}'", tenant_id);
                Ok(done)
            }
            None => {
                let post = self.require(tenant_id).await?;
                self.directory.invalidate(tenant_id).await;
                if post.status == TenantStatus::Deleted {
                    Ok(post)
                } else {
                    Err(TenancyError::IllegalTenantTransition {
                        from: post.status,
                        to: TenantStatus::Deleted,
                    })
                }
            }
        }
    }

    /// Authoritative read, DELETED rows included (audit history).
    pub async fn get(&self, tenant_id: &str) -> Result<TenantRecord, TenancyError> {
        self.require(tenant_id).await
    }

    pub async fn exists(&self, tenant_id: &str) -> Result<bool, TenancyError> {
        Ok(self.store.fetch(tenant_id).await?.is_some())
    }

    pub async fn list(
        &self,
        status: Option<TenantStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TenantRecord>, TenancyError> {
        let limit = limit.clamp(1, 500);
        let offset = offset.max(0);
        self.store.list(status, limit, offset).await
    }

    pub async fn update_display_name(
        &self,
        tenant_id: &str,
        display_name: &str,
    ) -> Result<TenantRecord, TenancyError> {
        let updated = self
            .store
            .set_display_name(tenant_id, display_name)
            .await?
            .ok_or_else(|| TenancyError::TenantNotFound(tenant_id.to_string()))?;
        self.directory.invalidate(tenant_id).await;
        Ok(updated)
    }

    async fn require(&self, tenant_id: &str) -> Result<TenantRecord, TenancyError> {
        self.store
            .fetch(tenant_id)
            .await?
            .ok_or_else(|| TenancyError::TenantNotFound(tenant_id.to_string()))
    }

    /// Allocate the next identifier for a base name. Counting includes
    /// DELETED rows, and the id is probed for collisions, so a failed
    /// identifier is never handed out twice.
    async fn allocate_tenant_id(&self, name: &str) -> Result<String, TenancyError> {
        let base = sanitize_name(name);
        let mut n = self.store.count_name_allocations(&base).await? + 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.store.fetch(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Drive a record to `target` regardless of racing writers. Used for the
    /// internal transitions out of PENDING and into DELETED, where the
    /// target is absorbing for this record.
    async fn force_status(
        &self,
        tenant_id: &str,
        target: TenantStatus,
    ) -> Result<TenantRecord, TenancyError> {
        for _ in 0..8 {
            let record = self.require(tenant_id).await?;
            if record.status == target {
                return Ok(record);
            }
            if let Some(updated) = self
                .store
                .cas_status(tenant_id, record.version, target)
                .await?
            {
                return Ok(updated);
            }
        }
        let record = self.require(tenant_id).await?;
        Err(TenancyError::IllegalTenantTransition {
            from: record.status,
            to: target,
        })
    }
}
