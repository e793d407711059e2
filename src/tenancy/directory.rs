// Read path of the Tenant Directory. The tenant set changes rarely relative
// to request volume, so resolution reads through a TTL cache; lifecycle
// writes invalidate the local entry immediately, and the TTL bounds how long
// any other process may keep serving a stale status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::error::TenancyError;
use super::model::{TenantRecord, TenantStatus};
use super::store::DirectoryStore;

struct CachedRecord {
    record: TenantRecord,
    fetched_at: Instant,
}

/// Authoritative tenant-id -> (schema, status) mapping with bounded-staleness
/// caching. Writes happen only through the lifecycle manager, which calls
/// `invalidate` after every mutation.
pub struct TenantDirectory {
    store: Arc<dyn DirectoryStore>,
    cache: RwLock<HashMap<String, CachedRecord>>,
    ttl: Duration,
}

impl TenantDirectory {
    pub fn new(store: Arc<dyn DirectoryStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Resolve a tenant for request admission. Fails with `TenantNotFound`
    /// for unknown ids and `TenantInactive` for any status other than
    /// ACTIVE; PENDING records are never externally observable, but they are
    /// not resolvable either.
    pub async fn resolve(&self, tenant_id: &str) -> Result<TenantRecord, TenancyError> {
        let record = self
            .lookup(tenant_id)
            .await?
            .ok_or_else(|| TenancyError::TenantNotFound(tenant_id.to_string()))?;

        if !record.status.is_active() {
            return Err(TenancyError::TenantInactive {
                tenant_id: record.tenant_id,
                status: record.status,
            });
        }

        Ok(record)
    }

    /// Cache-through fetch without the status gate. Used by `resolve` and by
    /// read-only admin lookups that must see suspended or deleting tenants.
    pub async fn lookup(&self, tenant_id: &str) -> Result<Option<TenantRecord>, TenancyError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(tenant_id) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(Some(entry.record.clone()));
                }
            }
        }

        let fetched = self.store.fetch(tenant_id).await?;

        let mut cache = self.cache.write().await;
        match &fetched {
            Some(record) => {
                cache.insert(
                    tenant_id.to_string(),
                    CachedRecord {
                        record: record.clone(),
                        fetched_at: Instant::now(),
                    },
                );
            }
            // Absent tenants are not negatively cached; a concurrent create
            // must become resolvable without waiting out the TTL.
            None => {
                cache.remove(tenant_id);
            }
        }

        Ok(fetched)
    }

    /// Drop the cached entry for a tenant. Called by the lifecycle manager
    /// after every status write so in-process staleness is zero.
    pub async fn invalidate(&self, tenant_id: &str) {
        let mut cache = self.cache.write().await;
        cache.remove(tenant_id);
    }

    /// Probe the backing store.
    pub async fn ping(&self) -> Result<(), TenancyError> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenancy::store::MemoryDirectoryStore;
    use chrono::Utc;

    fn active_record(tenant_id: &str) -> TenantRecord {
        let now = Utc::now();
        TenantRecord {
            tenant_id: tenant_id.to_string(),
            display_name: tenant_id.to_string(),
            schema_name: format!("t_{tenant_id}"),
            status: TenantStatus::Active,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn resolves_active_tenant() {
        let store = Arc::new(MemoryDirectoryStore::new());
        store.insert(&active_record("acme_1")).await.unwrap();
        let directory = TenantDirectory::new(store, Duration::from_secs(30));

        let record = directory.resolve("acme_1").await.unwrap();
        assert_eq!(record.schema_name, "t_acme_1");
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let store = Arc::new(MemoryDirectoryStore::new());
        let directory = TenantDirectory::new(store, Duration::from_secs(30));

        let err = directory.resolve("nope").await.unwrap_err();
        assert!(matches!(err, TenancyError::TenantNotFound(_)));
    }

    #[tokio::test]
    async fn suspended_tenant_is_inactive() {
        let store = Arc::new(MemoryDirectoryStore::new());
        let mut record = active_record("acme_1");
        record.status = TenantStatus::Suspended;
        store.insert(&record).await.unwrap();
        let directory = TenantDirectory::new(store, Duration::from_secs(30));

        let err = directory.resolve("acme_1").await.unwrap_err();
        match err {
            TenancyError::TenantInactive { status, .. } => {
                assert_eq!(status, TenantStatus::Suspended);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn cache_serves_stale_status_only_within_ttl() {
        let store = Arc::new(MemoryDirectoryStore::new());
        store.insert(&active_record("acme_1")).await.unwrap();
        let directory = TenantDirectory::new(store.clone(), Duration::from_millis(50));

        // Warm the cache, then suspend behind the directory's back.
        directory.resolve("acme_1").await.unwrap();
        store
            .cas_status("acme_1", 1, TenantStatus::Suspended)
            .await
            .unwrap();

        // Within the TTL the stale ACTIVE may still be served.
        assert!(directory.resolve("acme_1").await.is_ok());

        // After the TTL the suspension must be honored.
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(directory.resolve("acme_1").await.is_err());
    }

    #[tokio::test]
    async fn invalidate_takes_effect_immediately() {
        let store = Arc::new(MemoryDirectoryStore::new());
        store.insert(&active_record("acme_1")).await.unwrap();
        let directory = TenantDirectory::new(store.clone(), Duration::from_secs(300));

        directory.resolve("acme_1").await.unwrap();
        store
            .cas_status("acme_1", 1, TenantStatus::Suspended)
            .await
            .unwrap();
        directory.invalidate("acme_1").await;

        assert!(directory.resolve("acme_1").await.is_err());
    }
}
