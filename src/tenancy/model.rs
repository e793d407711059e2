use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::TenancyError;

/// Longest tenant id that still maps to a readable schema name. Postgres
/// truncates identifiers at 63 bytes; beyond this we fall back to a hash.
const MAX_PLAIN_SCHEMA_ID: usize = 48;

/// Tenant lifecycle status. A single finite-state field with a transition
/// table; there are no auxiliary boolean flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TenantStatus {
    Pending,
    Active,
    Suspended,
    Deleting,
    Deleted,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Pending => "PENDING",
            TenantStatus::Active => "ACTIVE",
            TenantStatus::Suspended => "SUSPENDED",
            TenantStatus::Deleting => "DELETING",
            TenantStatus::Deleted => "DELETED",
        }
    }

    /// Full transition table, including the internal transitions driven by
    /// provisioning (`PENDING -> ACTIVE|DELETED`) and teardown
    /// (`DELETING -> DELETED`). The administrative surface is restricted
    /// further in the lifecycle manager.
    pub fn can_transition_to(self, target: TenantStatus) -> bool {
        use TenantStatus::*;
        matches!(
            (self, target),
            (Pending, Active)
                | (Pending, Deleted)
                | (Active, Suspended)
                | (Suspended, Active)
                | (Active, Deleting)
                | (Suspended, Deleting)
                | (Deleting, Deleted)
        )
    }

    /// True for the only status under which requests may resolve the tenant.
    pub fn is_active(self) -> bool {
        self == TenantStatus::Active
    }

    /// `DELETED` is terminal; nothing transitions out of it.
    pub fn is_terminal(self) -> bool {
        self == TenantStatus::Deleted
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TenantStatus::Pending),
            "ACTIVE" => Ok(TenantStatus::Active),
            "SUSPENDED" => Ok(TenantStatus::Suspended),
            "DELETING" => Ok(TenantStatus::Deleting),
            "DELETED" => Ok(TenantStatus::Deleted),
            other => Err(format!("unknown tenant status '{}'", other)),
        }
    }
}

/// Directory row for one tenant. `tenant_id` and `schema_name` are immutable
/// after creation; `version` serializes status writes per tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRecord {
    pub tenant_id: String,
    pub display_name: String,
    pub schema_name: String,
    pub status: TenantStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validate a requested tenant name: 2-100 chars, letters, numbers,
/// hyphens, and underscores only.
pub fn validate_tenant_name(name: &str) -> Result<(), TenancyError> {
    if name.len() < 2 {
        return Err(TenancyError::InvalidTenantName(
            "tenant name must be at least 2 characters".to_string(),
        ));
    }
    if name.len() > 100 {
        return Err(TenancyError::InvalidTenantName(
            "tenant name must be less than 100 characters".to_string(),
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TenancyError::InvalidTenantName(
            "tenant name can only contain letters, numbers, hyphens, and underscores".to_string(),
        ));
    }
    Ok(())
}

/// Normalize a requested name into the form used for tenant id allocation.
pub fn sanitize_name(name: &str) -> String {
    name.to_lowercase().replace('-', "_")
}

/// Derive the schema name for a tenant id. Deterministic and immutable:
/// short ids map to a readable `t_<id>` name, long ids to a hash prefix.
pub fn derive_schema_name(tenant_id: &str) -> String {
    if tenant_id.len() <= MAX_PLAIN_SCHEMA_ID {
        return format!("t_{}", tenant_id.to_lowercase());
    }

    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("t_{}", &hash[..16])
}
