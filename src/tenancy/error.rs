use thiserror::Error;

use super::model::TenantStatus;

/// Errors raised by the tenancy core. The HTTP layer maps these onto the
/// API error envelope in `crate::error`.
#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    #[error("tenant '{tenant_id}' is not active (status: {status})")]
    TenantInactive {
        tenant_id: String,
        status: TenantStatus,
    },

    #[error("no tenant context established for this operation")]
    MissingTenantContext,

    #[error("tenant context conflict: cannot establish '{requested}' inside a scope owned by '{established}'")]
    TenantContextConflict {
        established: String,
        requested: String,
    },

    #[error("illegal tenant transition: {from} -> {to}")]
    IllegalTenantTransition {
        from: TenantStatus,
        to: TenantStatus,
    },

    #[error("tenant provisioning failed for '{tenant_id}': {reason}")]
    TenantProvisioning { tenant_id: String, reason: String },

    #[error("invalid tenant name: {0}")]
    InvalidTenantName(String),

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl TenancyError {
    /// Stable machine-readable code, exposed to clients in rejection bodies.
    pub fn code(&self) -> &'static str {
        match self {
            TenancyError::InvalidToken(_) => "INVALID_TOKEN",
            TenancyError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            TenancyError::TenantInactive { .. } => "TENANT_INACTIVE",
            TenancyError::MissingTenantContext => "MISSING_TENANT_CONTEXT",
            TenancyError::TenantContextConflict { .. } => "TENANT_CONTEXT_CONFLICT",
            TenancyError::IllegalTenantTransition { .. } => "ILLEGAL_TENANT_TRANSITION",
            TenancyError::TenantProvisioning { .. } => "TENANT_PROVISIONING_FAILED",
            TenancyError::InvalidTenantName(_) => "INVALID_TENANT_NAME",
            TenancyError::Store(_) => "STORE_ERROR",
        }
    }
}
