use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::tenancy::{TenancyError, TenantContext};

/// Header carrying the gateway-signed identity on internal hops.
pub const INTERNAL_IDENTITY_HEADER: &str = "x-atrium-internal";

/// Wire shape of an inbound bearer token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tenant: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(tenant: String, subject: String, roles: Vec<String>) -> Self {
        let now = Utc::now();
        let ttl_hours = config::config().security.token_ttl_hours;
        Self {
            sub: subject,
            tenant,
            roles,
            exp: (now + Duration::hours(ttl_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Verified token payload. Consumed to build a TenantContext and not
/// retained beyond that.
#[derive(Debug, Clone)]
pub struct AuthClaims {
    pub subject_id: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Validates bearer tokens: signature, structure, and expiry with a fixed
/// clock skew leeway. Pure; never consults the Tenant Directory.
pub struct TokenVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str, clock_skew_secs: u64) -> Result<Self, TenancyError> {
        if secret.is_empty() {
            return Err(TenancyError::InvalidToken(
                "JWT secret not configured".to_string(),
            ));
        }
        let mut validation = Validation::default();
        validation.leeway = clock_skew_secs;
        Ok(Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn from_config() -> Result<Self, TenancyError> {
        let security = &config::config().security;
        Self::new(&security.jwt_secret, security.clock_skew_secs)
    }

    pub fn verify(&self, token: &str) -> Result<AuthClaims, TenancyError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| TenancyError::InvalidToken(e.to_string()))?;

        let claims = data.claims;
        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TenancyError::InvalidToken("invalid exp claim".to_string()))?;

        Ok(AuthClaims {
            subject_id: claims.sub,
            tenant_id: claims.tenant,
            roles: claims.roles,
            expires_at,
        })
    }
}

/// Mint a bearer token with the configured secret and TTL. Used by the CLI
/// and tests; token issuance UX is otherwise out of scope.
pub fn issue_token(
    tenant: &str,
    subject: &str,
    roles: Vec<String>,
) -> Result<String, TenancyError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(TenancyError::InvalidToken(
            "JWT secret not configured".to_string(),
        ));
    }

    let claims = Claims::new(tenant.to_string(), subject.to_string(), roles);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TenancyError::InvalidToken(e.to_string()))
}

/// Wire shape of the gateway-signed internal identity token. `jti` gives
/// every hop token a distinct identity for audit correlation.
#[derive(Debug, Serialize, Deserialize)]
struct InternalClaims {
    jti: uuid::Uuid,
    sub: String,
    tenant: String,
    schema: String,
    exp: i64,
    iat: i64,
}

/// Signs and verifies the internal identity attached to forwarded requests.
/// Downstream services re-establish their tenant context from this token
/// alone; the gateway's signature is the trust boundary, and no directory
/// lookup happens on that hot path.
pub struct InternalSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl InternalSigner {
    pub fn new(secret: &str, ttl_secs: u64, clock_skew_secs: u64) -> Result<Self, TenancyError> {
        if secret.is_empty() {
            return Err(TenancyError::InvalidToken(
                "internal signing secret not configured".to_string(),
            ));
        }
        let mut validation = Validation::default();
        validation.leeway = clock_skew_secs;
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
        })
    }

    pub fn from_config() -> Result<Self, TenancyError> {
        let security = &config::config().security;
        Self::new(
            &security.internal_secret,
            security.internal_token_ttl_secs,
            security.clock_skew_secs,
        )
    }

    pub fn sign(&self, ctx: &TenantContext) -> Result<String, TenancyError> {
        let now = Utc::now();
        let claims = InternalClaims {
            jti: uuid::Uuid::new_v4(),
            sub: ctx.subject_id.clone(),
            tenant: ctx.tenant_id.clone(),
            schema: ctx.schema_name.clone(),
            exp: (now + Duration::seconds(self.ttl_secs as i64)).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| TenancyError::InvalidToken(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<TenantContext, TenancyError> {
        let data = decode::<InternalClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| TenancyError::InvalidToken(e.to_string()))?;

        let claims = data.claims;
        let issued_at = DateTime::<Utc>::from_timestamp(claims.iat, 0)
            .ok_or_else(|| TenancyError::InvalidToken("invalid iat claim".to_string()))?;

        Ok(TenantContext::from_parts(
            claims.tenant,
            claims.schema,
            claims.sub,
            issued_at,
        ))
    }
}
