use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub directory: DirectoryConfig,
    pub security: SecurityConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Staleness bound for cached tenant records, in seconds. A status
    /// change is honored by every resolver within this window; the lifecycle
    /// manager invalidates its own process immediately.
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// HMAC secret for inbound bearer tokens.
    pub jwt_secret: String,
    /// HMAC secret for gateway-signed internal identity tokens.
    pub internal_secret: String,
    /// Clock skew tolerance applied during token validation.
    pub clock_skew_secs: u64,
    pub token_ttl_hours: u64,
    pub internal_token_ttl_secs: u64,
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// service name -> downstream base URL
    pub downstreams: HashMap<String, String>,
    pub forward_timeout_secs: u64,
    pub max_forward_body_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT") {
            self.database.connect_timeout_secs =
                v.parse().unwrap_or(self.database.connect_timeout_secs);
        }

        // Directory overrides
        if let Ok(v) = env::var("ATRIUM_DIRECTORY_CACHE_TTL_SECS") {
            self.directory.cache_ttl_secs = v.parse().unwrap_or(self.directory.cache_ttl_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("ATRIUM_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("ATRIUM_INTERNAL_SECRET") {
            self.security.internal_secret = v;
        }
        if let Ok(v) = env::var("ATRIUM_CLOCK_SKEW_SECS") {
            self.security.clock_skew_secs = v.parse().unwrap_or(self.security.clock_skew_secs);
        }
        if let Ok(v) = env::var("ATRIUM_TOKEN_TTL_HOURS") {
            self.security.token_ttl_hours = v.parse().unwrap_or(self.security.token_ttl_hours);
        }
        if let Ok(v) = env::var("ATRIUM_INTERNAL_TOKEN_TTL_SECS") {
            self.security.internal_token_ttl_secs =
                v.parse().unwrap_or(self.security.internal_token_ttl_secs);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }

        // Gateway overrides
        if let Ok(v) = env::var("ATRIUM_DOWNSTREAMS") {
            self.gateway.downstreams = parse_downstreams(&v);
        }
        if let Ok(v) = env::var("GATEWAY_FORWARD_TIMEOUT_SECS") {
            self.gateway.forward_timeout_secs =
                v.parse().unwrap_or(self.gateway.forward_timeout_secs);
        }
        if let Ok(v) = env::var("GATEWAY_MAX_FORWARD_BODY_BYTES") {
            self.gateway.max_forward_body_bytes =
                v.parse().unwrap_or(self.gateway.max_forward_body_bytes);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connect_timeout_secs: 30,
            },
            directory: DirectoryConfig { cache_ttl_secs: 30 },
            security: SecurityConfig {
                jwt_secret: "dev-secret-change-me".to_string(),
                internal_secret: "dev-internal-secret-change-me".to_string(),
                clock_skew_secs: 30,
                token_ttl_hours: 24 * 7, // 1 week
                internal_token_ttl_secs: 300,
                enable_cors: true,
            },
            gateway: GatewayConfig {
                downstreams: HashMap::new(),
                forward_timeout_secs: 30,
                max_forward_body_bytes: 10 * 1024 * 1024, // 10MB
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connect_timeout_secs: 10,
            },
            directory: DirectoryConfig { cache_ttl_secs: 30 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                internal_secret: String::new(),
                clock_skew_secs: 30,
                token_ttl_hours: 24,
                internal_token_ttl_secs: 120,
                enable_cors: true,
            },
            gateway: GatewayConfig {
                downstreams: HashMap::new(),
                forward_timeout_secs: 15,
                max_forward_body_bytes: 5 * 1024 * 1024, // 5MB
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connect_timeout_secs: 5,
            },
            directory: DirectoryConfig { cache_ttl_secs: 30 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                internal_secret: String::new(),
                clock_skew_secs: 30,
                token_ttl_hours: 4,
                internal_token_ttl_secs: 60,
                enable_cors: true,
            },
            gateway: GatewayConfig {
                downstreams: HashMap::new(),
                forward_timeout_secs: 10,
                max_forward_body_bytes: 2 * 1024 * 1024, // 2MB
            },
        }
    }
}

/// Parse `svc=http://host,svc2=http://host2` into the downstream map.
fn parse_downstreams(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, url) = pair.split_once('=')?;
            let name = name.trim();
            let url = url.trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some((name.to_string(), url.trim_end_matches('/').to_string()))
        })
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
