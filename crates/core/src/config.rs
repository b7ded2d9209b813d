//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted image payload in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_image_bytes: default_max_image_bytes(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Identity verification configuration.
///
/// Callers authenticate with a bearer JWT minted by the external
/// identity provider; the server only verifies, it never issues.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// HS256 shared secret, minimum 32 bytes.
    /// WARNING: Prefer the PINBOARD_IDENTITY__JWT_SECRET env var over
    /// storing the secret in a config file.
    pub jwt_secret: String,
    /// Expected `iss` claim. Unchecked when unset.
    pub issuer: Option<String>,
    /// Expected `aud` claim. Unchecked when unset.
    pub audience: Option<String>,
}

impl IdentityConfig {
    /// Create a test configuration with a fixed secret.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            jwt_secret: "test-secret-0123456789abcdef0123456789abcdef".to_string(),
            issuer: None,
            audience: None,
        }
    }

    /// Validate identity configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.is_empty() {
            return Err("identity.jwt_secret must not be empty".to_string());
        }
        if self.jwt_secret.len() < 32 {
            return Err(format!(
                "identity.jwt_secret must be at least 32 bytes, got {}",
                self.jwt_secret.len()
            ));
        }
        Ok(())
    }
}

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Ledger store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LedgerConfig {
    /// SQLite database (recommended for testing and small deployments only).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Query timeout in seconds (advisory only - SQLite cannot
        /// force-cancel queries). For strict timeouts use PostgreSQL.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host (e.g., "localhost" or "db.example.com").
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer the PINBOARD_LEDGER__PASSWORD env var over
        /// storing it in a config file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds (prevents hung queries).
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(600)
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_max_connections() -> u32 {
    10
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(30_000)
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/ledger.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

impl LedgerConfig {
    /// Validate ledger configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            LedgerConfig::Sqlite { .. } => Ok(()),
            LedgerConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => {
                    Err("postgres config requires either 'url' or 'host' + 'database'".to_string())
                }
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Media store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MediaConfig {
    /// Local filesystem storage served by an external web tier.
    Filesystem {
        /// Root directory for stored assets.
        path: PathBuf,
        /// Public URL prefix assets are reachable under.
        public_base_url: String,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (e.g., `endpoint/bucket/key`).
        /// Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
        /// Public URL prefix overriding the derived bucket URL
        /// (for CDN fronting).
        public_base_url: Option<String>,
    },
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/media"),
            public_base_url: "http://127.0.0.1:8080/media".to_string(),
        }
    }
}

impl MediaConfig {
    /// Validate media configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MediaConfig::Filesystem {
                public_base_url, ..
            } => {
                if public_base_url.is_empty() {
                    return Err("media.public_base_url must not be empty".to_string());
                }
                Ok(())
            }
            MediaConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
        }
    }
}

/// Rate limiting configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    #[serde(default)]
    pub enabled: bool,
    /// Requests per minute per IP (pre-auth limiting).
    #[serde(default = "default_ip_requests_per_minute")]
    pub ip_requests_per_minute: u32,
    /// Requests per minute per authenticated user.
    #[serde(default = "default_user_requests_per_minute")]
    pub user_requests_per_minute: u32,
    /// Burst size (allows temporary burst above rate limit).
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    /// Trusted proxy IP addresses/CIDR ranges.
    /// Only requests from these IPs will have X-Forwarded-For/X-Real-IP
    /// headers trusted. If empty, forwarded headers are never trusted.
    /// Use ["*"] to trust all proxies (NOT recommended for production).
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
    /// Maximum number of unique IPs/users to track before rejecting new
    /// entries (default: 100000). When the limit is reached, new keys
    /// are rejected with 429 until cleanup runs.
    #[serde(default = "default_max_entries")]
    pub max_entries: u32,
    /// Interval in seconds between cleanup sweeps of stale entries.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
    /// Time-to-live in seconds for rate limit entries (default: 300).
    /// Should be at least 2x the rate limit window.
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,
}

fn default_ip_requests_per_minute() -> u32 {
    300
}

fn default_user_requests_per_minute() -> u32 {
    100
}

fn default_burst_size() -> u32 {
    20
}

fn default_max_entries() -> u32 {
    100_000
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

fn default_entry_ttl_secs() -> u64 {
    300
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ip_requests_per_minute: default_ip_requests_per_minute(),
            user_requests_per_minute: default_user_requests_per_minute(),
            burst_size: default_burst_size(),
            trusted_proxies: Vec::new(),
            max_entries: default_max_entries(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            entry_ttl_secs: default_entry_ttl_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Validate rate limit configuration.
    /// Returns warnings for configs that are insecure but allowed,
    /// and errors for configs that are unsafe and should be rejected.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if !self.enabled {
            return Ok(warnings);
        }

        // Zero would panic when creating the cleanup timer.
        if self.cleanup_interval_secs == 0 {
            return Err("rate_limit.cleanup_interval_secs cannot be 0. \
                 Use a value >= 1 second."
                .to_string());
        }

        if self.trusted_proxies.len() == 1 && self.trusted_proxies[0] == "*" {
            warnings.push(
                "rate_limit.trusted_proxies=['*'] trusts ALL forwarded headers. \
                 This allows clients to spoof their IP address and bypass rate limits. \
                 Only use this setting in development or behind a trusted reverse proxy."
                    .to_string(),
            );
        }

        if self.entry_ttl_secs < 120 {
            warnings.push(format!(
                "rate_limit.entry_ttl_secs={} is very short. \
                 Entries may be evicted before rate limits reset, \
                 allowing limits to be bypassed by waiting. \
                 Recommended minimum: 120 seconds.",
                self.entry_ttl_secs
            ));
        }

        Ok(warnings)
    }
}

/// Keep-alive pinger configuration.
///
/// Deployments on hosts that spin down idle services configure this to
/// ping their own public URL on an interval.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// URL to ping.
    pub url: String,
    /// Seconds between pings (default: 840, under the common
    /// 15-minute idle window).
    #[serde(default = "default_keepalive_interval_secs")]
    pub interval_secs: u64,
}

fn default_keepalive_interval_secs() -> u64 {
    840
}

impl KeepaliveConfig {
    /// Validate keep-alive configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("keepalive.url must not be empty".to_string());
        }
        if self.interval_secs == 0 {
            return Err("keepalive.interval_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Ledger store configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Media store configuration.
    #[serde(default)]
    pub media: MediaConfig,
    /// Identity verification configuration (required).
    pub identity: IdentityConfig,
    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Keep-alive pinger configuration (optional).
    pub keepalive: Option<KeepaliveConfig>,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem media, SQLite ledger,
    /// and a fixed identity secret.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            ledger: LedgerConfig::default(),
            media: MediaConfig::default(),
            identity: IdentityConfig::for_testing(),
            rate_limit: RateLimitConfig::default(),
            keepalive: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.max_image_bytes, 10 * 1024 * 1024);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_identity_config_rejects_short_secret() {
        let config = IdentityConfig {
            jwt_secret: "short".to_string(),
            issuer: None,
            audience: None,
        };
        assert!(config.validate().is_err());
        assert!(IdentityConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_ledger_config_postgres_requires_url_or_host() {
        let invalid = LedgerConfig::Postgres {
            url: None,
            host: None,
            port: default_pg_port(),
            username: None,
            password: None,
            database: Some("pinboard".to_string()),
            ssl_mode: None,
            max_connections: 10,
            statement_timeout_ms: None,
        };
        assert!(invalid.validate().is_err());

        let valid = LedgerConfig::Postgres {
            url: Some("postgres://localhost/pinboard".to_string()),
            host: None,
            port: default_pg_port(),
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            max_connections: 10,
            statement_timeout_ms: None,
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_media_config_s3_partial_credentials_rejected() {
        let invalid = MediaConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access-key".to_string()),
            secret_access_key: None,
            force_path_style: false,
            public_base_url: None,
        };
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_media_config_tagged_roundtrip() {
        let config = MediaConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: Some("http://localhost:9000".to_string()),
            region: Some("us-east-1".to_string()),
            prefix: Some("media".to_string()),
            access_key_id: None,
            secret_access_key: None,
            force_path_style: true,
            public_base_url: None,
        };

        let json = serde_json::to_string(&config).unwrap();
        let decoded: MediaConfig = serde_json::from_str(&json).unwrap();
        match decoded {
            MediaConfig::S3 {
                force_path_style, ..
            } => assert!(force_path_style),
            _ => panic!("expected S3 config"),
        }
    }

    #[test]
    fn test_rate_limit_validate_rejects_zero_cleanup_interval() {
        let config = RateLimitConfig {
            enabled: true,
            cleanup_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rate_limit_validate_warns_on_wildcard_proxies() {
        let config = RateLimitConfig {
            enabled: true,
            trusted_proxies: vec!["*".to_string()],
            ..Default::default()
        };
        let warnings = config.validate().unwrap();
        assert!(!warnings.is_empty());
    }

    #[test]
    fn test_keepalive_defaults_under_idle_window() {
        let json = r#"{"url": "https://api.example.com/health"}"#;
        let config: KeepaliveConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.interval_secs, 840);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_for_testing_validates() {
        let config = AppConfig::for_testing();
        assert!(config.identity.validate().is_ok());
        assert!(config.ledger.validate().is_ok());
        assert!(config.media.validate().is_ok());
    }
}
