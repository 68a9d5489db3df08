use serde::Deserialize;

/// Top-level application configuration.
/// Loaded from environment variables (and a `.env` file, if present).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Database settings
    pub database: DatabaseConfig,
    /// Redis settings; upgrade rate limiting and token revocation are
    /// disabled when absent.
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// JWT settings
    pub auth: AuthConfig,
    /// Real-time gateway settings
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to (default: 0.0.0.0)
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP API port (default: 8080)
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Log level (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,
    /// Value of the `type` claim that marks an access token (default: "access")
    #[serde(default = "default_access_token_type")]
    pub access_token_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Period of the ping/pong liveness sweep in seconds (default: 30)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    /// Join admins to `admin_<companyId>` for every company they administer
    /// when they connect (default: true)
    #[serde(default = "default_true")]
    pub auto_join_company_rooms: bool,
    /// Gate client `join_room`/`subscribe` requests for role rooms and
    /// company admin rooms on the caller's identity. Off means any room can
    /// be joined on request (default: false)
    #[serde(default)]
    pub restrict_room_joins: bool,
    /// Upgrade attempts allowed per client IP within the window (default: 30)
    #[serde(default = "default_upgrade_rate_limit")]
    pub upgrade_rate_limit: u64,
    /// Rate limit window in seconds (default: 60)
    #[serde(default = "default_upgrade_rate_window")]
    pub upgrade_rate_window_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            auto_join_company_rooms: true,
            restrict_room_joins: false,
            upgrade_rate_limit: default_upgrade_rate_limit(),
            upgrade_rate_window_secs: default_upgrade_rate_window(),
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, e.g. `IVM_AUTH__JWT_SECRET`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("IVM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize()
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_api_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_connections() -> u32 {
    10
}
fn default_access_token_type() -> String {
    "access".to_string()
}
fn default_heartbeat_interval() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_upgrade_rate_limit() -> u64 {
    30
}
fn default_upgrade_rate_window() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let cfg: AppConfig = config::Config::builder()
            .set_override("database.url", "postgres://localhost/ivm")
            .unwrap()
            .set_override("auth.jwt_secret", "secret")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.server.api_port, 8080);
        assert_eq!(cfg.database.max_connections, 10);
        assert!(cfg.redis.is_none());
        assert_eq!(cfg.auth.access_token_type, "access");
        assert_eq!(cfg.realtime.heartbeat_interval_secs, 30);
        assert!(cfg.realtime.auto_join_company_rooms);
        assert!(!cfg.realtime.restrict_room_joins);
    }

    #[test]
    fn test_realtime_overrides() {
        let cfg: AppConfig = config::Config::builder()
            .set_override("database.url", "postgres://localhost/ivm")
            .unwrap()
            .set_override("auth.jwt_secret", "secret")
            .unwrap()
            .set_override("realtime.heartbeat_interval_secs", 5)
            .unwrap()
            .set_override("realtime.auto_join_company_rooms", false)
            .unwrap()
            .set_override("realtime.restrict_room_joins", true)
            .unwrap()
            .set_override("redis.url", "redis://127.0.0.1/")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.realtime.heartbeat_interval_secs, 5);
        assert!(!cfg.realtime.auto_join_company_rooms);
        assert!(cfg.realtime.restrict_room_joins);
        assert_eq!(cfg.realtime.upgrade_rate_limit, 30);
        assert_eq!(cfg.redis.map(|r| r.url).as_deref(), Some("redis://127.0.0.1/"));
    }
}
