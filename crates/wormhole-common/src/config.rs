//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Initialize the global configuration from environment.
///
/// Should be called once at application startup, before any other code accesses config.
pub fn init() -> Result<&'static AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let app_config = load(config::File::with_name("config").required(false))?;
    Ok(CONFIG.get_or_init(|| app_config))
}

/// Build a configuration from defaults, one file source, and the environment.
pub fn load<S>(file: S) -> Result<AppConfig, config::ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    let cfg = config::Config::builder()
        // Defaults
        .set_default("database.url", "sqlite://wormhole.db?mode=rwc")?
        .set_default("database.max_connections", 5)?
        .set_default("database.min_connections", 1)?
        .set_default("platform.api_url", "https://discord.com/api/v10")?
        .set_default("platform.gateway_url", "wss://gateway.discord.gg/?v=10&encoding=json")?
        .set_default("platform.web_url", "https://discord.com")?
        .set_default("platform.token", "")?
        .set_default("platform.cdn_url", "https://cdn.discordapp.com")?
        .set_default("platform.request_timeout_secs", 15)?
        .set_default("platform.message_cache_size", 10_000)?
        .set_default("relay.suppression_secs", 5)?
        .set_default("relay.history_timeout_secs", 10)?
        .set_default("relay.endpoint_name", "Wormhole")?
        .set_default("limits.max_wormholes_per_user", 5)?
        .set_default("limits.max_wormhole_name_length", 64)?
        .set_default("health.host", "127.0.0.1")?
        .set_default("health.port", 8090)?
        .set_default("logging.json", false)?
        .add_source(file)
        // Environment variables (WORMHOLE__PLATFORM__TOKEN, WORMHOLE__DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("WORMHOLE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    cfg.try_deserialize()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub platform: PlatformConfig,
    pub relay: RelayConfig,
    pub limits: LimitsConfig,
    pub health: HealthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// SQLite connection URL (`sqlite://...`)
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    /// REST API base URL, without trailing slash.
    pub api_url: String,
    /// WebSocket gateway URL.
    pub gateway_url: String,
    /// Base of message jump URLs (`{web_url}/channels/{guild}/{channel}/{message}`).
    pub web_url: String,
    /// Bot token. Leave empty for management-only commands.
    pub token: String,
    /// Base of avatar image URLs.
    pub cdn_url: String,
    pub request_timeout_secs: u64,
    /// Recent messages remembered so deletes and edits can be relayed.
    pub message_cache_size: usize,
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// How long a fingerprint stays in the delete suppression cache.
    pub suppression_secs: u64,
    /// Upper bound for one history query during mirror lookup.
    pub history_timeout_secs: u64,
    /// Display name of newly created delivery endpoints.
    pub endpoint_name: String,
}

impl RelayConfig {
    pub fn suppression_delay(&self) -> Duration {
        Duration::from_secs(self.suppression_secs)
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_secs(self.history_timeout_secs)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            suppression_secs: 5,
            history_timeout_secs: 10,
            endpoint_name: "Wormhole".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// How many wormholes a single user may administrate.
    pub max_wormholes_per_user: u32,
    pub max_wormhole_name_length: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_wormholes_per_user: 5,
            max_wormhole_name_length: 64,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}
