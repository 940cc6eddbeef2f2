//! Configuration for the localid service and client.
//!
//! Settings are read from `localid.toml` and layered under `LOCALID_*`
//! environment variables (environment wins). Three keys are required —
//! `api_key`, `ranking_url` and `game_api_base` — and a missing one is a
//! fatal startup condition reported before any command runs, never a
//! workflow error.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "localid.toml";

/// Session registry service settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Address the registry service binds to.
    #[serde(default = "RegistryConfig::default_host")]
    pub host: SocketAddr,

    /// Idle session lifetime, in hours.
    #[serde(default = "RegistryConfig::default_ttl_hours")]
    pub ttl_hours: i64,

    /// Cadence of the expiry sweep, in minutes.
    #[serde(default = "RegistryConfig::default_sweep_minutes")]
    pub sweep_minutes: u64,

    /// Permissive CORS for local frontend development.
    #[serde(default)]
    pub dev_mode: bool,
}

impl RegistryConfig {
    fn default_host() -> SocketAddr {
        ([127, 0, 0, 1], 4170).into()
    }

    fn default_ttl_hours() -> i64 {
        24
    }

    fn default_sweep_minutes() -> u64 {
        30
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            ttl_hours: Self::default_ttl_hours(),
            sweep_minutes: Self::default_sweep_minutes(),
            dev_mode: false,
        }
    }
}

/// Top level configuration as written in the file; required keys are still
/// optional here so the environment can fill them in.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    api_key: Option<String>,
    ranking_url: Option<String>,
    game_api_base: Option<String>,
    registry_url: Option<String>,
    #[serde(default)]
    registry: RegistryConfig,
}

/// Environment overrides, read once at load time.
#[derive(Debug, Clone, Default)]
struct EnvOverrides {
    api_key: Option<String>,
    ranking_url: Option<String>,
    game_api_base: Option<String>,
    registry_url: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            api_key: std::env::var("LOCALID_API_KEY").ok(),
            ranking_url: std::env::var("LOCALID_RANKING_URL").ok(),
            game_api_base: std::env::var("LOCALID_GAME_API_BASE").ok(),
            registry_url: std::env::var("LOCALID_REGISTRY_URL").ok(),
        }
    }
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Game-backend API key, sent with every upstream request.
    pub api_key: String,
    /// Ranking service endpoint, used by the dependent-records stages.
    pub ranking_url: String,
    /// Base URL of the game-backend API.
    pub game_api_base: String,
    /// Base URL of the session registry service the client talks to.
    pub registry_url: String,
    /// Registry service settings (used by `localid serve`).
    pub registry: RegistryConfig,
}

impl AppConfig {
    /// Load and validate configuration.
    ///
    /// An explicit `path` must exist; without one, `localid.toml` in the
    /// working directory is used when present, else file settings are empty
    /// and only the environment counts.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let raw = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::read_file(default)?
                } else {
                    RawConfig::default()
                }
            }
        };
        Self::merge(raw, EnvOverrides::from_env())
    }

    fn read_file(path: &Path) -> Result<RawConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn merge(raw: RawConfig, env: EnvOverrides) -> Result<Self> {
        let api_key = env.api_key.or(raw.api_key);
        let ranking_url = env.ranking_url.or(raw.ranking_url);
        let game_api_base = env.game_api_base.or(raw.game_api_base);
        let registry_url = env
            .registry_url
            .or(raw.registry_url)
            .unwrap_or_else(|| "http://127.0.0.1:4170".to_string());

        let mut missing = Vec::new();
        if api_key.as_deref().is_none_or(str::is_empty) {
            missing.push("api_key (LOCALID_API_KEY)");
        }
        if ranking_url.as_deref().is_none_or(str::is_empty) {
            missing.push("ranking_url (LOCALID_RANKING_URL)");
        }
        if game_api_base.as_deref().is_none_or(str::is_empty) {
            missing.push("game_api_base (LOCALID_GAME_API_BASE)");
        }
        if !missing.is_empty() {
            bail!("Missing required configuration: {}", missing.join(", "));
        }

        Ok(Self {
            api_key: api_key.unwrap_or_default(),
            ranking_url: ranking_url.unwrap_or_default(),
            game_api_base: game_api_base.unwrap_or_default(),
            registry_url,
            registry: raw.registry,
        })
    }
}
