use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::range::RangeKey;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Service configuration.  Every field carries a default so the proxy runs
/// without a config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface the HTTP listener binds to.
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    /// TCP port for the HTTP listener.  `PORT` in the environment wins.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the frontend.  `null` disables static serving.
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> Option<PathBuf> {
    Some(PathBuf::from("public"))
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

const FIRMS_CSV_BASE: &str =
    "https://firms.modaps.eosdis.nasa.gov/data/active_fire/suomi-npp-viirs-c2/csv";

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// CSV feed URL per range.
    #[serde(default)]
    pub urls: RangeUrls,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bodies shorter than this are treated as a failed fetch.
    #[serde(default = "default_min_payload_bytes")]
    pub min_payload_bytes: usize,
    /// Per-request timeout.  Unset leaves the HTTP client default in place.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            urls: RangeUrls::default(),
            user_agent: default_user_agent(),
            min_payload_bytes: default_min_payload_bytes(),
            request_timeout_secs: None,
        }
    }
}

impl UpstreamConfig {
    /// Upstream URL for a validated range.
    pub fn url_for(&self, range: RangeKey) -> &str {
        match range {
            RangeKey::Last24h => &self.urls.last_24h,
            RangeKey::Last48h => &self.urls.last_48h,
            RangeKey::Last7d => &self.urls.last_7d,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RangeUrls {
    #[serde(rename = "24h", default = "default_url_24h")]
    pub last_24h: String,
    #[serde(rename = "48h", default = "default_url_48h")]
    pub last_48h: String,
    #[serde(rename = "7d", default = "default_url_7d")]
    pub last_7d: String,
}

impl Default for RangeUrls {
    fn default() -> Self {
        Self {
            last_24h: default_url_24h(),
            last_48h: default_url_48h(),
            last_7d: default_url_7d(),
        }
    }
}

fn default_url_24h() -> String {
    format!("{FIRMS_CSV_BASE}/SUOMI_VIIRS_C2_Global_24h.csv")
}

fn default_url_48h() -> String {
    format!("{FIRMS_CSV_BASE}/SUOMI_VIIRS_C2_Global_48h.csv")
}

fn default_url_7d() -> String {
    format!("{FIRMS_CSV_BASE}/SUOMI_VIIRS_C2_Global_7d.csv")
}

fn default_user_agent() -> String {
    concat!("firecache/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_min_payload_bytes() -> usize {
    100
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Freshness window in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_ttl_secs() -> u64 {
    300
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load and validate a [`Config`] from an optional YAML file.
///
/// Without a path the built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?
        }
        None => Config::default(),
    };
    validate_config(&config)?;
    Ok(config)
}

/// Basic sanity checks that cannot be expressed purely with serde.
fn validate_config(config: &Config) -> Result<()> {
    anyhow::ensure!(config.cache.ttl_secs > 0, "cache.ttl_secs must be positive");
    anyhow::ensure!(
        config.upstream.min_payload_bytes > 0,
        "upstream.min_payload_bytes must be positive"
    );
    for range in RangeKey::ALL {
        anyhow::ensure!(
            !config.upstream.url_for(range).trim().is_empty(),
            "upstream.urls.{range} must not be empty"
        );
    }
    Ok(())
}
