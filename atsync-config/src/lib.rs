use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// Listening port used when none is configured.
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub deployment: Option<DeploymentSection>,
    #[serde(default)]
    pub queue: Option<QueueSection>,
    #[serde(default)]
    pub sync_sources_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DeploymentSection {
    #[serde(default)]
    pub container: Option<bool>,
    #[serde(default)]
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub max_pending: Option<usize>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub retain_finished: Option<usize>,
    #[serde(default)]
    pub key_prefix: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        let _ = s; // suppress unused warning
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// External broker address. When set, jobs go to Redis instead of the
    /// in-process queue.
    pub redis_url: Option<String>,
    pub deployment: DeploymentConfig,
    pub queue: QueueConfig,
    /// JSON file seeding the in-memory sync-source store.
    pub sync_sources_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentConfig {
    /// Running inside a container: workers call back over loopback.
    pub container: bool,
    /// Public site URL; overrides the host observed on each request.
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueConfig {
    pub max_pending: usize,
    pub max_attempts: u32,
    pub retain_finished: usize,
    pub key_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            redis_url: None,
            deployment: DeploymentConfig {
                container: false,
                public_url: None,
            },
            queue: QueueConfig {
                max_pending: 1000,
                max_attempts: 3,
                retain_finished: 1000,
                key_prefix: "atsync".to_string(),
            },
            sync_sources_path: None,
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    let bytes = s.as_bytes();
    match bytes {
        b"1" | b"true" | b"TRUE" | b"True" | b"yes" | b"YES" | b"Yes" | b"y" | b"Y" => Ok(true),
        b"0" | b"false" | b"FALSE" | b"False" | b"no" | b"NO" | b"No" | b"n" | b"N" => Ok(false),
        _ => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Ok(true),
            "false" | "no" | "n" => Ok(false),
            _ => Err(()),
        },
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    let mut cfg = Config::default();

    if let Some(p) = path {
        let raw = load_raw_from_file(p)?;
        if let Some(server) = raw.server {
            apply_opt!(cfg.server.host, server.host);
            apply_opt!(cfg.server.port, server.port);
        }
        if let Some(logging) = raw.logging {
            apply_opt!(cfg.logging.level, logging.level);
            apply_opt!(cfg.logging.json, logging.json);
        }
        apply_opt!(cfg.redis_url, raw.redis_url, wrap);
        if let Some(d) = raw.deployment {
            apply_opt!(cfg.deployment.container, d.container);
            apply_opt!(cfg.deployment.public_url, d.public_url, wrap);
        }
        if let Some(q) = raw.queue {
            apply_opt!(cfg.queue.max_pending, q.max_pending);
            apply_opt!(cfg.queue.max_attempts, q.max_attempts);
            apply_opt!(cfg.queue.retain_finished, q.retain_finished);
            apply_opt!(cfg.queue.key_prefix, q.key_prefix);
        }
        apply_opt!(cfg.sync_sources_path, raw.sync_sources_path, wrap);
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

/// Helper to parse env var as a specific type
#[inline]
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Parse(format!("invalid {}: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Helper to parse env var as bool
#[inline]
fn env_bool(key: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(key) {
        Ok(v) => parse_bool(&v)
            .map(Some)
            .map_err(|_| ConfigError::Parse(format!("invalid {}", key))),
        Err(_) => Ok(None),
    }
}

/// Helper to get env var as string; empty values count as unset.
#[inline]
fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Apply all environment variable overrides to config
fn apply_env_overrides(cfg: &mut Config) -> Result<(), ConfigError> {
    // Server
    if let Some(v) = env_str("ATSYNC_SERVER_HOST") {
        cfg.server.host = v;
    }
    // Container platforms commonly inject a bare PORT
    if let Some(v) = env_parse::<u16>("PORT")? {
        cfg.server.port = v;
    }
    if let Some(v) = env_parse::<u16>("ATSYNC_SERVER_PORT")? {
        cfg.server.port = v;
    }

    // Logging
    if let Some(v) = env_str("ATSYNC_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = env_bool("ATSYNC_LOG_JSON")? {
        cfg.logging.json = v;
    }

    // Redis
    if let Some(v) = env_str("ATSYNC_REDIS_URL") {
        cfg.redis_url = Some(v);
    }

    // Deployment
    if let Some(v) = env_bool("ATSYNC_DOCKER")? {
        cfg.deployment.container = v;
    }
    if let Some(v) = env_str("ATSYNC_PUBLIC_URL") {
        cfg.deployment.public_url = Some(v);
    }

    // Queue
    if let Some(v) = env_parse::<usize>("ATSYNC_QUEUE_MAX_PENDING")? {
        cfg.queue.max_pending = v;
    }
    if let Some(v) = env_parse::<u32>("ATSYNC_QUEUE_MAX_ATTEMPTS")? {
        cfg.queue.max_attempts = v;
    }
    if let Some(v) = env_parse::<usize>("ATSYNC_QUEUE_RETAIN_FINISHED")? {
        cfg.queue.retain_finished = v;
    }
    if let Some(v) = env_str("ATSYNC_QUEUE_KEY_PREFIX") {
        cfg.queue.key_prefix = v;
    }

    if let Some(v) = env_str("ATSYNC_SYNC_SOURCES_PATH") {
        cfg.sync_sources_path = Some(v);
    }

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    if let Some(redis_url) = &cfg.redis_url {
        match url::Url::parse(redis_url) {
            Ok(u) if matches!(u.scheme(), "redis" | "rediss" | "redis+unix" | "unix") => {}
            Ok(u) => {
                return Err(ConfigError::Validation(format!(
                    "redis_url must use a redis scheme, got {}",
                    u.scheme()
                )))
            }
            Err(e) => {
                return Err(ConfigError::Validation(format!(
                    "invalid redis_url: {}",
                    e
                )))
            }
        }
    }

    if let Some(public_url) = &cfg.deployment.public_url {
        match url::Url::parse(public_url) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Validation(format!(
                    "deployment.public_url must be an http(s) URL: {}",
                    public_url
                )))
            }
        }
    }

    if cfg.queue.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "queue.max_attempts must be at least 1".into(),
        ));
    }
    if cfg.queue.max_pending == 0 {
        return Err(ConfigError::Validation(
            "queue.max_pending must be at least 1".into(),
        ));
    }
    if cfg.queue.key_prefix.is_empty() {
        return Err(ConfigError::Validation(
            "queue.key_prefix must not be empty".into(),
        ));
    }
    Ok(())
}
