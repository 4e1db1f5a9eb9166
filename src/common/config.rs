//! Configuration schema, defaults, and layered loading.
//!
//! Precedence: defaults < config file < environment < CLI
use anyhow::{ensure, Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "FERRYDROP_";
pub const DEFAULT_PORT: u16 = 8080;
pub const MAX_PORT_ATTEMPTS: u16 = 1000;
pub const MAX_HISTORY_CAPACITY: usize = 10_000;
const MIN_POLL_INTERVAL_MS: u64 = 50;

pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "ferrydrop")
        .map(|p| p.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("ferrydrop.toml"))
}

/// Listener settings shared by every mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerSettings {
    /// First port tried when binding
    pub port: u16,
    /// How many sequential ports are tried before giving up
    pub port_attempts: u16,
    /// Cap on how long in-flight transfers may keep running after shutdown
    /// starts. Unset waits for them to finish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain_timeout_secs: Option<u64>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            port_attempts: 100,
            drain_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SendSettings {
    /// Downloads allowed before the share closes (0 = unlimited)
    pub limit: u32,
    /// Pause between the last allowed download finishing and shutdown
    pub grace_delay_secs: u64,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            limit: 1,
            grace_delay_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReceiveSettings {
    pub max_upload_bytes: u64,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 << 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClipboardSettings {
    pub poll_interval_ms: u64,
    pub history_capacity: usize,
}

impl Default for ClipboardSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            history_capacity: 50,
        }
    }
}

/// Fully resolved application configuration after all layers merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub send: SendSettings,
    pub receive: ReceiveSettings,
    pub clipboard: ClipboardSettings,
}

impl AppConfig {
    pub fn drain_timeout(&self) -> Option<Duration> {
        self.server.drain_timeout_secs.map(Duration::from_secs)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_secs(self.send.grace_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.clipboard.poll_interval_ms)
    }

    /// Upload body ceiling as a `usize` for the body-limit layer.
    pub fn upload_limit(&self) -> usize {
        usize::try_from(self.receive.max_upload_bytes).unwrap_or(usize::MAX)
    }

    /// Rejects values that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.server.port_attempts >= 1,
            "Invalid config: server.port_attempts must be >= 1"
        );
        ensure!(
            self.server.port_attempts <= MAX_PORT_ATTEMPTS,
            "Invalid config: server.port_attempts must be <= {MAX_PORT_ATTEMPTS}"
        );
        ensure!(
            self.receive.max_upload_bytes > 0,
            "Invalid config: receive.max_upload_bytes must be > 0"
        );
        ensure!(
            self.clipboard.poll_interval_ms >= MIN_POLL_INTERVAL_MS,
            "Invalid config: clipboard.poll_interval_ms must be >= {MIN_POLL_INTERVAL_MS}"
        );
        ensure!(
            self.clipboard.history_capacity >= 1,
            "Invalid config: clipboard.history_capacity must be >= 1"
        );
        ensure!(
            self.clipboard.history_capacity <= MAX_HISTORY_CAPACITY,
            "Invalid config: clipboard.history_capacity must be <= {MAX_HISTORY_CAPACITY}"
        );
        Ok(())
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Loads config from defaults/file/env.
pub fn load_config() -> Result<AppConfig> {
    load_config_from(&config_path())
}

/// Same as [`load_config`] with an explicit config file location.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let config: AppConfig = Figment::new()
        .merge(Serialized::defaults(AppConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Failed to load configuration")?;

    config.validate()?;

    Ok(config)
}

/// Applies runtime overrides to a loaded config.
pub fn apply_overrides(mut config: AppConfig, overrides: &ConfigOverrides) -> AppConfig {
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(limit) = overrides.limit {
        config.send.limit = limit;
    }
    config
}
