//! Configuration management for the bledomd daemon.
//!
//! Handles loading, parsing, and validation of YAML configuration files
//! that define the target device, link tuning, and daemon behavior.
//! Configuration is loaded once at startup and immutable thereafter.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Main configuration structure for the bledomd daemon.
///
/// # Example
///
/// ```yaml
/// version: 1
/// device:
///   address: "BE:16:FA:00:51:C7"
///   characteristic: "0000fff3-0000-1000-8000-00805f9b34fb"
///   connect_timeout_secs: 10
/// link:
///   keepalive_secs: 1
///   settle_ms: 50
///   retry_delay_secs: 5
///   max_reconnect_attempts: 5
///   cooldown_secs: 30
///   dispatch_timeout_ms: 2000
/// enable_broadcast: true
/// broadcast_interval: 10
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Target LED strip device.
    pub device: DeviceCfg,

    /// Link maintenance tuning.
    #[serde(default)]
    pub link: LinkCfg,

    /// Whether to periodically broadcast link statistics.
    #[serde(default = "defaults::enable_broadcast")]
    pub enable_broadcast: bool,

    /// Interval between broadcasts in seconds.
    #[serde(default = "defaults::broadcast_interval")]
    pub broadcast_interval: u16,
}

/// BLE device identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCfg {
    /// Bluetooth MAC address of the strip (`AA:BB:CC:DD:EE:FF`).
    pub address: String,

    /// GATT characteristic UUID commands are written to.
    #[serde(default = "defaults::characteristic")]
    pub characteristic: String,

    /// Bound on a single connection attempt, in seconds.
    #[serde(default = "defaults::connect_timeout_secs")]
    pub connect_timeout_secs: u16,
}

/// Link maintenance tuning knobs.
///
/// The defaults match the strip's observed behavior; there is rarely a
/// reason to change anything but the reconnect policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCfg {
    /// Liveness poll interval while connected, in seconds.
    #[serde(default = "defaults::keepalive_secs")]
    pub keepalive_secs: u16,

    /// Pause after each write so the strip can process it, in milliseconds.
    #[serde(default = "defaults::settle_ms")]
    pub settle_ms: u16,

    /// Delay before an ordinary reconnect attempt, in seconds.
    #[serde(default = "defaults::retry_delay_secs")]
    pub retry_delay_secs: u16,

    /// Consecutive failures before backing off to the cooldown.
    #[serde(default = "defaults::max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Extended delay after `max_reconnect_attempts` failures, in seconds.
    #[serde(default = "defaults::cooldown_secs")]
    pub cooldown_secs: u16,

    /// Bound on a dispatcher round-trip, in milliseconds.
    #[serde(default = "defaults::dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u16,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self {
            keepalive_secs: defaults::keepalive_secs(),
            settle_ms: defaults::settle_ms(),
            retry_delay_secs: defaults::retry_delay_secs(),
            max_reconnect_attempts: defaults::max_reconnect_attempts(),
            cooldown_secs: defaults::cooldown_secs(),
            dispatch_timeout_ms: defaults::dispatch_timeout_ms(),
        }
    }
}

impl LinkCfg {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(u64::from(self.keepalive_secs))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(u64::from(self.settle_ms))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.retry_delay_secs))
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(u64::from(self.cooldown_secs))
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.dispatch_timeout_ms))
    }
}

impl DeviceCfg {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            device: DeviceCfg {
                address: String::new(),
                characteristic: defaults::characteristic(),
                connect_timeout_secs: defaults::connect_timeout_secs(),
            },
            link: LinkCfg::default(),
            enable_broadcast: defaults::enable_broadcast(),
            broadcast_interval: defaults::broadcast_interval(),
        }
    }
}

impl Config {
    /// Validates the configuration for consistency.
    ///
    /// Checks the device address shape, the characteristic UUID, and that
    /// no timing knob is zeroed in a way that would spin a loop.
    pub fn validate(&self) -> Result<()> {
        let addr = &self.device.address;
        let valid_addr = addr.len() == 17
            && addr.split(':').count() == 6
            && addr
                .split(':')
                .all(|octet| octet.len() == 2 && u8::from_str_radix(octet, 16).is_ok());
        if !valid_addr {
            anyhow::bail!("Invalid device address '{addr}' (expected AA:BB:CC:DD:EE:FF)");
        }

        Uuid::parse_str(&self.device.characteristic).with_context(|| {
            format!(
                "Invalid characteristic UUID '{}'",
                self.device.characteristic
            )
        })?;

        if self.link.keepalive_secs == 0 {
            anyhow::bail!("link.keepalive_secs must be at least 1");
        }
        if self.link.max_reconnect_attempts == 0 {
            anyhow::bail!("link.max_reconnect_attempts must be at least 1");
        }
        if self.link.dispatch_timeout_ms == 0 {
            anyhow::bail!("link.dispatch_timeout_ms must be at least 1");
        }

        Ok(())
    }

    /// Parsed characteristic UUID.
    ///
    /// Only valid after [`Config::validate`]; call sites go through the
    /// ConfigManager which validates on load.
    pub fn characteristic_uuid(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.device.characteristic)
            .with_context(|| format!("Invalid UUID '{}'", self.device.characteristic))
    }
}

mod defaults {
    /// Default GATT characteristic for BLEDOM-family strips.
    pub fn characteristic() -> String {
        "0000fff3-0000-1000-8000-00805f9b34fb".to_string()
    }

    pub fn connect_timeout_secs() -> u16 {
        10
    }

    pub fn keepalive_secs() -> u16 {
        1
    }

    pub fn settle_ms() -> u16 {
        50
    }

    pub fn retry_delay_secs() -> u16 {
        5
    }

    pub fn max_reconnect_attempts() -> u32 {
        5
    }

    pub fn cooldown_secs() -> u16 {
        30
    }

    pub fn dispatch_timeout_ms() -> u16 {
        2000
    }

    pub fn enable_broadcast() -> bool {
        false
    }

    pub fn broadcast_interval() -> u16 {
        10
    }
}

fn locate_config() -> Result<PathBuf> {
    // 1) ENV
    if let Ok(env_path) = env::var("BLEDOMD_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    // 2) XDG_CONFIG_HOME or $HOME/.config
    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("bledomd/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir.clone());
        }
    }

    // 3) /etc
    let etc = Path::new("/etc/bledomd/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    anyhow::bail!("Configuration file not found in any standard location")
}

/// Configuration manager that handles both config data and file operations.
///
/// Provides a unified interface for loading and managing configuration
/// without exposing the underlying file path to the rest of the application.
///
/// # Example
///
/// ```no_run
/// use bledomd::config::ConfigManager;
/// use std::path::PathBuf;
///
/// # async fn example() -> anyhow::Result<()> {
/// // Load from specific path
/// let config_manager = ConfigManager::load(Some(PathBuf::from("config.yml"))).await?;
///
/// // Load from standard locations
/// let config_manager = ConfigManager::load(None).await?;
///
/// // Access configuration
/// let address = config_manager.get().await.device.address.clone();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<Config>>,
    path: PathBuf,
}

#[allow(dead_code)]
impl ConfigManager {
    /// Creates a new ConfigManager with the given config and path.
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            path,
        }
    }

    /// Loads configuration from file or standard locations.
    ///
    /// Searches for configuration in the following order:
    /// 1. Provided path parameter
    /// 2. BLEDOMD_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/bledomd/config.yml or ~/.config/bledomd/config.yml
    /// 4. /etc/bledomd/config.yml
    pub async fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration file found")?,
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path).await?;

        Ok(Self::new(config, config_path))
    }

    /// Gets a read-only reference to the current configuration.
    pub async fn get(&self) -> tokio::sync::RwLockReadGuard<'_, Config> {
        self.config.read().await
    }

    /// Returns the path to the configuration file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saves the current configuration to file.
    pub async fn save(&self) -> Result<()> {
        let config = self.config.read().await;
        let config_yaml =
            serde_yaml::to_string(&*config).context("Failed to serialize configuration")?;

        let tmp_path = self.path.with_extension("yml.tmp");
        fs::write(&tmp_path, config_yaml).with_context(|| {
            format!("Failed to write temporary config to {}", tmp_path.display())
        })?;

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move config to {}", self.path.display()))?;

        info!("Configuration saved to: {}", self.path.display());
        Ok(())
    }

    /// Validates the current configuration.
    pub async fn validate(&self) -> Result<()> {
        let config = self.config.read().await;
        config.validate()
    }

    /// Clones the current configuration.
    ///
    /// Useful when you need to work with a snapshot of the config.
    pub async fn clone_config(&self) -> Config {
        self.config.read().await.clone()
    }

    /// Loads configuration from a specific path (internal helper).
    async fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        if config.version != 1 {
            anyhow::bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}
