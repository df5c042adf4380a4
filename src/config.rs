// Configuration management

use crate::error::{Result, WardenError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_TARGET_HOST: &str = "HOSTWARDEN_TARGET_HOST";
pub const ENV_STATE_FILE: &str = "HOSTWARDEN_STATE_FILE";
pub const ENV_ALERT_URL: &str = "HOSTWARDEN_ALERT_URL";
pub const ENV_COMPOSE_FILE: &str = "HOSTWARDEN_COMPOSE_FILE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeConfig,
    /// Where the last observed health state is kept
    pub state_file: Option<PathBuf>,
    pub alert: AlertConfig,
    pub recycle: RecycleConfig,
    /// Directory for run lock files; defaults to the state file's directory
    pub lock_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMethod {
    #[default]
    Icmp,
    Tcp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub target_host: Option<String>,
    pub method: ProbeMethod,
    /// Only used by the tcp method
    pub port: Option<u16>,
    pub timeout_ms: u64,
    pub interval_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_host: None,
            method: ProbeMethod::Icmp,
            port: None,
            timeout_ms: 2000,
            interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum GroupConfig {
    /// A docker compose application stack
    Compose {
        file: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
    },
    /// A fixed set of systemd units
    Systemd {
        units: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecycleConfig {
    pub group: Option<GroupConfig>,
    pub grace_secs: u64,
    pub command_timeout_secs: u64,
    pub interval_secs: u64,
}

impl Default for RecycleConfig {
    fn default() -> Self {
        Self {
            group: None,
            grace_secs: 5,
            command_timeout_secs: 120,
            interval_secs: 24 * 60 * 60,
        }
    }
}

impl Config {
    /// Get default config path: ~/.config/hostwarden/config.yaml
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("hostwarden").join("config.yaml"))
    }

    /// Default location of the persisted health state
    pub fn default_state_file() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join("hostwarden").join("state"))
            .unwrap_or_else(|| PathBuf::from("hostwarden.state"))
    }

    /// Load config from path, falling back to defaults if not found,
    /// then apply environment overrides
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(|| Self::default_path().unwrap_or_default());

        let mut config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            serde_yaml::from_str(&contents).map_err(|e| {
                WardenError::Config(format!("{}: {}", config_path.display(), e))
            })?
        } else {
            tracing::debug!("No config at {:?}, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(host) = env_value(ENV_TARGET_HOST) {
            self.probe.target_host = Some(host);
        }
        if let Some(path) = env_value(ENV_STATE_FILE) {
            self.state_file = Some(PathBuf::from(path));
        }
        if let Some(url) = env_value(ENV_ALERT_URL) {
            self.alert.webhook_url = Some(url);
        }
        if let Some(file) = env_value(ENV_COMPOSE_FILE) {
            let project = match &self.recycle.group {
                Some(GroupConfig::Compose { project, .. }) => project.clone(),
                _ => None,
            };
            self.recycle.group = Some(GroupConfig::Compose {
                file: PathBuf::from(file),
                project,
            });
        }
    }

    /// Everything the prober needs must be present before the first probe
    pub fn validate_probe(&self) -> Result<()> {
        let host = self.probe.target_host.as_deref().unwrap_or("").trim();
        if host.is_empty() {
            return Err(config_error("probe.target_host is required"));
        }
        if self.probe.timeout_ms == 0 {
            return Err(config_error("probe.timeout_ms must be greater than zero"));
        }
        if self.probe.method == ProbeMethod::Tcp && self.probe.port.is_none() {
            return Err(config_error("probe.port is required when probe.method is tcp"));
        }

        let url = self.alert.webhook_url.as_deref().unwrap_or("").trim();
        if url.is_empty() {
            return Err(config_error("alert.webhook_url is required"));
        }
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| config_error(&format!("alert.webhook_url is not a valid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(config_error("alert.webhook_url must use http or https"));
        }
        if self.alert.timeout_secs == 0 {
            return Err(config_error("alert.timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Everything the recycler needs must be present before the first stop
    pub fn validate_recycle(&self) -> Result<()> {
        match &self.recycle.group {
            None => return Err(config_error("recycle.group is required")),
            Some(GroupConfig::Compose { file, .. }) if file.as_os_str().is_empty() => {
                return Err(config_error("recycle.group.file must not be empty"));
            }
            Some(GroupConfig::Systemd { units }) if units.is_empty() => {
                return Err(config_error("recycle.group.units must list at least one unit"));
            }
            Some(_) => {}
        }
        if self.recycle.command_timeout_secs == 0 {
            return Err(config_error("recycle.command_timeout_secs must be greater than zero"));
        }
        Ok(())
    }

    /// Daemon mode additionally needs usable intervals
    pub fn validate_daemon(&self) -> Result<()> {
        self.validate_probe()?;
        if self.probe.interval_secs == 0 {
            return Err(config_error("probe.interval_secs must be greater than zero"));
        }
        if self.recycle.group.is_some() {
            self.validate_recycle()?;
            if self.recycle.interval_secs == 0 {
                return Err(config_error("recycle.interval_secs must be greater than zero"));
            }
        }
        Ok(())
    }

    pub fn state_file_path(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(Self::default_state_file)
    }

    pub fn lock_dir_path(&self) -> PathBuf {
        if let Some(dir) = &self.lock_dir {
            return dir.clone();
        }
        match self.state_file_path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe.timeout_ms)
    }

    pub fn alert_timeout(&self) -> Duration {
        Duration::from_secs(self.alert.timeout_secs)
    }

    pub fn recycle_grace(&self) -> Duration {
        Duration::from_secs(self.recycle.grace_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.recycle.command_timeout_secs)
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn config_error(message: &str) -> anyhow::Error {
    WardenError::Config(message.to_string()).into()
}
