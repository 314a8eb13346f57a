//! `aiotctl.toml` configuration for the gateway manager.
//!
//! Every field has a default, so a missing or empty file yields the standard
//! gateway layout. `aiotctl init` prints the defaults as a starting point.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/aiot/aiotctl.toml";

/// Top-level manager configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub layout: Layout,
    pub artifacts: ArtifactConfig,
    pub cloud: CloudConfig,
    pub install: InstallPolicy,
}

/// Where things live on the gateway and who owns them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Layout {
    /// Application directory holding the two pipeline scripts.
    pub app_dir: PathBuf,
    /// Local SQLite dataset shared by collector and publisher.
    pub data_dir: PathBuf,
    /// One plain-text file per configuration key, plus `gateway.env`.
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Root CA, device certificate and private key.
    pub cert_dir: PathBuf,
    pub unit_dir: PathBuf,
    /// Install location of the manager binary itself.
    pub bin_path: PathBuf,
    pub service_account: String,
    /// Absolute interpreter path used in `ExecStart=`.
    pub interpreter: PathBuf,
    pub collector_script: String,
    pub publisher_script: String,
}

impl Layout {
    pub fn collector_script_path(&self) -> PathBuf {
        self.app_dir.join(&self.collector_script)
    }

    pub fn publisher_script_path(&self) -> PathBuf {
        self.app_dir.join(&self.publisher_script)
    }

    pub fn env_file(&self) -> PathBuf {
        self.state_dir.join("gateway.env")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("sensor_data.db")
    }

    /// Directories `install` creates and hands to the service account.
    pub fn managed_dirs(&self) -> [&Path; 5] {
        [
            &self.app_dir,
            &self.data_dir,
            &self.state_dir,
            &self.log_dir,
            &self.cert_dir,
        ]
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            app_dir: "/aiot".into(),
            data_dir: "/aiot/dataset".into(),
            state_dir: "/aiot/state".into(),
            log_dir: "/aiot/logs".into(),
            cert_dir: "/iotcert".into(),
            unit_dir: "/etc/systemd/system".into(),
            bin_path: "/usr/local/bin/aiotctl".into(),
            service_account: "aiot".into(),
            interpreter: "/usr/bin/python3".into(),
            collector_script: "mqtt_to_sqlite.py".into(),
            publisher_script: "sqlite_to_iotcore.py".into(),
        }
    }
}

/// Fixed source of the manager binary and pipeline scripts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Base URL; artifact file names are appended to it.
    pub base_url: String,
    /// File name of the manager binary under `base_url`.
    pub manager_binary: String,
    pub connect_timeout_secs: u64,
    /// Upper bound for a single download.
    pub timeout_secs: u64,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            base_url: "https://raw.githubusercontent.com/aiot-lab/aiot-gateway/main/dist".into(),
            manager_binary: "aiotctl".into(),
            connect_timeout_secs: 10,
            timeout_secs: 120,
        }
    }
}

impl ArtifactConfig {
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), file_name)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Passed as `--region` to the cloud CLI. Omit to use the CLI profile's region.
    pub region: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            region: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallPolicy {
    /// Abort `install` when the configuration wizard fails. When false the
    /// failure is logged and install continues with whatever is configured.
    pub fail_fast: bool,
    /// Stop and disable the previous room's publisher when the room changes.
    /// When false the old instance stays enabled and a warning names it.
    pub disable_superseded_publisher: bool,
}

impl Default for InstallPolicy {
    fn default() -> Self {
        Self {
            fail_fast: true,
            disable_superseded_publisher: false,
        }
    }
}

impl ManagerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let cfg: Self = toml::from_str(&text)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(cfg)
    }

    /// Loads `path` if it exists, otherwise the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }
}
