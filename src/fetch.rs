//! Artifact downloads: the manager binary and the two pipeline scripts.
//!
//! Uses `curl` rather than an HTTP client crate to avoid pulling in a TLS
//! stack. Each file is downloaded next to its destination and renamed into
//! place, so a failed download never leaves a truncated artifact behind.

use anyhow::{Context, Result};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::{ArtifactConfig, ManagerConfig};
use crate::error::GatewayError;
use crate::host::HostOps;

pub trait Downloader {
    /// Fetch `url` into `dest`, overwriting it.
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

pub struct Curl {
    connect_timeout_secs: u64,
    timeout_secs: u64,
}

impl Curl {
    pub fn new(config: &ArtifactConfig) -> Self {
        Self {
            connect_timeout_secs: config.connect_timeout_secs,
            timeout_secs: config.timeout_secs,
        }
    }
}

impl Downloader for Curl {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let failed = |message: String| -> anyhow::Error {
            GatewayError::DownloadFailed {
                url: url.to_string(),
                message,
            }
            .into()
        };
        let output = Command::new("curl")
            .args(["-fsSL", "--retry", "0"])
            .arg("--connect-timeout")
            .arg(self.connect_timeout_secs.to_string())
            .arg("--max-time")
            .arg(self.timeout_secs.to_string())
            .args(["-H", concat!("User-Agent: aiotctl/", env!("CARGO_PKG_VERSION"))])
            .arg("-o")
            .arg(dest)
            .arg(url)
            .output()
            .map_err(|e| failed(e.to_string()))?;
        if !output.status.success() {
            return Err(failed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub url: String,
    pub dest: PathBuf,
    pub mode: u32,
    /// Hand the file to the service account after download.
    pub service_owned: bool,
}

/// The fixed artifact set for this layout.
pub fn artifacts(config: &ManagerConfig) -> Vec<Artifact> {
    let layout = &config.layout;
    let art = &config.artifacts;
    vec![
        Artifact {
            url: art.url_for(&art.manager_binary),
            dest: layout.bin_path.clone(),
            mode: 0o755,
            service_owned: false,
        },
        Artifact {
            url: art.url_for(&layout.collector_script),
            dest: layout.collector_script_path(),
            mode: 0o755,
            service_owned: true,
        },
        Artifact {
            url: art.url_for(&layout.publisher_script),
            dest: layout.publisher_script_path(),
            mode: 0o755,
            service_owned: true,
        },
    ]
}

/// Download every artifact. Stops at the first failure.
pub fn fetch_all(
    config: &ManagerConfig,
    downloader: &dyn Downloader,
    host: &dyn HostOps,
) -> Result<Vec<PathBuf>> {
    let mut fetched = Vec::new();
    for artifact in artifacts(config) {
        fetch_one(&artifact, downloader)?;
        if artifact.service_owned {
            host.set_owner(&artifact.dest, &config.layout.service_account)?;
        }
        tracing::info!(url = %artifact.url, dest = %artifact.dest.display(), "fetched");
        fetched.push(artifact.dest);
    }
    Ok(fetched)
}

fn fetch_one(artifact: &Artifact, downloader: &dyn Downloader) -> Result<()> {
    let dir = artifact
        .dest
        .parent()
        .with_context(|| format!("{} has no parent directory", artifact.dest.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    downloader.download(&artifact.url, tmp.path())?;
    std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(artifact.mode))?;
    tmp.persist(&artifact.dest)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to install {}", artifact.dest.display()))?;
    Ok(())
}
