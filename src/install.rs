//! `aiotctl install` — provision the gateway from a possibly-empty machine.
//!
//! Every step is idempotent. The first failure is surfaced as-is and nothing
//! is rolled back: re-running `install` is the recovery path.

use anyhow::{Context, Result};
use std::os::unix::fs::PermissionsExt;
use tracing::{info, warn};

use crate::cloud::CloudCli;
use crate::config::{Layout, ManagerConfig};
use crate::fetch::{self, Downloader};
use crate::gateway::GatewayConfig;
use crate::host::HostOps;
use crate::packages::{self, PackageManager};
use crate::probe::{self, DependencyStatus};
use crate::prompt::Prompter;
use crate::service;
use crate::state::{self, StateStore};
use crate::supervisor::ServiceSupervisor;
use crate::units;
use crate::wizard::Wizard;

/// Everything `install` and `configure` need from the host.
pub struct Capabilities<'a> {
    pub host: &'a dyn HostOps,
    pub packages: Option<&'a dyn PackageManager>,
    pub downloader: &'a dyn Downloader,
    pub supervisor: &'a dyn ServiceSupervisor,
    pub cloud: &'a dyn CloudCli,
    pub store: &'a dyn StateStore,
}

#[derive(Debug, Default)]
pub struct InstallReport {
    pub created_account: bool,
    pub installed_packages: Vec<String>,
    pub dependencies: DependencyStatus,
    /// None when the wizard failed and `fail_fast` is off.
    pub gateway: Option<GatewayConfig>,
    pub started_room: Option<u32>,
}

pub struct Installer<'a> {
    config: &'a ManagerConfig,
    caps: Capabilities<'a>,
    prompter: &'a mut dyn Prompter,
    fail_fast: bool,
}

impl<'a> Installer<'a> {
    pub fn new(config: &'a ManagerConfig, caps: Capabilities<'a>, prompter: &'a mut dyn Prompter) -> Self {
        Self {
            config,
            caps,
            prompter,
            fail_fast: config.install.fail_fast,
        }
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn install(&mut self) -> Result<InstallReport> {
        let layout = &self.config.layout;
        let mut report = InstallReport::default();

        info!("[1/8] service account");
        report.created_account = ensure_account(layout, self.caps.host)?;

        info!("[2/8] directories");
        ensure_directories(layout, self.caps.host)?;

        info!("[3/8] OS packages");
        match self.caps.packages {
            Some(pm) => report.installed_packages = packages::ensure_packages(pm)?,
            None => warn!("no supported package manager found; skipping package installation"),
        }

        info!("[4/8] artifacts");
        fetch::fetch_all(self.config, self.caps.downloader, self.caps.host)?;

        info!("[5/8] environment check");
        report.dependencies = probe::check(self.config, self.caps.store);
        for missing in report.dependencies.missing_required() {
            warn!("{}", missing);
        }

        info!("[6/8] supervisor units");
        let previous_room = state::room_number(self.caps.store).ok();
        units::register_units(layout, self.caps.supervisor, previous_room)?;

        info!("[7/8] configuration wizard");
        let wizard_result = Wizard::new(layout, self.caps.store, self.caps.cloud, &mut *self.prompter).configure();
        match wizard_result {
            Ok(gateway) => report.gateway = Some(gateway),
            Err(e) if self.fail_fast => return Err(e),
            Err(e) => warn!("configuration wizard failed, continuing: {:#}", e),
        }

        info!("[8/8] services");
        match state::room_number(self.caps.store) {
            Ok(room) => {
                apply_room(self.config, self.caps.supervisor, previous_room, room)?;
                report.started_room = Some(room);
            }
            Err(_) => warn!("no room configured; services not started — run `aiotctl configure`"),
        }

        Ok(report)
    }
}

/// Returns true if the account had to be created.
pub fn ensure_account(layout: &Layout, host: &dyn HostOps) -> Result<bool> {
    if host.user_exists(&layout.service_account)? {
        return Ok(false);
    }
    host.create_service_user(&layout.service_account, &layout.app_dir)?;
    info!(account = %layout.service_account, "service account created");
    Ok(true)
}

pub fn ensure_directories(layout: &Layout, host: &dyn HostOps) -> Result<()> {
    for dir in layout.managed_dirs() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        host.set_owner(dir, &layout.service_account)?;
    }
    std::fs::set_permissions(&layout.cert_dir, std::fs::Permissions::from_mode(0o750))
        .with_context(|| format!("failed to set mode 0750 on {}", layout.cert_dir.display()))?;
    Ok(())
}

/// Register, enable and (re)start the pipeline for `room`. Handles the
/// publisher instance of a previous room according to the install policy.
pub fn apply_room(
    config: &ManagerConfig,
    supervisor: &dyn ServiceSupervisor,
    previous_room: Option<u32>,
    room: u32,
) -> Result<()> {
    units::register_units(&config.layout, supervisor, Some(room))?;
    service::enable_at_boot(room, supervisor)?;

    if let Some(old) = previous_room.filter(|&old| old != room) {
        if config.install.disable_superseded_publisher {
            service::retire_publisher(old, supervisor)?;
            units::unregister_publisher(&config.layout, supervisor, old)?;
        } else {
            warn!(
                "{} is still enabled; disable it with `systemctl disable --now {}` if room {} is retired",
                units::publisher_unit(old),
                units::publisher_unit(old),
                old
            );
        }
    }

    service::restart_pipeline(room, supervisor)?;
    info!(room, "collector and publisher running");
    Ok(())
}
