//! In-memory fakes for every host capability, shared by the unit tests.

use anyhow::Result;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::cloud::CloudCli;
use crate::config::ManagerConfig;
use crate::error::GatewayError;
use crate::fetch::Downloader;
use crate::host::HostOps;
use crate::packages::{ManagerKind, PackageManager, Requirement};
use crate::prompt::Prompter;
use crate::state::{StateKey, StateStore};
use crate::supervisor::{ServiceSupervisor, UnitAction, UnitStatus};

/// Default layout re-rooted under a temp directory.
pub fn test_config(root: &Path) -> ManagerConfig {
    let mut cfg = ManagerConfig::default();
    let l = &mut cfg.layout;
    for dir in [
        &mut l.app_dir,
        &mut l.data_dir,
        &mut l.state_dir,
        &mut l.log_dir,
        &mut l.cert_dir,
        &mut l.unit_dir,
        &mut l.bin_path,
    ] {
        *dir = root.join(dir.strip_prefix("/").unwrap());
    }
    cfg
}

#[derive(Default)]
pub struct MemoryStateStore {
    values: RefCell<BTreeMap<StateKey, String>>,
}

impl MemoryStateStore {
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    pub fn dump(&self) -> BTreeMap<StateKey, String> {
        self.values.borrow().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: StateKey) -> Result<Option<String>> {
        Ok(self.values.borrow().get(&key).cloned())
    }

    fn set(&self, key: StateKey, value: &str) -> Result<()> {
        self.values.borrow_mut().insert(key, value.trim().to_string());
        Ok(())
    }
}

/// Records control calls and tracks enabled/running units.
#[derive(Default)]
pub struct FakeSupervisor {
    calls: RefCell<Vec<String>>,
    running: RefCell<BTreeMap<String, u32>>,
    enabled: RefCell<BTreeSet<String>>,
    reloads: RefCell<usize>,
    failure: RefCell<Option<(String, String)>>,
}

impl FakeSupervisor {
    /// Make every `action` call fail with `message`.
    pub fn fail_on(&self, action: &str, message: &str) {
        *self.failure.borrow_mut() = Some((action.to_string(), message.to_string()));
    }

    /// `"<action> <unit>"` for every control call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn reloads(&self) -> usize {
        *self.reloads.borrow()
    }

    pub fn is_enabled(&self, unit: &str) -> bool {
        self.enabled.borrow().contains(unit)
    }
}

impl ServiceSupervisor for FakeSupervisor {
    fn control(&self, unit: &str, action: UnitAction) -> Result<()> {
        if let Some((failing, message)) = self.failure.borrow().as_ref() {
            if failing == action.as_str() {
                return Err(GatewayError::SupervisorError {
                    unit: unit.to_string(),
                    action: failing.clone(),
                    message: message.clone(),
                }
                .into());
            }
        }
        self.calls.borrow_mut().push(format!("{} {}", action.as_str(), unit));
        let mut running = self.running.borrow_mut();
        match action {
            UnitAction::Start => {
                running.entry(unit.to_string()).or_insert(0);
            }
            UnitAction::Restart => {
                *running.entry(unit.to_string()).or_insert(0) += 1;
            }
            UnitAction::Stop => {
                running.remove(unit);
            }
            UnitAction::Enable => {
                self.enabled.borrow_mut().insert(unit.to_string());
            }
            UnitAction::Disable => {
                self.enabled.borrow_mut().remove(unit);
            }
        }
        Ok(())
    }

    fn status(&self, unit: &str) -> Result<UnitStatus> {
        let running = self.running.borrow();
        let text = match running.get(unit) {
            Some(restarts) => format!(
                "LoadState=loaded\nActiveState=active\nSubState=running\nMainPID=100\n\
                 NRestarts={}\nActiveEnterTimestamp=@1760000000\n",
                restarts
            ),
            None => "LoadState=loaded\nActiveState=inactive\nSubState=dead\nMainPID=0\n\
                     NRestarts=0\nActiveEnterTimestamp=\n"
                .to_string(),
        };
        Ok(UnitStatus::parse_show(unit, &text))
    }

    fn daemon_reload(&self) -> Result<()> {
        *self.reloads.borrow_mut() += 1;
        Ok(())
    }
}

pub struct FakeCloud {
    credentials: bool,
    endpoint: Option<String>,
}

impl FakeCloud {
    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            credentials: true,
            endpoint: Some(endpoint.to_string()),
        }
    }

    pub fn without_endpoint() -> Self {
        Self {
            credentials: true,
            endpoint: None,
        }
    }

    pub fn without_credentials() -> Self {
        Self {
            credentials: false,
            endpoint: None,
        }
    }
}

impl CloudCli for FakeCloud {
    fn verify_credentials(&self) -> Result<()> {
        if self.credentials {
            Ok(())
        } else {
            Err(GatewayError::CredentialsNotConfigured(
                "Unable to locate credentials. You can configure credentials by running \"aws configure\".".into(),
            )
            .into())
        }
    }

    fn describe_endpoint(&self) -> Result<String> {
        self.endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("AccessDeniedException: not authorized to perform iot:DescribeEndpoint"))
    }
}

/// Answers questions from a fixed script; errors when the script runs out.
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String> {
        self.asked.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted answer for {:?}", question))
    }
}

#[derive(Default)]
pub struct FakeHost {
    users: RefCell<BTreeSet<String>>,
    owners: RefCell<BTreeMap<PathBuf, String>>,
}

impl FakeHost {
    pub fn owner_of(&self, path: &Path) -> Option<String> {
        self.owners.borrow().get(path).cloned()
    }
}

impl HostOps for FakeHost {
    fn is_root(&self) -> bool {
        true
    }

    fn user_exists(&self, name: &str) -> Result<bool> {
        Ok(self.users.borrow().contains(name))
    }

    fn create_service_user(&self, name: &str, _home: &Path) -> Result<()> {
        self.users.borrow_mut().insert(name.to_string());
        Ok(())
    }

    fn set_owner(&self, path: &Path, user: &str) -> Result<()> {
        anyhow::ensure!(self.users.borrow().contains(user), "no such user {}", user);
        self.owners.borrow_mut().insert(path.to_path_buf(), user.to_string());
        Ok(())
    }
}

pub struct FakePackages {
    kind: ManagerKind,
    installed: RefCell<BTreeSet<String>>,
    install_calls: RefCell<usize>,
    failure: Option<String>,
}

impl FakePackages {
    pub fn with_installed(kind: ManagerKind, installed: &[&str]) -> Self {
        Self {
            kind,
            installed: RefCell::new(installed.iter().map(|s| s.to_string()).collect()),
            install_calls: RefCell::new(0),
            failure: None,
        }
    }

    pub fn failing(kind: ManagerKind, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::with_installed(kind, &[])
        }
    }

    pub fn install_calls(&self) -> usize {
        *self.install_calls.borrow()
    }
}

impl PackageManager for FakePackages {
    fn name(&self) -> &str {
        self.kind.program()
    }

    fn package_for(&self, req: Requirement) -> Option<&'static str> {
        self.kind.package_for(req)
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        Ok(self.installed.borrow().contains(package))
    }

    fn install(&self, packages: &[&str]) -> Result<()> {
        if let Some(message) = &self.failure {
            return Err(GatewayError::PackageInstallFailed {
                manager: self.name().to_string(),
                message: message.clone(),
            }
            .into());
        }
        *self.install_calls.borrow_mut() += 1;
        self.installed
            .borrow_mut()
            .extend(packages.iter().map(|s| s.to_string()));
        Ok(())
    }
}

/// Writes a small deterministic script per URL; fails for URLs ending in `fail_suffix`.
#[derive(Default)]
pub struct FakeDownloader {
    failure: Option<(String, String)>,
}

impl FakeDownloader {
    pub fn failing(suffix: &str, message: &str) -> Self {
        Self {
            failure: Some((suffix.to_string(), message.to_string())),
        }
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some((suffix, message)) = &self.failure {
            if url.ends_with(suffix.as_str()) {
                return Err(GatewayError::DownloadFailed {
                    url: url.to_string(),
                    message: message.clone(),
                }
                .into());
            }
        }
        std::fs::write(dest, format!("#!/usr/bin/env python3\n# fetched from {}\n", url))?;
        Ok(())
    }
}
