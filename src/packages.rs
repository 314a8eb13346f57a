//! OS package installation behind the `PackageManager` capability.
//!
//! The host's package manager is selected once, in a fixed preference order.
//! Only packages that are not already installed are passed to it.

use anyhow::{Context, Result};
use std::process::Command;

use crate::error::GatewayError;

/// What the gateway needs from the OS, independent of package naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Interpreter,
    MqttLibrary,
    Broker,
    BrokerClients,
    CloudCli,
    Downloader,
}

impl Requirement {
    pub const ALL: [Requirement; 6] = [
        Requirement::Interpreter,
        Requirement::MqttLibrary,
        Requirement::Broker,
        Requirement::BrokerClients,
        Requirement::CloudCli,
        Requirement::Downloader,
    ];
}

pub trait PackageManager {
    fn name(&self) -> &str;
    /// Distribution package providing `req`, if the distribution ships one.
    fn package_for(&self, req: Requirement) -> Option<&'static str>;
    fn is_installed(&self, package: &str) -> Result<bool>;
    fn install(&self, packages: &[&str]) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerKind {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Apk,
}

impl ManagerKind {
    pub const PREFERENCE: [ManagerKind; 5] = [
        ManagerKind::Apt,
        ManagerKind::Dnf,
        ManagerKind::Yum,
        ManagerKind::Pacman,
        ManagerKind::Apk,
    ];

    pub fn program(self) -> &'static str {
        match self {
            ManagerKind::Apt => "apt-get",
            ManagerKind::Dnf => "dnf",
            ManagerKind::Yum => "yum",
            ManagerKind::Pacman => "pacman",
            ManagerKind::Apk => "apk",
        }
    }

    pub fn package_for(self, req: Requirement) -> Option<&'static str> {
        use ManagerKind::*;
        use Requirement::*;
        Some(match (self, req) {
            (Pacman, Interpreter) => "python",
            (_, Interpreter) => "python3",
            (Apt | Dnf, MqttLibrary) => "python3-paho-mqtt",
            (Pacman, MqttLibrary) => "python-paho-mqtt",
            (Apk, MqttLibrary) => "py3-paho-mqtt",
            (Yum, MqttLibrary) => return None,
            (_, Broker) => "mosquitto",
            (Apt, BrokerClients) => "mosquitto-clients",
            (_, BrokerClients) => return None,
            (Apt | Dnf | Yum, CloudCli) => "awscli",
            (Pacman | Apk, CloudCli) => "aws-cli",
            (_, Downloader) => "curl",
        })
    }

    /// Command that exits zero iff `package` is installed.
    fn query_args(self, package: &str) -> (&'static str, Vec<String>) {
        match self {
            ManagerKind::Apt => (
                "dpkg-query",
                vec!["-W".into(), "-f=${Status}".into(), package.into()],
            ),
            ManagerKind::Dnf | ManagerKind::Yum => ("rpm", vec!["-q".into(), package.into()]),
            ManagerKind::Pacman => ("pacman", vec!["-Q".into(), package.into()]),
            ManagerKind::Apk => ("apk", vec!["info".into(), "-e".into(), package.into()]),
        }
    }

    fn install_args(self) -> Vec<&'static str> {
        match self {
            ManagerKind::Apt => vec!["install", "-y", "--no-install-recommends"],
            ManagerKind::Dnf | ManagerKind::Yum => vec!["install", "-y"],
            ManagerKind::Pacman => vec!["-S", "--noconfirm", "--needed"],
            ManagerKind::Apk => vec!["add", "--no-cache"],
        }
    }
}

/// The host's package manager, driven through its command-line tool.
pub struct HostPackageManager {
    kind: ManagerKind,
}

impl HostPackageManager {
    /// First available manager in preference order.
    pub fn detect() -> Option<Self> {
        ManagerKind::PREFERENCE
            .into_iter()
            .find(|k| which::which(k.program()).is_ok())
            .map(|kind| Self { kind })
    }

    fn failed(&self, message: String) -> anyhow::Error {
        GatewayError::PackageInstallFailed {
            manager: self.kind.program().to_string(),
            message,
        }
        .into()
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        tracing::info!(manager = self.kind.program(), ?args, "running package manager");
        let output = Command::new(self.kind.program())
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .map_err(|e| self.failed(e.to_string()))?;
        if !output.status.success() {
            return Err(self.failed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        Ok(())
    }
}

impl PackageManager for HostPackageManager {
    fn name(&self) -> &str {
        self.kind.program()
    }

    fn package_for(&self, req: Requirement) -> Option<&'static str> {
        self.kind.package_for(req)
    }

    fn is_installed(&self, package: &str) -> Result<bool> {
        let (program, args) = self.kind.query_args(package);
        let output = Command::new(program)
            .args(&args)
            .output()
            .with_context(|| format!("failed to run {}", program))?;
        if self.kind == ManagerKind::Apt {
            return Ok(output.status.success()
                && String::from_utf8_lossy(&output.stdout).contains("install ok installed"));
        }
        Ok(output.status.success())
    }

    fn install(&self, packages: &[&str]) -> Result<()> {
        if self.kind == ManagerKind::Apt {
            self.run(&["update", "-q"])?;
        }
        let mut args: Vec<&str> = self.kind.install_args();
        args.extend_from_slice(packages);
        self.run(&args)
    }
}

/// Install whatever is missing. Returns the packages that were installed.
pub fn ensure_packages(pm: &dyn PackageManager) -> Result<Vec<String>> {
    let mut missing = Vec::new();
    for req in Requirement::ALL {
        let Some(package) = pm.package_for(req) else {
            tracing::debug!(?req, manager = pm.name(), "no distribution package");
            continue;
        };
        if !pm.is_installed(package)? {
            missing.push(package);
        }
    }

    if missing.is_empty() {
        tracing::info!(manager = pm.name(), "all packages already installed");
        return Ok(Vec::new());
    }
    tracing::info!(manager = pm.name(), packages = ?missing, "installing packages");
    pm.install(&missing)?;
    Ok(missing.into_iter().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePackages;

    #[test]
    fn only_missing_packages_are_installed() {
        let pm = FakePackages::with_installed(ManagerKind::Apt, &["python3", "curl"]);
        let installed = ensure_packages(&pm).unwrap();
        assert_eq!(
            installed,
            vec!["python3-paho-mqtt", "mosquitto", "mosquitto-clients", "awscli"]
        );
        assert_eq!(pm.install_calls(), 1);
    }

    #[test]
    fn second_run_installs_nothing() {
        let pm = FakePackages::with_installed(ManagerKind::Dnf, &[]);
        assert!(!ensure_packages(&pm).unwrap().is_empty());
        assert!(ensure_packages(&pm).unwrap().is_empty());
        assert_eq!(pm.install_calls(), 1);
    }

    #[test]
    fn install_failure_carries_manager_message() {
        let pm = FakePackages::failing(ManagerKind::Apk, "ERROR: unable to select packages");
        let err = ensure_packages(&pm).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GatewayError>(),
            Some(GatewayError::PackageInstallFailed { .. })
        ));
        assert!(err.to_string().contains("ERROR: unable to select packages"));
    }

    #[test]
    fn package_names_follow_distribution() {
        assert_eq!(ManagerKind::Pacman.package_for(Requirement::CloudCli), Some("aws-cli"));
        assert_eq!(ManagerKind::Apt.package_for(Requirement::CloudCli), Some("awscli"));
        assert_eq!(ManagerKind::Pacman.package_for(Requirement::Interpreter), Some("python"));
        assert_eq!(ManagerKind::Yum.package_for(Requirement::MqttLibrary), None);
        assert_eq!(ManagerKind::Apk.package_for(Requirement::BrokerClients), None);
    }

    #[test]
    fn preference_order_is_fixed() {
        let programs: Vec<&str> = ManagerKind::PREFERENCE.iter().map(|k| k.program()).collect();
        assert_eq!(programs, vec!["apt-get", "dnf", "yum", "pacman", "apk"]);
    }
}
