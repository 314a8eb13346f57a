//! `aiotctl check` — report which host dependencies and certificates are present.
//!
//! Read-only. A missing dependency is reported, never raised; callers decide
//! whether to proceed.

use std::path::{Path, PathBuf};

use crate::color;
use crate::config::ManagerConfig;
use crate::error::GatewayError;
use crate::state::{StateKey, StateStore};

pub const ROOT_CA_FILE: &str = "AmazonRootCA1.pem";
pub const CERT_SUFFIX: &str = ".cert.pem";
pub const KEY_SUFFIX: &str = ".private.key";

/// Fallback locations for daemons that live outside an unprivileged PATH.
const SBIN_DIRS: [&str; 3] = ["/usr/sbin", "/usr/local/sbin", "/sbin"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub present: bool,
    /// Optional items never affect the exit code of `check`.
    pub required: bool,
    /// Resolved path when present, remediation hint when absent.
    pub detail: String,
}

impl Dependency {
    fn found(name: &str, required: bool, path: &Path) -> Self {
        Self {
            name: name.into(),
            present: true,
            required,
            detail: path.display().to_string(),
        }
    }

    fn missing(name: &str, required: bool, hint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            present: false,
            required,
            detail: hint.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DependencyStatus {
    pub items: Vec<Dependency>,
}

impl DependencyStatus {
    pub fn all_required_present(&self) -> bool {
        self.items.iter().all(|d| d.present || !d.required)
    }

    /// Missing required items as `DependencyMissing` conditions.
    pub fn missing_required(&self) -> Vec<GatewayError> {
        self.items
            .iter()
            .filter(|d| d.required && !d.present)
            .map(|d| GatewayError::DependencyMissing {
                name: d.name.clone(),
                hint: d.detail.clone(),
            })
            .collect()
    }

    pub fn print(&self) {
        println!("{}", color::bold(&format!("{:<28}  {:<9}  {}", "DEPENDENCY", "STATUS", "DETAIL")));
        println!("{}", color::dim(&"-".repeat(78)));
        for d in &self.items {
            let status = match (d.present, d.required) {
                (true, _) => color::green("ok"),
                (false, true) => color::red("missing"),
                (false, false) => color::yellow("optional"),
            };
            let detail = if d.present { color::dim(&d.detail) } else { d.detail.clone() };
            println!("{:<28}  {}  {}", d.name, color::rpad(&status, 9), detail);
        }
        println!();
    }
}

/// Probe every dependency. The thing name, if configured, selects which
/// certificate and key files are expected.
pub fn check(config: &ManagerConfig, store: &dyn StateStore) -> DependencyStatus {
    let layout = &config.layout;
    let mut items = vec![
        probe_program("interpreter", &layout.interpreter.to_string_lossy(), true, "python3"),
        probe_program("supervisor", "systemctl", true, "systemd"),
        probe_program("broker", "mosquitto", true, "mosquitto"),
        probe_program("cloud CLI", "aws", true, "awscli"),
        probe_program("downloader", "curl", false, "curl"),
    ];

    let thing = store.get(StateKey::ThingName).ok().flatten();
    items.extend(check_certificates(&layout.cert_dir, thing.as_deref()));

    let status = DependencyStatus { items };
    for d in status.items.iter().filter(|d| !d.present) {
        tracing::debug!(dependency = %d.name, hint = %d.detail, "dependency missing");
    }
    status
}

fn probe_program(name: &str, program: &str, required: bool, package: &str) -> Dependency {
    match locate(program) {
        Some(path) => Dependency::found(name, required, &path),
        None => Dependency::missing(
            name,
            required,
            format!("`{}` not found — install the `{}` package", program, package),
        ),
    }
}

/// Resolve `program` to an executable. Absolute paths are checked directly;
/// bare names are looked up on PATH, then in the sbin directories.
pub fn locate(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }
    if let Ok(path) = which::which(program) {
        return Some(path);
    }
    SBIN_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(program))
        .find(|p| is_executable(p))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// The three certificate files: root CA, device certificate, private key.
pub fn check_certificates(cert_dir: &Path, thing: Option<&str>) -> Vec<Dependency> {
    let root_ca = cert_dir.join(ROOT_CA_FILE);
    let root = if root_ca.is_file() {
        Dependency::found("root CA", true, &root_ca)
    } else {
        Dependency::missing(
            "root CA",
            true,
            format!("copy {} into {}", ROOT_CA_FILE, cert_dir.display()),
        )
    };

    let mut out = vec![root];
    for (label, suffix) in [("device certificate", CERT_SUFFIX), ("private key", KEY_SUFFIX)] {
        let found = match thing {
            Some(thing) => {
                let path = cert_dir.join(format!("{}{}", thing, suffix));
                path.is_file().then_some(path)
            }
            None => find_by_suffix(cert_dir, suffix),
        };
        let expected = match thing {
            Some(thing) => format!("{}{}", thing, suffix),
            None => format!("*{}", suffix),
        };
        out.push(match found {
            Some(path) => Dependency::found(label, true, &path),
            None => Dependency::missing(
                label,
                true,
                format!("copy {} into {}", expected, cert_dir.display()),
            ),
        });
    }
    out
}

fn find_by_suffix(dir: &Path, suffix: &str) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(suffix))
                    .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn touch(path: &Path) {
        std::fs::write(path, "-----BEGIN-----\n").unwrap();
    }

    #[test]
    fn all_three_certificates_found_by_suffix() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(ROOT_CA_FILE));
        touch(&dir.path().join("gw.cert.pem"));
        touch(&dir.path().join("gw.private.key"));

        let items = check_certificates(dir.path(), None);
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|d| d.present));
    }

    #[test]
    fn missing_certificates_are_named() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("JetsonNano_IoT_Thing_Gateway_5.cert.pem"));

        let items = check_certificates(dir.path(), Some("JetsonNano_IoT_Thing_Gateway_5"));
        let missing: Vec<&str> = items.iter().filter(|d| !d.present).map(|d| d.name.as_str()).collect();
        assert_eq!(missing, vec!["root CA", "private key"]);
        let key = items.iter().find(|d| d.name == "private key").unwrap();
        assert!(key.detail.contains("JetsonNano_IoT_Thing_Gateway_5.private.key"));
    }

    #[test]
    fn thing_name_selects_certificate_over_other_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(ROOT_CA_FILE));
        touch(&dir.path().join("Other.cert.pem"));
        touch(&dir.path().join("Other.private.key"));

        let items = check_certificates(dir.path(), Some("Mine"));
        assert_eq!(items.iter().filter(|d| !d.present).count(), 2);
    }

    #[test]
    fn locate_checks_executable_bit_for_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("python3");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        assert_eq!(locate(&bin.to_string_lossy()), None);

        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(locate(&bin.to_string_lossy()), Some(bin));
    }

    #[test]
    fn optional_items_do_not_fail_the_check() {
        let status = DependencyStatus {
            items: vec![
                Dependency::found("supervisor", true, Path::new("/usr/bin/systemctl")),
                Dependency::missing("downloader", false, "install curl"),
            ],
        };
        assert!(status.all_required_present());
        assert!(status.missing_required().is_empty());
    }

    #[test]
    fn missing_required_become_dependency_missing() {
        let status = DependencyStatus {
            items: vec![Dependency::missing("broker", true, "install mosquitto")],
        };
        assert!(!status.all_required_present());
        let errs = status.missing_required();
        assert!(matches!(&errs[0], GatewayError::DependencyMissing { name, .. } if name == "broker"));
    }
}
