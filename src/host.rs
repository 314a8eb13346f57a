//! Host account and ownership operations behind the `HostOps` capability.

use anyhow::{bail, Context, Result};
use std::ffi::CString;
use std::path::Path;
use std::process::Command;

pub trait HostOps {
    fn is_root(&self) -> bool;
    fn user_exists(&self, name: &str) -> Result<bool>;
    /// Create a system account with no login shell and `home` as its home.
    fn create_service_user(&self, name: &str, home: &Path) -> Result<()>;
    /// Give `path` to `user` and that user's primary group.
    fn set_owner(&self, path: &Path, user: &str) -> Result<()>;
}

pub struct LinuxHost;

impl LinuxHost {
    /// uid and primary gid of `name`, or None when there is no such user.
    fn lookup(name: &str) -> Result<Option<(u32, u32)>> {
        let cname = CString::new(name).context("user name contains a NUL byte")?;
        // SAFETY: getpwnam returns NULL or a pointer to static storage that
        // stays valid until the next getpw* call; both fields are read before
        // returning. The process is single-threaded.
        unsafe {
            let pw = libc::getpwnam(cname.as_ptr());
            if pw.is_null() {
                Ok(None)
            } else {
                Ok(Some(((*pw).pw_uid, (*pw).pw_gid)))
            }
        }
    }
}

impl HostOps for LinuxHost {
    fn is_root(&self) -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }

    fn user_exists(&self, name: &str) -> Result<bool> {
        Ok(Self::lookup(name)?.is_some())
    }

    fn create_service_user(&self, name: &str, home: &Path) -> Result<()> {
        let home = home.to_string_lossy();
        let home: &str = &home;
        // busybox systems (apk) ship adduser only
        let mut cmd = if which::which("useradd").is_ok() {
            let mut c = Command::new("useradd");
            c.args(["--system", "--no-create-home", "--home-dir", home])
                .args(["--shell", "/usr/sbin/nologin", name]);
            c
        } else {
            let mut c = Command::new("adduser");
            c.args(["-S", "-D", "-H", "-h", home, "-s", "/sbin/nologin", name]);
            c
        };
        let output = cmd.output().context("failed to create service account")?;

        if !output.status.success() {
            bail!(
                "could not create service account {}: {}",
                name,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn set_owner(&self, path: &Path, user: &str) -> Result<()> {
        let (uid, gid) = Self::lookup(user)?
            .with_context(|| format!("service account {} does not exist", user))?;
        std::os::unix::fs::chown(path, Some(uid), Some(gid))
            .with_context(|| format!("failed to chown {} to {}", path.display(), user))
    }
}
