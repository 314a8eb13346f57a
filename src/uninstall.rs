//! `aiotctl uninstall` — stop the pipeline and remove its units.
//!
//! Scripts, certificates and logs stay in place. `--purge` also removes the
//! state directory so the next `install` starts unconfigured.

use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;

use crate::color;
use crate::config::Layout;
use crate::supervisor::{ServiceSupervisor, UnitAction};
use crate::units::{self, COLLECTOR_UNIT};

pub fn run(layout: &Layout, supervisor: &dyn ServiceSupervisor, purge: bool, yes: bool) -> Result<()> {
    let mut unit_names = vec![COLLECTOR_UNIT.to_string()];
    unit_names.extend(
        units::installed_publishers(&layout.unit_dir)
            .into_iter()
            .map(units::publisher_unit),
    );

    println!("The following will be removed:");
    for unit in &unit_names {
        println!("  systemd unit            {}", unit);
    }
    if purge {
        println!("  gateway state           {}", layout.state_dir.display());
    }
    println!();

    if !yes {
        print!("{}", color::yellow("Proceed? [y/N]: "));
        io::stdout().flush().ok();
        let mut input = String::new();
        io::stdin().read_line(&mut input).ok();
        if input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return Ok(());
        }
        println!();
    }

    for unit in &unit_names {
        step(&format!("Stopping {}", unit), || {
            supervisor.control(unit, UnitAction::Stop)?;
            supervisor.control(unit, UnitAction::Disable)
        });
        let path = layout.unit_dir.join(unit);
        step(&format!("Removing {}", path.display()), || remove_if_exists(&path));
    }
    step("Reloading systemd", || supervisor.daemon_reload());

    if purge {
        step(&format!("Removing state ({})", layout.state_dir.display()), || {
            if layout.state_dir.exists() {
                std::fs::remove_dir_all(&layout.state_dir)?;
            }
            Ok(())
        });
    }

    println!();
    println!("{}", color::bold_green("✓ gateway pipeline uninstalled."));
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn step(label: &str, f: impl FnOnce() -> Result<()>) {
    print!("  {}...", label);
    io::stdout().flush().ok();
    match f() {
        Ok(_) => println!(" {}", color::green("done")),
        Err(e) => println!(" {} ({})", color::yellow("skipped"), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_config, FakeSupervisor};

    #[test]
    fn removes_every_unit_and_optionally_state() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        let sup = FakeSupervisor::default();
        units::register_units(&cfg.layout, &sup, Some(306)).unwrap();
        units::register_units(&cfg.layout, &sup, Some(401)).unwrap();
        std::fs::create_dir_all(&cfg.layout.state_dir).unwrap();

        run(&cfg.layout, &sup, true, true).unwrap();

        assert!(std::fs::read_dir(&cfg.layout.unit_dir).unwrap().next().is_none());
        assert!(!cfg.layout.state_dir.exists());
        let calls = sup.calls();
        assert!(calls.contains(&"disable aiot-publisher@401.service".to_string()));
        assert!(calls.contains(&"stop aiot-collector.service".to_string()));
    }

    #[test]
    fn keeps_state_without_purge() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path());
        std::fs::create_dir_all(&cfg.layout.state_dir).unwrap();
        run(&cfg.layout, &FakeSupervisor::default(), false, true).unwrap();
        assert!(cfg.layout.state_dir.exists());
    }
}
