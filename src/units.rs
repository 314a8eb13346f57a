//! systemd unit rendering and registration for the two pipeline processes.
//!
//! Rendering is a pure function of the layout (and, for the publisher, the
//! room number), so re-registering always writes identical bytes and the
//! daemon reload after it can be triggered unconditionally.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Layout;
use crate::state::{room_label, write_atomic};
use crate::supervisor::ServiceSupervisor;

pub const COLLECTOR_UNIT: &str = "aiot-collector.service";
pub const PUBLISHER_PREFIX: &str = "aiot-publisher@";

const RESTART_SEC: u32 = 5;

pub fn publisher_unit(room: u32) -> String {
    format!("{}{}.service", PUBLISHER_PREFIX, room)
}

/// Room number of a publisher instance unit name, if `name` is one.
pub fn publisher_room(name: &str) -> Option<u32> {
    name.strip_prefix(PUBLISHER_PREFIX)?
        .strip_suffix(".service")?
        .parse()
        .ok()
}

struct UnitSpec<'a> {
    description: String,
    after: &'a str,
    environment: Option<String>,
    exec_start: String,
    log_name: String,
}

fn render(layout: &Layout, spec: UnitSpec<'_>) -> String {
    let mut out = String::new();
    out.push_str("[Unit]\n");
    out.push_str(&format!("Description={}\n", spec.description));
    out.push_str("Wants=network-online.target\n");
    out.push_str(&format!("After={}\n", spec.after));
    out.push('\n');

    out.push_str("[Service]\n");
    out.push_str("Type=simple\n");
    out.push_str(&format!("User={}\n", layout.service_account));
    out.push_str(&format!("Group={}\n", layout.service_account));
    out.push_str(&format!("WorkingDirectory={}\n", layout.app_dir.display()));
    out.push_str(&format!("EnvironmentFile=-{}\n", layout.env_file().display()));
    if let Some(env) = &spec.environment {
        out.push_str(&format!("Environment={}\n", env));
    }
    out.push_str(&format!("ExecStart={}\n", spec.exec_start));
    out.push_str("Restart=always\n");
    out.push_str(&format!("RestartSec={}\n", RESTART_SEC));
    out.push_str("NoNewPrivileges=true\n");
    out.push_str("ProtectSystem=strict\n");
    out.push_str(&format!(
        "ReadWritePaths={} {} {}\n",
        layout.app_dir.display(),
        layout.log_dir.display(),
        layout.cert_dir.display(),
    ));
    let log = layout.log_dir.join(format!("{}.log", spec.log_name));
    out.push_str(&format!("StandardOutput=append:{}\n", log.display()));
    out.push_str(&format!("StandardError=append:{}\n", log.display()));
    out.push('\n');

    out.push_str("[Install]\n");
    out.push_str("WantedBy=multi-user.target\n");
    out
}

pub fn render_collector_unit(layout: &Layout) -> String {
    render(
        layout,
        UnitSpec {
            description: "AIoT gateway collector (MQTT -> SQLite)".into(),
            after: "network-online.target mosquitto.service",
            environment: None,
            exec_start: format!(
                "{} {}",
                layout.interpreter.display(),
                layout.collector_script_path().display()
            ),
            log_name: "collector".into(),
        },
    )
}

pub fn render_publisher_unit(layout: &Layout, room: u32) -> String {
    let label = room_label(room);
    render(
        layout,
        UnitSpec {
            description: format!("AIoT gateway publisher for {} (SQLite -> AWS IoT Core)", label),
            after: "network-online.target",
            environment: Some(format!("ROOM={}", label)),
            exec_start: format!(
                "{} {} --mode drain",
                layout.interpreter.display(),
                layout.publisher_script_path().display()
            ),
            log_name: format!("publisher-{}", label),
        },
    )
}

/// Write the collector unit, and the publisher unit for `room` when known,
/// then reload the supervisor. Returns the paths written.
pub fn register_units(
    layout: &Layout,
    supervisor: &dyn ServiceSupervisor,
    room: Option<u32>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let path = layout.unit_dir.join(COLLECTOR_UNIT);
    write_atomic(&path, &render_collector_unit(layout))?;
    written.push(path);

    if let Some(room) = room {
        let path = layout.unit_dir.join(publisher_unit(room));
        write_atomic(&path, &render_publisher_unit(layout, room))?;
        written.push(path);
    }

    for p in &written {
        tracing::info!(unit = %p.display(), "unit registered");
    }
    supervisor.daemon_reload()?;
    Ok(written)
}

/// Delete a retired room's instance file and reload. Missing files are fine.
pub fn unregister_publisher(layout: &Layout, supervisor: &dyn ServiceSupervisor, room: u32) -> Result<()> {
    let path = layout.unit_dir.join(publisher_unit(room));
    match std::fs::remove_file(&path) {
        Ok(()) => tracing::info!(unit = %path.display(), "unit removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("failed to remove {}", path.display()));
        }
    }
    supervisor.daemon_reload()
}

/// Publisher instance units currently present in the unit directory, by room.
pub fn installed_publishers(unit_dir: &Path) -> Vec<u32> {
    let mut rooms: Vec<u32> = std::fs::read_dir(unit_dir)
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .filter_map(|e| publisher_room(&e.file_name().to_string_lossy()))
                .collect()
        })
        .unwrap_or_default();
    rooms.sort_unstable();
    rooms
}
