//! `aiotctl status` and `aiotctl show` — one-shot views of the gateway.
//!
//! `status` asks the supervisor about both pipeline services; `show` prints
//! the persisted configuration and the unit names derived from it.

use anyhow::Result;
use chrono::Utc;

use crate::color;
use crate::config::Layout;
use crate::error::GatewayError;
use crate::service::{self, Action, ServiceName};
use crate::state::{StateKey, StateStore};
use crate::supervisor::{ServiceSupervisor, UnitStatus};
use crate::units;

const WIDTH: usize = 92;

pub fn run(store: &dyn StateStore, supervisor: &dyn ServiceSupervisor) -> Result<()> {
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    println!("{}", color::bold(&"=".repeat(WIDTH)));
    println!(
        "{}",
        color::bold_cyan(&format!("{:^width$}", format!(" AIOT GATEWAY STATUS  {} ", now), width = WIDTH))
    );
    println!("{}", color::bold(&"=".repeat(WIDTH)));

    let thing = store.get(StateKey::ThingName)?.unwrap_or_else(|| "—".into());
    let room = store.get(StateKey::Room)?.unwrap_or_else(|| "—".into());
    let endpoint = store.get(StateKey::Endpoint)?.unwrap_or_else(|| "—".into());
    println!("{}", color::dim(&format!("  Thing: {}   Room: {}   Endpoint: {}", thing, room, endpoint)));
    println!();

    println!(
        "{}",
        color::bold(&format!(
            "{:<10}  {:<28}  {:<10}  {:<8}  {:>7}  {:>8}  {}",
            "SERVICE", "UNIT", "STATE", "SUB", "PID", "RESTARTS", "SINCE"
        ))
    );
    println!("{}", color::dim(&"-".repeat(WIDTH)));

    for name in [ServiceName::Collector, ServiceName::Publisher] {
        match service::control(name, Action::Status, store, supervisor) {
            Ok(Some(st)) => println!("{}", format_row(name, &st)),
            Ok(None) => {}
            Err(e) if GatewayError::missing_key(&e).is_some() => {
                println!(
                    "{:<10}  {}",
                    name.as_str(),
                    color::yellow("not configured — run `aiotctl configure`")
                );
            }
            Err(e) => return Err(e),
        }
    }
    println!("{}", color::dim(&"-".repeat(WIDTH)));
    Ok(())
}

fn format_row(name: ServiceName, st: &UnitStatus) -> String {
    let state = if st.is_loaded() {
        color::unit_state(&st.active_state)
    } else {
        color::red(&st.load_state)
    };
    let pid = st.main_pid.map(|p| p.to_string()).unwrap_or_else(|| "—".into());
    let restarts = st.restarts.map(|n| n.to_string()).unwrap_or_else(|| "—".into());
    let since = st
        .active_since
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "—".into());
    format!(
        "{:<10}  {:<28}  {}  {:<8}  {:>7}  {:>8}  {}",
        name.as_str(),
        st.unit,
        color::rpad(&state, 10),
        st.sub_state,
        pid,
        restarts,
        since
    )
}

/// Print every persisted key and the paths/units derived from them.
pub fn show(layout: &Layout, store: &dyn StateStore) -> Result<()> {
    println!("{}", color::bold("GATEWAY CONFIGURATION"));
    for key in StateKey::ALL {
        let value = match store.get(key)? {
            Some(v) => v,
            None => color::yellow("(unset)"),
        };
        println!("  {:<16} {}", key.name(), value);
    }
    println!();
    println!("{}", color::bold("DERIVED"));
    println!("  {:<16} {}", "state dir", layout.state_dir.display());
    println!("  {:<16} {}", "env file", layout.env_file().display());
    println!("  {:<16} {}", "collector unit", units::COLLECTOR_UNIT);
    let publisher = match crate::state::room_number(store) {
        Ok(room) => units::publisher_unit(room),
        Err(_) => color::yellow("(no room configured)"),
    };
    println!("  {:<16} {}", "publisher unit", publisher);
    let others: Vec<String> = units::installed_publishers(&layout.unit_dir)
        .into_iter()
        .map(units::publisher_unit)
        .filter(|u| *u != publisher)
        .collect();
    if !others.is_empty() {
        println!("  {:<16} {}", "other rooms", color::dim(&others.join(", ")));
    }
    if !store.exists() {
        println!();
        println!("{}", color::yellow("Gateway is not fully configured. Run `aiotctl configure`."));
    }
    Ok(())
}
