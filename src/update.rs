//! `aiotctl update` — re-fetch artifacts and restart what was running.
//!
//! Units and, on a configured gateway, the environment file are re-rendered
//! too, so a manager update that changes either takes effect without a full
//! `install`.

use anyhow::Result;
use tracing::info;

use crate::config::ManagerConfig;
use crate::fetch::{self, Downloader};
use crate::gateway::GatewayConfig;
use crate::host::HostOps;
use crate::state::{self, StateStore};
use crate::supervisor::{ServiceSupervisor, UnitAction};
use crate::units::{self, COLLECTOR_UNIT};

/// Returns the units that were restarted.
pub fn run(
    config: &ManagerConfig,
    downloader: &dyn Downloader,
    host: &dyn HostOps,
    supervisor: &dyn ServiceSupervisor,
    store: &dyn StateStore,
) -> Result<Vec<String>> {
    println!("Current:  v{}", env!("CARGO_PKG_VERSION"));
    println!("Source:   {}", config.artifacts.base_url);

    fetch::fetch_all(config, downloader, host)?;

    match GatewayConfig::load(store) {
        Ok(gateway) => {
            let env_file = config.layout.env_file();
            state::write_atomic(&env_file, &gateway.env_file_contents(&config.layout))?;
            info!(path = %env_file.display(), "environment file rewritten");
        }
        Err(e) => info!("gateway not fully configured, environment file left as is: {:#}", e),
    }

    let room = state::room_number(store).ok();
    units::register_units(&config.layout, supervisor, room)?;

    let mut candidates = vec![COLLECTOR_UNIT.to_string()];
    if let Some(room) = room {
        candidates.push(units::publisher_unit(room));
    }

    let mut restarted = Vec::new();
    for unit in candidates {
        if supervisor.status(&unit)?.active_state == "active" {
            supervisor.control(&unit, UnitAction::Restart)?;
            info!(%unit, "restarted");
            restarted.push(unit);
        }
    }

    if restarted.is_empty() {
        println!("Artifacts updated. No services were running.");
    } else {
        println!("Artifacts updated. Restarted: {}", restarted.join(", "));
    }
    Ok(restarted)
}
