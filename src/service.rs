//! `aiotctl collector|publisher <action>` — service control by logical name.
//!
//! `publisher` resolves to the instance for the room currently in the State
//! Store. There is no default room: an unconfigured gateway is an error.

use anyhow::Result;
use clap::ValueEnum;

use crate::state::{self, StateStore};
use crate::supervisor::{ServiceSupervisor, UnitAction, UnitStatus};
use crate::units::{self, COLLECTOR_UNIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceName {
    Collector,
    Publisher,
}

impl ServiceName {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceName::Collector => "collector",
            ServiceName::Publisher => "publisher",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Start,
    Stop,
    Restart,
    Status,
}

impl Action {
    /// Whether the action changes supervisor state (and so needs root).
    pub fn mutates(self) -> bool {
        !matches!(self, Action::Status)
    }
}

/// Concrete unit name for a logical service.
pub fn resolve_unit(name: ServiceName, store: &dyn StateStore) -> Result<String> {
    match name {
        ServiceName::Collector => Ok(COLLECTOR_UNIT.to_string()),
        ServiceName::Publisher => Ok(units::publisher_unit(state::room_number(store)?)),
    }
}

/// Run `action` against `name`. Returns the unit status for `Action::Status`.
pub fn control(
    name: ServiceName,
    action: Action,
    store: &dyn StateStore,
    supervisor: &dyn ServiceSupervisor,
) -> Result<Option<UnitStatus>> {
    let unit = resolve_unit(name, store)?;
    let unit_action = match action {
        Action::Status => return supervisor.status(&unit).map(Some),
        Action::Start => UnitAction::Start,
        Action::Stop => UnitAction::Stop,
        Action::Restart => UnitAction::Restart,
    };
    supervisor.control(&unit, unit_action)?;
    tracing::info!(service = name.as_str(), %unit, action = unit_action.as_str(), "done");
    Ok(None)
}

/// Enable the collector and the room's publisher at boot. Idempotent.
pub fn enable_at_boot(room: u32, supervisor: &dyn ServiceSupervisor) -> Result<()> {
    supervisor.control(COLLECTOR_UNIT, UnitAction::Enable)?;
    supervisor.control(&units::publisher_unit(room), UnitAction::Enable)?;
    Ok(())
}

/// (Re)start both services so they pick up the current environment file.
pub fn restart_pipeline(room: u32, supervisor: &dyn ServiceSupervisor) -> Result<()> {
    supervisor.control(COLLECTOR_UNIT, UnitAction::Restart)?;
    supervisor.control(&units::publisher_unit(room), UnitAction::Restart)?;
    Ok(())
}

/// Stop and disable the publisher instance of a room that is no longer configured.
pub fn retire_publisher(room: u32, supervisor: &dyn ServiceSupervisor) -> Result<()> {
    let unit = units::publisher_unit(room);
    supervisor.control(&unit, UnitAction::Stop)?;
    supervisor.control(&unit, UnitAction::Disable)?;
    tracing::info!(%unit, "superseded publisher stopped and disabled");
    Ok(())
}
