//! CLI definitions for aiotctl.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;
use crate::service::Action;

#[derive(Parser)]
#[clap(
    name = "aiotctl",
    version,
    about = "Edge gateway pipeline manager\n\nProvision the gateway, configure its identity and room, and control the collector and publisher services.",
    long_about = None
)]
pub struct Cli {
    /// Path to aiotctl.toml (built-in defaults are used if it does not exist)
    #[clap(long, short, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Debug logging
    #[clap(long, short, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision this machine: account, directories, packages, artifacts, units, configuration, services.
    ///
    /// Safe to re-run; re-running is the recovery path after a failure.
    /// Do not run concurrently with another install or configure.
    Install {
        /// Continue even if the configuration wizard fails
        #[clap(long)]
        no_fail_fast: bool,
    },

    /// Check dependencies and certificates (exit 1 if anything required is missing)
    Check,

    /// Interactively configure device type, gateway number, room and cloud endpoint
    Configure,

    /// Show collector and publisher service status
    Status,

    /// Print the stored gateway configuration
    Show,

    /// Control the collector service
    Collector {
        #[clap(value_enum)]
        action: Action,
    },

    /// Control the publisher service for the configured room
    Publisher {
        #[clap(value_enum)]
        action: Action,
    },

    /// Re-fetch the manager and pipeline scripts and restart running services
    Update,

    /// Stop and remove the pipeline units
    Uninstall {
        /// Also delete the stored gateway configuration
        #[clap(long)]
        purge: bool,

        /// Do not ask for confirmation
        #[clap(long, short)]
        yes: bool,
    },

    /// Print an example aiotctl.toml to stdout
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_service_actions() {
        let cli = Cli::parse_from(["aiotctl", "publisher", "restart"]);
        assert!(matches!(cli.command, Commands::Publisher { action: Action::Restart }));

        let cli = Cli::parse_from(["aiotctl", "collector", "status", "-v"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Collector { action: Action::Status }));
    }

    #[test]
    fn rejects_unknown_action() {
        assert!(Cli::try_parse_from(["aiotctl", "publisher", "reload"]).is_err());
    }
}
