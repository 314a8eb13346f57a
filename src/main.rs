//! aiotctl — edge gateway provisioning and pipeline service manager.
//!
//! Installs the MQTT collector and cloud publisher on a gateway, configures
//! its identity and room, and controls both services under systemd. Run
//! `aiotctl --help` for usage.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod cloud;
mod color;
mod config;
mod error;
mod fetch;
mod gateway;
mod host;
mod install;
mod packages;
mod probe;
mod prompt;
mod service;
mod state;
mod status;
mod supervisor;
mod uninstall;
mod units;
mod update;
mod wizard;

#[cfg(test)]
mod testing;

use cli::{Cli, Commands};
use cloud::AwsCli;
use config::ManagerConfig;
use fetch::Curl;
use host::{HostOps, LinuxHost};
use install::{Capabilities, Installer};
use packages::{HostPackageManager, PackageManager};
use prompt::TerminalPrompter;
use state::FileStateStore;
use supervisor::Systemctl;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Init = cli.command {
        print!("{}", toml::to_string_pretty(&ManagerConfig::default())?);
        return Ok(());
    }

    let config = ManagerConfig::load_or_default(&cli.config)?;
    let layout = &config.layout;
    let host = LinuxHost;
    let store = FileStateStore::new(&layout.state_dir);
    let supervisor = Systemctl;

    if needs_root(&cli.command) && !host.is_root() {
        anyhow::bail!("this command changes system state; run it as root (sudo aiotctl ...)");
    }

    match cli.command {
        Commands::Init => unreachable!("handled above"),
        Commands::Check => {
            let report = probe::check(&config, &store);
            report.print();
            if !report.all_required_present() {
                for missing in report.missing_required() {
                    eprintln!("{}", missing);
                }
                std::process::exit(1);
            }
            println!("{}", color::bold_green("✓ all required dependencies present"));
        }
        Commands::Configure => {
            let cloud = AwsCli::new(&config.cloud);
            let previous_room = state::room_number(&store).ok();
            let gateway = wizard::Wizard::new(layout, &store, &cloud, &mut TerminalPrompter).configure()?;
            install::apply_room(&config, &supervisor, previous_room, gateway.room_number)?;
            println!();
            println!("{}", color::bold_green("✓ gateway configured"));
            println!("  thing name  {}", gateway.thing_name);
            println!("  room        {}", state::room_label(gateway.room_number));
            println!("  endpoint    {}", gateway.cloud_endpoint);
        }
        Commands::Install { no_fail_fast } => {
            let packages = HostPackageManager::detect();
            let cloud = AwsCli::new(&config.cloud);
            let downloader = Curl::new(&config.artifacts);
            let caps = Capabilities {
                host: &host,
                packages: packages.as_ref().map(|p| p as &dyn PackageManager),
                downloader: &downloader,
                supervisor: &supervisor,
                cloud: &cloud,
                store: &store,
            };
            let mut prompter = TerminalPrompter;
            let fail_fast = config.install.fail_fast && !no_fail_fast;
            let report = Installer::new(&config, caps, &mut prompter)
                .fail_fast(fail_fast)
                .install()?;

            println!();
            if report.created_account {
                println!("  created service account {}", layout.service_account);
            }
            if !report.installed_packages.is_empty() {
                println!("  installed packages       {}", report.installed_packages.join(" "));
            }
            if let Some(gateway) = &report.gateway {
                println!("  thing name               {}", gateway.thing_name);
            }
            report.dependencies.print();
            match report.started_room {
                Some(room) => println!(
                    "{}",
                    color::bold_green(&format!("✓ gateway installed — pipeline running for {}", state::room_label(room)))
                ),
                None => println!(
                    "{}",
                    color::yellow("Installed, but not configured. Run `aiotctl configure` to start the pipeline.")
                ),
            }
        }
        Commands::Status => status::run(&store, &supervisor)?,
        Commands::Show => status::show(layout, &store)?,
        Commands::Collector { action } => {
            control(service::ServiceName::Collector, action, &store, &supervisor)?
        }
        Commands::Publisher { action } => {
            control(service::ServiceName::Publisher, action, &store, &supervisor)?
        }
        Commands::Update => {
            let downloader = Curl::new(&config.artifacts);
            update::run(&config, &downloader, &host, &supervisor, &store)?;
        }
        Commands::Uninstall { purge, yes } => uninstall::run(layout, &supervisor, purge, yes)?,
    }

    Ok(())
}

fn needs_root(command: &Commands) -> bool {
    match command {
        Commands::Install { .. }
        | Commands::Configure
        | Commands::Update
        | Commands::Uninstall { .. } => true,
        Commands::Collector { action } | Commands::Publisher { action } => action.mutates(),
        Commands::Check | Commands::Status | Commands::Show | Commands::Init => false,
    }
}

fn control(
    name: service::ServiceName,
    action: service::Action,
    store: &FileStateStore,
    supervisor: &Systemctl,
) -> Result<()> {
    if let Some(st) = service::control(name, action, store, supervisor)? {
        let running = if st.is_running() { color::green("running") } else { color::red("not running") };
        println!("{}  {}", st.unit, running);
        println!("  state     {} ({})", st.active_state, st.sub_state);
        if let Some(pid) = st.main_pid {
            println!("  pid       {}", pid);
        }
        if let Some(n) = st.restarts {
            println!("  restarts  {}", n);
        }
        if let Some(t) = st.active_since {
            println!("  since     {}", t.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    } else {
        println!("{} {}: ok", name.as_str(), format!("{:?}", action).to_lowercase());
    }
    Ok(())
}
