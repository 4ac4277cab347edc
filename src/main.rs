mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::error;
use osdaemon::workload::CommandWorkload;
use osdaemon::{ActionResult, Daemon, DaemonConfig, Host, ServiceRecord, create_daemon};

fn main() {
    // Initialize logger with custom format
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = real_main() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let args = cli::Args::parse();
    let mut cfg = DaemonConfig::discover(args.config.as_deref())?;
    if args.backend.is_some() {
        cfg.backend = args.backend;
    }

    let (record, default_args) = service_record(&args, &cfg)?;
    let mut daemon =
        create_daemon(record, &cfg, Host::default()).context("Failed to set up daemon")?;

    match args.sub {
        cli::Cmd::Install { args } => {
            let args = if args.is_empty() { default_args } else { args };
            handle_action(daemon.install(&args))
        }
        cli::Cmd::Remove => handle_action(daemon.remove()),
        cli::Cmd::Start => handle_action(daemon.start()),
        cli::Cmd::Stop => handle_action(daemon.stop()),
        cli::Cmd::Status => handle_status(&*daemon),
        cli::Cmd::IsInstalled => handle_is_installed(&*daemon),
        cli::Cmd::Render { args } => {
            let args = if args.is_empty() { default_args } else { args };
            print!("{}", daemon.render(&args)?);
            Ok(())
        }
        cli::Cmd::Run { mut command } => {
            let program = command.remove(0);
            let mut workload = CommandWorkload::new(program, command);
            handle_action(daemon.run(&mut workload))
        }
    }
}

/// Build the service record from `[service]` in the config, overridden by
/// command line flags. Also returns the configured workload arguments.
fn service_record(args: &cli::Args, cfg: &DaemonConfig) -> Result<(ServiceRecord, Vec<String>)> {
    let (mut record, default_args) = match &cfg.service {
        Some(def) => (def.record.clone(), def.args.clone()),
        None => {
            let name = args
                .name
                .clone()
                .context("No service name given: pass --name or set [service] in the config")?;
            (ServiceRecord::new(name, ""), Vec::new())
        }
    };

    if let Some(name) = &args.name {
        record.name = name.clone();
    }
    if let Some(description) = &args.description {
        record.description = description.clone();
    }
    if let Some(path) = &args.exec_start_path {
        record.exec_start_path = Some(path.clone());
    }
    if !args.dependencies.is_empty() {
        record.dependencies = args.dependencies.clone();
    }
    Ok((record, default_args))
}

/// Print the action message; a failure is returned so the process exits 1.
fn handle_action(result: ActionResult) -> Result<()> {
    match result {
        Ok(message) => {
            println!("{message}");
            Ok(())
        }
        Err(e) => {
            println!("{}", e.message);
            Err(e.source.into())
        }
    }
}

/// Handle status command - exit 0 if running, 1 if stopped
fn handle_status(daemon: &dyn Daemon) -> Result<()> {
    let status = daemon.status().map_err(|e| {
        println!("{}", e.message);
        anyhow::Error::new(e.source)
    })?;
    println!("{status}");
    if !status.running {
        std::process::exit(1);
    }
    Ok(())
}

/// Handle is-installed command - exit 0 if installed, 1 otherwise
fn handle_is_installed(daemon: &dyn Daemon) -> Result<()> {
    let path = daemon.descriptor_path();
    match daemon.is_installed() {
        Ok(true) => {
            println!("{} is installed ({})", daemon.record().name, path.display());
            Ok(())
        }
        Ok(false) => {
            println!("{} is not installed", daemon.record().name);
            std::process::exit(1);
        }
        Err(e) => Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    }
}
