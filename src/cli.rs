use std::path::PathBuf;

use clap::{Parser, Subcommand};
use osdaemon::BackendKind;

#[derive(Parser, Debug)]
#[command(version, about = "Manage a daemon through the native service manager")]
pub struct Args {
    /// Path to configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Service manager to target: rcd, launchd or systemd (default: native)
    #[arg(long, global = true)]
    pub backend: Option<BackendKind>,

    /// Service name (overrides [service].name)
    #[arg(long, short = 'n', global = true)]
    pub name: Option<String>,

    /// Human readable description
    #[arg(long, short = 'd', global = true)]
    pub description: Option<String>,

    /// Workload binary (default: this executable)
    #[arg(long = "exec", global = true)]
    pub exec_start_path: Option<PathBuf>,

    /// Services that must start first, comma separated
    #[arg(long = "depends", value_delimiter = ',', global = true)]
    pub dependencies: Vec<String>,

    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Write the service descriptor (trailing ARGS are passed to the workload)
    Install {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Delete the service descriptor
    Remove,
    /// Start the service (Exit 0 = success, 1 = failed)
    Start,
    /// Stop the service (Exit 0 = success, 1 = failed)
    Stop,
    /// Check service status (Exit 0 = running, 1 = stopped)
    Status,
    /// Check whether the descriptor exists (Exit 0 = installed, 1 = not)
    IsInstalled,
    /// Print the descriptor install would write
    Render {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run PROGRAM in the foreground as the service workload
    Run {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}
