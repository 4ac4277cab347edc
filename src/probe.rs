//! Live status detection by scraping the service manager's own status output.
//!
//! The output of `service status`, `launchctl list` and `systemctl status` is
//! meant for humans and is not stable across releases or locales. All
//! knowledge of its shape is kept in this module.

use std::fmt;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::command::{CommandLine, CommandRunner};

/// `service foo status` on rc.d: "foo is running as pid 1234."
pub static RCD_PID: Lazy<Regex> = Lazy::new(|| Regex::new(r"pid\s+([0-9]+)").unwrap());

/// `launchctl list foo`: `"PID" = 1234;`
pub static LAUNCHD_PID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""PID" = ([0-9]+);"#).unwrap());

/// `systemctl status foo.service`: "Main PID: 1234 (foo)"
pub static SYSTEMD_PID: Lazy<Regex> = Lazy::new(|| Regex::new(r"Main PID: ([0-9]+)").unwrap());

/// A status command and the marker carrying the pid in its output.
#[derive(Debug, Clone)]
pub struct StatusQuery {
    pub command: CommandLine,
    pub pid_pattern: &'static Lazy<Regex>,
}

/// Whether a service is running, as reported by the service manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningStatus {
    pub message: String,
    pub running: bool,
    pub pid: Option<u32>,
}

impl RunningStatus {
    pub fn stopped() -> Self {
        Self {
            message: "Service is stopped".to_string(),
            running: false,
            pid: None,
        }
    }

    pub fn running(pid: Option<u32>) -> Self {
        let message = match pid {
            Some(pid) => format!("Service (pid  {pid}) is running..."),
            None => "Service is running...".to_string(),
        };
        Self {
            message,
            running: true,
            pid,
        }
    }
}

impl fmt::Display for RunningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Ask the service manager about `name`.
///
/// Never fails: a command that cannot be spawned or exits non-zero means
/// "not running".
pub fn probe(runner: &dyn CommandRunner, name: &str, query: &StatusQuery) -> RunningStatus {
    match runner.output(&query.command) {
        Ok(output) if output.success => parse_status(name, &output.stdout, query.pid_pattern),
        Ok(output) => {
            debug!(
                "{} exited with {:?}, treating {name} as stopped",
                query.command, output.code
            );
            RunningStatus::stopped()
        }
        Err(e) => {
            debug!("{} failed: {e}, treating {name} as stopped", query.command);
            RunningStatus::stopped()
        }
    }
}

/// Interpret the textual output of a successful status command.
pub fn parse_status(name: &str, output: &str, pid_pattern: &Regex) -> RunningStatus {
    if !output.contains(name) {
        return RunningStatus::stopped();
    }
    let pid = pid_pattern
        .captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok());
    RunningStatus::running(pid)
}
