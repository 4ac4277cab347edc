//! Manage a long-running daemon through the host's native service manager.
//!
//! A [`Daemon`] is obtained from [`new_daemon`] (native backend, stock
//! layout) or [`create_daemon`] (explicit backend, layout and host), then
//! driven through install, start, stop, status and remove. Supervision itself
//! is left to the service manager:
//! - FreeBSD: rc.d scripts and `service(8)`
//! - macOS: launchd property lists and `launchctl`
//! - Linux: systemd units and `systemctl`

pub mod command;
pub mod config;
pub mod daemon;
pub mod enablement;
pub mod error;
pub mod exec_path;
pub mod file_ops;
pub mod platform;
pub mod privilege;
pub mod probe;
pub mod record;
pub mod workload;

pub use config::DaemonConfig;
pub use daemon::{Daemon, Executable, Host, PlatformRecord, create_daemon, new_daemon};
pub use error::{ActionError, ActionResult, DaemonError};
pub use platform::BackendKind;
pub use probe::RunningStatus;
pub use record::ServiceRecord;
