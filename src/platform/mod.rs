//! Service manager backends.
//!
//! Each backend translates the generic lifecycle onto one OS service
//! manager's vocabulary:
//! - FreeBSD / DragonFly: rc.d scripts driven by `service(8)`
//! - macOS: launchd property lists driven by `launchctl`
//! - Linux: systemd units driven by `systemctl`

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command::CommandLine;
use crate::config::DaemonConfig;
use crate::error::DaemonError;
use crate::probe::StatusQuery;

pub mod launchd;
pub mod rcd;
pub mod systemd;

pub use launchd::Launchd;
pub use rcd::Rcd;
pub use systemd::Systemd;

/// Which service manager a daemon is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[serde(alias = "rc.d")]
    Rcd,
    Launchd,
    Systemd,
}

impl BackendKind {
    /// The service manager of the platform this crate was built for.
    pub fn native() -> Option<Self> {
        NATIVE_BACKEND
    }
}

// Platform-specific default
cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        const NATIVE_BACKEND: Option<BackendKind> = Some(BackendKind::Launchd);
    } else if #[cfg(any(target_os = "freebsd", target_os = "dragonfly"))] {
        const NATIVE_BACKEND: Option<BackendKind> = Some(BackendKind::Rcd);
    } else if #[cfg(target_os = "linux")] {
        const NATIVE_BACKEND: Option<BackendKind> = Some(BackendKind::Systemd);
    } else {
        const NATIVE_BACKEND: Option<BackendKind> = None;
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rcd => "rc.d",
            Self::Launchd => "launchd",
            Self::Systemd => "systemd",
        })
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rcd" | "rc.d" => Ok(Self::Rcd),
            "launchd" => Ok(Self::Launchd),
            "systemd" => Ok(Self::Systemd),
            other => Err(format!(
                "unknown backend '{other}' (expected rcd, launchd or systemd)"
            )),
        }
    }
}

/// Filesystem locations a backend reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub service_dir: PathBuf,
    pub rc_conf: PathBuf,
    pub working_dir: PathBuf,
    pub log_dir: PathBuf,
    pub supervisor: PathBuf,
}

impl Layout {
    /// Stock locations for `kind`.
    pub fn native(kind: BackendKind) -> Self {
        let service_dir = match kind {
            BackendKind::Rcd => "/usr/local/etc/rc.d",
            BackendKind::Launchd => "/Library/LaunchDaemons",
            BackendKind::Systemd => "/etc/systemd/system",
        };
        Self {
            service_dir: PathBuf::from(service_dir),
            rc_conf: PathBuf::from("/etc/rc.conf"),
            working_dir: PathBuf::from("/usr/local/var"),
            log_dir: PathBuf::from("/usr/local/var/log"),
            supervisor: PathBuf::from("/usr/sbin/daemon"),
        }
    }

    /// Stock locations for `kind`, overridden by whatever `cfg` sets.
    pub fn from_config(kind: BackendKind, cfg: &DaemonConfig) -> Self {
        let mut layout = Self::native(kind);
        let overrides = [
            (&mut layout.service_dir, &cfg.service_dir),
            (&mut layout.rc_conf, &cfg.rc_conf),
            (&mut layout.working_dir, &cfg.working_dir),
            (&mut layout.log_dir, &cfg.log_dir),
            (&mut layout.supervisor, &cfg.supervisor),
        ];
        for (slot, value) in overrides {
            if let Some(path) = value {
                *slot = path.clone();
            }
        }
        layout
    }
}

/// Values substituted into a service descriptor.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorFields<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub path: &'a Path,
    pub dependencies: &'a [String],
    pub args: &'a [String],
}

/// `path` as UTF-8. Descriptors are text, so a lossy conversion would name a
/// different file.
pub(crate) fn utf8_path<'a>(path: &'a Path, what: &str) -> Result<&'a str, DaemonError> {
    path.to_str().ok_or_else(|| {
        DaemonError::Render(format!("{what} is not valid UTF-8: {}", path.display()))
    })
}

/// `text` folded onto one line: every control character becomes a space.
pub(crate) fn single_line(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Platform-specific half of the lifecycle.
///
/// Implementations only describe files and commands; [`crate::daemon::PlatformRecord`]
/// decides when to write or run them.
pub trait ServiceBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Where the descriptor for `name` lives. Pure: depends on `name` only.
    fn descriptor_path(&self, name: &str) -> PathBuf;

    /// Permission bits of the written descriptor.
    fn descriptor_mode(&self) -> u32 {
        0o644
    }

    fn render(&self, fields: &DescriptorFields<'_>) -> Result<String, DaemonError>;

    /// Command whose output tells whether `name` is running.
    fn status_query(&self, name: &str) -> StatusQuery;

    fn start_command(&self, name: &str) -> CommandLine;

    fn stop_command(&self, name: &str) -> CommandLine;

    /// Command to run once a descriptor has been written.
    fn after_install(&self, _name: &str) -> Option<CommandLine> {
        None
    }

    /// Command to run once a descriptor has been deleted.
    fn after_remove(&self, _name: &str) -> Option<CommandLine> {
        None
    }
}
