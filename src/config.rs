//! TOML configuration for the daemon manager.
//!
//! Looked up from an explicit path, then the system-wide file, then the
//! user config directory. A missing file yields the defaults.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::platform::BackendKind;
use crate::record::ServiceRecord;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/osdaemon/osdaemon.toml";

/// Top-level configuration. Every field is optional; unset paths fall back to
/// the selected backend's native layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// Service manager to target. Defaults to the host's native one.
    pub backend: Option<BackendKind>,
    /// Directory holding service descriptors.
    pub service_dir: Option<PathBuf>,
    /// Boot configuration consulted for `<name>_enable` (rc.d).
    pub rc_conf: Option<PathBuf>,
    /// Working directory written into launchd descriptors.
    pub working_dir: Option<PathBuf>,
    /// Directory for launchd stdout/stderr logs.
    pub log_dir: Option<PathBuf>,
    /// Supervisor wrapper invoked by rc.d scripts.
    pub supervisor: Option<PathBuf>,
    /// Default service to operate on when none is named on the command line.
    pub service: Option<ServiceDefinition>,
}

/// On-disk TOML description of the service to manage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    #[serde(flatten)]
    pub record: ServiceRecord,
    /// Trailing arguments passed to the workload at install time.
    #[serde(default)]
    pub args: Vec<String>,
}

impl DaemonConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load configuration from an explicit path.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = Self::from_toml(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Using config from: {}", path.display());
        Ok(cfg)
    }

    /// Locate and load configuration.
    ///
    /// Search order: `explicit`, the system-wide file, the user config
    /// directory. Without any file the defaults are used.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidates = [
            Some(PathBuf::from(SYSTEM_CONFIG_PATH)),
            dirs::config_dir().map(|d| d.join("osdaemon").join("osdaemon.toml")),
        ];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                return Self::load(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }
}
