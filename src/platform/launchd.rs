//! launchd backend for macOS.
//!
//! Descriptors are XML property lists in `/Library/LaunchDaemons`, loaded and
//! unloaded with `launchctl`.

use std::path::{Path, PathBuf};

use plist::{Dictionary, Value};

use crate::command::CommandLine;
use crate::error::DaemonError;
use crate::probe::{LAUNCHD_PID, StatusQuery};

use super::{BackendKind, DescriptorFields, Layout, ServiceBackend, utf8_path};

#[derive(Debug, Clone)]
pub struct Launchd {
    layout: Layout,
}

impl Launchd {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    fn plist_arg(&self, name: &str) -> String {
        self.descriptor_path(name).display().to_string()
    }
}

impl ServiceBackend for Launchd {
    fn kind(&self) -> BackendKind {
        BackendKind::Launchd
    }

    fn descriptor_path(&self, name: &str) -> PathBuf {
        self.layout.service_dir.join(format!("{name}.plist"))
    }

    fn render(&self, fields: &DescriptorFields<'_>) -> Result<String, DaemonError> {
        let name = fields.name;
        let mut plist = Dictionary::new();

        plist.insert("KeepAlive".to_string(), Value::Boolean(true));
        plist.insert("Label".to_string(), Value::String(name.to_string()));

        // Program and arguments
        let program = utf8_path(fields.path, "executable path")?;
        let mut program_args = vec![Value::String(program.to_string())];
        program_args.extend(fields.args.iter().map(|a| Value::String(a.clone())));
        plist.insert("ProgramArguments".to_string(), Value::Array(program_args));

        plist.insert("RunAtLoad".to_string(), Value::Boolean(true));
        let working_dir = utf8_path(&self.layout.working_dir, "working directory")?;
        plist.insert(
            "WorkingDirectory".to_string(),
            Value::String(working_dir.to_string()),
        );

        // Logging
        let log_dir = Path::new(utf8_path(&self.layout.log_dir, "log directory")?);
        plist.insert(
            "StandardErrorPath".to_string(),
            Value::String(log_dir.join(format!("{name}.err")).display().to_string()),
        );
        plist.insert(
            "StandardOutPath".to_string(),
            Value::String(log_dir.join(format!("{name}.log")).display().to_string()),
        );

        let mut buf = Vec::new();
        plist::to_writer_xml(&mut buf, &Value::Dictionary(plist))
            .map_err(|e| DaemonError::Render(format!("Failed to generate plist: {e}")))?;
        buf.push(b'\n');

        String::from_utf8(buf)
            .map_err(|e| DaemonError::Render(format!("Plist contains invalid UTF-8: {e}")))
    }

    fn status_query(&self, name: &str) -> StatusQuery {
        StatusQuery {
            command: CommandLine::new("launchctl").args(["list", name]),
            pid_pattern: &LAUNCHD_PID,
        }
    }

    fn start_command(&self, name: &str) -> CommandLine {
        CommandLine::new("launchctl").args(["load".to_string(), self.plist_arg(name)])
    }

    fn stop_command(&self, name: &str) -> CommandLine {
        CommandLine::new("launchctl").args(["unload".to_string(), self.plist_arg(name)])
    }
}
