//! systemd backend for Linux.
//!
//! Descriptors are unit files in `/etc/systemd/system`. The manager is told
//! to re-read its unit directory after a unit is added or removed.

use std::path::PathBuf;

use crate::command::CommandLine;
use crate::error::DaemonError;
use crate::probe::{StatusQuery, SYSTEMD_PID};

use super::{BackendKind, DescriptorFields, Layout, ServiceBackend, single_line, utf8_path};

#[derive(Debug, Clone)]
pub struct Systemd {
    layout: Layout,
}

impl Systemd {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    fn systemctl(verb: &str, name: &str) -> CommandLine {
        CommandLine::new("systemctl").args([verb.to_string(), format!("{name}.service")])
    }
}

/// One `ExecStart=` word. Specifiers are doubled so they stay literal;
/// words with whitespace, quotes or backslashes are double-quoted.
fn exec_word(word: &str) -> String {
    let word = word.replace('%', "%%").replace('$', "$$");
    let needs_quotes = word.is_empty()
        || word
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '\\' | ';'));
    if !needs_quotes {
        return word;
    }
    let mut out = String::with_capacity(word.len() + 2);
    out.push('"');
    for c in word.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl ServiceBackend for Systemd {
    fn kind(&self) -> BackendKind {
        BackendKind::Systemd
    }

    fn descriptor_path(&self, name: &str) -> PathBuf {
        self.layout.service_dir.join(format!("{name}.service"))
    }

    fn render(&self, fields: &DescriptorFields<'_>) -> Result<String, DaemonError> {
        let binary_path = utf8_path(fields.path, "executable path")?;

        let mut content = String::with_capacity(512);

        // [Unit] section
        content.push_str("[Unit]\n");
        content.push_str(&format!(
            "Description={}\n",
            single_line(fields.description).replace('%', "%%")
        ));
        let mut after = String::from("network.target");
        for dep in fields.dependencies {
            let unit = if dep.contains('.') {
                dep.clone()
            } else {
                format!("{dep}.service")
            };
            after.push(' ');
            after.push_str(&unit);
            content.push_str(&format!("Wants={unit}\n"));
        }
        content.push_str(&format!("After={after}\n"));
        content.push('\n');

        // [Service] section
        content.push_str("[Service]\n");
        content.push_str("Type=simple\n");
        let mut exec_start = format!("ExecStart={}", exec_word(binary_path));
        for arg in fields.args {
            exec_start.push(' ');
            exec_start.push_str(&exec_word(arg));
        }
        content.push_str(&exec_start);
        content.push('\n');
        content.push_str("Restart=on-failure\n");
        content.push_str("RestartSec=5s\n");
        content.push('\n');

        // [Install] section
        content.push_str("[Install]\n");
        content.push_str("WantedBy=multi-user.target\n");

        Ok(content)
    }

    fn status_query(&self, name: &str) -> StatusQuery {
        StatusQuery {
            command: Self::systemctl("status", name),
            pid_pattern: &SYSTEMD_PID,
        }
    }

    fn start_command(&self, name: &str) -> CommandLine {
        Self::systemctl("start", name)
    }

    fn stop_command(&self, name: &str) -> CommandLine {
        Self::systemctl("stop", name)
    }

    fn after_install(&self, _name: &str) -> Option<CommandLine> {
        Some(CommandLine::new("systemctl").arg("daemon-reload"))
    }

    fn after_remove(&self, _name: &str) -> Option<CommandLine> {
        Some(CommandLine::new("systemctl").arg("daemon-reload"))
    }
}
