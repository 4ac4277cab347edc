//! rc.d backend for FreeBSD-style systems.
//!
//! Descriptors are shell scripts in `/usr/local/etc/rc.d` that wrap the
//! workload in `daemon(8)`. Control goes through `service(8)`; when the
//! service is not enabled in rc.conf the `one`-prefixed verbs are used.

use std::path::PathBuf;

use crate::command::CommandLine;
use crate::enablement;
use crate::error::DaemonError;
use crate::probe::{RCD_PID, StatusQuery};

use super::{BackendKind, DescriptorFields, Layout, ServiceBackend, single_line, utf8_path};

/// Services every rc.d script waits for.
const BASE_REQUIRE: &str = "networking syslog";

#[derive(Debug, Clone)]
pub struct Rcd {
    layout: Layout,
}

impl Rcd {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    fn service_command(&self, name: &str, verb: &str) -> CommandLine {
        let verb = enablement::verb_for(&self.layout.rc_conf, name, verb);
        CommandLine::new("service").args([name.to_string(), verb])
    }
}

/// Quote `arg` as one shell word. rc.subr evals `start_cmd`, so anything
/// outside a conservative safe set goes in single quotes.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Escape the characters that stay special inside `"..."`.
fn escape_double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl ServiceBackend for Rcd {
    fn kind(&self) -> BackendKind {
        BackendKind::Rcd
    }

    fn descriptor_path(&self, name: &str) -> PathBuf {
        self.layout.service_dir.join(name)
    }

    fn descriptor_mode(&self) -> u32 {
        0o755
    }

    fn render(&self, fields: &DescriptorFields<'_>) -> Result<String, DaemonError> {
        let name = fields.name;
        let path = utf8_path(fields.path, "executable path")?;
        let supervisor = utf8_path(&self.layout.supervisor, "supervisor path")?;

        let mut require = String::from(BASE_REQUIRE);
        for dep in fields.dependencies {
            require.push(' ');
            require.push_str(dep);
        }

        let mut content = String::with_capacity(1024);
        content.push_str("#!/bin/sh\n#\n");
        content.push_str(&format!("# PROVIDE: {name}\n"));
        content.push_str(&format!("# REQUIRE: {require}\n"));
        content.push_str("# KEYWORD:\n");
        if !fields.description.is_empty() {
            content.push_str(&format!("#\n# {}\n", single_line(fields.description)));
        }
        content.push('\n');
        content.push_str(&format!(
            "# Add the following lines to /etc/rc.conf to enable the {name}:\n"
        ));
        content.push_str("#\n");
        content.push_str(&format!("# {name}_enable=\"YES\"\n"));
        content.push_str("#\n\n");
        content.push_str(". /etc/rc.subr\n\n");
        content.push_str(&format!("name=\"{name}\"\n"));
        content.push_str(&format!("rcvar=\"{name}_enable\"\n"));
        content.push_str(&format!("command=\"{}\"\n", escape_double_quoted(path)));
        content.push_str("pidfile=\"/var/run/$name.pid\"\n\n");

        let mut start_cmd = format!(
            "{} -p $pidfile -f $command",
            escape_double_quoted(supervisor)
        );
        for arg in fields.args {
            start_cmd.push(' ');
            start_cmd.push_str(&escape_double_quoted(&shell_quote(arg)));
        }
        content.push_str(&format!("start_cmd=\"{start_cmd}\"\n"));
        content.push_str("load_rc_config $name\n");
        content.push_str("run_rc_command \"$1\"\n");

        Ok(content)
    }

    fn status_query(&self, name: &str) -> StatusQuery {
        StatusQuery {
            command: self.service_command(name, "status"),
            pid_pattern: &RCD_PID,
        }
    }

    fn start_command(&self, name: &str) -> CommandLine {
        self.service_command(name, "start")
    }

    fn stop_command(&self, name: &str) -> CommandLine {
        self.service_command(name, "stop")
    }
}
