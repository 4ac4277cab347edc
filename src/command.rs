//! Subprocess invocation.
//!
//! Every call into the host's service manager goes through a [`CommandRunner`]
//! so the lifecycle logic can be driven against a recording stub.

use std::fmt;
use std::io;
use std::process::Command;

use log::debug;

use crate::error::DaemonError;

/// A program plus its arguments, not yet executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Executes command lines and captures their output.
pub trait CommandRunner: Send + Sync {
    /// Run `cmd` to completion. Only spawn failures are `Err`; a non-zero
    /// exit is reported through [`CommandOutput::success`].
    fn output(&self, cmd: &CommandLine) -> io::Result<CommandOutput>;
}

/// Runs commands on the host with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn output(&self, cmd: &CommandLine) -> io::Result<CommandOutput> {
        debug!("exec: {cmd}");
        let output = Command::new(&cmd.program).args(&cmd.args).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `cmd` and turn a spawn failure or non-zero exit into an error.
pub fn run_checked(runner: &dyn CommandRunner, cmd: &CommandLine) -> Result<(), DaemonError> {
    let output = runner.output(cmd)?;
    if !output.success {
        let stderr = output.stderr.trim();
        return Err(DaemonError::CommandFailed {
            command: cmd.to_string(),
            code: output.code,
            stderr: if stderr.is_empty() {
                String::new()
            } else {
                format!(": {stderr}")
            },
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Exit(i32, &'static str);

    impl CommandRunner for Exit {
        fn output(&self, _cmd: &CommandLine) -> io::Result<CommandOutput> {
            Ok(CommandOutput {
                success: self.0 == 0,
                code: Some(self.0),
                stdout: String::new(),
                stderr: self.1.to_string(),
            })
        }
    }

    #[test]
    fn display_joins_program_and_args() {
        let cmd = CommandLine::new("service").args(["foo", "onestart"]);
        assert_eq!(cmd.to_string(), "service foo onestart");
    }

    #[test]
    fn run_checked_reports_exit_code_and_stderr() {
        let cmd = CommandLine::new("launchctl").arg("load");
        let err = run_checked(&Exit(3, "no such file\n"), &cmd).unwrap_err();
        match err {
            DaemonError::CommandFailed {
                command,
                code,
                stderr,
            } => {
                assert_eq!(command, "launchctl load");
                assert_eq!(code, Some(3));
                assert_eq!(stderr, ": no such file");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(run_checked(&Exit(0, ""), &cmd).is_ok());
    }
}
