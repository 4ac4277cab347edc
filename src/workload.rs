//! A child process as the in-process workload of [`crate::Daemon::run`].

use std::process::Command;

use anyhow::{Context, Result, bail};
use log::info;

use crate::daemon::Executable;

/// Runs an external program to completion.
#[derive(Debug, Clone)]
pub struct CommandWorkload {
    program: String,
    args: Vec<String>,
}

impl CommandWorkload {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Executable for CommandWorkload {
    fn run(&mut self) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.program))?;
        info!("{} started (pid {})", self.program, child.id());

        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for {}", self.program))?;
        if !status.success() {
            bail!(
                "{} exited with code {}",
                self.program,
                status.code().unwrap_or(-1)
            );
        }
        Ok(())
    }
}
