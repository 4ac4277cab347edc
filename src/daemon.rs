//! The daemon lifecycle capability set and its per-platform record.
//!
//! Every operation is a short synchronous sequence: privilege check,
//! precondition checks, then at most one file operation or service manager
//! command. Preconditions act as guards, so repeating an operation (installing
//! twice, starting a running service) is reported as a failure.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::command::{CommandRunner, SystemRunner, run_checked};
use crate::config::DaemonConfig;
use crate::error::{ActionError, ActionResult, DaemonError};
use crate::exec_path;
use crate::file_ops::write_file_atomic;
use crate::platform::{
    BackendKind, DescriptorFields, Launchd, Layout, Rcd, ServiceBackend, Systemd,
};
use crate::privilege::{PrivilegeGuard, RootGuard};
use crate::probe::{self, RunningStatus};
use crate::record::ServiceRecord;

/// Appended to an action prefix when the action succeeded.
pub const SUCCESS: &str = " completed successfully";
/// Appended to an action prefix when the action failed.
pub const FAILED: &str = " failed";

/// The workload a service manager launches. Run in-process by
/// [`Daemon::run`].
pub trait Executable {
    fn run(&mut self) -> anyhow::Result<()>;
}

impl<F> Executable for F
where
    F: FnMut() -> anyhow::Result<()>,
{
    fn run(&mut self) -> anyhow::Result<()> {
        self()
    }
}

/// Lifecycle operations on one service, independent of the service manager.
pub trait Daemon {
    /// Service manager this daemon is registered with.
    fn kind(&self) -> BackendKind;

    fn record(&self) -> &ServiceRecord;

    /// Location of the service descriptor. Depends only on the name.
    fn descriptor_path(&self) -> PathBuf;

    /// Whether the descriptor exists.
    ///
    /// A missing descriptor is `Ok(false)`. Any other stat failure is an
    /// error that callers should treat as "not installed".
    fn is_installed(&self) -> Result<bool, DaemonError>;

    /// Render the descriptor `install` would write, without writing it.
    fn render(&self, args: &[String]) -> Result<String, DaemonError>;

    /// Write the service descriptor. `args` are passed to the workload.
    fn install(&mut self, args: &[String]) -> ActionResult;

    /// Delete the service descriptor.
    fn remove(&self) -> ActionResult;

    fn start(&self) -> ActionResult;

    fn stop(&self) -> ActionResult;

    /// Ask the service manager whether the service runs.
    fn status(&self) -> ActionResult<RunningStatus>;

    /// Run the workload in this process, synchronously.
    fn run(&self, workload: &mut dyn Executable) -> ActionResult;
}

/// Collaborators a daemon needs from the host: a way to run commands and a
/// way to tell whether it is privileged.
#[derive(Clone)]
pub struct Host {
    pub runner: Arc<dyn CommandRunner>,
    pub privileges: Arc<dyn PrivilegeGuard>,
}

impl Host {
    pub fn new(runner: Arc<dyn CommandRunner>, privileges: Arc<dyn PrivilegeGuard>) -> Self {
        Self { runner, privileges }
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(Arc::new(SystemRunner), Arc::new(RootGuard))
    }
}

/// Message builder for one lifecycle action.
struct Action {
    prefix: String,
}

impl Action {
    fn new(verb: &str, record: &ServiceRecord) -> Self {
        Self {
            prefix: format!("{verb} {}:", record.display_name()),
        }
    }

    fn succeeded(&self) -> String {
        let message = format!("{}{SUCCESS}", self.prefix);
        info!("{message}");
        message
    }

    fn failed(&self, source: DaemonError) -> ActionError {
        let message = format!("{}{FAILED}", self.prefix);
        warn!("{message} ({source})");
        ActionError { message, source }
    }

    fn report<T>(&self, result: Result<T, DaemonError>) -> ActionResult<T> {
        result.map_err(|e| self.failed(e))
    }
}

/// A service record bound to one service manager backend.
pub struct PlatformRecord<B: ServiceBackend> {
    record: ServiceRecord,
    backend: B,
    host: Host,
}

impl<B: ServiceBackend> PlatformRecord<B> {
    pub fn new(record: ServiceRecord, backend: B, host: Host) -> Result<Self, DaemonError> {
        record.validate()?;
        Ok(Self {
            record,
            backend,
            host,
        })
    }

    fn require_installed(&self) -> Result<(), DaemonError> {
        match self.is_installed() {
            Ok(true) => Ok(()),
            Ok(false) => Err(DaemonError::NotInstalled),
            Err(e) => Err(e),
        }
    }

    fn probe(&self) -> RunningStatus {
        let query = self.backend.status_query(&self.record.name);
        let status = probe::probe(self.host.runner.as_ref(), &self.record.name, &query);
        debug!("{}: {}", self.record.name, status);
        status
    }

    /// The configured execution path made absolute, or the resolved path of
    /// the running binary when none was configured.
    fn resolve_exec_path(&self) -> Result<PathBuf, DaemonError> {
        match &self.record.exec_start_path {
            Some(path) if path.is_absolute() => Ok(path.clone()),
            Some(path) if !path.as_os_str().is_empty() => {
                exec_path::resolve(path, &std::env::current_dir()?)
            }
            _ => exec_path::current_executable(),
        }
    }

    fn fields<'a>(&'a self, path: &'a Path, args: &'a [String]) -> DescriptorFields<'a> {
        DescriptorFields {
            name: &self.record.name,
            description: &self.record.description,
            path,
            dependencies: &self.record.dependencies,
            args,
        }
    }

    fn try_install(&mut self, args: &[String]) -> Result<(), DaemonError> {
        self.host.privileges.check()?;

        match self.is_installed() {
            Ok(true) => return Err(DaemonError::AlreadyInstalled),
            Ok(false) => {}
            Err(e) => debug!("stat of descriptor failed ({e}), treating as not installed"),
        }

        let exec_path = self.resolve_exec_path()?;
        check_exec_path(&exec_path)?;
        self.record.exec_start_path = Some(exec_path.clone());

        let content = self.backend.render(&self.fields(&exec_path, args))?;
        let path = self.descriptor_path();
        write_file_atomic(&path, &content, self.backend.descriptor_mode())?;
        info!(
            "Wrote {} descriptor {} for {}",
            self.backend.kind(),
            path.display(),
            exec_path.display()
        );

        if let Some(cmd) = self.backend.after_install(&self.record.name) {
            if let Err(e) = run_checked(self.host.runner.as_ref(), &cmd) {
                // The manager never saw it: leave nothing behind.
                if let Err(rm) = fs::remove_file(&path) {
                    warn!("Failed to roll back {}: {rm}", path.display());
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn try_remove(&self) -> Result<(), DaemonError> {
        self.host.privileges.check()?;
        self.require_installed()?;

        let path = self.descriptor_path();
        fs::remove_file(&path)?;
        info!("Removed {}", path.display());

        if let Some(cmd) = self.backend.after_remove(&self.record.name) {
            run_checked(self.host.runner.as_ref(), &cmd)?;
        }
        Ok(())
    }

    fn try_start(&self) -> Result<(), DaemonError> {
        self.host.privileges.check()?;
        self.require_installed()?;
        if self.probe().running {
            return Err(DaemonError::AlreadyRunning);
        }
        let cmd = self.backend.start_command(&self.record.name);
        run_checked(self.host.runner.as_ref(), &cmd)
    }

    fn try_stop(&self) -> Result<(), DaemonError> {
        self.host.privileges.check()?;
        self.require_installed()?;
        if !self.probe().running {
            return Err(DaemonError::AlreadyStopped);
        }
        let cmd = self.backend.stop_command(&self.record.name);
        run_checked(self.host.runner.as_ref(), &cmd)
    }

    fn try_status(&self) -> Result<RunningStatus, DaemonError> {
        self.host.privileges.check()?;
        self.require_installed()?;
        Ok(self.probe())
    }
}

impl<B: ServiceBackend> Daemon for PlatformRecord<B> {
    fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    fn record(&self) -> &ServiceRecord {
        &self.record
    }

    fn descriptor_path(&self) -> PathBuf {
        self.backend.descriptor_path(&self.record.name)
    }

    fn is_installed(&self) -> Result<bool, DaemonError> {
        match fs::metadata(self.descriptor_path()) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn render(&self, args: &[String]) -> Result<String, DaemonError> {
        let exec_path = self.resolve_exec_path()?;
        self.backend.render(&self.fields(&exec_path, args))
    }

    fn install(&mut self, args: &[String]) -> ActionResult {
        let action = Action::new("Installing", &self.record);
        action.report(self.try_install(args))?;
        Ok(action.succeeded())
    }

    fn remove(&self) -> ActionResult {
        let action = Action::new("Removing", &self.record);
        action.report(self.try_remove())?;
        Ok(action.succeeded())
    }

    fn start(&self) -> ActionResult {
        let action = Action::new("Starting", &self.record);
        action.report(self.try_start())?;
        Ok(action.succeeded())
    }

    fn stop(&self) -> ActionResult {
        let action = Action::new("Stopping", &self.record);
        action.report(self.try_stop())?;
        Ok(action.succeeded())
    }

    fn status(&self) -> ActionResult<RunningStatus> {
        let action = Action::new("Querying", &self.record);
        action.report(self.try_status())
    }

    fn run(&self, workload: &mut dyn Executable) -> ActionResult {
        let action = Action::new("Running", &self.record);
        info!("Running {} in process {}", self.record.name, std::process::id());
        action.report(workload.run().map_err(DaemonError::Workload))?;
        Ok(action.succeeded())
    }
}

/// The workload binary must exist and must not be a directory.
fn check_exec_path(path: &Path) -> Result<(), DaemonError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(DaemonError::InvalidExecutionPath(path.to_path_buf())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(DaemonError::InvalidExecutionPath(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Bind `record` to the backend chosen by `config` (or the native one).
pub fn create_daemon(
    record: ServiceRecord,
    config: &DaemonConfig,
    host: Host,
) -> Result<Box<dyn Daemon>, DaemonError> {
    let kind = config
        .backend
        .or_else(BackendKind::native)
        .ok_or(DaemonError::UnsupportedPlatform)?;
    let layout = Layout::from_config(kind, config);
    debug!("Using {kind} backend with {layout:?}");

    let daemon: Box<dyn Daemon> = match kind {
        BackendKind::Rcd => Box::new(PlatformRecord::new(record, Rcd::new(layout), host)?),
        BackendKind::Launchd => Box::new(PlatformRecord::new(record, Launchd::new(layout), host)?),
        BackendKind::Systemd => Box::new(PlatformRecord::new(record, Systemd::new(layout), host)?),
    };
    Ok(daemon)
}

/// Daemon for the host's native service manager with its stock layout.
///
/// When `exec_start_path` is `None` the path of the running binary is used
/// at install time.
pub fn new_daemon(
    name: &str,
    description: &str,
    exec_start_path: Option<PathBuf>,
    dependencies: Vec<String>,
) -> Result<Box<dyn Daemon>, DaemonError> {
    let mut record = ServiceRecord::new(name, description).dependencies(dependencies);
    record.exec_start_path = exec_start_path;
    create_daemon(record, &DaemonConfig::default(), Host::default())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::command::{CommandLine, CommandOutput};
    use crate::privilege::AssumePrivileged;

    /// Records every command; status reports `running`.
    struct Recorder {
        running: bool,
        calls: Mutex<Vec<String>>,
    }

    impl CommandRunner for Recorder {
        fn output(&self, cmd: &CommandLine) -> io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(cmd.to_string());
            let status = cmd.args.last().is_some_and(|verb| verb.ends_with("status"));
            Ok(CommandOutput {
                success: !status || self.running,
                code: Some(0),
                stdout: format!("{} is running as pid 99.", cmd.args[0]),
                stderr: String::new(),
            })
        }
    }

    fn rcd_daemon(
        dir: &Path,
        running: bool,
        privileged: bool,
    ) -> (PlatformRecord<Rcd>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            running,
            calls: Mutex::new(Vec::new()),
        });
        let layout = Layout {
            service_dir: dir.join("rc.d"),
            rc_conf: dir.join("rc.conf"),
            ..Layout::native(BackendKind::Rcd)
        };
        let binary = dir.join("food");
        fs::write(&binary, "#!/bin/sh\n").unwrap();
        let record = ServiceRecord::new("food", "Food service").exec_start_path(binary);
        let host = Host::new(recorder.clone(), Arc::new(AssumePrivileged(privileged)));
        let daemon = PlatformRecord::new(record, Rcd::new(layout), host).unwrap();
        (daemon, recorder)
    }

    #[test]
    fn messages_pair_with_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (mut daemon, _) = rcd_daemon(dir.path(), false, true);

        let ok = daemon.install(&[]).unwrap();
        assert_eq!(ok, "Installing Food service: completed successfully");

        let err = daemon.install(&[]).unwrap_err();
        assert_eq!(err.message, "Installing Food service: failed");
        assert!(matches!(err.kind(), DaemonError::AlreadyInstalled));
    }

    #[test]
    fn privilege_is_checked_before_anything_else() {
        let dir = tempfile::tempdir().unwrap();
        let (mut daemon, recorder) = rcd_daemon(dir.path(), true, false);

        for err in [
            daemon.install(&[]).unwrap_err(),
            daemon.remove().unwrap_err(),
            daemon.start().unwrap_err(),
            daemon.stop().unwrap_err(),
            daemon.status().unwrap_err(),
        ] {
            assert!(matches!(err.kind(), DaemonError::Privilege), "{err}");
        }
        assert!(!daemon.descriptor_path().exists());
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn operations_on_missing_descriptor_are_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, _) = rcd_daemon(dir.path(), false, true);

        assert!(!daemon.is_installed().unwrap());
        for err in [
            daemon.remove().unwrap_err(),
            daemon.start().unwrap_err(),
            daemon.stop().unwrap_err(),
            daemon.status().unwrap_err(),
        ] {
            assert!(matches!(err.kind(), DaemonError::NotInstalled), "{err}");
        }
    }

    #[test]
    fn install_rejects_directory_exec_path_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let (mut daemon, _) = rcd_daemon(dir.path(), false, true);
        daemon.record.exec_start_path = Some(dir.path().to_path_buf());

        let err = daemon.install(&[]).unwrap_err();
        assert!(matches!(
            err.kind(),
            DaemonError::InvalidExecutionPath(_)
        ));
        assert!(!daemon.descriptor_path().exists());
    }

    #[test]
    fn install_rejects_missing_exec_path() {
        let dir = tempfile::tempdir().unwrap();
        let (mut daemon, _) = rcd_daemon(dir.path(), false, true);
        daemon.record.exec_start_path = Some(dir.path().join("nope"));

        let err = daemon.install(&[]).unwrap_err();
        assert!(matches!(
            err.kind(),
            DaemonError::InvalidExecutionPath(_)
        ));
    }

    #[test]
    fn install_without_exec_path_uses_running_binary() {
        let dir = tempfile::tempdir().unwrap();
        let (mut daemon, _) = rcd_daemon(dir.path(), false, true);
        daemon.record.exec_start_path = None;

        daemon.install(&[]).unwrap();
        let resolved = daemon.record().exec_start_path.clone().unwrap();
        assert!(resolved.is_absolute());
        let script = fs::read_to_string(daemon.descriptor_path()).unwrap();
        assert!(script.contains(&format!("command=\"{}\"", resolved.display())));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn render_failure_leaves_no_files_behind() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let (mut daemon, _) = rcd_daemon(dir.path(), false, true);
        let binary = dir.path().join(OsStr::from_bytes(b"food\xff"));
        fs::write(&binary, "#!/bin/sh\n").unwrap();
        daemon.record.exec_start_path = Some(binary);

        let err = daemon.install(&[]).unwrap_err();
        assert!(matches!(err.kind(), DaemonError::Render(_)), "{err:?}");
        assert!(!daemon.descriptor_path().exists());
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("rc.d"))
            .map(|entries| entries.filter_map(Result::ok).map(|e| e.file_name()).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    /// Accepts everything except `systemctl daemon-reload`.
    struct ReloadFails;

    impl CommandRunner for ReloadFails {
        fn output(&self, cmd: &CommandLine) -> io::Result<CommandOutput> {
            let reload = cmd.args.iter().any(|a| a == "daemon-reload");
            Ok(CommandOutput {
                success: !reload,
                code: Some(if reload { 1 } else { 0 }),
                stdout: String::new(),
                stderr: if reload { "bus down".into() } else { String::new() },
            })
        }
    }

    #[test]
    fn failed_reload_rolls_back_the_unit() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout {
            service_dir: dir.path().join("system"),
            ..Layout::native(BackendKind::Systemd)
        };
        let binary = dir.path().join("food");
        fs::write(&binary, "#!/bin/sh\n").unwrap();
        let record = ServiceRecord::new("food", "Food service").exec_start_path(binary);
        let host = Host::new(Arc::new(ReloadFails), Arc::new(AssumePrivileged(true)));
        let mut daemon = PlatformRecord::new(record, Systemd::new(layout), host).unwrap();

        for _ in 0..2 {
            let err = daemon.install(&[]).unwrap_err();
            assert!(
                matches!(err.kind(), DaemonError::CommandFailed { .. }),
                "{err:?}"
            );
            assert!(!daemon.descriptor_path().exists());
        }
    }

    #[test]
    fn stop_when_stopped_issues_no_stop_command() {
        let dir = tempfile::tempdir().unwrap();
        let (mut daemon, recorder) = rcd_daemon(dir.path(), false, true);
        daemon.install(&[]).unwrap();

        let err = daemon.stop().unwrap_err();
        assert!(matches!(err.kind(), DaemonError::AlreadyStopped));
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(*calls, ["service food onestatus"]);
    }

    #[test]
    fn run_reports_workload_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let (daemon, _) = rcd_daemon(dir.path(), false, false);

        let mut calls = 0;
        let mut ok = || -> anyhow::Result<()> {
            calls += 1;
            Ok(())
        };
        assert_eq!(
            daemon.run(&mut ok).unwrap(),
            "Running Food service: completed successfully"
        );
        assert_eq!(calls, 1);

        let mut failing = || -> anyhow::Result<()> { anyhow::bail!("boom") };
        let err = daemon.run(&mut failing).unwrap_err();
        assert_eq!(err.message, "Running Food service: failed");
        assert!(matches!(err.kind(), DaemonError::Workload(_)));
    }

    #[test]
    fn invalid_names_are_rejected_by_the_factory() {
        let cfg = DaemonConfig {
            backend: Some(BackendKind::Launchd),
            ..DaemonConfig::default()
        };
        let err = create_daemon(ServiceRecord::new("../etc", ""), &cfg, Host::default())
            .err()
            .unwrap();
        assert!(matches!(err, DaemonError::InvalidName(_)));
    }

    #[test]
    fn factory_honors_configured_backend_and_layout() {
        let cfg = DaemonConfig {
            backend: Some(BackendKind::Launchd),
            service_dir: Some(PathBuf::from("/tmp/agents")),
            ..DaemonConfig::default()
        };
        let daemon = create_daemon(ServiceRecord::new("x", "d"), &cfg, Host::default()).unwrap();
        assert_eq!(daemon.kind(), BackendKind::Launchd);
        assert_eq!(daemon.descriptor_path(), PathBuf::from("/tmp/agents/x.plist"));
    }
}
