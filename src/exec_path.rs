//! Resolution of the absolute path of the binary to register with the
//! service manager.

use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::DaemonError;

/// Resolve the binary this process was invoked as.
///
/// Falls back to [`std::env::current_exe`] when `argv[0]` is unavailable.
pub fn current_executable() -> Result<PathBuf, DaemonError> {
    match std::env::args_os().next() {
        Some(arg0) if !arg0.is_empty() => {
            let cwd = std::env::current_dir()?;
            resolve(Path::new(&arg0), &cwd)
        }
        _ => Ok(std::env::current_exe()?),
    }
}

/// Turn an invocation path into an absolute one.
///
/// A path with a separator (`./bin/x`, `../x`, `/usr/bin/x`) is made absolute
/// against `cwd` and cleaned lexically; a bare name is looked up on `PATH`.
pub fn resolve(invoked: &Path, cwd: &Path) -> Result<PathBuf, DaemonError> {
    let resolved = if invoked.components().count() > 1 || invoked.is_absolute() {
        clean(&cwd.join(invoked))
    } else {
        which::which(invoked).map_err(|e| {
            DaemonError::PathResolution(format!("{} not found on PATH: {e}", invoked.display()))
        })?
    };
    debug!(
        "resolved executable {} -> {}",
        invoked.display(),
        resolved.display()
    );
    Ok(resolved)
}

/// Lexically normalize a path: drop `.` and fold `..` into its parent.
fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_path_is_joined_and_cleaned() {
        let got = resolve(Path::new("./bin/../sbin/mydaemon"), Path::new("/opt/app")).unwrap();
        assert_eq!(got, PathBuf::from("/opt/app/sbin/mydaemon"));
    }

    #[test]
    fn parent_relative_path_is_resolved() {
        let got = resolve(Path::new("../mydaemon"), Path::new("/opt/app/bin")).unwrap();
        assert_eq!(got, PathBuf::from("/opt/app/mydaemon"));
    }

    #[test]
    fn absolute_path_is_only_cleaned() {
        let got = resolve(Path::new("/usr/./local/bin/mydaemon"), Path::new("/tmp")).unwrap();
        assert_eq!(got, PathBuf::from("/usr/local/bin/mydaemon"));
    }

    #[test]
    fn bare_name_missing_from_path_is_an_error() {
        let err = resolve(Path::new("osdaemon-no-such-binary-xyz"), Path::new("/")).unwrap_err();
        assert!(matches!(err, DaemonError::PathResolution(_)));
    }

    #[test]
    fn current_executable_is_absolute() {
        assert!(current_executable().unwrap().is_absolute());
    }
}
