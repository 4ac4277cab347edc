//! Atomic descriptor file operations.
//!
//! Descriptors are written to a temp file in the target directory, synced,
//! given their final mode, then renamed into place without clobbering. A
//! reader never observes a partially written descriptor.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::DaemonError;

/// Write `content` to `path` atomically with permission bits `mode`.
///
/// Fails with [`DaemonError::AlreadyInstalled`] if `path` appeared in the
/// meantime.
pub fn write_file_atomic(path: &Path, content: &str, mode: u32) -> Result<(), DaemonError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".osdaemon-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    temp.persist_noclobber(path).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            DaemonError::AlreadyInstalled
        } else {
            DaemonError::Io(e.error)
        }
    })?;
    Ok(())
}
