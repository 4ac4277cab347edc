//! Privilege checking for operations that mutate system service state.

use crate::error::DaemonError;

/// Answers "may this process change system-level service state?".
pub trait PrivilegeGuard: Send + Sync {
    fn is_privileged(&self) -> bool;

    /// Fail fast with [`DaemonError::Privilege`] when not privileged.
    fn check(&self) -> Result<(), DaemonError> {
        if self.is_privileged() {
            Ok(())
        } else {
            Err(DaemonError::Privilege)
        }
    }
}

/// Privileged when the effective user is root.
#[derive(Debug, Default, Clone, Copy)]
pub struct RootGuard;

impl PrivilegeGuard for RootGuard {
    #[inline]
    fn is_privileged(&self) -> bool {
        nix::unistd::geteuid().is_root()
    }
}

/// Fixed answer, for callers that already know (or tests).
#[derive(Debug, Clone, Copy)]
pub struct AssumePrivileged(pub bool);

impl PrivilegeGuard for AssumePrivileged {
    fn is_privileged(&self) -> bool {
        self.0
    }
}
