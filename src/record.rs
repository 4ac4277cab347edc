//! The service record a daemon is installed from.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::DaemonError;

/// Name, description, binary and dependencies of one daemon.
///
/// The name is the unique key: it alone decides where the descriptor lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Absolute path of the workload binary. Resolved at install time when
    /// left unset.
    #[serde(default)]
    pub exec_start_path: Option<PathBuf>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            exec_start_path: None,
            dependencies: Vec::new(),
        }
    }

    /// Set the workload binary
    pub fn exec_start_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exec_start_path = Some(path.into());
        self
    }

    /// Add dependency
    pub fn depends_on(mut self, service: impl Into<String>) -> Self {
        self.dependencies.push(service.into());
        self
    }

    /// Add multiple dependencies
    pub fn dependencies<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(services.into_iter().map(Into::into));
        self
    }

    /// Reject records that cannot be written into a descriptor as-is.
    ///
    /// The name must map to exactly one file in the descriptor directory.
    /// The description must fit on one line and dependencies must be single
    /// words, since both are copied into line-oriented descriptors.
    pub fn validate(&self) -> Result<(), DaemonError> {
        let name = &self.name;
        let bad = name.is_empty()
            || name == "."
            || name == ".."
            || name
                .chars()
                .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_whitespace());
        if bad {
            return Err(DaemonError::InvalidName(name.clone()));
        }
        if self.description.chars().any(char::is_control) {
            return Err(DaemonError::InvalidDescription(self.description.clone()));
        }
        for dep in &self.dependencies {
            if dep.is_empty() || dep.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(DaemonError::InvalidDependency(dep.clone()));
            }
        }
        Ok(())
    }

    /// Description, or the name when no description was given.
    pub fn display_name(&self) -> &str {
        if self.description.is_empty() {
            &self.name
        } else {
            &self.description
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_dependencies_in_order() {
        let record = ServiceRecord::new("web", "Web server")
            .exec_start_path("/usr/local/bin/web")
            .depends_on("db")
            .dependencies(["cache", "queue"]);
        assert_eq!(record.dependencies, ["db", "cache", "queue"]);
        assert_eq!(
            record.exec_start_path,
            Some(PathBuf::from("/usr/local/bin/web"))
        );
    }

    #[test]
    fn names_that_escape_the_descriptor_directory_are_rejected() {
        for name in ["", ".", "..", "a/b", "my daemon", "tab\tname"] {
            assert!(
                ServiceRecord::new(name, "").validate().is_err(),
                "{name:?} should be rejected"
            );
        }
        assert!(ServiceRecord::new("org.example.web", "").validate().is_ok());
    }

    #[test]
    fn descriptions_with_line_breaks_are_rejected() {
        for description in ["d\ntouch /tmp/x", "d\rx", "tab\tbed"] {
            let err = ServiceRecord::new("web", description).validate().unwrap_err();
            assert!(
                matches!(err, DaemonError::InvalidDescription(_)),
                "{description:?}"
            );
        }
        assert!(ServiceRecord::new("web", "Web server (v2)").validate().is_ok());
    }

    #[test]
    fn dependencies_must_be_single_words() {
        for dep in ["", "a b", "db\nExecStartPre=/bin/evil"] {
            let err = ServiceRecord::new("web", "")
                .depends_on(dep)
                .validate()
                .unwrap_err();
            assert!(matches!(err, DaemonError::InvalidDependency(_)), "{dep:?}");
        }
    }

    #[test]
    fn display_name_falls_back_to_name() {
        assert_eq!(ServiceRecord::new("web", "").display_name(), "web");
        assert_eq!(ServiceRecord::new("web", "Web").display_name(), "Web");
    }
}
