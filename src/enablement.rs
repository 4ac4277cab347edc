//! Boot-time enablement lookup for rc.d services.
//!
//! A service is enabled when `/etc/rc.conf` carries an active
//! `<name>_enable="YES"` line. Disabled services can still be driven with the
//! `one`-prefixed verbs of `service(8)`.

use std::fs;
use std::path::Path;

use log::{info, warn};
use regex::Regex;

/// Whether `name` is enabled in the rc.conf at `rc_conf`.
///
/// An unreadable file counts as "not enabled".
pub fn is_enabled(rc_conf: &Path, name: &str) -> bool {
    match fs::read_to_string(rc_conf) {
        Ok(text) => is_enabled_in(&text, name),
        Err(e) => {
            warn!("Error opening {}: {e}", rc_conf.display());
            false
        }
    }
}

/// Whether `text` enables `name`.
///
/// Every line containing `<name>_enable="YES"` is inspected left to right: a
/// `#` before any other non-space character comments it out, any other
/// character first makes it active.
pub fn is_enabled_in(text: &str, name: &str) -> bool {
    let pattern = format!(r#"(?m)^(.*?)\b{}_enable="YES""#, regex::escape(name));
    let Ok(re) = Regex::new(&pattern) else {
        return false;
    };
    re.captures_iter(text).any(|caps| {
        let prefix = caps.get(1).map_or("", |m| m.as_str());
        prefix.chars().find(|c| *c != ' ') != Some('#')
    })
}

/// Pick the persistent verb for enabled services, the one-shot verb otherwise.
pub fn select_verb(enabled: bool, verb: &str) -> String {
    if enabled {
        verb.to_string()
    } else {
        format!("one{verb}")
    }
}

/// [`select_verb`] against the rc.conf on disk, logging the fallback.
pub fn verb_for(rc_conf: &Path, name: &str, verb: &str) -> String {
    let enabled = is_enabled(rc_conf, name);
    if !enabled {
        info!("Service {name} is not enabled, using one{verb} instead");
    }
    select_verb(enabled, verb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_assignment_is_enabled() {
        assert!(is_enabled_in(r#"foo_enable="YES""#, "foo"));
    }

    #[test]
    fn commented_assignment_is_disabled() {
        assert!(!is_enabled_in(r#"#foo_enable="YES""#, "foo"));
        assert!(!is_enabled_in(r#"   # foo_enable="YES""#, "foo"));
    }

    #[test]
    fn leading_spaces_are_still_enabled() {
        assert!(is_enabled_in(r#"  foo_enable="YES""#, "foo"));
    }

    #[test]
    fn unrelated_text_is_disabled() {
        assert!(!is_enabled_in("hostname=\"box\"\nsshd_enable=\"YES\"\n", "foo"));
        assert!(!is_enabled_in("", "foo"));
    }

    #[test]
    fn other_service_with_same_suffix_does_not_count() {
        assert!(!is_enabled_in(r#"barfoo_enable="YES""#, "foo"));
        assert!(!is_enabled_in(r#"bar_foo_enable="YES""#, "foo"));
    }

    #[test]
    fn active_line_after_commented_one_is_enabled() {
        let rc_conf = "#foo_enable=\"YES\"\nsshd_enable=\"YES\"\nfoo_enable=\"YES\"\n";
        assert!(is_enabled_in(rc_conf, "foo"));
    }

    #[test]
    fn names_with_regex_metacharacters_are_literal() {
        assert!(!is_enabled_in(r#"fooXbar_enable="YES""#, "foo.bar"));
        assert!(is_enabled_in(r#"foo.bar_enable="YES""#, "foo.bar"));
    }

    #[test]
    fn verb_selection() {
        assert_eq!(select_verb(true, "start"), "start");
        assert_eq!(select_verb(false, "stop"), "onestop");
    }

    #[test]
    fn missing_rc_conf_is_not_enabled() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_enabled(&dir.path().join("rc.conf"), "foo"));
        assert_eq!(verb_for(&dir.path().join("rc.conf"), "foo", "status"), "onestatus");
    }
}
