// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Unison profile generation.
//!
//! Unison reads its settings from __profiles__, i.e., `<name>.prf` files in
//! its preferences directory. Unisync never asks the user to write one.
//! Instead, a profile is rendered fresh from a named command right before
//! every run, so the configuration file stays the only source of truth.
//!
//! Rendering is deterministic. The same inputs always produce the same bytes,
//! and an unchanged profile is not rewritten at all.

use crate::{
    config::ignore::{IgnoreKind, IgnoreRuleSet},
    store::{write_atomic, StoreError},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Ignore rules added to every profile.
pub const BUILTIN_IGNORES: &[(IgnoreKind, &str)] = &[
    (IgnoreKind::Name, "*.tmp"),
    (IgnoreKind::Name, "*~"),
    (IgnoreKind::Name, ".*.swp"),
    (IgnoreKind::Name, ".*.swo"),
    (IgnoreKind::Name, ".#*"),
    (IgnoreKind::Name, "*.o"),
    (IgnoreKind::Name, ".svn"),
    (IgnoreKind::Name, ".hg"),
    (IgnoreKind::Name, "CVS"),
];

/// Remote side of a synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub user: String,
    pub host: String,
    pub path: String,
}

impl RemoteSpec {
    /// Construct new remote specification.
    pub fn new(user: impl Into<String>, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            path: path.into(),
        }
    }
}

impl Display for RemoteSpec {
    /// Format as unison ssh root.
    ///
    /// An absolute path keeps its own leading slash, so the root ends up with
    /// a double slash after the host. A path starting with `~/` is relative
    /// to the remote home directory.
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let path = self.path.trim();
        let path = match path.strip_prefix("~/") {
            Some(relative) => relative.to_string(),
            None if path == "~" => String::new(),
            None => path.to_string(),
        };

        if self.user.is_empty() {
            write!(fmt, "ssh://{}/{}", self.host, path)
        } else {
            write!(fmt, "ssh://{}@{}/{}", self.user, self.host, path)
        }
    }
}

/// Generated profile ready for unison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile name as passed to unison.
    pub name: String,

    /// Location of the `.prf` file.
    pub path: PathBuf,

    /// Local root.
    pub local_root: PathBuf,

    /// Remote root in unison URL form.
    pub remote_root: String,
}

/// Write unison profiles into a preferences directory.
#[derive(Debug, Clone)]
pub struct ProfileGenerator {
    prefs_dir: PathBuf,
}

impl ProfileGenerator {
    /// Construct new profile generator for target preferences directory.
    pub fn new(prefs_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefs_dir: prefs_dir.into(),
        }
    }

    /// Generate profile.
    ///
    /// Creates the preferences directory if needed. The profile file is only
    /// written if its contents changed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Write`] if the profile cannot be written.
    #[instrument(skip(self, local_path, remote, rules), level = "debug")]
    pub fn generate(
        &self,
        profile_name: &str,
        local_path: impl AsRef<Path>,
        remote: &RemoteSpec,
        rules: &IgnoreRuleSet,
    ) -> Result<Profile, StoreError> {
        let path = self.prefs_dir.join(format!("{profile_name}.prf"));
        let contents = render(profile_name, local_path.as_ref(), remote, rules);

        match read_to_string(&path) {
            Ok(existing) if existing == contents => {
                debug!("profile {} is up to date", path.display());
            }
            _ => {
                debug!("write profile {}", path.display());
                write_atomic(&path, &contents)?;
            }
        }

        Ok(Profile {
            name: profile_name.to_string(),
            path,
            local_root: local_path.as_ref().to_path_buf(),
            remote_root: remote.to_string(),
        })
    }
}

/// Profile name for one command and host pair.
///
/// Characters unison would choke on are replaced with underscores.
pub fn profile_name(command: &str, host: &str) -> String {
    format!("{command}-{host}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Render profile contents.
pub fn render(
    profile_name: &str,
    local_path: &Path,
    remote: &RemoteSpec,
    rules: &IgnoreRuleSet,
) -> String {
    let mut out = String::new();
    out.push_str("# Generated by unisync. Changes are overwritten on the next run.\n");
    out.push_str(&format!("label = unisync {profile_name}\n"));
    out.push_str(&format!("root = {}\n", local_path.display()));
    out.push_str(&format!("root = {remote}\n"));
    out.push_str("batch = true\n");
    out.push_str("fastcheck = true\n");
    out.push_str("confirmbigdel = true\n");

    for (kind, pattern) in BUILTIN_IGNORES {
        out.push_str(&format!("ignore = {kind} {pattern}\n"));
    }

    for rule in rules.iter() {
        out.push_str(&format!("ignore = {rule}\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("/home/x/git", "ssh://x@192.168.1.5//home/x/git"; "absolute")]
    #[test_case("~/git", "ssh://x@192.168.1.5/git"; "home relative")]
    #[test_case("~", "ssh://x@192.168.1.5/"; "home")]
    #[test_case("git", "ssh://x@192.168.1.5/git"; "relative")]
    #[test_case(" /srv/git ", "ssh://x@192.168.1.5//srv/git"; "padded absolute")]
    #[test]
    fn remote_spec_formats_unison_root(path: &str, expect: &str) {
        let result = RemoteSpec::new("x", "192.168.1.5", path).to_string();
        pretty_assertions::assert_eq!(result, expect);
    }

    #[test_case("git", "192.168.1.5", "git-192.168.1.5"; "ipv4")]
    #[test_case("docs", "fe80::1", "docs-fe80__1"; "ipv6")]
    #[test_case("my docs", "box", "my_docs-box"; "spaces")]
    #[test]
    fn profile_names_are_sanitized(command: &str, host: &str, expect: &str) {
        pretty_assertions::assert_eq!(profile_name(command, host), expect);
    }

    #[test]
    fn render_profile_layout() -> anyhow::Result<()> {
        let rules: IgnoreRuleSet = "Name *.log\nRegex .*\\.bak\n".parse()?;
        let result = render(
            "git-box",
            Path::new("/home/x/git"),
            &RemoteSpec::new("x", "box", "/home/x/git"),
            &rules,
        );

        let expect = indoc! {r#"
            # Generated by unisync. Changes are overwritten on the next run.
            label = unisync git-box
            root = /home/x/git
            root = ssh://x@box//home/x/git
            batch = true
            fastcheck = true
            confirmbigdel = true
            ignore = Name *.tmp
            ignore = Name *~
            ignore = Name .*.swp
            ignore = Name .*.swo
            ignore = Name .#*
            ignore = Name *.o
            ignore = Name .svn
            ignore = Name .hg
            ignore = Name CVS
            ignore = Name *.log
            ignore = Regex .*\.bak
        "#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn generate_is_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let prefs = dir.path().join("prefs");
        let generator = ProfileGenerator::new(&prefs);
        let remote = RemoteSpec::new("x", "box", "/srv/git");
        let rules = IgnoreRuleSet::builtin();

        let first = generator.generate("git-box", "/home/x/git", &remote, &rules)?;
        let first_bytes = std::fs::read(&first.path)?;
        let second = generator.generate("git-box", "/home/x/git", &remote, &rules)?;
        let second_bytes = std::fs::read(&second.path)?;

        assert_eq!(first, second);
        assert_eq!(first_bytes, second_bytes);
        assert_eq!(first.path, prefs.join("git-box.prf"));
        assert_eq!(first.remote_root, "ssh://x@box//srv/git");

        Ok(())
    }
}
