// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the configuration file that unisync uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out, see [`crate::store`].
//!
//! # General Layout
//!
//! A configuration is composed of two basic parts: defaults and commands. The
//! `[defaults]` table supplies every setting a command needs. Each
//! `[[command]]` table is a __named command__ that binds a local path to a
//! remote path on one or more hosts. A command inherits any setting it omits
//! from the defaults.
//!
//! ```toml
//! [defaults]
//! remote_user = "deploy"
//! local_unison_path = "unison"
//! remote_unison_path = "/usr/bin/unison"
//! prefs_dir = "~/.unison"
//! ignore_file = "~/.config/unisync/ignore"
//!
//! [[command]]
//! name = "git"
//! remote_hosts = ["192.168.1.5"]
//! local_path = "~/git"
//! remote_path = "/home/deploy/git"
//! ```

pub mod ignore;

use crate::path::expand;

use serde::Deserialize;
use std::{collections::HashSet, path::PathBuf, str::FromStr};

/// Full configuration file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct Configuration {
    /// Global defaults inherited by every command.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named commands in file order.
    #[serde(default, rename = "command")]
    pub commands: Vec<CommandBlock>,
}

impl Configuration {
    /// Names of every command block in file order.
    pub fn command_names(&self) -> Vec<String> {
        self.commands.iter().map(|block| block.name.clone()).collect()
    }

    /// Check that required defaults are set and command names are unique.
    ///
    /// Every problem is collected, rather than stopping at the first one.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Invalid`] listing every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut problems = self
            .defaults
            .missing_fields()
            .into_iter()
            .map(|field| format!("defaults.{field} is empty"))
            .collect::<Vec<_>>();

        let mut seen = HashSet::new();
        for block in &self.commands {
            if block.name.trim().is_empty() {
                problems.push("command block without a name".into());
            } else if !seen.insert(block.name.as_str()) {
                problems.push(format!("duplicate command name {:?}", block.name));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }

    /// Resolve named command by applying inheritance from the defaults.
    ///
    /// Returns `None` if no block has the exact name given. The resolved
    /// command may still be unrunnable, see [`ResolvedCommand::validate`].
    pub fn resolve_command(&self, name: impl AsRef<str>) -> Option<ResolvedCommand> {
        let block = self
            .commands
            .iter()
            .find(|block| block.name == name.as_ref())?;
        let defaults = &self.defaults;

        let pick = |own: &Option<String>, default: &str| {
            own.clone()
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Some(ResolvedCommand {
            name: block.name.clone(),
            remote_user: pick(&block.remote_user, &defaults.remote_user),
            remote_hosts: block
                .remote_hosts
                .iter()
                .filter(|host| !host.trim().is_empty())
                .cloned()
                .collect(),
            local_path: expand(&block.local_path),
            remote_path: block.remote_path.clone(),
            local_unison_path: expand(pick(
                &block.local_unison_path,
                &defaults.local_unison_path,
            )),
            remote_unison_path: pick(&block.remote_unison_path, &defaults.remote_unison_path),
            prefs_dir: expand(pick(&block.prefs_dir, &defaults.prefs_dir)),
            ignore_file: expand(pick(&block.ignore_file, &defaults.ignore_file)),
            extra_options: block.extra_options.clone().unwrap_or_default(),
        })
    }
}

impl FromStr for Configuration {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let config: Configuration = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;
        config.validate()?;

        Ok(config)
    }
}

/// Global defaults.
///
/// Every field is required. Missing keys deserialize as empty strings so that
/// validation can report all of them at once.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// User to log in as on remote hosts.
    pub remote_user: String,

    /// Unison binary on this machine.
    pub local_unison_path: String,

    /// Unison binary on remote hosts.
    pub remote_unison_path: String,

    /// Directory holding generated unison profiles.
    pub prefs_dir: String,

    /// Ignore pattern file.
    pub ignore_file: String,
}

impl Defaults {
    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("remote_user", &self.remote_user),
            ("local_unison_path", &self.local_unison_path),
            ("remote_unison_path", &self.remote_unison_path),
            ("prefs_dir", &self.prefs_dir),
            ("ignore_file", &self.ignore_file),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

/// Named command block as written in the configuration file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
pub struct CommandBlock {
    /// Unique name used to invoke the command.
    pub name: String,

    /// Hosts to synchronize with, in order.
    #[serde(default)]
    pub remote_hosts: Vec<String>,

    /// Directory on this machine.
    #[serde(default)]
    pub local_path: String,

    /// Directory on the remote hosts.
    #[serde(default)]
    pub remote_path: String,

    // Overrides for the matching default.
    pub remote_user: Option<String>,
    pub local_unison_path: Option<String>,
    pub remote_unison_path: Option<String>,
    pub prefs_dir: Option<String>,
    pub ignore_file: Option<String>,

    /// Flags passed to unison verbatim.
    pub extra_options: Option<Vec<String>>,
}

/// Named command with every field inherited and expanded.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ResolvedCommand {
    pub name: String,
    pub remote_user: String,
    pub remote_hosts: Vec<String>,
    pub local_path: PathBuf,
    pub remote_path: String,
    pub local_unison_path: PathBuf,
    pub remote_unison_path: String,
    pub prefs_dir: PathBuf,
    pub ignore_file: PathBuf,
    pub extra_options: Vec<String>,
}

impl ResolvedCommand {
    /// Apply command line overrides.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(user) = &overrides.user {
            self.remote_user = user.clone();
        }

        if let Some(ip) = &overrides.ip {
            self.remote_hosts = vec![ip.clone()];
        }

        if let Some(path) = &overrides.unison_path {
            self.local_unison_path = path.clone();
        }

        if let Some(path) = &overrides.pref_dir {
            self.prefs_dir = path.clone();
        }

        if let Some(path) = &overrides.ignore_file {
            self.ignore_file = path.clone();
        }
    }

    /// Check that the command is runnable.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Invalid`] listing every empty field.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.local_path.as_os_str().is_empty() {
            problems.push(format!("command {:?} has no local_path", self.name));
        }

        if self.remote_path.trim().is_empty() {
            problems.push(format!("command {:?} has no remote_path", self.name));
        }

        if self.remote_hosts.is_empty() {
            problems.push(format!("command {:?} has no remote_hosts", self.name));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { problems })
        }
    }
}

/// Settings given on the command line that win over the configuration file.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Overrides {
    pub user: Option<String>,
    pub ip: Option<String>,
    pub unison_path: Option<PathBuf>,
    pub pref_dir: Option<PathBuf>,
    pub ignore_file: Option<PathBuf>,
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Configuration is missing required settings.
    #[error("invalid configuration:\n  - {}", problems.join("\n  - "))]
    Invalid { problems: Vec<String> },
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    const LAYERED: &str = indoc! {r#"
        [defaults]
        remote_user = "deploy"
        local_unison_path = "/usr/local/bin/unison"
        remote_unison_path = "/usr/bin/unison"
        prefs_dir = "/home/blah/.unison"
        ignore_file = "/home/blah/.config/unisync/ignore"

        [[command]]
        name = "plain"
        remote_hosts = ["10.0.0.1"]
        local_path = "/home/blah/plain"
        remote_path = "/srv/plain"

        [[command]]
        name = "custom"
        remote_hosts = ["10.0.0.2", "10.0.0.3"]
        local_path = "/home/blah/custom"
        remote_path = "/srv/custom"
        remote_user = "alice"
        local_unison_path = "/opt/unison/bin/unison"
        remote_unison_path = "/opt/unison/bin/unison-remote"
        prefs_dir = "/tmp/prefs"
        ignore_file = "/tmp/ignore"
        extra_options = ["-times"]
    "#};

    #[test]
    fn omitted_fields_inherit_defaults() -> anyhow::Result<()> {
        let config: Configuration = LAYERED.parse()?;
        let result = config.resolve_command("plain").unwrap();
        let expect = ResolvedCommand {
            name: "plain".into(),
            remote_user: "deploy".into(),
            remote_hosts: vec!["10.0.0.1".into()],
            local_path: "/home/blah/plain".into(),
            remote_path: "/srv/plain".into(),
            local_unison_path: "/usr/local/bin/unison".into(),
            remote_unison_path: "/usr/bin/unison".into(),
            prefs_dir: "/home/blah/.unison".into(),
            ignore_file: "/home/blah/.config/unisync/ignore".into(),
            extra_options: vec![],
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn set_fields_override_defaults() -> anyhow::Result<()> {
        let config: Configuration = LAYERED.parse()?;
        let result = config.resolve_command("custom").unwrap();
        let expect = ResolvedCommand {
            name: "custom".into(),
            remote_user: "alice".into(),
            remote_hosts: vec!["10.0.0.2".into(), "10.0.0.3".into()],
            local_path: "/home/blah/custom".into(),
            remote_path: "/srv/custom".into(),
            local_unison_path: "/opt/unison/bin/unison".into(),
            remote_unison_path: "/opt/unison/bin/unison-remote".into(),
            prefs_dir: "/tmp/prefs".into(),
            ignore_file: "/tmp/ignore".into(),
            extra_options: vec!["-times".into()],
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn unknown_command_resolves_to_none() -> anyhow::Result<()> {
        let config: Configuration = LAYERED.parse()?;
        assert!(config.resolve_command("nonexistent").is_none());
        assert_eq!(config.command_names(), vec!["plain", "custom"]);

        Ok(())
    }

    #[test]
    fn validation_reports_every_missing_default() {
        let result = indoc! {r#"
            [defaults]
            remote_user = "deploy"
            prefs_dir = ""

            [[command]]
            name = "a"

            [[command]]
            name = "a"
        "#}
        .parse::<Configuration>();

        match result {
            Err(ConfigError::Invalid { problems }) => assert_eq!(
                problems,
                vec![
                    "defaults.local_unison_path is empty".to_string(),
                    "defaults.remote_unison_path is empty".to_string(),
                    "defaults.prefs_dir is empty".to_string(),
                    "defaults.ignore_file is empty".to_string(),
                    "duplicate command name \"a\"".to_string(),
                ]
            ),
            other => panic!("expected invalid configuration, got {other:?}"),
        }
    }

    #[test_case("", "/srv/x", vec!["h".into()], "has no local_path"; "local path")]
    #[test_case("/x", " ", vec!["h".into()], "has no remote_path"; "remote path")]
    #[test_case("/x", "/srv/x", vec![], "has no remote_hosts"; "remote hosts")]
    #[test]
    fn resolved_command_must_be_runnable(
        local: &str,
        remote: &str,
        hosts: Vec<String>,
        problem: &str,
    ) {
        let command = ResolvedCommand {
            name: "x".into(),
            local_path: local.into(),
            remote_path: remote.into(),
            remote_hosts: hosts,
            ..Default::default()
        };

        match command.validate() {
            Err(ConfigError::Invalid { problems }) => {
                pretty_assertions::assert_eq!(problems.len(), 1);
                assert!(problems[0].contains(problem), "{problems:?}");
            }
            other => panic!("expected invalid command, got {other:?}"),
        }
    }

    #[test]
    fn overrides_win_over_resolved_fields() -> anyhow::Result<()> {
        let config: Configuration = LAYERED.parse()?;
        let mut result = config.resolve_command("custom").unwrap();
        result.apply(&Overrides {
            user: Some("bob".into()),
            ip: Some("192.168.1.5".into()),
            unison_path: Some("/bin/unison".into()),
            pref_dir: Some("/prefs".into()),
            ignore_file: None,
        });

        assert_eq!(result.remote_user, "bob");
        assert_eq!(result.remote_hosts, vec!["192.168.1.5".to_string()]);
        assert_eq!(result.local_unison_path, PathBuf::from("/bin/unison"));
        assert_eq!(result.prefs_dir, PathBuf::from("/prefs"));
        assert_eq!(result.ignore_file, PathBuf::from("/tmp/ignore"));

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn local_paths_are_shell_expanded() -> anyhow::Result<()> {
        let config: Configuration = indoc! {r#"
            [defaults]
            remote_user = "deploy"
            local_unison_path = "unison"
            remote_unison_path = "unison"
            prefs_dir = "~/.unison"
            ignore_file = "~/.config/unisync/ignore"

            [[command]]
            name = "git"
            remote_hosts = ["h"]
            local_path = "~/git"
            remote_path = "~/git"
        "#}
        .parse()?;
        let result = config.resolve_command("git").unwrap();

        assert_eq!(result.local_path, PathBuf::from("/home/blah/git"));
        assert_eq!(result.prefs_dir, PathBuf::from("/home/blah/.unison"));
        assert_eq!(result.remote_path, "~/git");

        Ok(())
    }
}
