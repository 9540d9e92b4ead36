// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration store management.
//!
//! Unisync reads its configuration from one active file. Which file is active
//! is decided by the __indirection pointer__, a small file next to the
//! installed binary whose first non-blank line names the active
//! configuration path. If there is no pointer, then the default XDG location
//! is used instead, i.e., `$XDG_CONFIG_HOME/unisync/config.toml`.
//!
//! The configuration file and the pointer are read-mostly. Only
//! [`ConfigStore::init`] and [`ConfigStore::relocate`] write to them, and both
//! do so through [`write_atomic`] so that readers never observe a half
//! written file.

use crate::{
    config::{ignore::default_ignore_file, ConfigError, Configuration, ResolvedCommand},
    path::{default_config_path, default_pointer_path, expand, sibling_ignore_path, NoWayHome},
    prompt::Confirm,
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, File},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// Where the active configuration path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Given explicitly on the command line.
    Explicit,

    /// Read from the indirection pointer.
    Pointer,

    /// Fixed default location.
    Default,
}

impl Display for ConfigSource {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Explicit => fmt.write_str("command line"),
            Self::Pointer => fmt.write_str("indirection pointer"),
            Self::Default => fmt.write_str("default location"),
        }
    }
}

/// Resolved configuration path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: PathBuf,
    pub source: ConfigSource,
}

impl ConfigLocation {
    /// Check if the configuration file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Outcome of [`ConfigStore::init`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    /// Configuration file was written.
    pub config_written: bool,

    /// Companion ignore file was written.
    pub ignore_written: bool,

    pub config_path: PathBuf,
    pub ignore_path: PathBuf,
}

/// Outcome of [`ConfigStore::relocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocateReport {
    pub previous: PathBuf,
    pub current: PathBuf,

    /// Previous configuration was copied to the new location.
    pub copied: bool,
}

/// Manage configuration file and indirection pointer.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pointer_path: PathBuf,
    default_path: PathBuf,
    explicit: Option<PathBuf>,
}

impl ConfigStore {
    /// Construct new configuration store with explicit locations.
    pub fn new(pointer_path: impl Into<PathBuf>, default_path: impl Into<PathBuf>) -> Self {
        Self {
            pointer_path: pointer_path.into(),
            default_path: default_path.into(),
            explicit: None,
        }
    }

    /// Construct configuration store using standard locations.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NoWayHome`] if standard locations cannot be
    ///   determined.
    pub fn try_default() -> Result<Self> {
        Ok(Self::new(default_pointer_path()?, default_config_path()?))
    }

    /// Use given configuration path, ignoring the pointer entirely.
    pub fn with_explicit_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit = path;
        self
    }

    /// Path to the indirection pointer.
    pub fn pointer_path(&self) -> &Path {
        &self.pointer_path
    }

    /// Determine active configuration path.
    ///
    /// Does not check if the configuration file actually exists. Malformed or
    /// unreadable pointers are treated as absent.
    pub fn resolve_config_path(&self) -> ConfigLocation {
        if let Some(path) = &self.explicit {
            return ConfigLocation {
                path: path.clone(),
                source: ConfigSource::Explicit,
            };
        }

        match read_to_string(&self.pointer_path) {
            Ok(content) => {
                if let Some(line) = content.lines().map(str::trim).find(|line| !line.is_empty()) {
                    debug!("pointer {} names {line}", self.pointer_path.display());
                    return ConfigLocation {
                        path: expand(line),
                        source: ConfigSource::Pointer,
                    };
                }
                warn!("pointer {} is empty", self.pointer_path.display());
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => warn!("cannot read pointer {}: {error}", self.pointer_path.display()),
        }

        ConfigLocation {
            path: self.default_path.clone(),
            source: ConfigSource::Default,
        }
    }

    /// Determine active configuration path, requiring that it exists.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ConfigNotFound`] if no file exists there.
    pub fn require_config_path(&self) -> Result<ConfigLocation> {
        let location = self.resolve_config_path();
        if !location.exists() {
            return Err(StoreError::ConfigNotFound {
                path: location.path,
            });
        }

        Ok(location)
    }

    /// Load configuration from target path.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ConfigNotFound`] if file does not exist.
    /// - Return [`StoreError::Read`] if file cannot be read.
    /// - Return [`StoreError::Config`] if file is not a valid configuration.
    #[instrument(skip(self, path), level = "debug")]
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Configuration> {
        let path = path.as_ref();
        debug!("load configuration {}", path.display());
        let content = read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => StoreError::ConfigNotFound {
                path: path.to_path_buf(),
            },
            _ => StoreError::Read {
                source,
                path: path.to_path_buf(),
            },
        })?;

        content.parse().map_err(|source| StoreError::Config {
            source,
            path: path.to_path_buf(),
        })
    }

    /// Load the active configuration.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::ConfigNotFound`] if no file exists there.
    /// - Return [`StoreError::Config`] if file is not a valid configuration.
    pub fn load_active(&self) -> Result<(ConfigLocation, Configuration)> {
        let location = self.require_config_path()?;
        let config = self.load(&location.path)?;
        Ok((location, config))
    }

    /// Resolve named command in a loaded configuration.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::CommandNotFound`] listing every known command
    ///   if no block has the given name.
    pub fn resolve_command(
        &self,
        config: &Configuration,
        name: impl AsRef<str>,
    ) -> Result<ResolvedCommand> {
        config
            .resolve_command(name.as_ref())
            .ok_or_else(|| StoreError::CommandNotFound {
                name: name.as_ref().to_string(),
                known: config.command_names(),
            })
    }

    /// Initialize configuration file with commented template.
    ///
    /// Writes the default template at `target`, and a companion ignore file
    /// named `ignore` next to it. An existing configuration is only replaced if
    /// `overwrite` is set. An existing ignore file is never replaced. Parent
    /// directories are created as needed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Write`] if either file cannot be written.
    #[instrument(skip(self, target), level = "debug")]
    pub fn init(&self, target: impl AsRef<Path>, overwrite: bool) -> Result<InitReport> {
        let config_path = target.as_ref().to_path_buf();
        let ignore_path = sibling_ignore_path(&config_path);

        let config_written = if config_path.exists() && !overwrite {
            info!("keep existing configuration {}", config_path.display());
            false
        } else {
            info!("write configuration template {}", config_path.display());
            write_atomic(&config_path, render_template(&ignore_path))?;
            true
        };

        let ignore_written = if ignore_path.exists() {
            debug!("keep existing ignore file {}", ignore_path.display());
            false
        } else {
            info!("write ignore file {}", ignore_path.display());
            write_atomic(&ignore_path, default_ignore_file())?;
            true
        };

        Ok(InitReport {
            config_written,
            ignore_written,
            config_path,
            ignore_path,
        })
    }

    /// Point the indirection pointer at a new configuration path.
    ///
    /// If a configuration exists at the previous location, then the caller is
    /// asked whether it should be copied over. Declining leaves both files
    /// untouched. The previous file is never removed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Read`] if the previous configuration cannot be
    ///   read for copying.
    /// - Return [`StoreError::Write`] if the pointer or copy cannot be written.
    #[instrument(skip(self, new_path, confirm), level = "debug")]
    pub fn relocate(
        &self,
        new_path: impl AsRef<Path>,
        confirm: &dyn Confirm,
    ) -> Result<RelocateReport> {
        let current = new_path.as_ref().to_path_buf();
        let previous = self.resolve_config_path().path;
        let mut copied = false;

        if previous != current && previous.is_file() {
            let question = if current.exists() {
                format!(
                    "copy {} over existing {}?",
                    previous.display(),
                    current.display()
                )
            } else {
                format!("copy {} to {}?", previous.display(), current.display())
            };

            if confirm.confirm(&question) {
                let content = read_to_string(&previous).map_err(|source| StoreError::Read {
                    source,
                    path: previous.clone(),
                })?;
                write_atomic(&current, content)?;
                copied = true;
            }
        }

        info!(
            "point {} at {}",
            self.pointer_path.display(),
            current.display()
        );
        write_atomic(&self.pointer_path, format!("{}\n", current.display()))?;

        Ok(RelocateReport {
            previous,
            current,
            copied,
        })
    }
}

/// Render commented configuration template.
///
/// The template's ignore file setting points at `ignore_path`.
pub fn render_template(ignore_path: impl AsRef<Path>) -> String {
    format!(
        r#"# Unisync configuration.
#
# The [defaults] table is inherited by every [[command]] table. A command may
# override any default by setting the same key. Every default is required.

[defaults]
# User to log in as on remote hosts.
remote_user = "{user}"
# Unison binary on this machine, either a name on PATH or a full path.
local_unison_path = "unison"
# Unison binary on remote hosts. Both sides should run the same version.
remote_unison_path = "/usr/bin/unison"
# Directory holding generated unison profiles.
prefs_dir = "~/.unison"
# Ignore rules shared by every command.
ignore_file = "{ignore}"

# Each command binds a local path to a remote path on one or more hosts.
# Run it with `unisync <name>`.
[[command]]
name = "git"
remote_hosts = ["192.168.1.5"]
local_path = "~/git"
remote_path = "~/git"

[[command]]
name = "docs"
remote_hosts = ["192.168.1.5", "192.168.1.6"]
local_path = "~/Documents"
remote_path = "/srv/documents"
remote_user = "{user}"
extra_options = ["-times"]
"#,
        user = default_remote_user(),
        ignore = ignore_path.as_ref().display(),
    )
}

/// Name of the current user, used as default remote user.
pub fn default_remote_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "user".into())
}

/// Write contents to target path atomically.
///
/// Creates parent directories as needed. Contents are written to a temporary
/// file in the same directory, and then renamed into place. The temporary
/// file is removed if anything fails before the rename.
///
/// # Errors
///
/// - Return [`StoreError::Write`] if any step fails.
pub fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()> {
    let path = path.as_ref();
    let to_error = |source: std::io::Error| StoreError::Write {
        source,
        path: path.to_path_buf(),
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    mkdirp::mkdirp(&parent).map_err(to_error)?;

    let mut temp = NamedTempFile::new_in(&parent).map_err(to_error)?;
    temp.write_all(contents.as_ref()).map_err(to_error)?;
    temp.as_file().sync_all().map_err(to_error)?;
    temp.persist(path).map_err(|error| to_error(error.error))?;

    // INVARIANT: Directory entry for the rename must reach the disk too.
    if let Err(error) = File::open(&parent).and_then(|dir| dir.sync_all()) {
        debug!("cannot sync directory {}: {error}", parent.display());
    }

    Ok(())
}

/// Configuration store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No configuration file exists at the active path.
    #[error(
        "no configuration found at {:?}, run `unisync config init` first",
        path.display()
    )]
    ConfigNotFound { path: PathBuf },

    /// Named command is not defined in the configuration.
    #[error("command {name:?} not found, known commands: {}", known_list(known))]
    CommandNotFound { name: String, known: Vec<String> },

    /// Configuration file is malformed or incomplete.
    #[error("bad configuration at {:?}", path.display())]
    Config {
        #[source]
        source: ConfigError,
        path: PathBuf,
    },

    /// File cannot be read.
    #[error("failed to read {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// File cannot be written.
    #[error("failed to write {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),
}

fn known_list(known: &[String]) -> String {
    if known.is_empty() {
        "(none)".into()
    } else {
        known.join(", ")
    }
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;
