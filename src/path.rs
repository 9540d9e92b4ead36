// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::{Path, PathBuf};

/// Name of the indirection pointer file placed next to the installed binary.
pub const POINTER_FILE_NAME: &str = ".unisync-config";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/unisync/config.toml` as the
/// default absolute path. Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("unisync").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default path to the indirection pointer.
///
/// The pointer lives next to the running executable. Falls back to the
/// configuration directory if the executable path cannot be determined.
///
/// # Errors
///
/// - Return [`NoWayHome`] if neither location can be determined.
pub fn default_pointer_path() -> Result<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    match exe_dir {
        Some(dir) => Ok(dir.join(POINTER_FILE_NAME)),
        None => dirs::config_dir()
            .map(|path| path.join("unisync").join(POINTER_FILE_NAME))
            .ok_or(NoWayHome),
    }
}

/// Companion ignore file path for a configuration file.
///
/// The ignore file is always a sibling named `ignore`.
pub fn sibling_ignore_path(config_path: impl AsRef<Path>) -> PathBuf {
    config_path
        .as_ref()
        .parent()
        .map(|dir| dir.join("ignore"))
        .unwrap_or_else(|| PathBuf::from("ignore"))
}

/// Perform shell expansion on a path-like string.
///
/// Unknown variables are left as they are rather than treated as errors.
pub fn expand(raw: impl AsRef<str>) -> PathBuf {
    let raw = raw.as_ref();
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).into_owned()),
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
