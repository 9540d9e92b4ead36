// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Unison execution.
//!
//! The runner drives one unison process per generated profile. Unison runs in
//! batch mode with its output captured rather than streamed to the terminal.
//! While it runs, a spinner shows that something is happening. Once it exits
//! successfully, the captured output is replayed through a progress bar, see
//! [`progress`].
//!
//! # Failure
//!
//! A failed run always carries the exact command line and the full captured
//! output, so that the user can run it by hand to diagnose the problem.
//!
//! # Cancellation
//!
//! An interrupt while unison runs kills the child and reports
//! [`RunStatus::Cancelled`]. Whatever unison already propagated stays as it is;
//! unison's own archive makes the next run pick up from there.

pub mod progress;

use crate::{path::home_dir, profile::Profile};

use fs2::FileExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{File, OpenOptions},
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Options for a single run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Ask unison for full debug output.
    pub debug: bool,

    /// Force newer replica to win everywhere.
    pub force: bool,

    /// Report the command without running it.
    pub dry_run: bool,

    /// Arguments appended after everything else.
    pub extra_args: Vec<String>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    DryRun { report: String },
    Cancelled,
}

/// Result of a run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub files_processed: u64,
    pub duration: Duration,
    pub status: RunStatus,
}

/// Fully built unison command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}", shell_quote(&self.program.to_string_lossy()))?;
        for arg in &self.args {
            write!(fmt, " {}", shell_quote(arg))?;
        }

        Ok(())
    }
}

/// Run unison against generated profiles.
#[derive(Debug, Clone)]
pub struct SyncRunner {
    unison: PathBuf,
    remote_unison: String,
    prefs_dir: PathBuf,
}

impl SyncRunner {
    /// Construct new runner.
    ///
    /// - `unison` is the local binary, either a name on PATH or a path.
    /// - `remote_unison` is the binary unison starts on the remote host.
    /// - `prefs_dir` is where profiles and run locks live.
    pub fn new(
        unison: impl Into<PathBuf>,
        remote_unison: impl Into<String>,
        prefs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            unison: unison.into(),
            remote_unison: remote_unison.into(),
            prefs_dir: prefs_dir.into(),
        }
    }

    /// Locate local unison binary.
    ///
    /// # Errors
    ///
    /// - Return [`RunError::DependencyMissing`] if it cannot be found.
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        which::which(&self.unison).map_err(|_| RunError::DependencyMissing {
            binary: self.unison.clone(),
        })
    }

    /// Build unison invocation for a profile.
    ///
    /// Deletions propagate, which is unison's default, so there is no flag for
    /// it. Extra arguments come last so they can override anything before.
    pub fn build_invocation(
        &self,
        program: PathBuf,
        profile: &Profile,
        options: &RunOptions,
    ) -> Invocation {
        let mut args = vec![
            profile.name.clone(),
            "-batch".into(),
            "-prefer".into(),
            "newer".into(),
            "-times".into(),
            "-perms".into(),
            "0".into(),
            "-auto".into(),
            "-fastcheck".into(),
            "true".into(),
            "-servercmd".into(),
            self.remote_unison.clone(),
        ];

        if options.debug {
            args.extend(["-debug".into(), "all".into()]);
        }

        if options.force {
            args.extend(["-force".into(), "newer".into()]);
        }

        args.extend(options.extra_args.iter().cloned());

        Invocation { program, args }
    }

    /// Run unison for one profile.
    ///
    /// # Errors
    ///
    /// - Return [`RunError::DependencyMissing`] if unison cannot be found.
    /// - Return [`RunError::AlreadyRunning`] if another run holds the lock.
    /// - Return [`RunError::SyncFailed`] if unison exits unsuccessfully.
    /// - Return [`RunError::Spawn`] if unison cannot be started.
    #[instrument(skip(self, profile, options), fields(profile = %profile.name), level = "debug")]
    pub async fn run(&self, profile: &Profile, options: &RunOptions) -> Result<RunResult> {
        let started = Instant::now();
        let program = self.resolve_binary()?;
        let invocation = self.build_invocation(program, profile, options);
        debug!("built invocation: {invocation}");

        if options.dry_run {
            let report = format!(
                "{invocation}\n  profile: {}\n  root: {}\n  root: {}",
                profile.path.display(),
                profile.local_root.display(),
                profile.remote_root,
            );
            return Ok(RunResult {
                files_processed: 0,
                duration: started.elapsed(),
                status: RunStatus::DryRun { report },
            });
        }

        let _lock = self.lock(&profile.name)?;
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::with_template(
            "{spinner:.green} {elapsed_precise:.green}  {msg}",
        )?);
        spinner.set_message(format!(
            "synchronizing {} with {}",
            profile.local_root.display(),
            profile.remote_root
        ));
        spinner.enable_steady_tick(Duration::from_millis(100));

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.prefs_dir != default_prefs_dir() {
            command.env("UNISON", &self.prefs_dir);
        }

        let child = command.spawn().map_err(|source| RunError::Spawn {
            source,
            command: invocation.to_string(),
        })?;

        // INVARIANT: Dropping the wait future on interrupt drops the child, which kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|source| RunError::Spawn {
                source,
                command: invocation.to_string(),
            })?,
            _ = tokio::signal::ctrl_c() => {
                spinner.finish_and_clear();
                info!("run of {} cancelled", profile.name);
                return Ok(RunResult {
                    files_processed: 0,
                    duration: started.elapsed(),
                    status: RunStatus::Cancelled,
                });
            }
        };
        spinner.finish_and_clear();

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(RunError::SyncFailed {
                exit_code: output.status.code(),
                output: captured,
                command: invocation.to_string(),
            });
        }

        let bar = ProgressBar::new(1);
        bar.set_style(
            ProgressStyle::with_template(
                "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}] {pos}/{len}",
            )?
            .progress_chars("-Cco."),
        );
        let state = progress::replay(&captured, &bar);
        bar.finish_and_clear();

        Ok(RunResult {
            files_processed: state.processed(),
            duration: started.elapsed(),
            status: RunStatus::Completed,
        })
    }

    /// Take exclusive run lock for profile.
    fn lock(&self, profile_name: &str) -> Result<File> {
        let path = self.prefs_dir.join(format!("{profile_name}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| RunError::Lock {
                source,
                path: path.clone(),
            })?;

        file.try_lock_exclusive()
            .map_err(|_| RunError::AlreadyRunning {
                profile: profile_name.to_string(),
                lock: path,
            })?;

        Ok(file)
    }
}

fn default_prefs_dir() -> PathBuf {
    home_dir()
        .map(|home| home.join(".unison"))
        .unwrap_or_default()
}

/// Quote argument for display in a POSIX shell.
fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Sync runner error types.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Unison binary cannot be found.
    #[error("required binary {:?} not found, run `unisync bootstrap localhost`", binary.display())]
    DependencyMissing { binary: PathBuf },

    /// Another invocation is running the same profile.
    #[error("profile {profile:?} is already being synchronized (lock {:?})", lock.display())]
    AlreadyRunning { profile: String, lock: PathBuf },

    /// Run lock cannot be created.
    #[error("failed to open run lock {:?}", path.display())]
    Lock {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Unison cannot be started or waited on.
    #[error("failed to run {command}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Unison exited unsuccessfully.
    #[error(
        "unison failed with {}:\n  command: {command}\n{output}",
        exit_code.map(|code| format!("exit code {code}")).unwrap_or_else(|| "a signal".into())
    )]
    SyncFailed {
        exit_code: Option<i32>,
        output: String,
        command: String,
    },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
pub type Result<T, E = RunError> = std::result::Result<T, E>;
