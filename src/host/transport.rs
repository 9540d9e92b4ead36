// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell transports.
//!
//! Host inspection and bootstrap never care whether a script runs here or on
//! a remote host. A [`Transport`] hides that difference. [`LocalShell`] runs
//! scripts through `sh`, and [`SshShell`] runs them through `ssh`.

use std::{
    io::Write,
    net::{TcpStream, ToSocketAddrs},
    process::{Command, Stdio},
    time::Duration,
};
use tracing::{debug, instrument};

/// Default connection timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Port ssh listens on.
pub const SSH_PORT: u16 = 22;

/// How a script should be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Read-only probe. Never prompts.
    Probe,

    /// System mutation. May prompt, e.g., for a sudo password.
    Interactive,
}

/// Captured result of a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stdout followed by stderr, with trailing newlines chomped.
    pub fn combined(&self) -> String {
        let mut message = String::new();
        if !self.stdout.trim().is_empty() {
            message.push_str(self.stdout.trim_end());
        }

        if !self.stderr.trim().is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(self.stderr.trim_end());
        }

        message
    }
}

/// Why a remote host cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectFailure {
    /// Network level failure.
    Unreachable(String),

    /// Host answered but refused non-interactive login.
    Authentication(String),
}

/// Run shell scripts on a host.
pub trait Transport {
    /// Human readable name of the host.
    fn label(&self) -> String;

    /// Check if scripts run on this machine.
    fn is_local(&self) -> bool;

    /// Check network reachability.
    fn check_reachable(&self) -> Result<(), ConnectFailure>;

    /// Check non-interactive shell access.
    fn check_shell_access(&self) -> Result<(), ConnectFailure>;

    /// Execute POSIX shell script.
    fn exec(&self, script: &str, mode: ExecMode) -> std::io::Result<ShellOutput>;
}

/// Scripts run on this machine.
#[derive(Debug, Default, Clone)]
pub struct LocalShell;

impl Transport for LocalShell {
    fn label(&self) -> String {
        "localhost".into()
    }

    fn is_local(&self) -> bool {
        true
    }

    fn check_reachable(&self) -> Result<(), ConnectFailure> {
        Ok(())
    }

    fn check_shell_access(&self) -> Result<(), ConnectFailure> {
        Ok(())
    }

    #[instrument(skip(self, script), level = "debug")]
    fn exec(&self, script: &str, mode: ExecMode) -> std::io::Result<ShellOutput> {
        match mode {
            ExecMode::Probe => syscall_with_input(Command::new("sh").arg("-s"), script),
            ExecMode::Interactive => syscall_interactive(Command::new("sh").args(["-c", script])),
        }
    }
}

/// Scripts run on a remote host over ssh.
#[derive(Debug, Clone)]
pub struct SshShell {
    user: String,
    host: String,
    timeout: Duration,
}

impl SshShell {
    /// Construct new ssh transport.
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn destination(&self) -> String {
        if self.user.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.user, self.host)
        }
    }

    fn batch_command(&self) -> Command {
        let mut command = Command::new("ssh");
        command
            .args(["-o", "BatchMode=yes"])
            .args(["-o", &format!("ConnectTimeout={}", self.timeout.as_secs().max(1))])
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .args(["-p", &SSH_PORT.to_string()])
            .arg(self.destination());
        command
    }
}

impl Transport for SshShell {
    fn label(&self) -> String {
        self.destination()
    }

    fn is_local(&self) -> bool {
        false
    }

    #[instrument(skip(self), level = "debug")]
    fn check_reachable(&self) -> Result<(), ConnectFailure> {
        let addrs = (self.host.as_str(), SSH_PORT)
            .to_socket_addrs()
            .map_err(|error| {
                ConnectFailure::Unreachable(format!("cannot resolve {}: {error}", self.host))
            })?;

        let mut last_error = None;
        for addr in addrs {
            debug!("connect to {addr}");
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(_) => return Ok(()),
                Err(error) => last_error = Some(format!("{addr}: {error}")),
            }
        }

        Err(ConnectFailure::Unreachable(last_error.unwrap_or_else(|| {
            format!("no address found for {}", self.host)
        })))
    }

    #[instrument(skip(self), level = "debug")]
    fn check_shell_access(&self) -> Result<(), ConnectFailure> {
        let output = syscall(self.batch_command().arg("true")).map_err(|error| {
            ConnectFailure::Authentication(format!("failed to execute ssh: {error}"))
        })?;

        if output.success() {
            return Ok(());
        }

        Err(classify_ssh_failure(&output.stderr))
    }

    #[instrument(skip(self, script), level = "debug")]
    fn exec(&self, script: &str, mode: ExecMode) -> std::io::Result<ShellOutput> {
        match mode {
            ExecMode::Probe => syscall_with_input(self.batch_command().args(["sh", "-s"]), script),
            ExecMode::Interactive => {
                let mut command = Command::new("ssh");
                command
                    .arg("-t")
                    .args(["-p", &SSH_PORT.to_string()])
                    .arg(self.destination())
                    .arg(script);
                syscall_interactive(&mut command)
            }
        }
    }
}

/// Decide whether ssh failed to connect or failed to log in.
pub fn classify_ssh_failure(stderr: &str) -> ConnectFailure {
    let detail = stderr.trim().to_string();
    let auth_markers = [
        "Permission denied",
        "Host key verification failed",
        "Too many authentication failures",
        "no matching host key type",
    ];

    if auth_markers.iter().any(|marker| stderr.contains(marker)) {
        ConnectFailure::Authentication(detail)
    } else {
        ConnectFailure::Unreachable(detail)
    }
}

fn syscall(command: &mut Command) -> std::io::Result<ShellOutput> {
    let output = command.stdin(Stdio::null()).output()?;
    Ok(ShellOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn syscall_with_input(command: &mut Command, input: &str) -> std::io::Result<ShellOutput> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    Ok(ShellOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn syscall_interactive(command: &mut Command) -> std::io::Result<ShellOutput> {
    let output = command
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()?;

    Ok(ShellOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn local_shell_runs_probe_scripts() -> anyhow::Result<()> {
        let output = LocalShell.exec("echo out; echo err >&2; exit 4", ExecMode::Probe)?;
        assert_eq!(output.code, Some(4));
        assert!(!output.success());
        assert_eq!(output.combined(), "out\nerr");

        Ok(())
    }

    #[test]
    fn ssh_failures_are_classified() {
        assert_eq!(
            classify_ssh_failure("x@h: Permission denied (publickey,password).\n"),
            ConnectFailure::Authentication("x@h: Permission denied (publickey,password).".into())
        );
        assert_eq!(
            classify_ssh_failure("ssh: connect to host h port 22: Connection timed out"),
            ConnectFailure::Unreachable(
                "ssh: connect to host h port 22: Connection timed out".into()
            )
        );
    }

    #[test]
    fn unresolvable_host_is_unreachable() {
        let shell = SshShell::new("x", "host.invalid").with_timeout(Duration::from_millis(200));
        assert!(matches!(
            shell.check_reachable(),
            Err(ConnectFailure::Unreachable(_))
        ));
    }
}
