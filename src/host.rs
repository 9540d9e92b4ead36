// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host readiness inspection.
//!
//! Before unisync can synchronize with a host, or bootstrap it, the host must
//! be inspected. Inspection produces a [`HostState`]: what is installed, what
//! is missing along with how to fix it, and anything that looks off.
//!
//! # Inspection Phases
//!
//! Every inspection walks the same phases:
//!
//! ```text
//! Unprobed -> ReachabilityChecked -> ShellAccessVerified -> ChecksRun -> Reported
//! ```
//!
//! A remote host must first answer on the network, and then accept a
//! non-interactive login. If either fails, then inspection jumps straight to
//! `Reported` with only the connectivity finding filled in. No other check
//! is attempted.
//!
//! # Probe Script
//!
//! All checks run as one POSIX shell script through the host's
//! [`Transport`], printing `KEY=VALUE` lines between start and end markers.
//! The same script serves local and remote hosts, and all interpretation
//! happens here in Rust.

pub mod distro;
pub mod transport;

use crate::{
    config::ResolvedCommand,
    host::{
        distro::{OsFamily, PackageManager},
        transport::{ConnectFailure, ExecMode, Transport},
    },
    path::{default_config_path, sibling_ignore_path},
};

use regex::Regex;
use std::{
    collections::{HashMap, HashSet},
    fmt::{Display, Formatter, Result as FmtResult},
    path::Path,
    sync::LazyLock,
};
use tracing::{debug, info, instrument, warn};

static VERSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+\.\d+(?:\.\d+)?").unwrap());

/// Shell startup files checked for the PATH entry.
pub const SHELL_RC_FILES: &[&str] = &[".bashrc", ".bash_profile", ".zshrc", ".profile"];

/// Name of installed man page.
pub const MAN_PAGE_NAME: &str = "unisync.1";

/// Inspection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionPhase {
    Unprobed,
    ReachabilityChecked,
    ShellAccessVerified,
    ChecksRun,
    Reported,
}

/// Outcome of connectivity checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connectivity {
    /// Target is this machine.
    Local,

    /// Remote host is reachable and accepts non-interactive login.
    Verified,

    /// Remote host does not answer on the network.
    HostUnreachable(String),

    /// Remote host refuses non-interactive login.
    AuthenticationFailed(String),
}

impl Connectivity {
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Local | Self::Verified)
    }
}

/// Requirement that a host may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Requirement {
    Reachability,
    ShellAccess,
    HostChecks,
    SupportedPlatform,
    PackageManager,
    RemoteShellClient,
    SyncBinary,
    SshKey,
    PreferencesDir,
    ToolConfigDir,
    ToolConfigFile,
    IgnoreFile,
    Documentation,
    ShellPath,
}

impl Requirement {
    /// Check if requirement is about reaching the host at all.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Reachability | Self::ShellAccess)
    }
}

impl Display for Requirement {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::Reachability => "network reachability",
            Self::ShellAccess => "non-interactive shell access",
            Self::HostChecks => "host readiness checks",
            Self::SupportedPlatform => "supported platform",
            Self::PackageManager => "package manager",
            Self::RemoteShellClient => "ssh client",
            Self::SyncBinary => "unison",
            Self::SshKey => "ssh key",
            Self::PreferencesDir => "unison preferences directory",
            Self::ToolConfigDir => "unisync configuration directory",
            Self::ToolConfigFile => "unisync configuration file",
            Self::IgnoreFile => "unisync ignore file",
            Self::Documentation => "man page",
            Self::ShellPath => "PATH entry in shell startup file",
        };
        fmt.write_str(name)
    }
}

/// Missing requirement with its remedy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub requirement: Requirement,
    pub remediation: String,

    /// Bootstrap can fix this without help.
    pub automatic: bool,
}

impl Finding {
    fn manual(requirement: Requirement, remediation: impl Into<String>) -> Self {
        Self {
            requirement,
            remediation: remediation.into(),
            automatic: false,
        }
    }

    fn automatic(requirement: Requirement, remediation: impl Into<String>) -> Self {
        Self {
            requirement,
            remediation: remediation.into(),
            automatic: true,
        }
    }
}

impl Display for Finding {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}: {}", self.requirement, self.remediation)
    }
}

/// Diagnostic snapshot of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostState {
    pub target: String,
    pub connectivity: Connectivity,
    pub os_family: Option<OsFamily>,
    pub distro: Option<String>,
    pub package_manager: Option<PackageManager>,
    pub unison_version: Option<String>,
    pub installed: Vec<String>,
    pub missing: Vec<Finding>,
    pub warnings: Vec<String>,

    /// Phases walked, in order.
    pub trail: Vec<InspectionPhase>,
}

impl HostState {
    fn new(target: String) -> Self {
        Self {
            target,
            connectivity: Connectivity::Local,
            os_family: None,
            distro: None,
            package_manager: None,
            unison_version: None,
            installed: Vec::new(),
            missing: Vec::new(),
            warnings: Vec::new(),
            trail: vec![InspectionPhase::Unprobed],
        }
    }

    fn enter(&mut self, phase: InspectionPhase) {
        debug!("inspection of {} enters {phase:?}", self.target);
        self.trail.push(phase);
    }

    /// Check if the full set of checks ran.
    pub fn checks_ran(&self) -> bool {
        self.trail.contains(&InspectionPhase::ChecksRun)
    }

    /// Check if requirement is missing.
    pub fn is_missing(&self, requirement: Requirement) -> bool {
        self.missing
            .iter()
            .any(|finding| finding.requirement == requirement)
    }

    /// Require that the host could be reached and logged into.
    ///
    /// # Errors
    ///
    /// - Return [`HostError::Unreachable`] if host did not answer.
    /// - Return [`HostError::AuthenticationFailed`] if host refused login.
    pub fn ensure_connected(&self) -> Result<()> {
        match &self.connectivity {
            Connectivity::Local | Connectivity::Verified => Ok(()),
            Connectivity::HostUnreachable(detail) => Err(HostError::Unreachable {
                host: self.target.clone(),
                detail: detail.clone(),
            }),
            Connectivity::AuthenticationFailed(detail) => Err(HostError::AuthenticationFailed {
                host: self.target.clone(),
                detail: detail.clone(),
            }),
        }
    }
}

/// Files and binaries a ready host is expected to have.
///
/// Paths are written the way the host's shell sees them. A leading `~/` is
/// expanded by the probe script on the host itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectations {
    pub unison: String,
    pub prefs_dir: String,
    pub config_file: String,
    pub ignore_file: String,
    pub path_entry: String,
    pub man_page: String,
}

impl Default for Expectations {
    fn default() -> Self {
        Self {
            unison: "unison".into(),
            prefs_dir: "~/.unison".into(),
            config_file: "~/.config/unisync/config.toml".into(),
            ignore_file: "~/.config/unisync/ignore".into(),
            path_entry: "~/.local/bin".into(),
            man_page: format!("~/.local/share/man/man1/{MAN_PAGE_NAME}"),
        }
    }
}

impl Expectations {
    /// Expectations for this machine, taken from the active configuration.
    ///
    /// The configuration lives wherever the pointer says, so it replaces the
    /// remote-style defaults when given.
    pub fn for_local(config_path: Option<&Path>, command: Option<&ResolvedCommand>) -> Self {
        let mut expect = Self::default();
        let config_path = config_path
            .map(Path::to_path_buf)
            .or_else(|| default_config_path().ok());
        if let Some(path) = config_path {
            expect.ignore_file = sibling_ignore_path(&path).display().to_string();
            expect.config_file = path.display().to_string();
        }

        if let Some(command) = command {
            expect.unison = command.local_unison_path.display().to_string();
            expect.prefs_dir = command.prefs_dir.display().to_string();
            expect.ignore_file = command.ignore_file.display().to_string();
        }

        expect
    }

    /// Directory holding the configuration file.
    pub fn config_dir(&self) -> String {
        match self.config_file.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => dir.to_string(),
            _ => ".".into(),
        }
    }

    /// Directory holding the man page.
    pub fn man_dir(&self) -> String {
        match self.man_page.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => dir.to_string(),
            _ => ".".into(),
        }
    }
}

/// Quote a path for the host's shell, keeping a leading `~/` expandable.
pub fn shell_path(path: &str) -> String {
    let quote = |raw: &str| format!("'{}'", raw.replace('\'', r"'\''"));
    match path.strip_prefix("~/") {
        Some(rest) => format!("\"$HOME\"/{}", quote(rest)),
        None if path == "~" => "\"$HOME\"".into(),
        None => quote(path),
    }
}

/// Render probe script for the given expectations.
pub fn probe_script(expect: &Expectations) -> String {
    let mut script = String::from(
        r#"echo "===PROBE_START==="
echo "OS=$(uname -s 2>/dev/null)"
if [ -r /etc/os-release ]; then
    ( . /etc/os-release; echo "DISTRO_ID=$ID"; echo "DISTRO_LIKE=$ID_LIKE"; echo "DISTRO_NAME=$PRETTY_NAME" )
fi
"#,
    );

    let mut binaries = PackageManager::all_binaries().collect::<Vec<_>>();
    binaries.push("ssh");
    script.push_str(&format!(
        "for bin in {}; do\n    if command -v \"$bin\" >/dev/null 2>&1; then echo \"HAS=$bin\"; fi\ndone\n",
        binaries.join(" ")
    ));

    let unison = shell_path(&expect.unison);
    script.push_str(&format!(
        "if command -v {unison} >/dev/null 2>&1; then\n    echo \"UNISON_VERSION=$({unison} -version 2>/dev/null | head -n 1)\"\nfi\n"
    ));

    let paths = [
        ("prefs_dir", expect.prefs_dir.clone()),
        ("ssh_key_ed25519", "~/.ssh/id_ed25519".to_string()),
        ("ssh_key_rsa", "~/.ssh/id_rsa".to_string()),
        ("config_dir", expect.config_dir()),
        ("config_file", expect.config_file.clone()),
        ("ignore_file", expect.ignore_file.clone()),
        ("man_page", expect.man_page.clone()),
    ];
    for (key, path) in paths {
        script.push_str(&format!(
            "if [ -e {} ]; then echo \"EXISTS={key}\"; fi\n",
            shell_path(&path)
        ));
    }

    let entry = path_entry_pattern(&expect.path_entry);
    script.push_str(&format!(
        "for rc in {}; do\n    if [ -f \"$HOME/$rc\" ]; then\n        echo \"RC=$rc\"\n        if grep -qF {} \"$HOME/$rc\"; then echo \"RC_PATH=$rc\"; fi\n    fi\ndone\n",
        SHELL_RC_FILES.join(" "),
        shell_path_literal(&entry),
    ));

    script.push_str("echo \"===PROBE_END===\"\n");
    script
}

/// Text expected in a shell startup file that adds the PATH entry.
pub fn path_entry_pattern(path_entry: &str) -> String {
    match path_entry.strip_prefix("~/") {
        Some(rest) => format!("$HOME/{rest}"),
        None => path_entry.to_string(),
    }
}

fn shell_path_literal(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Raw values reported by the probe script.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub values: HashMap<String, String>,
    pub binaries: HashSet<String>,
    pub existing: HashSet<String>,
    pub rc_files: Vec<String>,
    pub rc_with_path: Vec<String>,
}

impl ProbeReport {
    /// Parse probe script output.
    ///
    /// Returns `None` if the start or end marker is missing.
    pub fn parse(output: &str) -> Option<Self> {
        if !output.contains("===PROBE_START===") || !output.contains("===PROBE_END===") {
            return None;
        }

        let mut report = Self::default();
        for line in output.lines().map(str::trim) {
            if line.is_empty() || line.starts_with("===") {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key {
                "HAS" => {
                    report.binaries.insert(value);
                }
                "EXISTS" => {
                    report.existing.insert(value);
                }
                "RC" => report.rc_files.push(value),
                "RC_PATH" => report.rc_with_path.push(value),
                _ => {
                    report.values.insert(key.to_string(), value);
                }
            }
        }

        Some(report)
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn exists(&self, key: &str) -> bool {
        self.existing.contains(key)
    }
}

/// Extract version number from `unison -version` output.
pub fn parse_version(raw: &str) -> String {
    VERSION
        .find(raw)
        .map(|found| found.as_str().to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Inspect hosts for readiness.
#[derive(Debug, Clone, Default)]
pub struct HostInspector {
    expect: Expectations,
}

impl HostInspector {
    /// Construct new host inspector.
    pub fn new(expect: Expectations) -> Self {
        Self { expect }
    }

    /// Inspect host behind transport.
    ///
    /// If `reference_version` is given, then a different unison version on
    /// the host is reported as a warning.
    #[instrument(skip(self, transport, reference_version), level = "debug")]
    pub fn inspect(&self, transport: &dyn Transport, reference_version: Option<&str>) -> HostState {
        let mut state = HostState::new(transport.label());
        info!("inspect {}", state.target);

        if !transport.is_local() {
            state.connectivity = Connectivity::Verified;
            if let Err(failure) = transport.check_reachable() {
                return self.report_connect_failure(state, failure);
            }
            state.enter(InspectionPhase::ReachabilityChecked);

            if let Err(failure) = transport.check_shell_access() {
                return self.report_connect_failure(state, failure);
            }
            state.enter(InspectionPhase::ShellAccessVerified);
        } else {
            state.enter(InspectionPhase::ReachabilityChecked);
            state.enter(InspectionPhase::ShellAccessVerified);
        }

        let output = match transport.exec(&probe_script(&self.expect), ExecMode::Probe) {
            Ok(output) => output,
            Err(error) => return self.report_unchecked(state, error.to_string()),
        };

        let Some(report) = ProbeReport::parse(&output.stdout) else {
            return self.report_unchecked(state, output.combined());
        };

        self.run_checks(&mut state, &report, transport.is_local(), reference_version);
        state.enter(InspectionPhase::ChecksRun);
        state.enter(InspectionPhase::Reported);
        state
    }

    // No check ran, so nothing about the host is known to be in place.
    fn report_unchecked(&self, mut state: HostState, output: String) -> HostState {
        warn!("cannot run readiness checks on {}", state.target);
        state.missing.push(Finding::manual(
            Requirement::HostChecks,
            format!("readiness checks could not run, shell said: {output}"),
        ));
        state.enter(InspectionPhase::Reported);
        state
    }

    fn report_connect_failure(&self, mut state: HostState, failure: ConnectFailure) -> HostState {
        match failure {
            ConnectFailure::Unreachable(detail) => {
                warn!("{} is unreachable: {detail}", state.target);
                state.missing.push(Finding::manual(
                    Requirement::Reachability,
                    format!("host does not answer ({detail}), check the address and network"),
                ));
                state.connectivity = Connectivity::HostUnreachable(detail);
            }
            ConnectFailure::Authentication(detail) => {
                warn!("{} refused login: {detail}", state.target);
                state.missing.push(Finding::manual(
                    Requirement::ShellAccess,
                    format!(
                        "non-interactive login failed ({detail}), copy your public key with `ssh-copy-id {}`",
                        state.target
                    ),
                ));
                state.connectivity = Connectivity::AuthenticationFailed(detail);
            }
        }

        state.enter(InspectionPhase::Reported);
        state
    }

    fn run_checks(
        &self,
        state: &mut HostState,
        report: &ProbeReport,
        is_local: bool,
        reference_version: Option<&str>,
    ) {
        let os = OsFamily::from_uname(report.value("OS").unwrap_or_default());
        state.distro = report
            .value("DISTRO_NAME")
            .or_else(|| report.value("DISTRO_ID"))
            .map(str::to_string);

        // Package manager.
        let manager =
            PackageManager::detect(&os, report.value("DISTRO_ID"), report.value("DISTRO_LIKE"));
        state.package_manager = manager;
        match (&os, manager) {
            (_, Some(manager)) if report.binaries.contains(manager.binary()) => {
                state.installed.push(format!("package manager {manager}"));
            }
            (OsFamily::MacOs, Some(manager)) => state.missing.push(Finding::automatic(
                Requirement::PackageManager,
                format!("install {manager}"),
            )),
            (_, Some(manager)) => state.missing.push(Finding::manual(
                Requirement::PackageManager,
                format!(
                    "{manager} is expected on this distribution but `{}` was not found",
                    manager.binary()
                ),
            )),
            (OsFamily::Linux, None) => state.missing.push(Finding::manual(
                Requirement::SupportedPlatform,
                format!(
                    "unsupported distribution {:?}, install unison by hand",
                    report.value("DISTRO_ID").unwrap_or("unknown")
                ),
            )),
            (_, None) => state.missing.push(Finding::manual(
                Requirement::SupportedPlatform,
                format!("unsupported operating system {os}, install unison by hand"),
            )),
        }
        state.os_family = Some(os);

        // Remote shell client.
        if report.binaries.contains("ssh") {
            state.installed.push("ssh client".into());
        } else {
            state.missing.push(Finding::manual(
                Requirement::RemoteShellClient,
                "install an OpenSSH client",
            ));
        }

        // Unison and its version.
        match report.value("UNISON_VERSION") {
            Some(raw) => {
                let version = parse_version(raw);
                state.installed.push(format!("unison {version}"));
                if let Some(reference) = reference_version.map(parse_version) {
                    if !is_local && reference != version {
                        state.warnings.push(format!(
                            "unison version mismatch: local {reference}, {} {version}",
                            state.target
                        ));
                    }
                }
                state.unison_version = Some(version);
            }
            None => {
                let remediation = match manager {
                    Some(manager) => format!("run `{}`", manager.install_unison()),
                    None => "install unison by hand".into(),
                };
                let finding = if manager.is_some() {
                    Finding::automatic(Requirement::SyncBinary, remediation)
                } else {
                    Finding::manual(Requirement::SyncBinary, remediation)
                };
                state.missing.push(finding);
            }
        }

        // SSH key material.
        if report.exists("ssh_key_ed25519") || report.exists("ssh_key_rsa") {
            state.installed.push("ssh key".into());
        } else {
            state.missing.push(Finding::manual(
                Requirement::SshKey,
                "generate a key with `ssh-keygen -t ed25519`",
            ));
        }

        // Files and directories unisync itself manages.
        let config_dir = self.expect.config_dir();
        let files = [
            ("prefs_dir", Requirement::PreferencesDir, &self.expect.prefs_dir),
            ("config_dir", Requirement::ToolConfigDir, &config_dir),
            ("config_file", Requirement::ToolConfigFile, &self.expect.config_file),
            ("ignore_file", Requirement::IgnoreFile, &self.expect.ignore_file),
        ];
        for (key, requirement, path) in files {
            if report.exists(key) {
                state.installed.push(format!("{requirement} {path}"));
            } else {
                state
                    .missing
                    .push(Finding::automatic(requirement, format!("create {path}")));
            }
        }

        // Shell startup files.
        if report.rc_files.is_empty() {
            state.warnings.push("no shell startup file found".into());
        }
        if report.rc_with_path.is_empty() {
            state.missing.push(Finding::automatic(
                Requirement::ShellPath,
                format!("add {} to PATH in a shell startup file", self.expect.path_entry),
            ));
        } else {
            state.installed.push(format!(
                "PATH entry {} in {}",
                self.expect.path_entry,
                report.rc_with_path.join(", ")
            ));
        }

        // Documentation.
        if report.exists("man_page") {
            state.installed.push(format!("man page {}", self.expect.man_page));
        } else {
            state.missing.push(Finding::automatic(
                Requirement::Documentation,
                format!("install man page to {}", self.expect.man_page),
            ));
        }
    }
}

/// Host connectivity error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// Host does not answer on the network.
    #[error("host {host} is unreachable: {detail}")]
    Unreachable { host: String, detail: String },

    /// Host answered but refused non-interactive login.
    #[error("authentication to {host} failed: {detail}, copy your public key with `ssh-copy-id {host}`")]
    AuthenticationFailed { host: String, detail: String },
}

/// Friendly result alias :3
pub type Result<T, E = HostError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::transport::ShellOutput;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    /// Transport answering with canned results, counting probe executions.
    struct FakeHost {
        local: bool,
        reachable: Result<(), ConnectFailure>,
        shell: Result<(), ConnectFailure>,
        probe: ShellOutput,
        execs: Cell<usize>,
    }

    impl FakeHost {
        fn remote(probe: &str) -> Self {
            Self {
                local: false,
                reachable: Ok(()),
                shell: Ok(()),
                probe: ShellOutput {
                    code: Some(0),
                    stdout: probe.into(),
                    stderr: String::new(),
                },
                execs: Cell::new(0),
            }
        }
    }

    impl Transport for FakeHost {
        fn label(&self) -> String {
            "x@fake".into()
        }

        fn is_local(&self) -> bool {
            self.local
        }

        fn check_reachable(&self) -> Result<(), ConnectFailure> {
            self.reachable.clone()
        }

        fn check_shell_access(&self) -> Result<(), ConnectFailure> {
            self.shell.clone()
        }

        fn exec(&self, _script: &str, _mode: ExecMode) -> std::io::Result<ShellOutput> {
            self.execs.set(self.execs.get() + 1);
            Ok(self.probe.clone())
        }
    }

    const READY_UBUNTU: &str = indoc! {r#"
        ===PROBE_START===
        OS=Linux
        DISTRO_ID=ubuntu
        DISTRO_LIKE=debian
        DISTRO_NAME=Ubuntu 24.04 LTS
        HAS=apt-get
        HAS=ssh
        UNISON_VERSION=unison version 2.53.3 (ocaml 4.14.1)
        EXISTS=prefs_dir
        EXISTS=ssh_key_ed25519
        EXISTS=config_dir
        EXISTS=config_file
        EXISTS=ignore_file
        EXISTS=man_page
        RC=.bashrc
        RC_PATH=.bashrc
        ===PROBE_END===
    "#};

    const BARE_ALPINE: &str = indoc! {r#"
        ===PROBE_START===
        OS=Linux
        DISTRO_ID=alpine
        HAS=apk
        ===PROBE_END===
    "#};

    #[test]
    fn unreachable_host_short_circuits() {
        let mut host = FakeHost::remote(READY_UBUNTU);
        host.reachable = Err(ConnectFailure::Unreachable("no route to host".into()));

        let state = HostInspector::default().inspect(&host, None);
        assert_eq!(state.connectivity, Connectivity::HostUnreachable("no route to host".into()));
        assert_eq!(state.missing.len(), 1);
        assert!(state.missing.iter().all(|finding| finding.requirement.is_connectivity()));
        assert!(!state.checks_ran());
        assert!(state.installed.is_empty());
        assert!(matches!(state.ensure_connected(), Err(HostError::Unreachable { .. })));
        assert_eq!(host.execs.get(), 0);
        assert_eq!(
            state.trail,
            vec![InspectionPhase::Unprobed, InspectionPhase::Reported]
        );
    }

    #[test]
    fn authentication_failure_short_circuits() {
        let mut host = FakeHost::remote(READY_UBUNTU);
        host.shell = Err(ConnectFailure::Authentication("Permission denied".into()));

        let state = HostInspector::default().inspect(&host, None);
        assert!(matches!(state.connectivity, Connectivity::AuthenticationFailed(_)));
        assert_eq!(state.missing[0].requirement, Requirement::ShellAccess);
        assert!(state.missing[0].remediation.contains("ssh-copy-id"));
        assert_eq!(state.missing.len(), 1);
        assert!(!state.checks_ran());
        assert_eq!(host.execs.get(), 0);
        assert_eq!(
            state.trail,
            vec![
                InspectionPhase::Unprobed,
                InspectionPhase::ReachabilityChecked,
                InspectionPhase::Reported,
            ]
        );
    }

    #[test]
    fn ready_host_has_nothing_missing() {
        let host = FakeHost::remote(READY_UBUNTU);
        let state = HostInspector::default().inspect(&host, Some("unison version 2.53.3"));

        assert_eq!(state.missing, vec![]);
        assert_eq!(state.warnings, Vec::<String>::new());
        assert_eq!(state.connectivity, Connectivity::Verified);
        assert_eq!(state.os_family, Some(OsFamily::Linux));
        assert_eq!(state.package_manager, Some(PackageManager::Apt));
        assert_eq!(state.unison_version.as_deref(), Some("2.53.3"));
        assert_eq!(state.distro.as_deref(), Some("Ubuntu 24.04 LTS"));
        assert_eq!(
            state.trail,
            vec![
                InspectionPhase::Unprobed,
                InspectionPhase::ReachabilityChecked,
                InspectionPhase::ShellAccessVerified,
                InspectionPhase::ChecksRun,
                InspectionPhase::Reported,
            ]
        );
    }

    #[test]
    fn version_mismatch_is_only_a_warning() {
        let host = FakeHost::remote(READY_UBUNTU);
        let state = HostInspector::default().inspect(&host, Some("unison version 2.52.1"));

        assert!(state.missing.is_empty());
        assert_eq!(
            state.warnings,
            vec!["unison version mismatch: local 2.52.1, x@fake 2.53.3".to_string()]
        );
    }

    #[test]
    fn bare_host_accumulates_every_finding() {
        let host = FakeHost::remote(BARE_ALPINE);
        let state = HostInspector::default().inspect(&host, None);

        let missing = state
            .missing
            .iter()
            .map(|finding| (finding.requirement, finding.automatic))
            .collect::<Vec<_>>();
        assert_eq!(
            missing,
            vec![
                (Requirement::RemoteShellClient, false),
                (Requirement::SyncBinary, true),
                (Requirement::SshKey, false),
                (Requirement::PreferencesDir, true),
                (Requirement::ToolConfigDir, true),
                (Requirement::ToolConfigFile, true),
                (Requirement::IgnoreFile, true),
                (Requirement::ShellPath, true),
                (Requirement::Documentation, true),
            ]
        );
        assert!(state.missing[1].remediation.contains("sudo apk add unison"));
        assert_eq!(state.warnings, vec!["no shell startup file found".to_string()]);
    }

    #[test]
    fn unknown_distro_is_a_finding_not_a_crash() {
        let probe = "===PROBE_START===\nOS=Linux\nDISTRO_ID=plan9\n===PROBE_END===\n";
        let state = HostInspector::default().inspect(&FakeHost::remote(probe), None);

        assert!(state.is_missing(Requirement::SupportedPlatform));
        assert!(!state.is_missing(Requirement::PackageManager));
        let unison = state
            .missing
            .iter()
            .find(|finding| finding.requirement == Requirement::SyncBinary)
            .unwrap();
        assert!(!unison.automatic);
    }

    #[test]
    fn malformed_probe_output_is_reported() {
        let state = HostInspector::default().inspect(&FakeHost::remote("garbage"), None);
        assert!(!state.checks_ran());
        assert!(state.is_missing(Requirement::HostChecks));
    }

    #[test]
    fn missing_shell_is_a_manual_finding() {
        let mut host = FakeHost::remote("");
        host.probe = ShellOutput {
            code: Some(127),
            stdout: String::new(),
            stderr: "sh: not found\n".into(),
        };

        let state = HostInspector::default().inspect(&host, None);
        assert!(!state.checks_ran());
        assert_eq!(state.missing.len(), 1);
        assert_eq!(state.missing[0].requirement, Requirement::HostChecks);
        assert!(!state.missing[0].automatic);
        assert!(state.missing[0].remediation.ends_with("sh: not found"));
    }

    #[test]
    fn shell_path_keeps_home_expandable() {
        assert_eq!(shell_path("~/.unison"), "\"$HOME\"/'.unison'");
        assert_eq!(shell_path("/opt/it's"), r"'/opt/it'\''s'");
        assert_eq!(path_entry_pattern("~/.local/bin"), "$HOME/.local/bin");
    }

    #[test]
    fn probe_script_runs_on_local_shell() -> anyhow::Result<()> {
        let script = probe_script(&Expectations::default());
        let output = transport::LocalShell.exec(&script, ExecMode::Probe)?;
        let report = ProbeReport::parse(&output.stdout);
        assert!(report.is_some(), "{}", output.combined());

        Ok(())
    }
}
