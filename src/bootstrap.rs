// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host bootstrapping.
//!
//! Bootstrapping fixes what [`HostInspector`] found missing on a host. Only
//! findings marked automatic are acted on. Everything else is left to the
//! user, with the remediation text from the inspection.
//!
//! Changes are grouped into steps that always run in the same order:
//!
//! 1. Package manager.
//! 2. Unison itself, which needs the package manager.
//! 3. Preferences directory, configuration file, and ignore file.
//! 4. Man page.
//! 5. PATH entry in a shell startup file.
//!
//! Nothing is mutated before the user confirms the full plan. A failing step
//! does not stop later steps, except for unison whose install needs a working
//! package manager.
//!
//! [`HostInspector`]: crate::host::HostInspector

use crate::{
    config::ignore::default_ignore_file,
    host::{
        path_entry_pattern, shell_path,
        transport::{ExecMode, Transport},
        Expectations, HostError, HostState, Requirement, SHELL_RC_FILES,
    },
    path::{expand, sibling_ignore_path},
    prompt::Confirm,
    store::{render_template, write_atomic, ConfigStore},
};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{info, instrument, warn};

/// Man page installed by the documentation step.
pub const MAN_PAGE: &str = include_str!("../doc/unisync.1");

const HEREDOC_MARKER: &str = "UNISYNC_EOF";

/// Bootstrap step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapStep {
    PackageManager,
    SyncBinary,
    ConfigFiles,
    Documentation,
    ShellPath,
}

impl BootstrapStep {
    /// Every step, in execution order.
    pub const ALL: [BootstrapStep; 5] = [
        Self::PackageManager,
        Self::SyncBinary,
        Self::ConfigFiles,
        Self::Documentation,
        Self::ShellPath,
    ];

    /// Step able to fix a requirement.
    pub fn for_requirement(requirement: Requirement) -> Option<Self> {
        match requirement {
            Requirement::PackageManager => Some(Self::PackageManager),
            Requirement::SyncBinary => Some(Self::SyncBinary),
            Requirement::PreferencesDir
            | Requirement::ToolConfigDir
            | Requirement::ToolConfigFile
            | Requirement::IgnoreFile => Some(Self::ConfigFiles),
            Requirement::Documentation => Some(Self::Documentation),
            Requirement::ShellPath => Some(Self::ShellPath),
            _ => None,
        }
    }
}

impl Display for BootstrapStep {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::PackageManager => "install package manager",
            Self::SyncBinary => "install unison",
            Self::ConfigFiles => "create configuration files",
            Self::Documentation => "install man page",
            Self::ShellPath => "update shell PATH",
        };
        fmt.write_str(name)
    }
}

/// Step planned for a host, with every finding it addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub step: BootstrapStep,
    pub changes: Vec<String>,
}

/// Failed step with the output of the tool that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: BootstrapStep,
    pub output: String,
}

impl Display for StepFailure {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}: {}", self.step, self.output)
    }
}

/// Non-failing bootstrap outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Nothing is missing.
    AlreadyBootstrapped,

    /// User declined the plan.
    Cancelled,

    /// Only manual fixes remain.
    ManualActionRequired,

    /// Every planned step succeeded.
    Applied { steps: Vec<BootstrapStep> },
}

/// Apply automatic fixes to a host.
pub struct Bootstrapper<'a> {
    transport: &'a dyn Transport,
    confirm: &'a dyn Confirm,
    store: &'a ConfigStore,
    expect: Expectations,
}

impl<'a> Bootstrapper<'a> {
    /// Construct new bootstrapper.
    ///
    /// The configuration store is only used when bootstrapping this machine.
    pub fn new(
        transport: &'a dyn Transport,
        confirm: &'a dyn Confirm,
        store: &'a ConfigStore,
        expect: Expectations,
    ) -> Self {
        Self {
            transport,
            confirm,
            store,
            expect,
        }
    }

    /// Plan steps for automatic findings in host state.
    pub fn plan(state: &HostState) -> Vec<PlannedStep> {
        BootstrapStep::ALL
            .into_iter()
            .filter_map(|step| {
                let changes = state
                    .missing
                    .iter()
                    .filter(|finding| finding.automatic)
                    .filter(|finding| {
                        BootstrapStep::for_requirement(finding.requirement) == Some(step)
                    })
                    .map(|finding| finding.remediation.clone())
                    .collect::<Vec<_>>();
                (!changes.is_empty()).then_some(PlannedStep { step, changes })
            })
            .collect()
    }

    /// Apply fixes for everything inspection found missing.
    ///
    /// An empty missing list returns right away without asking anything.
    /// Otherwise the user must confirm before the first change.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::Host`] if host state shows no usable
    ///   connection.
    /// - Return [`BootstrapError::StepsFailed`] listing every failed step.
    #[instrument(skip(self, state), fields(target = %state.target), level = "debug")]
    pub fn apply(&self, state: &HostState) -> Result<BootstrapOutcome> {
        state.ensure_connected()?;

        if state.missing.is_empty() {
            info!("{} is already bootstrapped", state.target);
            return Ok(BootstrapOutcome::AlreadyBootstrapped);
        }

        let plan = Self::plan(state);
        if plan.is_empty() {
            info!("{} needs manual fixes only", state.target);
            return Ok(BootstrapOutcome::ManualActionRequired);
        }

        let question = format!(
            "apply {} bootstrap step(s) to {}?",
            plan.len(),
            state.target
        );
        if !self.confirm.confirm(&question) {
            info!("bootstrap of {} declined", state.target);
            return Ok(BootstrapOutcome::Cancelled);
        }

        let mut applied = Vec::new();
        let mut failures = Vec::new();
        for planned in &plan {
            let step = planned.step;
            if step == BootstrapStep::SyncBinary
                && failures
                    .iter()
                    .any(|failure: &StepFailure| failure.step == BootstrapStep::PackageManager)
            {
                warn!("skip {step}, package manager is not available");
                failures.push(StepFailure {
                    step,
                    output: "skipped, package manager step failed".into(),
                });
                continue;
            }

            info!("{step} on {}", state.target);
            match self.run_step(step, state) {
                Ok(()) => applied.push(step),
                Err(output) => {
                    warn!("{step} failed on {}", state.target);
                    failures.push(StepFailure { step, output });
                }
            }
        }

        if !failures.is_empty() {
            return Err(BootstrapError::StepsFailed {
                target: state.target.clone(),
                failures,
            });
        }

        Ok(BootstrapOutcome::Applied { steps: applied })
    }

    fn run_step(&self, step: BootstrapStep, state: &HostState) -> std::result::Result<(), String> {
        match step {
            BootstrapStep::PackageManager => {
                let manager = state
                    .package_manager
                    .ok_or_else(|| "no package manager known for this host".to_string())?;
                let script = manager
                    .bootstrap_command()
                    .ok_or_else(|| format!("{manager} cannot be installed automatically"))?;
                self.exec(script)
            }
            BootstrapStep::SyncBinary => {
                let manager = state
                    .package_manager
                    .ok_or_else(|| "no package manager known for this host".to_string())?;
                self.exec(manager.install_unison())
            }
            BootstrapStep::ConfigFiles if self.transport.is_local() => self.local_config_files(),
            BootstrapStep::ConfigFiles => self.exec(&remote_config_script(&self.expect)),
            BootstrapStep::Documentation => self.exec(&man_page_script(&self.expect)),
            BootstrapStep::ShellPath => self.exec(&shell_path_script(&self.expect)),
        }
    }

    fn local_config_files(&self) -> std::result::Result<(), String> {
        mkdirp::mkdirp(expand(&self.expect.prefs_dir)).map_err(|error| error.to_string())?;
        let report = self
            .store
            .init(expand(&self.expect.config_file), false)
            .map_err(|error| format!("{error:?}"))?;
        info!(
            "configuration {} written: {}, ignore file {} written: {}",
            report.config_path.display(),
            report.config_written,
            report.ignore_path.display(),
            report.ignore_written
        );

        // Commands may point at an ignore file away from the configuration.
        let ignore_path = expand(&self.expect.ignore_file);
        if !self.expect.ignore_file.is_empty()
            && ignore_path != report.ignore_path
            && !ignore_path.exists()
        {
            info!("write ignore file {}", ignore_path.display());
            write_atomic(&ignore_path, default_ignore_file())
                .map_err(|error| format!("{error:?}"))?;
        }

        Ok(())
    }

    fn exec(&self, script: &str) -> std::result::Result<(), String> {
        let output = self
            .transport
            .exec(script, ExecMode::Interactive)
            .map_err(|error| format!("failed to run script: {error}"))?;

        if output.success() {
            Ok(())
        } else {
            Err(output.combined())
        }
    }
}

/// Render script creating configuration files on a remote host.
///
/// Existing files are left alone.
pub fn remote_config_script(expect: &Expectations) -> String {
    let ignore_file = if expect.ignore_file.is_empty() {
        sibling_ignore_path(&expect.config_file).display().to_string()
    } else {
        expect.ignore_file.clone()
    };

    let mut script = format!(
        "set -e\nmkdir -p {} {}\n",
        shell_path(&expect.prefs_dir),
        shell_path(&expect.config_dir())
    );
    script.push_str(&write_if_absent(
        &expect.config_file,
        &render_template(&ignore_file),
    ));
    script.push_str(&write_if_absent(&ignore_file, &default_ignore_file()));
    script
}

/// Render script installing the man page.
pub fn man_page_script(expect: &Expectations) -> String {
    format!(
        "set -e\nmkdir -p {dir}\ncat > {page} <<'{HEREDOC_MARKER}'\n{MAN_PAGE}{newline}{HEREDOC_MARKER}\n",
        dir = shell_path(&expect.man_dir()),
        page = shell_path(&expect.man_page),
        newline = if MAN_PAGE.ends_with('\n') { "" } else { "\n" },
    )
}

/// Render script adding the PATH entry to the first shell startup file found.
///
/// Falls back to `~/.profile` if the host has none.
pub fn shell_path_script(expect: &Expectations) -> String {
    let entry = path_entry_pattern(&expect.path_entry);
    format!(
        r#"set -e
rc="$HOME/.profile"
for candidate in {candidates}; do
    if [ -f "$HOME/$candidate" ]; then rc="$HOME/$candidate"; break; fi
done
mkdir -p {dir}
printf '\n# Added by unisync\nexport PATH="%s:$PATH"\n' '{entry}' >> "$rc"
"#,
        candidates = SHELL_RC_FILES.join(" "),
        dir = shell_path(&expect.path_entry),
    )
}

fn write_if_absent(path: &str, contents: &str) -> String {
    let target = shell_path(path);
    let newline = if contents.ends_with('\n') { "" } else { "\n" };
    format!(
        "if [ ! -e {target} ]; then\ncat > {target} <<'{HEREDOC_MARKER}'\n{contents}{newline}{HEREDOC_MARKER}\nfi\n"
    )
}

/// Bootstrap error types.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Host cannot be used at all.
    #[error(transparent)]
    Host(#[from] HostError),

    /// One or more steps failed.
    #[error("bootstrap of {target} failed:\n{}", failure_list(failures))]
    StepsFailed {
        target: String,
        failures: Vec<StepFailure>,
    },
}

fn failure_list(failures: &[StepFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  {failure}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Friendly result alias :3
pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{
        distro::{OsFamily, PackageManager},
        transport::{ConnectFailure, LocalShell, ShellOutput},
        Connectivity, Finding, HostInspector,
    };
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};

    struct Answer {
        answer: bool,
        asked: Cell<usize>,
    }

    impl Answer {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: Cell::new(0),
            }
        }
    }

    impl Confirm for Answer {
        fn confirm(&self, _message: &str) -> bool {
            self.asked.set(self.asked.get() + 1);
            self.answer
        }
    }

    /// Remote transport recording every script, failing scripts containing
    /// a marker.
    #[derive(Default)]
    struct Recorder {
        scripts: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl Transport for Recorder {
        fn label(&self) -> String {
            "x@box".into()
        }

        fn is_local(&self) -> bool {
            false
        }

        fn check_reachable(&self) -> std::result::Result<(), ConnectFailure> {
            Ok(())
        }

        fn check_shell_access(&self) -> std::result::Result<(), ConnectFailure> {
            Ok(())
        }

        fn exec(&self, script: &str, mode: ExecMode) -> std::io::Result<ShellOutput> {
            assert_eq!(mode, ExecMode::Interactive);
            self.scripts.borrow_mut().push(script.to_string());
            let failed = self.fail_on.is_some_and(|marker| script.contains(marker));
            let stderr = if failed {
                "curl: (6) Could not resolve host".into()
            } else {
                String::new()
            };
            Ok(ShellOutput {
                code: Some(if failed { 1 } else { 0 }),
                stdout: String::new(),
                stderr,
            })
        }
    }

    fn store() -> ConfigStore {
        ConfigStore::new("/nonexistent/.unisync-config", "/nonexistent/config.toml")
    }

    fn finding(requirement: Requirement, automatic: bool) -> Finding {
        Finding {
            requirement,
            remediation: format!("fix {requirement}"),
            automatic,
        }
    }

    fn state_with(missing: Vec<Finding>) -> HostState {
        HostState {
            target: "x@box".into(),
            connectivity: Connectivity::Verified,
            os_family: Some(OsFamily::MacOs),
            distro: None,
            package_manager: Some(PackageManager::Homebrew),
            unison_version: None,
            installed: Vec::new(),
            missing,
            warnings: Vec::new(),
            trail: Vec::new(),
        }
    }

    #[test]
    fn nothing_missing_is_a_no_op() -> anyhow::Result<()> {
        let transport = Recorder::default();
        let confirm = Answer::new(true);
        let store = store();
        let bootstrapper = Bootstrapper::new(&transport, &confirm, &store, Expectations::default());

        let outcome = bootstrapper.apply(&state_with(Vec::new()))?;
        assert_eq!(outcome, BootstrapOutcome::AlreadyBootstrapped);
        assert_eq!(confirm.asked.get(), 0);
        assert!(transport.scripts.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn manual_only_findings_never_prompt() -> anyhow::Result<()> {
        let transport = Recorder::default();
        let confirm = Answer::new(true);
        let store = store();
        let bootstrapper = Bootstrapper::new(&transport, &confirm, &store, Expectations::default());

        let state = state_with(vec![finding(Requirement::SshKey, false)]);
        assert_eq!(bootstrapper.apply(&state)?, BootstrapOutcome::ManualActionRequired);
        assert_eq!(confirm.asked.get(), 0);
        assert!(transport.scripts.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn declining_mutates_nothing() -> anyhow::Result<()> {
        let transport = Recorder::default();
        let confirm = Answer::new(false);
        let store = store();
        let bootstrapper = Bootstrapper::new(&transport, &confirm, &store, Expectations::default());

        let state = state_with(vec![finding(Requirement::SyncBinary, true)]);
        assert_eq!(bootstrapper.apply(&state)?, BootstrapOutcome::Cancelled);
        assert_eq!(confirm.asked.get(), 1);
        assert!(transport.scripts.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn unreachable_host_is_refused() {
        let transport = Recorder::default();
        let confirm = Answer::new(true);
        let store = store();
        let bootstrapper = Bootstrapper::new(&transport, &confirm, &store, Expectations::default());

        let mut state = state_with(vec![finding(Requirement::Reachability, false)]);
        state.connectivity = Connectivity::HostUnreachable("timed out".into());
        let result = bootstrapper.apply(&state);
        assert!(matches!(result, Err(BootstrapError::Host(HostError::Unreachable { .. }))));
        assert_eq!(confirm.asked.get(), 0);
    }

    #[test]
    fn steps_run_in_fixed_order() -> anyhow::Result<()> {
        let transport = Recorder::default();
        let confirm = Answer::new(true);
        let store = store();
        let bootstrapper = Bootstrapper::new(&transport, &confirm, &store, Expectations::default());

        let state = state_with(vec![
            finding(Requirement::ShellPath, true),
            finding(Requirement::Documentation, true),
            finding(Requirement::IgnoreFile, true),
            finding(Requirement::SyncBinary, true),
            finding(Requirement::PackageManager, true),
            finding(Requirement::SshKey, false),
        ]);
        let outcome = bootstrapper.apply(&state)?;
        assert_eq!(
            outcome,
            BootstrapOutcome::Applied {
                steps: BootstrapStep::ALL.to_vec()
            }
        );

        let scripts = transport.scripts.borrow();
        assert_eq!(scripts.len(), 5);
        assert!(scripts[0].contains("Homebrew/install"));
        assert_eq!(scripts[1], "brew install unison");
        assert!(scripts[2].contains("<<'UNISYNC_EOF'"));
        assert!(scripts[3].contains(".TH UNISYNC 1"));
        assert!(scripts[4].contains("export PATH"));

        Ok(())
    }

    #[test]
    fn failures_accumulate_and_skip_dependents() {
        let transport = Recorder {
            fail_on: Some("Homebrew/install"),
            ..Default::default()
        };
        let confirm = Answer::new(true);
        let store = store();
        let bootstrapper = Bootstrapper::new(&transport, &confirm, &store, Expectations::default());

        let state = state_with(vec![
            finding(Requirement::PackageManager, true),
            finding(Requirement::SyncBinary, true),
            finding(Requirement::ShellPath, true),
        ]);

        match bootstrapper.apply(&state) {
            Err(BootstrapError::StepsFailed { target, failures }) => {
                assert_eq!(target, "x@box");
                let steps = failures.iter().map(|failure| failure.step).collect::<Vec<_>>();
                assert_eq!(steps, vec![BootstrapStep::PackageManager, BootstrapStep::SyncBinary]);
                assert_eq!(failures[0].output, "curl: (6) Could not resolve host");
            }
            other => panic!("expected step failures, got {other:?}"),
        }

        // Package manager script ran, unison install did not, PATH update did.
        let scripts = transport.scripts.borrow();
        assert_eq!(scripts.len(), 2);
        assert!(scripts[1].contains("export PATH"));
    }

    #[test]
    fn remote_config_script_never_overwrites() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let expect = Expectations {
            prefs_dir: home.path().join("prefs").display().to_string(),
            config_file: home.path().join("cfg").join("config.toml").display().to_string(),
            ignore_file: home.path().join("cfg").join("ignore").display().to_string(),
            ..Default::default()
        };

        std::fs::create_dir_all(home.path().join("cfg"))?;
        std::fs::write(&expect.ignore_file, "Name keep.me\n")?;

        let output = LocalShell.exec(&remote_config_script(&expect), ExecMode::Probe)?;
        assert!(output.success(), "{}", output.combined());
        assert!(home.path().join("prefs").is_dir());
        assert_eq!(std::fs::read_to_string(&expect.ignore_file)?, "Name keep.me\n");

        let written = std::fs::read_to_string(&expect.config_file)?;
        assert_eq!(written, render_template(&expect.ignore_file));
        let config: crate::config::Configuration = written.parse()?;
        assert!(config.resolve_command("git").is_some());

        Ok(())
    }

    #[test]
    fn local_config_files_delegate_to_store() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let config_path = home.path().join("cfg").join("config.toml");
        let expect = Expectations {
            prefs_dir: home.path().join("prefs").display().to_string(),
            config_file: config_path.display().to_string(),
            ignore_file: home.path().join("cfg").join("ignore").display().to_string(),
            ..Default::default()
        };
        let store = ConfigStore::new(home.path().join(".unisync-config"), &config_path);
        let confirm = Answer::new(true);
        let bootstrapper = Bootstrapper::new(&LocalShell, &confirm, &store, expect.clone());

        let mut state = state_with(vec![
            finding(Requirement::PreferencesDir, true),
            finding(Requirement::ToolConfigFile, true),
        ]);
        state.connectivity = Connectivity::Local;
        let outcome = bootstrapper.apply(&state)?;
        assert_eq!(
            outcome,
            BootstrapOutcome::Applied {
                steps: vec![BootstrapStep::ConfigFiles]
            }
        );
        assert!(home.path().join("prefs").is_dir());
        assert!(config_path.is_file());
        assert!(home.path().join("cfg").join("ignore").is_file());

        // A second inspection of the same files finds them in place.
        let after = HostInspector::new(expect).inspect(&LocalShell, None);
        assert!(!after.is_missing(Requirement::PreferencesDir));
        assert!(!after.is_missing(Requirement::ToolConfigFile));
        assert!(!after.is_missing(Requirement::IgnoreFile));

        Ok(())
    }

    #[test]
    fn local_config_files_create_ignore_file_elsewhere() -> anyhow::Result<()> {
        let home = tempfile::tempdir()?;
        let config_path = home.path().join("cfg").join("config.toml");
        let ignore_path = home.path().join("rules").join("ignore");
        let expect = Expectations {
            prefs_dir: home.path().join("prefs").display().to_string(),
            config_file: config_path.display().to_string(),
            ignore_file: ignore_path.display().to_string(),
            ..Default::default()
        };
        let store = ConfigStore::new(home.path().join(".unisync-config"), &config_path);
        let confirm = Answer::new(true);
        let bootstrapper = Bootstrapper::new(&LocalShell, &confirm, &store, expect.clone());

        let mut state = state_with(vec![finding(Requirement::IgnoreFile, true)]);
        state.connectivity = Connectivity::Local;
        bootstrapper.apply(&state)?;

        assert_eq!(std::fs::read_to_string(&ignore_path)?, default_ignore_file());
        let after = HostInspector::new(expect).inspect(&LocalShell, None);
        assert!(!after.is_missing(Requirement::IgnoreFile));

        Ok(())
    }

    /// Transport whose shell cannot run anything.
    struct NoShell;

    impl Transport for NoShell {
        fn label(&self) -> String {
            "x@broken".into()
        }

        fn is_local(&self) -> bool {
            false
        }

        fn check_reachable(&self) -> std::result::Result<(), ConnectFailure> {
            Ok(())
        }

        fn check_shell_access(&self) -> std::result::Result<(), ConnectFailure> {
            Ok(())
        }

        fn exec(&self, _script: &str, _mode: ExecMode) -> std::io::Result<ShellOutput> {
            Ok(ShellOutput {
                code: Some(127),
                stdout: String::new(),
                stderr: "sh: not found".into(),
            })
        }
    }

    #[test]
    fn unchecked_host_is_not_reported_as_bootstrapped() -> anyhow::Result<()> {
        let confirm = Answer::new(true);
        let store = store();
        let state = HostInspector::default().inspect(&NoShell, None);
        let bootstrapper = Bootstrapper::new(&NoShell, &confirm, &store, Expectations::default());

        assert_eq!(bootstrapper.apply(&state)?, BootstrapOutcome::ManualActionRequired);
        assert_eq!(confirm.asked.get(), 0);
        assert!(state.missing[0].remediation.contains("sh: not found"));

        Ok(())
    }

    #[test]
    fn plan_groups_findings_by_step() {
        let state = state_with(vec![
            finding(Requirement::IgnoreFile, true),
            finding(Requirement::PreferencesDir, true),
            finding(Requirement::SshKey, false),
        ]);
        let plan = Bootstrapper::plan(&state);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].step, BootstrapStep::ConfigFiles);
        assert_eq!(plan[0].changes.len(), 2);
    }
}
