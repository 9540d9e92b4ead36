// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use unisync::{
    bootstrap::{BootstrapOutcome, Bootstrapper},
    config::{ignore::IgnoreRuleSet, Configuration, Overrides},
    exit::classify,
    host::{
        transport::{LocalShell, SshShell, Transport},
        Expectations, HostInspector, HostState,
    },
    path::expand,
    profile::{profile_name, ProfileGenerator, RemoteSpec},
    prompt::{select_command, Confirm, TerminalConfirm},
    runner::{RunOptions, RunStatus, SyncRunner},
    store::{default_remote_user, ConfigStore},
};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::{
    ffi::OsString,
    io::IsTerminal,
    path::{Path, PathBuf},
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  unisync [options] <command> [unison-args]...\n  unisync [options] bootstrap (localhost | <host>)\n  unisync [options] config (get | set <path> | init [path])\n  unisync [options] status",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let Cli { global, command } = self;

        match command {
            Some(Command::Bootstrap(opts)) => run_bootstrap(&global, &global.store()?, opts),
            Some(Command::Config(opts)) => run_config(&global.store()?, opts),
            Some(Command::Status) => run_status(&global, &global.store()?),
            Some(Command::Run(args)) => run_named(global, args).await,
            None => run_menu(&global, &global.store()?).await,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct GlobalOptions {
    /// Log debug output, and run unison with debugging enabled.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Let the newer side win every conflict.
    #[arg(long, global = true)]
    pub force: bool,

    /// Print the unison command line instead of running it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Remote user to log in as.
    #[arg(long, global = true, value_name = "user")]
    pub user: Option<String>,

    /// Synchronize with this host only.
    #[arg(long, global = true, value_name = "ip")]
    pub ip: Option<String>,

    /// Local unison binary.
    #[arg(long, global = true, value_name = "path")]
    pub unison_path: Option<PathBuf>,

    /// Unison preferences directory.
    #[arg(long, global = true, value_name = "dir")]
    pub pref_dir: Option<PathBuf>,

    /// Ignore rule file.
    #[arg(long, global = true, value_name = "file")]
    pub ignore_file: Option<PathBuf>,

    /// Configuration file to use instead of the active one.
    #[arg(long, global = true, value_name = "file")]
    pub config: Option<PathBuf>,
}

impl GlobalOptions {
    fn store(&self) -> Result<ConfigStore> {
        Ok(ConfigStore::try_default()?.with_explicit_path(self.config.clone()))
    }

    /// Take unisync flags written after a command name.
    ///
    /// Returns whatever is left, which is handed to unison as is.
    fn absorb_trailing(&mut self, args: impl IntoIterator<Item = String>) -> Result<Vec<String>> {
        let mut args = args.into_iter();
        let mut extra = Vec::new();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg.clone(), None),
            };

            match (flag.as_str(), inline.is_some()) {
                ("--dry-run", false) => self.dry_run = true,
                ("--debug", false) => self.debug = true,
                ("--force", false) => self.force = true,
                ("--user", _) => self.user = Some(flag_value(&flag, inline, &mut args)?),
                ("--ip", _) => self.ip = Some(flag_value(&flag, inline, &mut args)?),
                ("--unison-path", _) => {
                    self.unison_path = Some(flag_value(&flag, inline, &mut args)?.into())
                }
                ("--pref-dir", _) => {
                    self.pref_dir = Some(flag_value(&flag, inline, &mut args)?.into())
                }
                ("--ignore-file", _) => {
                    self.ignore_file = Some(flag_value(&flag, inline, &mut args)?.into())
                }
                ("--config", _) => self.config = Some(flag_value(&flag, inline, &mut args)?.into()),
                _ => extra.push(arg),
            }
        }

        Ok(extra)
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            user: self.user.clone(),
            ip: self.ip.clone(),
            unison_path: self.unison_path.clone(),
            pref_dir: self.pref_dir.clone(),
            ignore_file: self.ignore_file.clone(),
        }
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            debug: self.debug,
            force: self.force,
            dry_run: self.dry_run,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Inspect a host and install whatever unisync needs there.
    #[command(override_usage = "unisync bootstrap [options] (localhost | <host>)")]
    Bootstrap(BootstrapOptions),

    /// Show, move, or initialize the configuration file.
    #[command(override_usage = "unisync config [options] (get | set <path> | init [path])")]
    Config(ConfigOptions),

    /// Show configuration and every named command.
    #[command(override_usage = "unisync status [options]")]
    Status,

    /// Synchronize a named command.
    #[command(external_subcommand)]
    Run(Vec<OsString>),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BootstrapOptions {
    /// Host to bootstrap, or `localhost` for this machine.
    #[arg(required = true, value_name = "target")]
    pub target: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ConfigOptions {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigAction {
    /// Print the active configuration path.
    Get,

    /// Point unisync at another configuration file.
    Set {
        #[arg(required = true, value_name = "path")]
        path: String,
    },

    /// Write configuration template and ignore file.
    Init {
        #[arg(value_name = "path")]
        path: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let code = if error.use_stderr() { 1 } else { 0 };
            let _ = error.print();
            exit(code);
        }
    };

    let level = if cli.global.debug { "debug" } else { "info" };
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run().await {
        error!("{error:?}");
        exit(classify(&error).code());
    }

    exit(0)
}

fn flag_value(
    flag: &str,
    inline: Option<String>,
    rest: &mut impl Iterator<Item = String>,
) -> Result<String> {
    inline
        .or_else(|| rest.next())
        .with_context(|| format!("{flag} needs a value"))
}

async fn run_named(mut global: GlobalOptions, args: Vec<OsString>) -> Result<()> {
    let mut args = args.into_iter().map(|arg| arg.to_string_lossy().into_owned());
    let name = args.next().context("no command name given")?;
    let extra = global.absorb_trailing(args)?;

    let store = global.store()?;
    let (_, config) = store.load_active()?;
    let options = global.run_options();
    sync_command(&global, &store, &config, &name, options, extra).await
}

async fn sync_command(
    global: &GlobalOptions,
    store: &ConfigStore,
    config: &Configuration,
    name: &str,
    mut options: RunOptions,
    extra: Vec<String>,
) -> Result<()> {
    let mut command = store.resolve_command(config, name)?;
    command.apply(&global.overrides());
    command
        .validate()
        .with_context(|| format!("command {name:?} cannot run"))?;

    let rules = IgnoreRuleSet::load(&command.ignore_file)?;
    let generator = ProfileGenerator::new(&command.prefs_dir);
    let runner = SyncRunner::new(
        &command.local_unison_path,
        &command.remote_unison_path,
        &command.prefs_dir,
    );

    options.extra_args = command.extra_options.clone();
    options.extra_args.extend(extra);

    for host in &command.remote_hosts {
        let remote = RemoteSpec::new(&command.remote_user, host, &command.remote_path);
        let profile = generator.generate(
            &profile_name(&command.name, host),
            &command.local_path,
            &remote,
            &rules,
        )?;

        let result = runner
            .run(&profile, &options)
            .await
            .with_context(|| format!("failed to synchronize {name:?} with {host}"))?;
        match result.status {
            RunStatus::DryRun { report } => println!("{report}"),
            RunStatus::Completed => println!(
                "{name} with {host}: {} file(s) in {:.1?}",
                result.files_processed, result.duration
            ),
            RunStatus::Cancelled => {
                println!("{name} with {host}: cancelled");
                return Ok(());
            }
        }
    }

    Ok(())
}

async fn run_menu(global: &GlobalOptions, store: &ConfigStore) -> Result<()> {
    if std::io::stdin().is_terminal() {
        if let Ok((_, config)) = store.load_active() {
            if let Some(name) = select_command(config.command_names()) {
                return sync_command(global, store, &config, &name, global.run_options(), Vec::new())
                    .await;
            }

            return Ok(());
        }
    }

    Cli::command().print_help()?;
    Ok(())
}

fn run_config(store: &ConfigStore, opts: ConfigOptions) -> Result<()> {
    match opts.action {
        ConfigAction::Get => {
            let location = store.resolve_config_path();
            println!("{}", location.path.display());
            println!("  source: {}", location.source);
            if !location.exists() {
                println!("  (does not exist, run `unisync config init`)");
            }
        }
        ConfigAction::Set { path } => {
            let report = store.relocate(expand(path), &TerminalConfirm)?;
            println!(
                "configuration moved from {} to {}",
                report.previous.display(),
                report.current.display()
            );
            if report.copied {
                println!("  previous configuration copied");
            }
        }
        ConfigAction::Init { path } => {
            let target = match path {
                Some(path) => expand(path),
                None => store.resolve_config_path().path,
            };

            let overwrite = target.exists()
                && TerminalConfirm.confirm(&format!("overwrite existing {}?", target.display()));
            let report = store.init(&target, overwrite)?;

            let verb = |written| if written { "wrote" } else { "kept existing" };
            println!("{} {}", verb(report.config_written), report.config_path.display());
            println!("{} {}", verb(report.ignore_written), report.ignore_path.display());
        }
    }

    Ok(())
}

fn run_status(global: &GlobalOptions, store: &ConfigStore) -> Result<()> {
    let location = store.resolve_config_path();
    println!("configuration: {} ({})", location.path.display(), location.source);

    let mut unison = PathBuf::from("unison");
    if !location.exists() {
        println!("  does not exist, run `unisync config init`");
    } else {
        match store.load(&location.path) {
            Ok(config) => {
                unison = expand(&config.defaults.local_unison_path);
                println!("commands:");
                for name in config.command_names() {
                    let Some(mut command) = config.resolve_command(&name) else {
                        continue;
                    };
                    command.apply(&global.overrides());
                    let validity = match command.validate() {
                        Ok(()) => "ok".to_string(),
                        Err(error) => error.to_string().replace('\n', " "),
                    };
                    println!(
                        "  {name}: {} <-> {}@[{}]:{} [{validity}]",
                        command.local_path.display(),
                        command.remote_user,
                        command.remote_hosts.join(", "),
                        command.remote_path,
                    );
                }
            }
            Err(error) => println!("  invalid: {error:?}"),
        }
    }

    if let Some(path) = &global.unison_path {
        unison = path.clone();
    }

    match which::which(&unison) {
        Ok(path) => println!(
            "unison: {} ({})",
            path.display(),
            unison_version(&path).unwrap_or_else(|| "unknown version".into())
        ),
        Err(_) => println!("unison: {} not found", unison.display()),
    }

    Ok(())
}

fn run_bootstrap(
    global: &GlobalOptions,
    store: &ConfigStore,
    opts: BootstrapOptions,
) -> Result<()> {
    let location = store.resolve_config_path();
    let config = if location.exists() {
        Some(store.load(&location.path)?)
    } else {
        None
    };

    let local_unison = global
        .unison_path
        .clone()
        .or_else(|| config.as_ref().map(|config| expand(&config.defaults.local_unison_path)))
        .unwrap_or_else(|| PathBuf::from("unison"));

    let is_local = opts.target == "localhost";
    let (transport, expect): (Box<dyn Transport>, Expectations) = if is_local {
        let mut expect = Expectations::for_local(Some(location.path.as_path()), None);
        expect.unison = local_unison.display().to_string();
        if let Some(config) = &config {
            expect.prefs_dir = config.defaults.prefs_dir.clone();
            expect.ignore_file = config.defaults.ignore_file.clone();
        }
        apply_path_overrides(global, &mut expect);
        (Box::new(LocalShell), expect)
    } else {
        let user = global
            .user
            .clone()
            .or_else(|| config.as_ref().map(|config| config.defaults.remote_user.clone()))
            .unwrap_or_else(default_remote_user);
        let mut expect = Expectations::default();
        if let Some(config) = &config {
            expect.unison = config.defaults.remote_unison_path.clone();
        }
        (Box::new(SshShell::new(user, &opts.target)), expect)
    };

    let reference = if is_local {
        None
    } else {
        which::which(&local_unison).ok().and_then(|path| unison_version(&path))
    };

    let state =
        HostInspector::new(expect.clone()).inspect(transport.as_ref(), reference.as_deref());
    print_host_state(&state);
    state.ensure_connected()?;

    let plan = Bootstrapper::plan(&state);
    if !plan.is_empty() {
        println!("planned changes:");
        for planned in &plan {
            println!("  {}", planned.step);
            for change in &planned.changes {
                println!("    - {change}");
            }
        }
    }

    let bootstrapper = Bootstrapper::new(transport.as_ref(), &TerminalConfirm, store, expect);
    match bootstrapper.apply(&state)? {
        BootstrapOutcome::AlreadyBootstrapped => {
            println!("{} is already bootstrapped", state.target)
        }
        BootstrapOutcome::Cancelled => println!("bootstrap cancelled, nothing was changed"),
        BootstrapOutcome::ManualActionRequired => {
            println!("nothing can be fixed automatically, see manual steps above")
        }
        BootstrapOutcome::Applied { steps } => {
            info!("applied {} step(s) to {}", steps.len(), state.target);
            println!("{} is bootstrapped", state.target);
        }
    }

    Ok(())
}

fn apply_path_overrides(global: &GlobalOptions, expect: &mut Expectations) {
    if let Some(dir) = &global.pref_dir {
        expect.prefs_dir = dir.display().to_string();
    }

    if let Some(file) = &global.ignore_file {
        expect.ignore_file = file.display().to_string();
    }
}

fn print_host_state(state: &HostState) {
    println!("host: {}", state.target);
    if let Some(os) = &state.os_family {
        match &state.distro {
            Some(distro) => println!("  system: {os} ({distro})"),
            None => println!("  system: {os}"),
        }
    }

    if let Some(manager) = &state.package_manager {
        println!("  package manager: {manager}");
    }

    if !state.installed.is_empty() {
        println!("installed:");
        for item in &state.installed {
            println!("  + {item}");
        }
    }

    if !state.missing.is_empty() {
        println!("missing:");
        for finding in &state.missing {
            let how = if finding.automatic { "automatic" } else { "manual" };
            println!("  - {finding} [{how}]");
        }
    }

    for warning in &state.warnings {
        println!("warning: {warning}");
    }
}

fn unison_version(binary: &Path) -> Option<String> {
    let output = std::process::Command::new(binary)
        .arg("-version")
        .output()
        .ok()?;
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines().next().map(|line| line.trim().to_string())
}
