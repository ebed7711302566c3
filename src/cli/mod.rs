use std::io;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::catalog::{Category, InMemoryCatalog};
use crate::channel::{DeviceAddress, QueryFailure};
use crate::config::EffectiveConfig;
use crate::core::{EquipmentSelection, Goal, SettingValue, SettingsSnapshot};
use crate::engine::{Engine, EngineOptions};
use crate::exit::{ExitCode, ExitError};
use crate::rules::SnapshotAnalysis;
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "avlab",
    version,
    about = "Diagnose and configure HDFury Vrroom HDMI matrices, and plan home-theater settings"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk the signal chain and report issues.
    Diagnose(DeviceArgs),
    /// Read the device's settings.
    Settings(SettingsArgs),
    /// Read the raw status of every port.
    Status(DeviceArgs),
    /// Report which inputs carry a signal.
    Detect(DeviceArgs),
    /// Write settings to the device.
    Apply(ApplyArgs),
    /// Send one `get`/`set` command and print the answer.
    Command(CommandArgs),
    /// Save settings and port status to the exports directory.
    Backup(DeviceArgs),
    /// Check a settings snapshot against the rule set.
    Analyze(AnalyzeArgs),
    /// Build recommendations for an equipment setup and goals.
    Recommend(RecommendArgs),
    /// List the optimization goals.
    Goals,
    /// List catalog entries.
    Catalog(CatalogArgs),
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub struct DeviceArgs {
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    #[arg(long)]
    pub detailed: bool,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    /// JSON settings patch.
    #[arg(long, required_unless_present = "set", conflicts_with = "set")]
    pub file: Option<PathBuf>,
    /// `key=value`; repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CommandArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub words: Vec<String>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub device: DeviceArgs,
    #[arg(long, required_unless_present = "live", conflicts_with = "live")]
    pub file: Option<PathBuf>,
    /// Fetch the snapshot from the device.
    #[arg(long)]
    pub live: bool,
}

#[derive(Debug, Args)]
pub struct RecommendArgs {
    /// TOML or JSON file with the equipment selection and goals.
    #[arg(long)]
    pub setup: Option<PathBuf>,
    #[arg(long)]
    pub display: Option<String>,
    #[arg(long)]
    pub matrix: Option<String>,
    #[arg(long)]
    pub receiver: Option<String>,
    #[arg(long = "source")]
    pub sources: Vec<String>,
    #[arg(long)]
    pub speakers: Option<String>,
    #[arg(long)]
    pub screen: Option<String>,
    #[arg(long = "media-server")]
    pub media_servers: Vec<String>,
    #[arg(long = "goal")]
    pub goals: Vec<Goal>,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    pub category: Option<Category>,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SetupFile {
    #[serde(flatten)]
    selection: EquipmentSelection,
    goals: Vec<Goal>,
}

#[derive(Debug, Serialize)]
struct AnalyzeOutput<'a> {
    #[serde(flatten)]
    analysis: &'a SnapshotAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    corrected_file: Option<String>,
    #[serde(skip_serializing_if = "<[QueryFailure]>::is_empty")]
    failures: &'a [QueryFailure],
}

#[derive(Debug, Serialize)]
struct CommandOutput<'a> {
    command: &'a str,
    response: &'a str,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::home_dir()?;

    let env_config_path = std::env::var_os("AVLAB_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        color: stdout_is_tty && cfg.ui.color && !cli.no_color,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    let catalog = InMemoryCatalog::load(cfg.catalog.path.as_deref())
        .context("failed to load equipment catalog")
        .map_err(crate::exit::invalid_args_err)?;
    let engine = Engine::new(
        EngineOptions {
            timeouts: cfg.device.timeouts(),
            show_progress: ui_cfg.stderr_is_tty && !cli.quiet && !cli.json,
            dry_run: cli.dry_run,
        },
        cfg.exports.dir.clone(),
        catalog,
    );

    match cli.command {
        Commands::Diagnose(args) => {
            let addr = device_address(&cfg, &args)?;
            let diagnosis = engine
                .fetch_diagnosis(&addr)
                .with_context(|| format!("diagnose: cannot reach {addr}"))?;
            if cli.json {
                write_json(&diagnosis)?;
            } else {
                crate::ui::print_diagnosis(&diagnosis, &ui_cfg);
            }
        }
        Commands::Settings(args) => {
            let addr = device_address(&cfg, &args.device)?;
            if args.detailed {
                let detailed = engine
                    .fetch_settings_detailed(&addr)
                    .with_context(|| format!("settings: cannot reach {addr}"))?;
                if cli.json {
                    write_json(&detailed)?;
                } else {
                    crate::ui::print_detailed_settings(&detailed, &ui_cfg);
                }
            } else {
                let fetch = engine
                    .fetch_all_settings(&addr)
                    .with_context(|| format!("settings: cannot reach {addr}"))?;
                if cli.json {
                    write_json(&fetch)?;
                } else {
                    crate::ui::print_settings(&fetch.settings, &fetch.failures, &ui_cfg);
                }
            }
        }
        Commands::Status(args) => {
            let addr = device_address(&cfg, &args)?;
            let status = engine
                .fetch_status(&addr)
                .with_context(|| format!("status: cannot reach {addr}"))?;
            if cli.json {
                write_json(&status)?;
            } else {
                crate::ui::print_status(&status, &ui_cfg);
            }
        }
        Commands::Detect(args) => {
            let addr = device_address(&cfg, &args)?;
            let detection = engine
                .detect_inputs(&addr)
                .with_context(|| format!("detect: cannot reach {addr}"))?;
            if cli.json {
                write_json(&detection)?;
            } else {
                crate::ui::print_detection(&detection, &ui_cfg);
            }
        }
        Commands::Apply(args) => {
            let patch = match &args.file {
                Some(path) => read_snapshot(path)?,
                None => parse_assignments(&args.set)?,
            };
            if patch.settings().next().is_none() {
                return Err(crate::exit::invalid_args("apply: nothing to apply"));
            }
            if cli.dry_run {
                if cli.json {
                    write_json(&patch)?;
                } else {
                    crate::ui::print_apply_plan(&patch, &ui_cfg);
                }
                return Ok(());
            }

            let addr = device_address(&cfg, &args.device)?;
            let started_at = OffsetDateTime::now_utc();
            let report = engine
                .apply_settings(&addr, &patch)
                .with_context(|| format!("apply: cannot reach {addr}"))?;
            let finished_at = OffsetDateTime::now_utc();
            if let Err(e) =
                crate::logs::write_apply_log(&home_dir, started_at, finished_at, &addr, &report)
            {
                tracing::warn!(error = %e, "apply log not written");
            }

            if cli.json {
                write_json(&report)?;
            } else {
                crate::ui::print_apply(&report, &ui_cfg);
            }
            if !report.all_applied() {
                let failed = report.results.len() - report.applied_count();
                return Err(ExitError::new(
                    ExitCode::Failed,
                    anyhow::anyhow!("apply: {failed} setting(s) were not applied"),
                )
                .into());
            }
        }
        Commands::Command(args) => {
            let command = args.words.join(" ");
            crate::channel::validate_command(&command).context("command")?;
            let addr = device_address(&cfg, &args.device)?;
            let response = engine
                .send_raw_command(&addr, &command)
                .with_context(|| format!("command: `{command}` failed on {addr}"))?;
            if cli.json {
                write_json(&CommandOutput {
                    command: &command,
                    response: &response,
                })?;
            } else if !ui_cfg.quiet {
                println!("{response}");
            }
        }
        Commands::Backup(args) => {
            let addr = device_address(&cfg, &args)?;
            let report = engine
                .backup(&addr)
                .with_context(|| format!("backup: cannot complete backup of {addr}"))?;
            if cli.json {
                write_json(&report)?;
            } else {
                crate::ui::print_backup(&report, &ui_cfg);
            }
        }
        Commands::Analyze(args) => {
            let (snapshot, failures) = match &args.file {
                Some(path) => (read_snapshot(path)?, Vec::new()),
                None => {
                    let addr = device_address(&cfg, &args.device)?;
                    let fetch = engine
                        .fetch_all_settings(&addr)
                        .with_context(|| format!("analyze: cannot reach {addr}"))?;
                    (fetch.settings, fetch.failures)
                }
            };
            let analysis = engine.analyze_snapshot(&snapshot);
            let corrected_file = engine
                .export_corrected(&analysis)?
                .map(|p| p.display().to_string());
            if cli.json {
                write_json(&AnalyzeOutput {
                    analysis: &analysis,
                    corrected_file,
                    failures: &failures,
                })?;
            } else {
                crate::ui::print_analysis(&analysis, corrected_file.as_deref(), &ui_cfg);
            }
        }
        Commands::Recommend(args) => {
            let (selection, goals) = build_selection(args)?;
            let synthesis = engine.synthesize(&selection, &goals)?;
            if cli.json {
                write_json(&synthesis)?;
            } else {
                crate::ui::print_synthesis(&synthesis, &ui_cfg);
            }
        }
        Commands::Goals => {
            if cli.json {
                write_json(&goal_listing())?;
            } else {
                crate::ui::print_goals(&ui_cfg);
            }
        }
        Commands::Catalog(args) => {
            let categories = match args.category {
                Some(category) => vec![category],
                None => Category::ALL.to_vec(),
            };
            let entries: Vec<_> = categories
                .into_iter()
                .flat_map(|c| engine.catalog().entries(c))
                .collect();
            if cli.json {
                write_json(&entries)?;
            } else {
                crate::ui::print_catalog(&entries, &ui_cfg);
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = std::io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "avlab", &mut out);
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    write_json(&cfg)?;
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `avlab config --show`");
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let env_var = if std::env::var_os("AVLAB_LOG").is_some() {
        "AVLAB_LOG"
    } else {
        EnvFilter::DEFAULT_ENV
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default.into())
        .with_env_var(env_var)
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init();
}

fn device_address(cfg: &EffectiveConfig, args: &DeviceArgs) -> Result<DeviceAddress> {
    cfg.device
        .address(args.host.as_deref(), args.port)
        .ok_or_else(|| {
            crate::exit::invalid_args(
                "no device host: pass --host or set [device] host in the config",
            )
        })
}

fn read_snapshot(path: &Path) -> Result<SettingsSnapshot> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file: {}", path.display()))
        .map_err(crate::exit::invalid_args_err)?;
    SettingsSnapshot::from_json_str(&s)
        .with_context(|| format!("invalid settings file: {}", path.display()))
}

fn parse_assignments(items: &[String]) -> Result<SettingsSnapshot> {
    let mut patch = SettingsSnapshot::new();
    for item in items {
        let Some((key, value)) = item.split_once('=') else {
            return Err(crate::exit::invalid_args(format!(
                "--set expects key=value, got: {item}"
            )));
        };
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || key.contains(char::is_whitespace) || value.is_empty() {
            return Err(crate::exit::invalid_args(format!(
                "--set expects key=value, got: {item}"
            )));
        }
        let value = SettingValue::from_wire(value);
        crate::channel::validate_assignment(key, &value)
            .with_context(|| format!("--set {}", item.escape_debug()))?;
        patch.insert(key, value);
    }
    Ok(patch)
}

/// Flags override the setup file slot by slot; list flags and goals are appended.
fn build_selection(args: RecommendArgs) -> Result<(EquipmentSelection, Vec<Goal>)> {
    let setup = match &args.setup {
        Some(path) => read_setup(path)?,
        None => SetupFile::default(),
    };
    let mut selection = setup.selection;
    let mut goals = setup.goals;

    if args.display.is_some() {
        selection.display = args.display;
    }
    if args.matrix.is_some() {
        selection.matrix = args.matrix;
    }
    if args.receiver.is_some() {
        selection.receiver = args.receiver;
    }
    if args.speakers.is_some() {
        selection.speakers = args.speakers;
    }
    if args.screen.is_some() {
        selection.screen = args.screen;
    }
    selection.sources.extend(args.sources);
    selection.media_servers.extend(args.media_servers);

    for goal in args.goals {
        if !goals.contains(&goal) {
            goals.push(goal);
        }
    }
    Ok((selection, goals))
}

fn read_setup(path: &Path) -> Result<SetupFile> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read setup file: {}", path.display()))
        .map_err(crate::exit::invalid_args_err)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str(&s).map_err(anyhow::Error::from)
    } else {
        toml::from_str(&s).map_err(anyhow::Error::from)
    };
    parsed
        .with_context(|| format!("invalid setup file: {}", path.display()))
        .map_err(crate::exit::invalid_args_err)
}

#[derive(Debug, Serialize)]
struct GoalInfo {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: crate::core::GoalCategory,
}

fn goal_listing() -> Vec<GoalInfo> {
    Goal::ALL
        .into_iter()
        .map(|g| GoalInfo {
            id: g.id(),
            name: g.name(),
            description: g.description(),
            category: g.category(),
        })
        .collect()
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = std::io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
