//! fleetplan CLI - Voyage Timeline & Annual Allocation
//!
//! Command-line interface for projecting vessel timelines, allocating a
//! planning year and checking voyages for conflicts.

mod diagnostics;
mod render;

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use fleetplan_core::{
    AllocationRequest, Diagnostic, NeverCancel, OperationClass, OperationSet, OptimizationGoal,
    PlanningConfig, ScheduleConflict, Snapshot, TimelineGrid, TimelineRequest,
};
use fleetplan_solver::{
    check_timeline, filter_grid, timeline_statistics, PlanOutput, PlanRequest, Planner,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::diagnostics::{DiagnosticConfig, ExitCode, TerminalEmitter};

#[derive(Parser)]
#[command(name = "fleetplan")]
#[command(author, version, about = "Voyage timeline and fleet allocation", long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Planning configuration file (TOML)
    #[arg(long, global = true, env = "FLEETPLAN_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exit with failure when a critical conflict is found
    #[arg(long, global = true)]
    strict: bool,

    /// Hide informational diagnostics
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Goal {
    MaximizeRevenue,
    MinimizeCost,
    BalanceUtilization,
}

impl From<Goal> for OptimizationGoal {
    fn from(goal: Goal) -> Self {
        match goal {
            Goal::MaximizeRevenue => OptimizationGoal::MaximizeRevenue,
            Goal::MinimizeCost => OptimizationGoal::MinimizeCost,
            Goal::BalanceUtilization => OptimizationGoal::BalanceUtilization,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Project assigned voyages onto a vessel-by-day timeline
    Timeline {
        /// Snapshot file (JSON)
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// First day of the timeline (defaults to the earliest assigned voyage)
        #[arg(long)]
        origin: Option<NaiveDate>,

        /// Number of days shown (defaults to the configured horizon)
        #[arg(long)]
        horizon: Option<u32>,

        /// Only show these operation classes (comma separated)
        #[arg(long, value_delimiter = ',')]
        ops: Vec<OperationClass>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Allocate a year's voyages across the fleet
    Annual {
        /// Snapshot file (JSON)
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Planning year
        #[arg(long)]
        year: i32,

        /// Optimization goal
        #[arg(long, value_enum, default_value_t = Goal::BalanceUtilization)]
        goal: Goal,

        /// Instantiate the snapshot's voyage templates
        #[arg(long)]
        templates: bool,

        /// Restrict allocation to these vessels (comma separated, in tie-break order)
        #[arg(long, value_delimiter = ',')]
        vessels: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Detect conflicts among assigned voyages
    Check {
        /// Snapshot file (JSON)
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// First day considered (defaults to the earliest assigned voyage)
        #[arg(long)]
        origin: Option<NaiveDate>,

        /// Number of days considered (defaults to the configured horizon)
        #[arg(long)]
        horizon: Option<u32>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

/// JSON document printed in `--format json` mode
#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    result: &'a T,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflicts: Option<&'a [ScheduleConflict]>,
    diagnostics: &'a [Diagnostic],
}

fn main() -> Result<process::ExitCode> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = match &cli.config {
        Some(path) => PlanningConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PlanningConfig::default(),
    };
    let diagnostic_config = DiagnosticConfig {
        strict: cli.strict,
        quiet: cli.quiet,
    };

    let exit = match cli.command {
        Commands::Timeline {
            snapshot,
            origin,
            horizon,
            ops,
            format,
        } => cmd_timeline(&snapshot, origin, horizon, &ops, format, &config, diagnostic_config)?,
        Commands::Annual {
            snapshot,
            year,
            goal,
            templates,
            vessels,
            format,
        } => cmd_annual(
            &snapshot,
            year,
            goal.into(),
            templates,
            vessels,
            format,
            &config,
            diagnostic_config,
        )?,
        Commands::Check {
            snapshot,
            origin,
            horizon,
            format,
        } => cmd_check(&snapshot, origin, horizon, format, &config, diagnostic_config)?,
    };

    if exit.is_failure() {
        tracing::info!("critical conflicts found in strict mode");
    }
    Ok(exit.into())
}

fn load_snapshot(path: &Path) -> Result<Snapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
    debug!(
        vessels = snapshot.vessels.len(),
        voyages = snapshot.voyages.len(),
        cargo = snapshot.cargo.len(),
        "snapshot loaded"
    );
    Ok(snapshot)
}

/// Origin defaults to the earliest start of an assigned voyage
fn resolve_origin(snapshot: &Snapshot, origin: Option<NaiveDate>) -> Result<NaiveDate> {
    if let Some(origin) = origin {
        return Ok(origin);
    }
    match snapshot
        .voyages
        .iter()
        .filter(|v| v.is_assigned())
        .map(|v| v.start_date)
        .min()
    {
        Some(origin) => Ok(origin),
        None => bail!("snapshot has no assigned voyages; pass --origin"),
    }
}

fn project(
    snapshot: &Snapshot,
    origin: Option<NaiveDate>,
    horizon: Option<u32>,
    config: &PlanningConfig,
    planner: &Planner,
) -> Result<(TimelineGrid, Vec<Diagnostic>)> {
    let origin = resolve_origin(snapshot, origin)?;
    let horizon = horizon.unwrap_or(config.timeline.default_horizon_days);
    if horizon == 0 {
        bail!("--horizon must be at least 1 day");
    }
    let request = TimelineRequest::new(snapshot.voyages.clone(), origin, horizon);
    let (output, diagnostics) = planner
        .run(&PlanRequest::Timeline(request), &NeverCancel)
        .into_parts();
    match output {
        PlanOutput::Timeline(grid) => Ok((grid, diagnostics)),
        PlanOutput::Annual(_) => bail!("planner returned an annual schedule for a timeline"),
    }
}

fn print_json<T: Serialize>(
    result: &T,
    conflicts: Option<&[ScheduleConflict]>,
    diagnostics: &[Diagnostic],
) -> Result<()> {
    let report = Report {
        result,
        conflicts,
        diagnostics,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to serialize report")?
    );
    Ok(())
}

fn emit_diagnostics(diagnostics: &[Diagnostic], config: DiagnosticConfig) {
    let mut emitter = TerminalEmitter::new(std::io::stderr(), config);
    emitter.emit_all(diagnostics);
    if emitter.warning_count() > 0 {
        debug!(warnings = emitter.warning_count(), "diagnostics emitted");
    }
}

fn cmd_timeline(
    snapshot_path: &Path,
    origin: Option<NaiveDate>,
    horizon: Option<u32>,
    ops: &[OperationClass],
    format: Format,
    config: &PlanningConfig,
    diagnostic_config: DiagnosticConfig,
) -> Result<ExitCode> {
    let snapshot = load_snapshot(snapshot_path)?;
    let planner = Planner::new(config);
    let (grid, diagnostics) = project(&snapshot, origin, horizon, config, &planner)?;
    let stats = timeline_statistics(&grid);

    let shown = if ops.is_empty() {
        grid
    } else {
        filter_grid(&grid, ops.iter().copied().collect::<OperationSet>()).grid
    };

    match format {
        Format::Json => {
            #[derive(Serialize)]
            struct TimelineReport<'a> {
                grid: &'a TimelineGrid,
                statistics: &'a fleetplan_core::TimelineStatistics,
            }
            print_json(
                &TimelineReport {
                    grid: &shown,
                    statistics: &stats,
                },
                None,
                &diagnostics,
            )?;
        }
        Format::Text => {
            emit_diagnostics(&diagnostics, diagnostic_config);
            print!("{}", render::timeline(&shown));
            print!("{}", render::timeline_statistics(&stats));
        }
    }

    Ok(ExitCode::Success)
}

fn cmd_annual(
    snapshot_path: &Path,
    year: i32,
    goal: OptimizationGoal,
    templates: bool,
    vessels: Vec<String>,
    format: Format,
    config: &PlanningConfig,
    diagnostic_config: DiagnosticConfig,
) -> Result<ExitCode> {
    let snapshot = load_snapshot(snapshot_path)?;
    let mut request = AllocationRequest::from_snapshot(&snapshot, year, goal);
    request.use_templates = templates;
    if !vessels.is_empty() {
        request.vessel_ids = vessels;
    }

    let (output, diagnostics) = Planner::new(config)
        .run(&PlanRequest::Annual(request), &NeverCancel)
        .into_parts();
    let PlanOutput::Annual(schedule) = output else {
        bail!("planner returned a timeline for an annual request");
    };

    match format {
        Format::Json => print_json(&*schedule, None, &diagnostics)?,
        Format::Text => {
            emit_diagnostics(&diagnostics, diagnostic_config);
            print!("{}", render::schedule(&schedule));
            print!("{}", render::conflicts(&schedule.conflicts));
        }
    }

    Ok(diagnostic_config.exit_code(&schedule.conflicts))
}

fn cmd_check(
    snapshot_path: &Path,
    origin: Option<NaiveDate>,
    horizon: Option<u32>,
    format: Format,
    config: &PlanningConfig,
    diagnostic_config: DiagnosticConfig,
) -> Result<ExitCode> {
    let snapshot = load_snapshot(snapshot_path)?;
    let planner = Planner::new(config);
    let (grid, mut diagnostics) = project(&snapshot, origin, horizon, config, &planner)?;

    let (conflicts, detect_diagnostics) =
        check_timeline(&grid, &snapshot.voyages, &snapshot.cargo, &config.detection).into_parts();
    diagnostics.extend(detect_diagnostics);

    match format {
        Format::Json => print_json(&grid.overlaps, Some(conflicts.as_slice()), &diagnostics)?,
        Format::Text => {
            emit_diagnostics(&diagnostics, diagnostic_config);
            print!("{}", render::conflicts(&conflicts));
        }
    }

    Ok(diagnostic_config.exit_code(&conflicts))
}
