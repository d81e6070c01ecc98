//! Trendwatch CLI — run crossover trend detection over payload batches.
//!
//! Commands:
//! - `detect`: fold a payload file into stored detector states and report trends
//! - `state show`: list stored states, decoded, for a snapshot file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use trendwatch_core::DetectorState;
use trendwatch_runner::{
    detect_batch, load_payloads, write_report, DetectorSettings, StateSnapshot, TrendEvent,
};

mod logging;

#[derive(Parser)]
#[command(
    name = "trendwatch",
    about = "Trendwatch CLI — moving average crossover trend detection"
)]
struct Cli {
    /// Log level filter (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fold payloads into stored states and report regressions/improvements.
    Detect {
        /// Path to the detector settings TOML. Defaults apply when omitted.
        #[arg(long)]
        settings: Option<PathBuf>,

        /// Payload file (.csv, .jsonl or .ndjson). Each entity's payloads are
        /// folded in file order; a payload older than the one before it is
        /// skipped, so sort the file by timestamp first.
        #[arg(long)]
        payloads: PathBuf,

        /// State snapshot JSON, read before and written after the batch.
        #[arg(long, default_value = "trendwatch-state.json")]
        state: PathBuf,

        /// Write the trend report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Detect without writing the updated state snapshot.
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// State snapshot commands.
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print every stored state, decoded.
    Show {
        /// State snapshot JSON.
        #[arg(long, default_value = "trendwatch-state.json")]
        state: PathBuf,

        /// Settings to compare the snapshot fingerprint against.
        #[arg(long)]
        settings: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = if cli.log_json {
        logging::LogFormat::Json
    } else {
        logging::LogFormat::Pretty
    };
    logging::init_logging(&cli.log_level, format)?;

    match cli.command {
        Commands::Detect {
            settings,
            payloads,
            state,
            output,
            dry_run,
        } => run_detect(settings.as_deref(), &payloads, &state, output.as_deref(), dry_run),
        Commands::State { action } => match action {
            StateAction::Show { state, settings } => run_state_show(&state, settings.as_deref()),
        },
    }
}

fn load_settings(path: Option<&Path>) -> Result<DetectorSettings> {
    match path {
        Some(path) => DetectorSettings::load(path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(DetectorSettings::default()),
    }
}

fn run_detect(
    settings_path: Option<&Path>,
    payloads_path: &Path,
    state_path: &Path,
    output: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let settings = load_settings(settings_path)?;
    let fingerprint = settings.fingerprint();

    let payloads = load_payloads(payloads_path)
        .with_context(|| format!("loading payloads from {}", payloads_path.display()))?;
    let mut snapshot = StateSnapshot::load_or_new(state_path, &fingerprint)
        .with_context(|| format!("loading state from {}", state_path.display()))?;

    let outcome = detect_batch(payloads, &snapshot, &settings)?;

    let mut report: Vec<TrendEvent> = outcome.regressions;
    report.extend(outcome.improvements);

    match output {
        Some(path) => {
            write_report(path, &report)
                .with_context(|| format!("writing report to {}", path.display()))?;
            tracing::info!(path = %path.display(), trends = report.len(), "wrote trend report");
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    if dry_run {
        tracing::info!("dry run, state snapshot left untouched");
        return Ok(());
    }

    snapshot.merge(outcome.states, &fingerprint);
    snapshot
        .save(state_path)
        .with_context(|| format!("writing state to {}", state_path.display()))?;
    tracing::info!(
        path = %state_path.display(),
        entities = snapshot.len(),
        "saved state snapshot"
    );
    Ok(())
}

fn run_state_show(state_path: &Path, settings_path: Option<&Path>) -> Result<()> {
    let snapshot = StateSnapshot::load(state_path)
        .with_context(|| format!("loading state from {}", state_path.display()))?;

    if let Some(path) = settings_path {
        let settings = load_settings(Some(path))?;
        let matches = settings.fingerprint() == snapshot.config_fingerprint;
        println!(
            "fingerprint: {} ({})",
            snapshot.config_fingerprint,
            if matches { "matches settings" } else { "differs from settings" }
        );
    } else {
        println!("fingerprint: {}", snapshot.config_fingerprint);
    }
    println!("entities: {}", snapshot.len());
    println!();
    println!(
        "{:<56} {:>8} {:>14} {:>14}  last",
        "key", "count", "short", "long"
    );

    for (key, mapping) in &snapshot.states {
        match DetectorState::from_mapping(mapping) {
            Ok(state) => {
                let last = state
                    .timestamp
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<56} {:>8} {:>14.4} {:>14.4}  {}",
                    key, state.count, state.moving_avg_short, state.moving_avg_long, last
                );
            }
            Err(err) => println!("{key:<56} malformed: {err}"),
        }
    }
    Ok(())
}
