//! Loadwatch - athlete workload monitoring
//!
//! Command-line entry point.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use loadwatch::load::{
    ExternalLoadIntake, ExternalLoadSample, LoadSource, RecomputeWorker, SessionLoadEvent,
    SessionLoadLedger, SessionRegistry, TrainingSession,
};
use loadwatch::metrics::{AcwrEngine, BatchRunner, NightlyScheduler};
use loadwatch::storage::config::{get_config_path, load_config_from, save_config};
use loadwatch::storage::{AppConfig, Database, SnapshotStore};

/// Session RPE load tracking and acute:chronic workload ratios.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the platform data directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured one.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and write a default configuration file.
    Init,
    /// Register or reschedule training sessions from a JSON array.
    Sessions {
        file: PathBuf,
    },
    /// Apply session load events from a JSON Lines file.
    Ingest {
        file: PathBuf,
    },
    /// Record external load samples from a JSON array.
    External {
        file: PathBuf,
    },
    /// Rebuild every daily load row from the ledger and provider samples.
    Rebuild,
    /// Compute ACWR snapshots for one athlete.
    Compute(RangeArgs),
    /// Compute ACWR snapshots for every athlete with loads.
    Batch {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
        #[arg(long, default_value = "INTERNAL")]
        source: LoadSource,
    },
    /// Print stored snapshots for one athlete.
    Snapshots(RangeArgs),
    /// Recompute the trailing window on a fixed interval until Ctrl-C.
    Schedule,
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long)]
    athlete: Uuid,
    /// First day (YYYY-MM-DD).
    #[arg(long)]
    from: NaiveDate,
    /// Last day, inclusive (YYYY-MM-DD).
    #[arg(long)]
    to: NaiveDate,
    #[arg(long, default_value = "INTERNAL")]
    source: LoadSource,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(get_config_path);
    let mut config = load_config_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(database) = &cli.database {
        config.storage.database_file = database.display().to_string();
    }

    tracing::debug!("Starting Loadwatch v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Init => init(&config, &config_path),
        Commands::Sessions { file } => register_sessions(&config, &file),
        Commands::Ingest { file } => ingest(&config, &file),
        Commands::External { file } => record_external(&config, &file),
        Commands::Rebuild => rebuild(&config),
        Commands::Compute(args) => compute(&config, &args),
        Commands::Batch { from, to, source } => batch(&config, from, to, source).await,
        Commands::Snapshots(args) => show_snapshots(&config, &args),
        Commands::Schedule => schedule(&config).await,
    }
}

fn open(config: &AppConfig) -> anyhow::Result<Database> {
    let path = config.database_path();
    Database::open_with_timeout(&path, config.storage.busy_timeout())
        .with_context(|| format!("opening {}", path.display()))
}

fn init(config: &AppConfig, config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        save_config(config, config_path)?;
        println!("Wrote {}", config_path.display());
    }
    open(config)?;
    println!("Database ready at {}", config.database_path().display());
    Ok(())
}

fn register_sessions(config: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let sessions: Vec<TrainingSession> = serde_json::from_str(&content)?;

    let db = open(config)?;
    let registry = SessionRegistry::new(db.connection());
    for session in &sessions {
        registry.register(session)?;
    }

    println!("Registered {} sessions", sessions.len());
    Ok(())
}

fn ingest(config: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let reader = std::io::BufReader::new(
        std::fs::File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );

    let db = open(config)?;
    let ledger = SessionLoadLedger::new(db.connection());

    let mut applied = 0;
    let mut rejected = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: SessionLoadEvent = serde_json::from_str(&line)
            .with_context(|| format!("line {}: malformed event", index + 1))?;

        match ledger.apply(&event) {
            Ok(_) => applied += 1,
            Err(e) if e.is_retryable() => {
                return Err(e).with_context(|| format!("line {}: storage failure", index + 1));
            }
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Rejected event");
                rejected += 1;
            }
        }
    }

    println!("Applied {} events, rejected {}", applied, rejected);
    Ok(())
}

fn record_external(config: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let samples: Vec<ExternalLoadSample> = serde_json::from_str(&content)?;

    let db = open(config)?;
    let intake = ExternalLoadIntake::new(db.connection());
    for sample in &samples {
        intake.record(sample)?;
    }

    println!("Recorded {} samples", samples.len());
    Ok(())
}

fn rebuild(config: &AppConfig) -> anyhow::Result<()> {
    let reader = open(config)?;
    let worker = RecomputeWorker::spawn(open(config)?);

    let queued = worker.submit_rebuild(reader.connection())?;
    let (_, stats) = worker.finish()?;

    println!("Rebuilt {} of {} daily columns", stats.processed, queued);
    if !stats.failed.is_empty() {
        bail!("{} recomputes failed", stats.failed.len());
    }
    Ok(())
}

fn compute(config: &AppConfig, args: &RangeArgs) -> anyhow::Result<()> {
    let db = open(config)?;
    let engine = AcwrEngine::new(db.connection(), &config.acwr)?;

    match engine.compute_range(&args.athlete, args.from, args.to, args.source) {
        Ok(snapshots) => {
            println!("Wrote {} snapshots", snapshots.len());
            Ok(())
        }
        Err(e) => match e.resume_from() {
            // Runs start cold, so a mid-range restart would break the series
            Some(date) => bail!(
                "{} (days before {} are committed; rerun with --from {} to finish the range)",
                e,
                date,
                args.from
            ),
            None => Err(e.into()),
        },
    }
}

async fn batch(config: &AppConfig, from: NaiveDate, to: NaiveDate, source: LoadSource) -> anyhow::Result<()> {
    let runner = BatchRunner::from_config(config);
    let athletes = runner.athletes().await?;
    let report = runner.run(&athletes, from, to, source).await;

    for run in &report.completed {
        println!("{}  {} days", run.athlete_id, run.days_written);
    }
    for failure in &report.failed {
        match failure.resume_from {
            Some(date) => println!("{}  FAILED from {}: {}", failure.athlete_id, date, failure.error),
            None => println!("{}  FAILED: {}", failure.athlete_id, failure.error),
        }
    }

    if !report.is_success() {
        bail!("{} of {} athletes failed", report.failed.len(), athletes.len());
    }
    Ok(())
}

fn show_snapshots(config: &AppConfig, args: &RangeArgs) -> anyhow::Result<()> {
    let db = open(config)?;
    let engine = AcwrEngine::new(db.connection(), &config.acwr)?;
    let trusted_from = engine.trusted_from(args.from);

    let snapshots = SnapshotStore::new(db.connection()).range(&args.athlete, args.from, args.to, args.source)?;
    if snapshots.is_empty() {
        println!("No snapshots");
        return Ok(());
    }

    println!("{:<10}  {:>9}  {:>9}  {:>6}  status", "date", "acute", "chronic", "ratio");
    for snapshot in &snapshots {
        let marker = if snapshot.date < trusted_from { " (warming up)" } else { "" };
        println!(
            "{}  {:>9.2}  {:>9.2}  {:>6.2}  {}{}",
            snapshot.date,
            snapshot.acute,
            snapshot.chronic,
            snapshot.ratio,
            snapshot.status().label(),
            marker
        );
    }
    Ok(())
}

async fn schedule(config: &AppConfig) -> anyhow::Result<()> {
    let scheduler = NightlyScheduler::from_config(config);

    tracing::info!(
        interval_hours = config.batch.interval_hours,
        lookback_days = config.batch.lookback_days,
        "Scheduler started"
    );

    scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Could not listen for Ctrl-C");
            }
        })
        .await;
    Ok(())
}
