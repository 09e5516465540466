use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stats_ingestion::cancel::CancelToken;
use stats_ingestion::config::Config;
use stats_ingestion::health::{self, ProgressState};
use stats_ingestion::loader::{self, LoadOptions, DEFAULT_BATCH_SIZE};
use stats_ingestion::models::{League, NormalizedStatRecord, RunSummary, ShotRecord};
use stats_ingestion::orchestrator::{Orchestrator, PipelineTuning, RunObserver};
use stats_ingestion::provider::ProviderClient;
use stats_ingestion::report::RedisReporter;
use stats_ingestion::store::{MemoryStore, PgStore, RecordSink, StoredRecord, UpsertMode};
use stats_ingestion::writer::{WriterConfig, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_IN_FLIGHT};

const CONNECT_RETRIES: u32 = 5;

#[derive(Debug, Parser)]
#[command(name = "stats-ingestion", version, about = "Multi-league player statistics ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull provider events for every league × season and upsert player stat lines.
    Backfill(BackfillArgs),
    /// Stream a shot-level CSV into the shot table.
    Shots(ShotsArgs),
}

#[derive(Debug, Args)]
struct BackfillArgs {
    #[arg(long = "league", value_parser = parse_league, required = true, num_args = 1..)]
    leagues: Vec<League>,

    #[arg(long = "season", required = true, num_args = 1..)]
    seasons: Vec<String>,

    #[arg(long, default_value_t = 100)]
    page_size: u32,

    /// Delete each unit's existing rows before writing.
    #[arg(long)]
    replace: bool,

    /// Reject records whose teams have no known mapping.
    #[arg(long)]
    strict_teams: bool,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("source").required(true).args(["file", "url"])))]
struct ShotsArgs {
    #[arg(long)]
    file: Option<PathBuf>,

    #[arg(long)]
    url: Option<String>,

    /// Season stamped on every row; required for --replace.
    #[arg(long)]
    season: Option<String>,

    /// Stop after this many rows.
    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_positive)]
    batch_size: usize,

    #[arg(long)]
    replace: bool,

    #[command(flatten)]
    run: RunArgs,
}

/// Flags shared by both subcommands.
#[derive(Debug, Args)]
struct RunArgs {
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_parser = parse_positive)]
    chunk_size: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT, value_parser = parse_positive)]
    max_in_flight: usize,

    /// Keep stored rows on conflict instead of refreshing them.
    #[arg(long)]
    skip_existing: bool,

    /// Write to an in-memory store instead of Postgres.
    #[arg(long)]
    dry_run: bool,

    /// Serve GET /health on this port while the run is going.
    #[arg(long)]
    health_port: Option<u16>,
}

impl RunArgs {
    fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            chunk_size: self.chunk_size,
            max_in_flight: self.max_in_flight,
            mode: if self.skip_existing {
                UpsertMode::Ignore
            } else {
                UpsertMode::Refresh
            },
            ..WriterConfig::default()
        }
    }
}

fn parse_league(value: &str) -> Result<League, String> {
    League::from_code(value).ok_or_else(|| {
        let known: Vec<&str> = League::ALL.iter().map(League::as_str).collect();
        format!("unknown league '{}' (expected one of {})", value, known.join(", "))
    })
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "stats_ingestion=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    info!("Stats ingestion v{}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(summary) if summary.cancelled => {
            warn!("Run cancelled before all units finished");
            ExitCode::FAILURE
        }
        Ok(summary) if summary.has_failed_units() => {
            error!("{} units failed", summary.totals().failed_units);
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Setup failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<RunSummary> {
    let config = Config::from_env().context("Failed to load configuration")?;

    let cancel = CancelToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            signal_cancel.cancel();
        }
    });

    match cli.command {
        Command::Backfill(args) => backfill(&config, args, cancel).await,
        Command::Shots(args) => shots(&config, args, cancel).await,
    }
}

async fn backfill(config: &Config, args: BackfillArgs, cancel: CancelToken) -> Result<RunSummary> {
    let client = ProviderClient::new(
        config.provider_base_url.clone(),
        config.provider_api_key()?,
        config.requests_per_minute,
        args.page_size,
    )?;
    let store = open_store::<NormalizedStatRecord>(config, args.run.dry_run).await?;

    let tuning = PipelineTuning {
        writer: args.run.writer_config(),
        replace: args.replace,
        strict_teams: args.strict_teams,
        ..PipelineTuning::default()
    };
    let orchestrator = with_observers(Orchestrator::new(tuning, cancel), config, &args.run).await?;

    Ok(orchestrator
        .run_backfill(&client, store.as_ref(), &args.leagues, &args.seasons)
        .await)
}

async fn shots(config: &Config, args: ShotsArgs, cancel: CancelToken) -> Result<RunSummary> {
    let lines = match (&args.file, &args.url) {
        (Some(path), _) => {
            info!("Reading shots from {}", path.display());
            loader::file_lines(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?
        }
        (None, Some(url)) => {
            info!("Downloading shots from {}", url);
            let client = reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .context("Failed to create HTTP client")?;
            loader::url_lines(&client, url).await?
        }
        (None, None) => bail!("either --file or --url is required"),
    };
    if args.replace && args.season.is_none() {
        bail!("--replace needs --season");
    }
    let store = open_store::<ShotRecord>(config, args.run.dry_run).await?;

    let tuning = PipelineTuning {
        writer: args.run.writer_config(),
        replace: args.replace,
        ..PipelineTuning::default()
    };
    let orchestrator = with_observers(Orchestrator::new(tuning, cancel), config, &args.run).await?;
    let options = LoadOptions {
        batch_size: args.batch_size,
        limit: args.limit,
    };

    Ok(orchestrator
        .run_shots(lines, store.as_ref(), args.season, options)
        .await)
}

async fn open_store<R>(config: &Config, dry_run: bool) -> Result<Box<dyn RecordSink<R>>>
where
    R: StoredRecord,
    PgStore: RecordSink<R>,
{
    if dry_run {
        info!("Dry run: writing to the in-memory store");
        return Ok(Box::new(MemoryStore::<R>::new()));
    }
    let store = PgStore::connect(config.database_url()?, config.db_max_connections, CONNECT_RETRIES).await?;
    store.ensure_schema().await?;
    Ok(Box::new(store))
}

/// Health endpoint and Redis reporter. Redis being down only costs the reports.
async fn with_observers(mut orchestrator: Orchestrator, config: &Config, args: &RunArgs) -> Result<Orchestrator> {
    if let Some(port) = args.health_port {
        let progress = ProgressState::new();
        health::spawn_server(port, progress.clone()).await?;
        orchestrator = orchestrator.with_observer(Arc::new(progress) as Arc<dyn RunObserver>);
    }

    if let Some(url) = &config.redis_url {
        match RedisReporter::connect(url, CONNECT_RETRIES).await {
            Ok(reporter) => {
                orchestrator = orchestrator.with_observer(Arc::new(reporter) as Arc<dyn RunObserver>);
            }
            Err(e) => warn!("Run reports disabled: {}", e),
        }
    }
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn backfill_takes_many_leagues_and_seasons() {
        let cli = Cli::try_parse_from([
            "stats-ingestion",
            "backfill",
            "--league",
            "nfl",
            "NBA",
            "--season",
            "2023",
            "2024",
            "--replace",
            "--skip-existing",
        ])
        .unwrap();
        let Command::Backfill(args) = cli.command else {
            panic!("expected backfill");
        };
        assert_eq!(args.leagues, vec![League::Nfl, League::Nba]);
        assert_eq!(args.seasons, vec!["2023", "2024"]);
        assert_eq!(args.page_size, 100);
        assert!(args.replace);
        let writer = args.run.writer_config();
        assert_eq!(writer.mode, UpsertMode::Ignore);
        assert_eq!(writer.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn unknown_league_is_rejected() {
        let result = Cli::try_parse_from(["stats-ingestion", "backfill", "--league", "xfl", "--season", "2024"]);
        assert!(result.is_err());
    }

    #[test]
    fn shots_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["stats-ingestion", "shots"]).is_err());
        assert!(Cli::try_parse_from([
            "stats-ingestion",
            "shots",
            "--file",
            "shots.csv",
            "--url",
            "https://example.com/shots.csv",
        ])
        .is_err());

        let cli = Cli::try_parse_from(["stats-ingestion", "shots", "--file", "shots.csv", "--limit", "500"]).unwrap();
        let Command::Shots(args) = cli.command else {
            panic!("expected shots");
        };
        assert_eq!(args.limit, Some(500));
        assert_eq!(args.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(args.run.writer_config().mode, UpsertMode::Refresh);
    }

    #[test]
    fn zero_sizes_are_rejected() {
        assert!(Cli::try_parse_from(["stats-ingestion", "shots", "--file", "s.csv", "--batch-size", "0"]).is_err());
        assert!(Cli::try_parse_from([
            "stats-ingestion",
            "backfill",
            "--league",
            "nhl",
            "--season",
            "2024",
            "--chunk-size",
            "0",
        ])
        .is_err());
    }
}
