//! hivesync: command-line entry point.
//!
//! Reads `hivesync.toml` (or `--config`), picks the PostgreSQL store when
//! `DATABASE_URL` is set and the in-memory store otherwise, and attaches the
//! Hive gateway when `[hive] enabled = true`.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;

use hivesync_service::assessment::{self, AssessError, BenchmarkRunner, catalog};
use hivesync_service::config::{Config, ConfigError, DEFAULT_CONFIG_FILE};
use hivesync_service::generate::{self, GenerateError, GenerateOptions, SizePreset};
use hivesync_service::logging::{self, LogSource};
use hivesync_service::model::{Scenario, SourceError, StoreError};
use hivesync_service::source::QuerySource;
use hivesync_service::source::gateway::HiveGateway;
use hivesync_service::store::{MemoryStore, PgStore, Store};
use hivesync_service::sync::{DataSyncService, SyncError};

#[derive(Parser)]
#[command(name = "hivesync")]
#[command(about = "Climate data sync and Hive performance assessment")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pull regions, stations and observations from Hive
    Sync(SyncArgs),
    /// Load the CSV exports into the store
    LoadSample(LoadSampleArgs),
    /// Write synthetic station and observation CSVs
    Generate(GenerateArgs),
    /// Benchmark scenarios and manage recommendations
    #[command(subcommand)]
    Assess(AssessCommand),
    /// Show store counts and the last import
    Status,
}

#[derive(Args)]
struct SyncArgs {
    /// Regions, stations and observations (default when nothing is selected)
    #[arg(long)]
    full: bool,
    #[arg(long)]
    regions: bool,
    #[arg(long)]
    stations: bool,
    #[arg(long)]
    observations: bool,
    /// Maximum observations to pull
    #[arg(long)]
    limit: Option<usize>,
    /// Earliest observation date (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,
    /// Latest observation date (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,
    /// Only check that the gateway answers
    #[arg(long)]
    test_connection: bool,
}

#[derive(Args)]
struct LoadSampleArgs {
    /// Directory holding the CSV files (overrides [csv] data_dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Maximum observation rows to read
    #[arg(long)]
    limit: Option<usize>,
    #[arg(long, conflicts_with = "observations_only")]
    stations_only: bool,
    #[arg(long)]
    observations_only: bool,
    /// Delete stored stations and observations first
    #[arg(long)]
    clear: bool,
}

#[derive(Args)]
struct GenerateArgs {
    /// small, medium, large or xlarge
    #[arg(long, default_value = "large")]
    size: SizePreset,
    /// Approximate number of observations
    #[arg(long)]
    rows: Option<usize>,
    /// Output directory (defaults to [csv] data_dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AssessCommand {
    /// Run one scenario
    Run {
        /// Scenario id or name
        #[arg(long)]
        scenario: String,
        /// Records processed, for reporting
        #[arg(long)]
        records: Option<i64>,
        /// Draw timings instead of querying Hive
        #[arg(long)]
        simulate: bool,
    },
    /// Benchmark detail with metrics and recommendations
    Show {
        #[arg(long)]
        benchmark: i64,
    },
    /// List active scenarios
    Scenarios,
    /// Insert the default scenario catalog
    LoadScenarios,
    /// List recommendations, newest first
    Recommendations {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Mark a recommendation as applied
    Apply {
        #[arg(long)]
        id: i64,
    },
    /// Recent benchmarks grouped by scenario
    History,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Assess(#[from] AssessError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logger(level, config.logging.file.as_deref(), config.logging.timestamps);

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(LogSource::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_store(config: &Config) -> Result<Box<dyn Store>, CliError> {
    match &config.store.database_url {
        Some(url) => Ok(Box::new(PgStore::connect(url)?)),
        None => {
            logging::warn(LogSource::Store, None, "DATABASE_URL not set, using in-memory store (nothing persists)");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}

fn open_gateway(config: &Config) -> Result<Option<HiveGateway>, CliError> {
    if config.hive.enabled {
        Ok(Some(HiveGateway::new(&config.hive)?))
    } else {
        Ok(None)
    }
}

fn run(command: Command, config: &Config) -> Result<(), CliError> {
    match command {
        Command::Generate(args) => {
            let options = GenerateOptions {
                size: args.size,
                rows: args.rows,
                output_dir: args.output_dir.unwrap_or_else(|| config.csv.data_dir.clone()),
            };
            let report = generate::generate(&mut StdRng::from_entropy(), &options)?;
            print_json(&report)
        }
        Command::Sync(args) => run_sync(args, config),
        Command::LoadSample(args) => run_load_sample(args, config),
        Command::Assess(cmd) => run_assess(cmd, config),
        Command::Status => {
            let mut store = open_store(config)?;
            let mut gateway = open_gateway(config)?;
            let mut service = DataSyncService::new(&mut *store, &config.sync);
            if let Some(gateway) = gateway.as_mut() {
                service = service.with_source(gateway);
            }
            print_json(&service.status()?)
        }
    }
}

fn run_sync(args: SyncArgs, config: &Config) -> Result<(), CliError> {
    let mut gateway = open_gateway(config)?.ok_or(SyncError::NoSource)?;

    if args.test_connection {
        let ok = gateway.test_connection();
        println!("{}: {}", gateway.describe(), if ok { "connected" } else { "unreachable" });
        return Ok(());
    }

    let mut store = open_store(config)?;
    let mut service = DataSyncService::new(&mut *store, &config.sync).with_source(&mut gateway);

    let partial = args.regions || args.stations || args.observations;
    if args.full || !partial {
        return print_json(&service.full_sync(args.limit)?);
    }

    if args.regions {
        service.sync_regions()?;
    }
    if args.stations {
        service.sync_stations()?;
    }
    if args.observations {
        service.sync_observations(args.start_date, args.end_date, args.limit)?;
    }
    print_json(&service.status()?)
}

fn run_load_sample(args: LoadSampleArgs, config: &Config) -> Result<(), CliError> {
    let mut store = open_store(config)?;
    if args.clear {
        logging::warn(LogSource::Store, None, "clearing stored stations and observations");
        store.clear_climate_data()?;
    }

    let data_dir = args.data_dir.as_deref();
    let stations = config.csv.stations_path(data_dir);
    let observations = config.csv.observations_path(data_dir);

    let mut service = DataSyncService::new(&mut *store, &config.sync);
    let report = service.load_from_csv(
        (!args.observations_only).then_some(stations.as_path()),
        (!args.stations_only).then_some(observations.as_path()),
        args.limit,
    )?;
    print_json(&report)
}

/// By numeric id first, then by name.
fn resolve_scenario(store: &mut dyn Store, key: &str) -> Result<Scenario, CliError> {
    if let Ok(id) = key.parse::<i64>() {
        if let Some(scenario) = store.find_scenario(id)? {
            return Ok(scenario);
        }
    }
    store
        .find_scenario_by_name(key)?
        .ok_or_else(|| AssessError::ScenarioNotFound(key.to_string()).into())
}

fn run_assess(cmd: AssessCommand, config: &Config) -> Result<(), CliError> {
    let mut store = open_store(config)?;
    let table = config.sync.observations_table.as_str();
    let record_count = config.assessment.default_record_count;

    match cmd {
        AssessCommand::Run { scenario, records, simulate } => {
            if store.list_scenarios(false)?.is_empty() {
                logging::info(LogSource::Bench, None, "no scenarios stored, loading the default catalog");
                catalog::load_default_scenarios(&mut *store, table, record_count)?;
            }
            let scenario = resolve_scenario(&mut *store, &scenario)?;

            let mut gateway = if simulate { None } else { open_gateway(config)? };
            let mut runner = BenchmarkRunner::new(&mut *store, StdRng::from_entropy())
                .with_max_duration(config.assessment.max_duration_secs);
            if let Some(gateway) = gateway.as_mut() {
                runner = runner.with_source(gateway);
            }
            let outcome = runner.run(scenario.id, records, simulate)?;
            print_json(&outcome)
        }
        AssessCommand::Show { benchmark } => print_json(&assessment::benchmark_report(&mut *store, benchmark)?),
        AssessCommand::Scenarios => {
            for scenario in store.list_scenarios(true)? {
                println!(
                    "{:>4}  {:<14} {:<14} {}",
                    scenario.id, scenario.name, scenario.category.as_str(), scenario.description
                );
            }
            Ok(())
        }
        AssessCommand::LoadScenarios => {
            let (created, existing) = catalog::load_default_scenarios(&mut *store, table, record_count)?;
            println!("{} scenarios created, {} already present", created, existing);
            Ok(())
        }
        AssessCommand::Recommendations { limit } => {
            print_json(&assessment::list_recommendations(&mut *store, limit)?)
        }
        AssessCommand::Apply { id } => {
            assessment::apply_recommendation(&mut *store, id)?;
            println!("recommendation {} marked as applied", id);
            Ok(())
        }
        AssessCommand::History => print_json(&assessment::benchmark_history(&mut *store)?),
    }
}
