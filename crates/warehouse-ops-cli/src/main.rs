//! warehouse-ops CLI - scheduler entry points for the warehouse
//! maintenance jobs. Each subcommand runs one job to completion; cron (or
//! an equivalent scheduler) owns the cadence and single-flighting.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, Level};
use uuid::Uuid;
use warehouse_ops::catalog::CatalogIntrospector;
use warehouse_ops::{
    syncer, ColumnExtractor, Config, OpsError, SchemaReconciler, TableSyncer, WarehousePool,
};

#[derive(Parser)]
#[command(name = "warehouse-ops")]
#[command(about = "Warehouse schema reconciliation, column extraction, and system table sync")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Output the run summary as JSON to stdout (sync only)
    #[arg(long)]
    output_json: bool,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the live schema against the declarative table spec
    Reconcile {
        /// Override the spec file path from the config
        #[arg(long)]
        spec_file: Option<PathBuf>,
    },

    /// Extract payload columns from one intake table
    Extract {
        /// Intake table to process, e.g. unextracted_production
        source_table: String,
    },

    /// Incrementally sync system tables into the target schema
    Sync {
        /// Override the sync tables file path from the config
        #[arg(long)]
        tables_file: Option<PathBuf>,
    },

    /// List non-system schemas and their extracted tables
    SchemaMap,

    /// Test the warehouse connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), OpsError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| OpsError::Config(e.to_string()))?;

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let run_id = Uuid::new_v4();
    let pool = WarehousePool::connect(&config.warehouse).await?;

    match cli.command {
        Commands::Reconcile { spec_file } => {
            if let Some(path) = spec_file {
                config.reconciler.spec_file = path;
            }
            info!(job = "SchemaReconciler", run_id = %run_id, "Starting run");
            SchemaReconciler::new(pool, &config.reconciler).run().await?;
        }

        Commands::Extract { source_table } => {
            info!(
                job = "ColumnExtractor",
                run_id = %run_id,
                source_table = %source_table,
                "Starting run"
            );
            ColumnExtractor::new(pool, &config.extractor)?
                .extract(&source_table)
                .await?;
        }

        Commands::Sync { tables_file } => {
            if let Some(path) = tables_file {
                config.syncer.tables_file = path;
            }
            info!(job = "TableSyncer", run_id = %run_id, "Starting run");
            let tables = syncer::load_sync_tables(&config.syncer.tables_file)?;
            let summary = TableSyncer::new(pool, &config.syncer)
                .sync_all(&tables)
                .await?;
            info!(
                job = "TableSyncer",
                run_id = %run_id,
                synced = summary.synced,
                no_new_rows = summary.no_new_rows,
                failed = summary.failed.len(),
                "Sync run finished"
            );
            if cli.output_json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary)
                        .map_err(|e| OpsError::Config(e.to_string()))?
                );
            }
            if summary.has_failures() {
                return Err(OpsError::Sync {
                    table: summary.failed.join(", "),
                    message: "one or more tables failed to sync".to_string(),
                });
            }
        }

        Commands::SchemaMap => {
            let client = pool.client().await?;
            let introspector = CatalogIntrospector::new(&client, pool.dialect());
            for (schema, tables) in introspector.schema_table_map().await? {
                println!("{}: {}", schema, tables.join(", "));
            }
        }

        Commands::HealthCheck => {
            println!("Warehouse connection OK ({:?})", pool.dialect());
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
