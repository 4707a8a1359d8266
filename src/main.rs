//! # Main — CLI Entry Point
//!
//! - `serve`: HTTP API plus the scheduled job loops
//! - `sweep-payments`, `generate-brackets`: run one job once, under its
//!   lease, and print the report as JSON
//! - `migrate`: apply the bundled schema
//!
//! Configuration comes from flags, the environment and `.env` (see
//! [`arenadesk::config`]).

use anyhow::Result;
use arenadesk::config::Config;
use arenadesk::jobs::Job;
use arenadesk::{auth, db, prom_metrics, server};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "arenadesk",
    version,
    about = "Tournament registration API and scheduled reconciliation jobs"
)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and run the scheduled jobs
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Expire stale payment orders once
    SweepPayments,
    /// Generate brackets for closed tournaments once
    GenerateBrackets,
    /// Apply the database schema
    Migrate,
}

fn init_tracing() {
    // LOG_FORMAT=json for log shippers, human-readable otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Commands::Serve { port } => {
            config.check_auth()?;
            auth::init(config.auth());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(server::run(&config, port))
        }
        Commands::SweepPayments => run_job_once(&config, Job::PaymentSweep),
        Commands::GenerateBrackets => {
            // Fail before connecting when the provider cannot be reached anyway.
            config.bracket_api_key()?;
            run_job_once(&config, Job::BracketGeneration)
        }
        Commands::Migrate => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let database = db::Database::connect(config.database_url()?).await?;
                database.migrate().await?;
                info!("schema applied");
                Ok::<(), anyhow::Error>(())
            })
        }
    }
}

fn run_job_once(config: &Config, job: Job) -> Result<()> {
    let database_url = config.database_url()?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let database = db::Database::connect(database_url).await?;
        let metrics = Arc::new(prom_metrics::Metrics::new());
        let runner = server::build_job_runner(database, config, metrics)?;
        match runner.run(job).await? {
            Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            None => info!(job = %job, "job is already running elsewhere, nothing to do"),
        }
        Ok::<(), anyhow::Error>(())
    })
}
