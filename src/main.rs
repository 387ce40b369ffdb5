use std::path::PathBuf;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use tracing_subscriber::EnvFilter;

use presence_risk::models::TraceWarningPackage;
use presence_risk::{
    db, parameters, report, CheckinRiskCalculation, CheckinRiskCalculationResult, CheckinSplitter,
    CheckinStore, InMemoryEventStore, RiskCalculationParameters,
};

#[derive(Parser)]
#[command(name = "presence-risk")]
#[command(about = "Checkin based presence-tracing risk calculation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CalculationArgs {
    /// Reference time as RFC 3339; defaults to the current time
    #[arg(long)]
    now: Option<DateTime<Utc>>,
    /// JSON file with risk calculation parameters
    #[arg(long)]
    params: Option<PathBuf>,
    /// Offset of the calendar used for day boundaries
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    utc_offset_minutes: i32,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo checkins and a matching warning package
    Seed,
    /// Import checkins from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Match a warning package against stored checkins
    IngestPackage {
        #[arg(long)]
        json: PathBuf,
    },
    /// Flag checkins as submitted so they no longer contribute risk
    MarkSubmitted {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Calculate checkin risk
    Calculate {
        #[command(flatten)]
        calculation: CalculationArgs,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        calculation: CalculationArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn calculate(
    pool: &PgPool,
    args: &CalculationArgs,
) -> anyhow::Result<(CheckinRiskCalculationResult, InMemoryEventStore)> {
    let parameters = match &args.params {
        Some(path) => parameters::load_parameters(path)
            .with_context(|| format!("failed to load parameters from {}", path.display()))?,
        None => RiskCalculationParameters::default(),
    };
    let offset = FixedOffset::east_opt(args.utc_offset_minutes.saturating_mul(60))
        .context("utc offset must be within +/- 24 hours")?;
    let now = args.now.unwrap_or_else(Utc::now);

    let store = db::load_snapshot(pool).await?;
    let calculation = CheckinRiskCalculation::new(&store, CheckinSplitter::new(offset));
    let result = calculation.calculate_risk(&parameters, now);
    info!(
        risk_level = result.risk_level().as_str(),
        days = result.risk_level_per_date.len(),
        "risk calculation finished"
    );

    Ok((result, store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let pool = connect().await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} checkins from {}.", csv.display());
        }
        Commands::IngestPackage { json } => {
            let raw = std::fs::read_to_string(&json)
                .with_context(|| format!("failed to read {}", json.display()))?;
            let package: TraceWarningPackage =
                serde_json::from_str(&raw).context("invalid warning package")?;
            let inserted = db::ingest_package(&pool, &package).await?;
            println!("Stored {inserted} new matches from package {}.", package.id);
        }
        Commands::MarkSubmitted { ids } => {
            let updated = db::mark_submitted(&pool, &ids).await?;
            println!("Marked {updated} checkins as submitted.");
        }
        Commands::Calculate { calculation, json } => {
            let (result, _) = calculate(&pool, &calculation).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            if result.checkin_ids_with_risk_per_date.is_empty() {
                println!("No checkin risk found.");
                return Ok(());
            }

            println!("Overall risk: {}", result.risk_level().as_str());
            for (date, risk_level) in result.risk_level_per_date.iter().rev() {
                println!("- {} {}", date, risk_level.as_str());
            }
            for (date, entries) in result.checkin_ids_with_risk_per_date.iter().rev() {
                for entry in entries {
                    println!(
                        "- {} checkin #{} {}",
                        date,
                        entry.checkin_id,
                        entry.risk_level.as_str()
                    );
                }
            }
        }
        Commands::Report { calculation, out } => {
            let (result, store) = calculate(&pool, &calculation).await?;
            let report = report::build_report(&result, &store.checkins());
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
