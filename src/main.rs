use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use footy_ingest::config::{Config, DEFAULT_CONFIG_PATH};
use footy_ingest::constants::MIN_YEAR;
use footy_ingest::infra::ReqwestFetcher;
use footy_ingest::logging;
use footy_ingest::pipeline::{IngestionPipeline, StageOutcome, StopReason};
use footy_ingest::storage::{Sink, SqliteSink};
use footy_ingest::types::RoundRef;

#[derive(Parser)]
#[command(name = "footy_ingest")]
#[command(about = "Round-by-round harvester for football scores, ladders and odds")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "FOOTY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every round from the start date up to the end date
    Run {
        /// First date to consider (defaults to the start of the earliest season)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Stop once rounds are expected on or after this date (defaults to today)
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },
    /// Print the round a run starting at DATE would begin with
    Cursor {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show which stages of a round are complete
    Status {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        round: u32,
    },
}

fn open_pipeline(config: &Config) -> anyhow::Result<IngestionPipeline> {
    let fetcher = ReqwestFetcher::new(&config.http).context("building HTTP client")?;
    let db_path = config.database_path();
    let sink = SqliteSink::open(&db_path).with_context(|| format!("opening sink at {}", db_path.display()))?;
    Ok(IngestionPipeline::new(config, Arc::new(fetcher), Box::new(sink)))
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::load(&cli.config).with_context(|| format!("loading {}", cli.config.display()))?;
    let _log_guard = logging::init_logging(&config.log_dir);

    let today = Local::now().date_naive();
    let mut pipeline = open_pipeline(&config)?;

    match cli.command {
        Commands::Run { start_date, end_date } => {
            let start = match start_date {
                Some(d) => d,
                None => NaiveDate::from_ymd_opt(MIN_YEAR, 1, 1).context("invalid default start date")?,
            };
            let end = end_date.unwrap_or(today);
            info!(%start, %end, "running ingestion");

            let summary = pipeline.run(start, end)?;
            println!("\n📊 Ingestion results:");
            for report in &summary.reports {
                let staged: usize = report
                    .outcomes
                    .iter()
                    .filter_map(|(_, o)| match o {
                        StageOutcome::Completed { rows, .. } => Some(*rows),
                        _ => None,
                    })
                    .sum();
                println!("   {}: {} rows written{}", report.round, staged, if report.all_skipped() { " (already complete)" } else { "" });
            }
            for (round, reason) in &summary.failed {
                error!(%round, %reason, "round failed");
                println!("   {round}: failed: {reason}");
            }
            match summary.stop {
                StopReason::Horizon => println!("✅ Reached {end}"),
                StopReason::Pending(r) => println!("⏸  Stopped at {r}: scores not published yet"),
                StopReason::NoEstimate(r) => println!("⏸  Stopped at {r}: no stored kickoffs to date it from"),
                StopReason::BeyondEndSeason(r) => println!("⏸  Stopped at {r}: season starts after {end}"),
            }
        }
        Commands::Cursor { date } => {
            let date = date.unwrap_or(today);
            let round = pipeline.starting_round(date)?;
            println!("{round}");
        }
        Commands::Status { year, round } => {
            let round = RoundRef::new(year, round);
            for (key, done) in pipeline.round_status(round)? {
                println!("{:<24} {}", key.to_string(), if done { "done" } else { "missing" });
            }
            let logged: Vec<_> = pipeline
                .sink()
                .stage_log()?
                .into_iter()
                .filter(|entry| entry.round == round)
                .collect();
            for entry in logged {
                println!("{} persisted {} rows at {}", entry.kind, entry.row_count, entry.completed_at);
            }
        }
    }
    Ok(())
}
