mod report;
mod seed;
mod simulate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "aeodb-cli")]
#[command(about = "AEODB command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations.
    Migrate,
    /// Create a company with its products, competitors, ICPs, and personas
    /// from a setup YAML file.
    Seed {
        /// Path to the setup YAML file.
        #[arg(long, env = "AEODB_SEED_PATH", default_value = "./config/setup.yaml")]
        file: PathBuf,
        /// Account the company belongs to.
        #[arg(long)]
        account: i64,
        /// Validate the file without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Insert plausible demo response records for a company.
    Simulate {
        #[arg(long)]
        company: i64,
        /// Number of generation batches.
        #[arg(long, default_value_t = 4)]
        batches: u32,
        /// Responses per batch.
        #[arg(long, default_value_t = 25)]
        per_batch: u32,
        /// Spread the batches over the last N days.
        #[arg(long, default_value_t = 28)]
        days: u32,
        /// RNG seed for reproducible output.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print per-segment metrics and period-over-period deltas.
    Report {
        #[arg(long)]
        company: i64,
        /// Time bucketing: batch, week, or month.
        #[arg(long, default_value = "week")]
        granularity: String,
        /// Look back over the last N days.
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Migrate => {
            let pool = aeodb_db::connect_pool_from_env().await?;
            let applied = aeodb_db::run_migrations(&pool).await?;
            println!("applied {applied} new migrations");
        }
        Commands::Seed {
            file,
            account,
            dry_run,
        } => seed::run(&file, account, dry_run).await?,
        Commands::Simulate {
            company,
            batches,
            per_batch,
            days,
            seed,
        } => simulate::run(company, batches, per_batch, days, seed).await?,
        Commands::Report {
            company,
            granularity,
            days,
        } => report::run(company, &granularity, days).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_file_defaults_to_the_config_path() {
        let cli = Cli::parse_from(["aeodb-cli", "seed", "--account", "7"]);
        match cli.command {
            Commands::Seed {
                file,
                account,
                dry_run,
            } => {
                assert_eq!(file, PathBuf::from("./config/setup.yaml"));
                assert_eq!(account, 7);
                assert!(!dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn simulate_defaults_cover_a_month_of_batches() {
        let cli = Cli::parse_from(["aeodb-cli", "simulate", "--company", "3"]);
        match cli.command {
            Commands::Simulate {
                company,
                batches,
                per_batch,
                days,
                seed,
            } => {
                assert_eq!(company, 3);
                assert_eq!(batches, 4);
                assert_eq!(per_batch, 25);
                assert_eq!(days, 28);
                assert_eq!(seed, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
