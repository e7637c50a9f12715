mod runs;
mod sync;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gscdb-cli")]
#[command(about = "Search analytics sync command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one sync now and print its summary
    Sync {
        /// Days to fetch, ending at the newest day the API has finished ingesting
        #[arg(long, conflicts_with = "initial")]
        days: Option<u32>,
        /// Backfill using the initial sync window
        #[arg(long)]
        initial: bool,
    },
    /// Apply pending database migrations
    Migrate,
    /// List recent sync runs, newest first
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("gscdb-cli: run with --help to list commands");
        return Ok(());
    };

    let config = gscdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = gscdb_db::PoolConfig::from_app_config(&config);
    let pool = gscdb_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Sync { days, initial } => {
            gscdb_db::run_migrations(&pool).await?;
            let days = sync::resolve_days(days, initial, &config);
            sync::run_sync(pool, &config, days).await
        }
        Commands::Migrate => {
            let applied = gscdb_db::run_migrations(&pool).await?;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Commands::Runs { limit } => runs::list_runs(&pool, limit).await,
    }
}
