//! relsync CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "relsync")]
#[command(about = "Sync upstream release tags and schedule build jobs", long_about = None)]
struct Cli {
    /// Path to the sync configuration (defaults to ./relsync.kdl when present)
    #[arg(long, env = "RELSYNC_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync a package's releases and schedule build jobs
    Sync {
        /// Package name
        name: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// List known packages
    List,
    /// Validate a package definition
    Validate {
        /// Package name
        name: String,
    },
    /// Show the release records of a package
    Releases {
        /// Package name
        name: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Apply database migrations
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync { name, database_url } => {
            commands::sync::sync(&config, &database_url, &name).await?;
        }
        Commands::List => {
            commands::list(&config).await?;
        }
        Commands::Validate { name } => {
            commands::validate(&config, &name).await?;
        }
        Commands::Releases { name, database_url } => {
            commands::releases(&database_url, &name, cli.json).await?;
        }
        Commands::Migrate { database_url } => {
            commands::migrate(&database_url).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
