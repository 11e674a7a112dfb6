mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use mammothbox::{api, catalog, config::Config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            let config = load_config(args.config)?;
            api::run(config).await?;
        }
        Commands::Migrate => {
            let config = load_config(None)?;
            let pool = catalog::connect(&config.catalog.database_url, config.catalog.max_connections, config.catalog.min_connections).await?;
            catalog::migrate(&pool).await?;
            tracing::info!("migrations applied");
        }
    }

    Ok(())
}

fn load_config(path: Option<std::path::PathBuf>) -> Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    match path {
        Some(path) => Ok(Config::load_from_path(path)?),
        None => Ok(Config::load()?),
    }
}
