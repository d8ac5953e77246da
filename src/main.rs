mod cli;
mod server;

use clap::Parser;
use cli::{Cli, Commands};
use crawlbox::config::Config;
use crawlbox::observability;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    observability::init_tracing(config.telemetry.log_format);

    match cli.command {
        Commands::Fetcher(args) => {
            if let Some(concurrency) = args.concurrency {
                config.worker.concurrency = concurrency.get();
            }
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            server::run_fetcher(config).await?
        }
        Commands::Fetch { target } => server::enqueue(&config, target.jobs()).await?,
    }

    Ok(())
}
