mod cli;
mod error;
mod routes;
mod state;

use anyhow::Result;
use clap::Parser;
use cli::Cli;

const DEFAULT_FILTER: &str = "nw_server=info,nw_core=info,nw_train=info";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
