use agentdash::cli::{self, Cli};
use agentdash::config::Config;
use agentdash::logging;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging);

    cli::run(cli, config).await
}
