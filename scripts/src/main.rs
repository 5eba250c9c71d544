use clap::Parser;
use scripts::{cli::Cli, config::ProjectConfig, errors::ScriptError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ScriptError> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .pretty()
        .init();

    let config = ProjectConfig::load(&cli.config)?;
    cli.run(config).await
}
