//! Definitions of CLI arguments and commands for deploy scripts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use crate::{
    artifacts::Artifact,
    chain::InitializationCheck,
    commands::{compile, connect, status, upsert_liquidation, LiquidationArtifacts},
    config::ProjectConfig,
    constants::{DEFAULT_CONFIG_PATH, LOGIC_CONTRACT_NAME},
    deployments::DeploymentStore,
    errors::ScriptError,
};

/// Deploy and configure the NFT liquidation contracts
#[derive(Parser)]
pub struct Cli {
    /// Name of the network to target, as configured in the config file
    #[arg(short, long, env = "NETWORK")]
    pub network: Option<String>,

    /// Path to the project config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Path to the deployments file, overriding the config file
    #[arg(short, long)]
    pub deployments: Option<PathBuf>,

    /// Network RPC URL, overriding the network's configured URL
    #[arg(short, long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Private key of the deployer
    #[arg(short, long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub priv_key: Option<String>,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The deploy script commands
#[derive(Subcommand)]
pub enum Command {
    /// Deploy the liquidation contracts, or bring an existing deployment up
    /// to date
    Deploy,
    /// Print the recorded deployments and on-chain configuration
    Status,
    /// Compile the Solidity sources into artifacts
    Compile(CompileArgs),
}

/// Compile the Solidity sources
#[derive(Args)]
pub struct CompileArgs {
    /// Directory of Solidity sources, overriding the config file
    #[arg(long)]
    pub sources: Option<PathBuf>,

    /// Directory to write artifacts to, overriding the config file
    #[arg(long)]
    pub artifacts: Option<PathBuf>,
}

impl Cli {
    /// Run the selected command against the given project config
    pub async fn run(self, mut config: ProjectConfig) -> Result<(), ScriptError> {
        if let Some(deployments) = self.deployments {
            config.paths.deployments = deployments;
        }
        let network_name = self
            .network
            .unwrap_or_else(|| config.default_network.clone());

        match self.command {
            Command::Compile(args) => {
                if let Some(sources) = args.sources {
                    config.paths.sources = sources;
                }
                if let Some(artifacts) = args.artifacts {
                    config.paths.artifacts = artifacts;
                }
                compile(&config).map(|_| ())
            }
            Command::Deploy => {
                let network = config.network(&network_name)?;
                let artifacts = LiquidationArtifacts::load(&config.paths.artifacts)?;
                let mut store = DeploymentStore::open(&config.paths.deployments)?;

                let chain =
                    connect(network, self.rpc_url.as_deref(), self.priv_key.as_deref()).await?;
                let report =
                    upsert_liquidation(&chain, &mut store, &network_name, network, &artifacts)
                        .await?;

                store.save()?;
                for tx in &report.transactions {
                    info!("{}: {:#x}", tx.action, tx.tx_hash);
                }
                Ok(())
            }
            Command::Status => {
                let network = config.network(&network_name)?;
                let store = DeploymentStore::open(&config.paths.deployments)?;
                let check = match Artifact::load(&config.paths.artifacts, LOGIC_CONTRACT_NAME) {
                    Ok(logic) => InitializationCheck::for_logic(&logic),
                    Err(e) => {
                        debug!("reading initialization from comptroller(): {e}");
                        InitializationCheck::default()
                    }
                };

                let chain =
                    connect(network, self.rpc_url.as_deref(), self.priv_key.as_deref()).await?;
                status(&chain, &store, &network_name, network, check)
                    .await
                    .map(|_| ())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compile_overrides() {
        let cli = Cli::try_parse_from([
            "nft-liquidation-deploy",
            "--network",
            "goerli",
            "compile",
            "--sources",
            "src/contracts",
        ])
        .unwrap();

        assert_eq!(cli.network.as_deref(), Some("goerli"));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        match cli.command {
            Command::Compile(args) => {
                assert_eq!(args.sources, Some(PathBuf::from("src/contracts")));
                assert_eq!(args.artifacts, None);
            }
            _ => panic!("expected compile"),
        }
    }

    #[tokio::test]
    async fn test_unknown_network_is_rejected() {
        let cli = Cli::try_parse_from(["nft-liquidation-deploy", "--network", "nowhere", "deploy"])
            .unwrap();
        let res = cli.run(ProjectConfig::default()).await;
        assert!(matches!(res, Err(ScriptError::Config(_))));
    }
}
