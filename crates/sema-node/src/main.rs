mod cli;

use clap::Parser;
use cli::{
    default_data_dir, handle_identity, init_logging, init_node, run_checks, run_simulation,
    show_version, Cli, Commands,
};
use sema_node::{LoggingConfig, NodeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config_path = cli.config.clone().unwrap_or_else(|| data_dir.join("config.toml"));

    let loaded = NodeConfig::load(&config_path).map(|mut config| {
        if cli.data_dir.is_some() {
            config.data_dir = data_dir.clone();
        }
        config
    });
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    init_logging(&cli, &logging)?;

    match cli.command {
        Commands::Init { force } => {
            init_node(&config_path, &data_dir, force)?;
        }
        Commands::Identity { action } => {
            handle_identity(action, &loaded?, cli.format)?;
        }
        Commands::Check => {
            run_checks(&config_path, loaded)?;
        }
        Commands::Simulate { members, prove_index, signal, context } => {
            run_simulation(&loaded?, members, prove_index, &signal, &context, cli.format).await?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}
