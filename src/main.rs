use anyhow::Context;
use clap::Parser;
use crisma_admin::commands::Cli;
use crisma_admin::{handlers, init_tracing, AppConfig, AppContext, SecretVault};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let vault = SecretVault::new(config.vault_service.clone());
    let mut ctx = AppContext::init(config, vault).context("failed to restore the session")?;
    handlers::dispatch(cli, &mut ctx)
        .await
        .map_err(|err| anyhow::anyhow!(err.display_message()))
}
