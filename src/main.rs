// Contribution ledger node - CLI

use clap::Parser;
use fund_ledger::{Cli, CliHandler};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.overrides.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    let mut handler = match CliHandler::new(config).await {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Error initializing: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = handler.handle(cli.command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
