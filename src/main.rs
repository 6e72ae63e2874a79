use clap::Parser;
use std::process::ExitCode;

use parascope::cli::args::{Cli, Commands};
use parascope::cli::{daemon, detect, health, records};
use parascope::error::exit_codes;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> parascope::Result<()> {
    match cli.command {
        Commands::Daemon { action } => daemon::daemon(action).await,
        Commands::Detect { action } => detect::detect(action, cli.json).await,
        Commands::Frame { file } => detect::frame(&file, cli.json).await,
        Commands::Test { action } => records::test(action, cli.json).await,
        Commands::Image { action } => records::image(action, cli.json).await,
        Commands::Health => health::health(cli.json).await,
    }
}
