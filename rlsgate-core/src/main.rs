use clap::Parser;
use rlsgate_core::cli::{self, Cli, Command};
use rlsgate_core::flags::FeatureFlagStore;
use rlsgate_core::{config::Config, server, telemetry};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = Config::from_env()?;
            let metrics_handle = telemetry::init(&config.telemetry);

            info!("Starting RLS gate");
            info!("HTTP server listening on {}", config.http_addr());

            server::run(config, metrics_handle).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::RenderPolicy(args) => {
            println!("{}", args.render());
            Ok(ExitCode::SUCCESS)
        }
        Command::ValidateFlags => match cli::validate_flags(&FeatureFlagStore::from_env()) {
            Ok(report) => {
                print!("{}", report);
                Ok(ExitCode::SUCCESS)
            }
            Err(report) => {
                eprint!("{}", report);
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
