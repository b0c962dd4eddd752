//! Shift Relay - Main entry point
//!
//! Chat bot and result consumer for the schedule solver.

use anyhow::Result;
use clap::{Parser, Subcommand};
use shift_relay::envelope::RequesterId;
use shift_relay::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shift-relay")]
#[command(about = "Relay between the scheduling chat bot and the schedule solver")]
struct Cli {
    /// YAML config file (defaults to ./config.yaml when present)
    #[arg(short, long, global = true, env = "SHIFT_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chat bot and the result consumer until Ctrl-C
    Serve,

    /// Publish one reschedule request on behalf of a chat
    Submit {
        /// Chat id that will receive the new schedule
        #[arg(short, long, allow_negative_numbers = true)]
        requester: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,shift_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => shift_relay::start_relay(config).await,
        Commands::Submit { requester } => {
            let request_id = shift_relay::submit_request(config, RequesterId(requester)).await?;
            tracing::info!(request_id = %request_id, requester, "Request submitted");
            println!("{}", request_id);
            Ok(())
        }
    }
}
