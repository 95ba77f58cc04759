// In app/src/main.rs

use anyhow::{Context, Result};
use api_client::{BridgeClient, VenueBridge};
use app_config::Settings;
use clap::{Parser, Subcommand};
use core_types::Login;
use database::Store;
use engine::Engine;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "Trade event reconciliation and risk evaluation engine.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the event worker, the drawdown sweep and the daily reset.
    Run,

    /// Runs a single drawdown sweep and exits.
    Sweep,

    /// Re-bases start-of-day equity for every active account and exits.
    DailyReset,

    /// Sets a breached or disabled account back to active and re-enables it on the bridge.
    Reinstate {
        #[arg(short, long)]
        login: i64,
    },

    /// Credits or debits an account's balance on the bridge.
    AdjustBalance {
        #[arg(short, long)]
        login: i64,

        /// Negative amounts debit the account.
        #[arg(short, long, allow_hyphen_values = true)]
        amount: f64,
    },

    /// Changes an account's leverage on the bridge.
    SetLeverage {
        #[arg(short, long)]
        login: i64,

        #[arg(long)]
        leverage: u32,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = app_config::load_settings()?;

    // --- Tracing Setup ---
    let level = tracing::Level::from_str(&settings.app.log_level).unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(
        tracing_subscriber::filter::Targets::new()
            .with_target("sqlx::query", tracing::Level::WARN) // Disable sqlx query debug logs
            .with_default(level),
    );
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!(environment = %settings.app.environment, "Starting risk engine application");

    let engine = build_engine(settings).await?;

    match cli.command {
        Commands::Run => engine.run().await?,
        Commands::Sweep => match engine.sweep()?.run_once().await? {
            Some(report) => tracing::info!(?report, "Sweep complete."),
            None => tracing::warn!("A sweep is already running."),
        },
        Commands::DailyReset => match engine.daily_reset().run_once().await? {
            Some(report) => tracing::info!(?report, "Daily reset complete."),
            None => tracing::warn!("A daily reset is already running."),
        },
        Commands::Reinstate { login } => {
            if !engine.admin().reinstate(Login(login)).await? {
                tracing::warn!(login, "Nothing to reinstate.");
            }
        }
        Commands::AdjustBalance { login, amount } => {
            engine.admin().adjust_balance(Login(login), amount).await?;
        }
        Commands::SetLeverage { login, leverage } => {
            engine.admin().set_leverage(Login(login), leverage).await?;
        }
    }

    tracing::info!("Risk engine application has finished successfully.");

    Ok(())
}

/// Connects the database and the bridge client and wires them into an [`Engine`].
async fn build_engine(settings: Settings) -> Result<Engine> {
    let db = database::connect(&settings.database)
        .await
        .context("connecting to the database")?;
    tracing::info!("Database connection established and migrations are up-to-date.");

    let bridge = BridgeClient::new(&settings.bridge)?;
    if settings.bridge.api_key.is_empty() {
        tracing::warn!("Bridge API key is empty. Set APP__BRIDGE__API_KEY.");
    }

    let store: Arc<dyn Store> = Arc::new(db);
    let bridge: Arc<dyn VenueBridge> = Arc::new(bridge);
    Ok(Engine::new(settings, store, bridge))
}
