//! Coinwatch Telegram Bot
//!
//! Reports crypto prices on demand and watches a price until it crosses
//! a user-chosen threshold.

use clap::{Parser, Subcommand};
use coinwatch_bot::{
    bot::{command_menu, CurrencyBot},
    config::Config,
    feed::{CoinMarketCap, PriceSource},
    session::SessionStore,
    telegram::TelegramApi,
    tracker::Tracker,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "coinwatch-bot")]
#[command(about = "Telegram bot for crypto prices and price-threshold alerts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run,
    /// Print the current price of a currency and exit
    Price {
        /// Currency symbol, e.g. BTC
        symbol: String,
    },
    /// Send a test message to a chat
    TestNotify {
        /// Target chat id
        chat_id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run_bot(config).await,
        Commands::Price { symbol } => show_price(config, &symbol).await,
        Commands::TestNotify { chat_id } => test_notify(config, chat_id).await,
    }
}

async fn run_bot(config: Config) -> anyhow::Result<()> {
    tracing::info!("starting coinwatch bot");

    let api = Arc::new(TelegramApi::new(&config.telegram.bot_token)?);
    let feed = Arc::new(CoinMarketCap::new(&config.coinmarketcap)?);
    let store = Arc::new(SessionStore::new());

    // Publish the command menu so the client UI offers the commands.
    if let Err(e) = api.set_my_commands(&command_menu()).await {
        tracing::warn!("failed to register command menu: {}", e);
    }

    let tracker = Arc::new(Tracker::new(
        store.clone(),
        feed.clone(),
        api.clone(),
        config.tracker.clone(),
    ));

    tracing::info!(
        poll_interval_secs = config.tracker.poll_interval_secs,
        "tracking engine ready"
    );

    let bot = Arc::new(CurrencyBot::new(api, feed, tracker, store));
    bot.run().await;

    Ok(())
}

async fn show_price(config: Config, symbol: &str) -> anyhow::Result<()> {
    let feed = CoinMarketCap::new(&config.coinmarketcap)?;
    let symbol = symbol.to_uppercase();
    let price = feed.price(&symbol).await?;

    println!("{}: ${}", symbol, price);
    Ok(())
}

async fn test_notify(config: Config, chat_id: i64) -> anyhow::Result<()> {
    let api = TelegramApi::new(&config.telegram.bot_token)?;
    api.send_message(chat_id, "Test notification. The bot can reach this chat.")
        .await?;

    println!("✅ Test message sent to chat {}", chat_id);
    Ok(())
}
