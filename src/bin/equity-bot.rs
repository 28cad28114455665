// Equity Trading Bot - CLI entry point

use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use equity_trading_bot::{
    AlpacaGateway, AlpacaStream, Config, InboundQueue, MarketGateway, StreamClient, TradingBot,
    TradingResult,
};

#[derive(Parser)]
#[command(name = "equity-bot")]
#[command(version = "0.2.0")]
#[command(about = "Automated equity position manager", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Run the trading loops until shutdown
    Run {
        /// Start even when the market is closed
        #[arg(long)]
        force: bool,
    },

    /// Show market and account status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> TradingResult<()> {
    match cli.command {
        Commands::Init => init(&cli.config),
        Commands::Run { force } => run(&cli.config, force).await,
        Commands::Status => status(&cli.config).await,
    }
}

fn init(path: &str) -> TradingResult<()> {
    if Path::new(path).exists() {
        println!("Config file already exists: {}", path);
        return Ok(());
    }
    Config::default().to_file(path)?;
    println!("✅ Created {} - fill in your API credentials before running", path);
    Ok(())
}

async fn run(config_path: &str, force: bool) -> TradingResult<()> {
    let config = Config::load_or_create(config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.log_filter.as_str())
        .init();

    let gateway = Arc::new(AlpacaGateway::new(&config.gateway));
    let queue = InboundQueue::new(config.trading.queue_capacity);
    let stream = Arc::new(AlpacaStream::new(&config.gateway, queue.clone()));

    if !force && !gateway.is_market_open().await? {
        info!("market is closed, exiting");
        return Ok(());
    }

    if let Err(e) = stream.connect().await {
        warn!(error = %e, "initial stream connect failed, health monitor will retry");
    }

    let bot = Arc::new(TradingBot::new(
        gateway.clone() as Arc<dyn MarketGateway>,
        stream.clone() as Arc<dyn StreamClient>,
        queue,
        config.trading.clone(),
    ));

    if let Err(e) = bot.seed_ledger().await {
        warn!(error = %e, "could not seed ledger from order history");
    }

    let running = bot.running();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running.shutdown();
        }
    });

    bot.run().await;
    stream.close().await;
    Ok(())
}

async fn status(config_path: &str) -> TradingResult<()> {
    let config = Config::load_or_create(config_path)?;
    let gateway = AlpacaGateway::new(&config.gateway);

    let market_open = gateway.is_market_open().await?;
    let portfolio_value = gateway.portfolio_value().await?;
    let positions = gateway.fetch_positions().await?;

    println!("📊 Account Status");
    println!("   Market open:     {}", if market_open { "yes" } else { "no" });
    println!("   Portfolio value: ${:.2}", portfolio_value);
    println!("   Open positions:  {}", positions.len());
    for (symbol, position) in &positions {
        let last_close = match gateway.fetch_latest_bar(symbol).await {
            Ok(bar) => format!("{:.2}", bar.close),
            Err(_) => "n/a".to_string(),
        };
        println!(
            "   - {}: {} @ ${:.2} (last close {})",
            symbol, position.quantity, position.market_price, last_close
        );
    }

    Ok(())
}
