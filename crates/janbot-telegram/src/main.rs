//! JanBot Telegram binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx TODO_API_URL=http://localhost:8080 cargo run -p janbot-telegram
//! ```

use clap::Parser;
use janbot_core::BotConfig;
use janbot_telegram::TelegramBot;
use tracing_subscriber::EnvFilter;

/// JanBot - todo lists and summaries from Telegram
#[derive(Parser, Debug)]
#[command(name = "janbot-telegram")]
#[command(about = "Telegram bot for managing todo tasks and summarizing text")]
struct Args {
    /// Todo backend base URL (overrides TODO_API_URL)
    #[arg(long, env = "TODO_API_URL")]
    todo_api_url: Option<String>,

    /// Tasks per list page (overrides TODO_PAGE_SIZE)
    #[arg(long)]
    page_size: Option<u32>,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env.local or .env before clap reads env-backed flags
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());

    let args = Args::parse();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "janbot_telegram=info,janbot_core=info,teloxide=warn",
        1 => "janbot_telegram=debug,janbot_core=debug,teloxide=info",
        2 => "janbot_telegram=trace,janbot_core=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = match args.todo_api_url {
        Some(url) => BotConfig::from_lookup(|key| match key {
            janbot_core::config::TODO_API_URL_ENV => Some(url.clone()),
            other => std::env::var(other).ok(),
        })?,
        None => BotConfig::from_env()?,
    };
    if let Some(page_size) = args.page_size {
        if page_size == 0 || page_size > janbot_core::config::MAX_PAGE_SIZE {
            return Err(format!(
                "--page-size must be between 1 and {}",
                janbot_core::config::MAX_PAGE_SIZE
            )
            .into());
        }
        config = config.with_page_size(page_size);
    }

    let bot = TelegramBot::new(config)?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\n[robot] JanBot Telegram Bot");
            println!("   Bot: @{}", username);
            println!(
                "   Summarization: {}",
                if bot.has_summarization() { "enabled" } else { "disabled (set GEMINI_API_KEY)" }
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\n[phone] Open Telegram and send /start to begin");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}
