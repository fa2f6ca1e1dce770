mod bot;
mod browser;
mod config;
mod dedup;
mod enrich;
mod error;
mod llm;
mod models;
mod notify;
mod scraper;
mod store;
mod telegram;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use config::Config;
use enrich::api::EventbriteClient;
use enrich::Enricher;
use llm::{LlmClient, QueryTranslator, Summarizer};
use scraper::Scraper;
use telegram::{TelegramClient, TelegramNotifier};

#[derive(Parser)]
#[command(name = "event_scout", about = "Event listing scraper driven by a chat bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the chat bot for queries (default)
    Bot,
    /// Scrape one search results URL
    Scrape {
        /// Listing search URL
        #[arg(short, long)]
        url: String,
        /// Label for this search in logs
        #[arg(short, long, default_value = "search")]
        keyword: String,
    },
    /// Show row counts of both stores
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    let result = match cli.command.unwrap_or(Commands::Bot) {
        Commands::Bot => {
            let token = cfg
                .telegram
                .token
                .clone()
                .context("TELEGRAM_TOKEN must be set to run the bot")?;
            let llm = LlmClient::from_config(&cfg.llm)?.map(Arc::new);
            let translator = llm.clone().map(|c| c as Arc<dyn QueryTranslator>);
            if translator.is_none() {
                tracing::warn!("No LLM key configured; every query will get the help message");
            }
            let scraper = build_scraper(&cfg, llm.map(|c| c as Arc<dyn Summarizer>))?;
            let transport = Arc::new(TelegramClient::new(&token)?);
            bot::Bot::new(transport, translator, scraper).run().await
        }
        Commands::Scrape { url, keyword } => {
            let llm = LlmClient::from_config(&cfg.llm)?.map(|c| Arc::new(c) as Arc<dyn Summarizer>);
            let scraper = build_scraper(&cfg, llm)?.with_progress(true);
            let report = scraper.run(&url, &keyword).await?;
            if !report.listing_loaded {
                println!("Listing did not load for '{}'.", keyword);
            } else {
                println!(
                    "Done: {} cards ({} new, {} duplicates, {} skipped, {} insert errors, {} enrichment errors).",
                    report.cards,
                    report.inserted,
                    report.duplicates,
                    report.skipped,
                    report.insert_failures,
                    report.enrich_failures
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let stores = store::open(&cfg.store)?;
            println!(
                "Summaries ({}): {}",
                stores.summaries.name(),
                store::count_rows(stores.summaries.as_ref()).await?
            );
            println!(
                "Details   ({}): {}",
                stores.details.name(),
                store::count_rows(stores.details.as_ref()).await?
            );
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn build_scraper(cfg: &Config, summarizer: Option<Arc<dyn Summarizer>>) -> anyhow::Result<Scraper> {
    let stores = store::open(&cfg.store)?;
    let source = Arc::new(EventbriteClient::new(&cfg.eventbrite)?);
    let mut enricher = Enricher::new(source, stores.details);

    if let (Some(token), Some(chat_id)) = (&cfg.telegram.token, &cfg.telegram.chat_id) {
        let notifier = TelegramNotifier::new(TelegramClient::new(token)?, chat_id);
        enricher = enricher.with_notifier(Arc::new(notifier));
        if let Some(summarizer) = summarizer {
            enricher = enricher.with_summarizer(summarizer);
        }
    }

    let launcher = Arc::new(browser::chrome::ChromeLauncher::new(&cfg.browser));
    Ok(Scraper::new(launcher, stores.summaries, enricher, cfg.scrape.clone()))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
