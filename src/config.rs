use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};

const DEFAULT_LLM_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
const DEFAULT_EVENTBRITE_API_URL: &str = "https://www.eventbriteapi.com/v3";
const DEFAULT_STORE_PATH: &str = "data/events.sqlite";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub struct Config {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub eventbrite: EventbriteConfig,
    pub store: StoreConfig,
    pub scrape: ScrapeSettings,
    pub browser: BrowserConfig,
}

pub struct TelegramConfig {
    pub token: Option<String>,
    /// Notification channel; `None` disables notifications.
    pub chat_id: Option<String>,
}

pub struct LlmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

pub struct EventbriteConfig {
    /// Required for scraping; `stats` runs without it.
    pub token: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Sheets,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "sheets" => Ok(StoreBackend::Sheets),
            other => bail!("unknown STORE_BACKEND '{}' (expected sqlite or sheets)", other),
        }
    }
}

pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
    pub summaries_name: String,
    pub details_name: String,
    pub sheets_token: Option<String>,
    /// Tab to use in both spreadsheets; the first tab when unset.
    pub sheets_tab: Option<String>,
}

/// Timing and bounds for one orchestration run.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub max_scroll_attempts: u32,
    pub scroll_pause: Duration,
    pub load_more_pause: Duration,
    pub card_delay: Duration,
    pub navigation_timeout: Duration,
    pub listing_timeout: Duration,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            max_scroll_attempts: 5,
            scroll_pause: Duration::from_secs(3),
            load_more_pause: Duration::from_secs(5),
            card_delay: Duration::from_secs(1),
            navigation_timeout: Duration::from_secs(90),
            listing_timeout: Duration::from_secs(60),
        }
    }
}

pub struct BrowserConfig {
    pub headless: bool,
    pub user_agent: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = ScrapeSettings::default();

        Ok(Self {
            telegram: TelegramConfig {
                token: optional("TELEGRAM_TOKEN"),
                chat_id: optional("TELEGRAM_CHAT_ID"),
            },
            llm: LlmConfig {
                api_key: optional("LLM_API_KEY").or_else(|| optional("OPENAI_API_KEY")),
                base_url: optional("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.into()),
                model: optional("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.into()),
            },
            eventbrite: EventbriteConfig {
                token: optional("EVENTBRITE_TOKEN"),
                api_url: optional("EVENTBRITE_API_URL")
                    .unwrap_or_else(|| DEFAULT_EVENTBRITE_API_URL.into()),
            },
            store: StoreConfig {
                backend: parsed("STORE_BACKEND", StoreBackend::Sqlite)?,
                path: optional("STORE_PATH")
                    .unwrap_or_else(|| DEFAULT_STORE_PATH.into())
                    .into(),
                summaries_name: optional("FILE_NAME1").unwrap_or_else(|| "events".into()),
                details_name: optional("FILE_NAME2").unwrap_or_else(|| "event_details".into()),
                sheets_token: optional("SHEETS_ACCESS_TOKEN"),
                sheets_tab: optional("SHEETS_TAB"),
            },
            scrape: ScrapeSettings {
                max_scroll_attempts: parsed("MAX_SCROLL_ATTEMPTS", defaults.max_scroll_attempts)?,
                card_delay: Duration::from_millis(parsed("CARD_DELAY_MS", 1000u64)?),
                ..defaults
            },
            browser: BrowserConfig {
                headless: parsed("HEADLESS", true)?,
                user_agent: optional("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            },
        })
    }
}

/// Read a variable, treating empty values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}='{}': {}", name, raw, e)),
        None => Ok(default),
    }
}
