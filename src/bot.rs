use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::llm::QueryTranslator;
use crate::scraper::Scraper;
use crate::telegram::{self, ChatTransport, Format, Update};

pub const HELP_MESSAGE: &str = "\
🤖 I can help you find events from Eventbrite.

<b>Example Query:</b>
Find free yoga events next week in Paris

<b>Format:</b>
[Event type] [Date/Time] [Location]
Example: \"Find tech meetups in New York this weekend\"

You can also send:
- \"Help\" → to see this message again
";

const GREETINGS: &[&str] = &["help", "/help", "hi", "hello"];
const FALLBACK_KEYWORD: &str = "search";
const BETWEEN_UPDATES: Duration = Duration::from_secs(1);
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Long-polls the chat for queries and runs a scrape for each one.
pub struct Bot {
    transport: Arc<dyn ChatTransport>,
    translator: Option<Arc<dyn QueryTranslator>>,
    scraper: Scraper,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    Ignored,
    Help,
    Scraped { inserted: usize },
    Failed,
}

impl Bot {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        translator: Option<Arc<dyn QueryTranslator>>,
        scraper: Scraper,
    ) -> Self {
        Self {
            transport,
            translator,
            scraper,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let mut offset = self.starting_offset().await;
        info!("Bot is running...");

        loop {
            let updates = match self.transport.get_updates(offset).await {
                Ok(u) => u,
                Err(e) => {
                    warn!("Polling failed: {:#}", e);
                    tokio::time::sleep(RETRY_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                offset = Some(update.update_id + 1);
                self.handle(&update).await;
                tokio::time::sleep(BETWEEN_UPDATES).await;
            }
        }
    }

    /// Skip the backlog when possible; without it, start from the oldest update.
    async fn starting_offset(&self) -> Option<i64> {
        match telegram::latest_offset(self.transport.as_ref()).await {
            Ok(offset) => offset,
            Err(e) => {
                warn!("Could not skip pending updates: {:#}", e);
                None
            }
        }
    }

    pub async fn handle(&self, update: &Update) -> Handled {
        let Some(message) = &update.message else {
            return Handled::Ignored;
        };
        let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return Handled::Ignored;
        };
        let chat_id = message.chat.id.to_string();
        info!("Received: {}", text);

        if GREETINGS.contains(&text.to_lowercase().as_str()) {
            self.reply(&chat_id, HELP_MESSAGE, Format::Html).await;
            return Handled::Help;
        }

        match self.search(&chat_id, text).await {
            Ok(inserted) => Handled::Scraped { inserted },
            Err(e) => {
                error!("Query failed: {:#}", e);
                self.reply(&chat_id, HELP_MESSAGE, Format::Html).await;
                Handled::Failed
            }
        }
    }

    async fn search(&self, chat_id: &str, text: &str) -> Result<usize> {
        let translator = self
            .translator
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no query translator configured"))?;
        let query = translator.translate(text).await?;
        let url = query
            .url()
            .ok_or_else(|| anyhow::anyhow!("translator returned no URL"))?
            .to_string();
        let keyword = query
            .keywords
            .clone()
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_KEYWORD.to_string());

        self.reply(chat_id, &format!("Searching events for '{}':\n{}", keyword, url), Format::Plain)
            .await;

        let report = self.scraper.run(&url, &keyword).await?;
        Ok(report.inserted)
    }

    async fn reply(&self, chat_id: &str, text: &str, format: Format) {
        if let Err(e) = self.transport.send_message(chat_id, text, format).await {
            error!("Reply to {} failed: {:#}", chat_id, e);
        }
    }
}
