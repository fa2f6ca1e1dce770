use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::config::LlmConfig;
use crate::error::{check_status, ApiError};
use crate::models::EventDetail;

pub const SUMMARY_FALLBACK: &str = "Summary not available due to an error.";

static JSON_OBJECT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

const TRANSLATE_PROMPT: &str = r#"You are a helpful assistant. Convert a user's natural language event query into a formatted Eventbrite URL.
If the month and year are not mentioned in the prompt, assume the next upcoming ones.

Example:
User: Find free yoga events next week in Paris
Response:
{
  "location": "paris",
  "country": "france",
  "keywords": "yoga",
  "date": "next-week",
  "price": "free",
  "formatted_url": "https://www.eventbrite.com/d/france--paris/yoga--events/?price=free&date=next-week"
}
Only respond with a valid JSON object."#;

/// Produces a short chat-friendly description of an event.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Never fails; returns `SUMMARY_FALLBACK` when the model is unavailable.
    async fn summarize(&self, detail: &EventDetail) -> String;
}

/// Parsed search request for the listing site.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub formatted_url: Option<String>,
}

impl SearchQuery {
    pub fn url(&self) -> Option<&str> {
        self.formatted_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }
}

#[async_trait]
pub trait QueryTranslator: Send + Sync {
    /// Fails when the reply carries no usable `formatted_url`.
    async fn translate(&self, text: &str) -> Result<SearchQuery>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    /// `None` when no API key is configured.
    pub fn from_config(cfg: &LlmConfig) -> Result<Option<Self>> {
        let Some(api_key) = cfg.api_key.clone() else {
            return Ok(None);
        };
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;
        Ok(Some(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
        }))
    }

    async fn complete(&self, system: Option<&str>, user: &str, temperature: f32) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": user }));

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": temperature,
            }))
            .send()
            .await?;
        let completion: Completion = check_status("completion", res).await?.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .ok_or_else(|| {
                ApiError::Payload {
                    resource: "completion".into(),
                    reason: "no choices".into(),
                }
                .into()
            })
    }
}

/// First JSON object in a model reply, tolerating code fences and chatter.
pub fn parse_search_query(reply: &str) -> Result<SearchQuery> {
    let raw = JSON_OBJECT_RE
        .find(reply)
        .map(|m| m.as_str())
        .context("model reply contained no JSON object")?;
    let query: SearchQuery =
        serde_json::from_str(raw).context("model reply was not valid JSON")?;
    if query.url().is_none() {
        anyhow::bail!("formatted_url not found in response");
    }
    Ok(query)
}

pub fn summary_prompt(detail: &EventDetail) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "None".to_string());
    format!(
        "You are an assistant helping users quickly understand event listings.\n\n\
         Summarize the following event details into a friendly description suitable for \
         sending over Telegram. Include the title, date, location (if any), and organizer name.\n\n\
         Event data:\n\
         Title: {}\n\
         URL: {}\n\
         Start Time: {}\n\
         Location: {}\n\
         Organizer: {}\n\
         Description: {}\n",
        field(&detail.title),
        field(&detail.event_url),
        field(&detail.start_local),
        detail.venue_address.as_deref().unwrap_or("Online"),
        field(&detail.organizer_name),
        field(&detail.description),
    )
}

#[async_trait]
impl QueryTranslator for LlmClient {
    async fn translate(&self, text: &str) -> Result<SearchQuery> {
        let reply = self.complete(Some(TRANSLATE_PROMPT), text, 0.2).await?;
        debug!("Translator reply: {}", reply);
        parse_search_query(&reply).inspect_err(|e| warn!("Unusable translator reply ({}): {}", e, reply))
    }
}

#[async_trait]
impl Summarizer for LlmClient {
    async fn summarize(&self, detail: &EventDetail) -> String {
        match self.complete(None, &summary_prompt(detail), 0.7).await {
            Ok(summary) => summary,
            Err(e) => {
                error!("Summarizer error: {:#}", e);
                SUMMARY_FALLBACK.to_string()
            }
        }
    }
}
