use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::error::{check_status, ApiError};
use crate::notify::Notifier;

const API_BASE: &str = "https://api.telegram.org";
/// Long-poll window; the HTTP timeout must outlast it.
pub const POLL_TIMEOUT_SECS: u64 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

/// How outgoing text should be parsed by the chat client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Plain,
    Html,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>>;
    async fn send_message(&self, chat_id: &str, text: &str, format: Format) -> Result<()>;
}

pub struct TelegramClient {
    client: Client,
    token: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 20))
            .build()?;
        Ok(Self {
            client,
            token: token.to_string(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", API_BASE, self.token, method)
    }
}

/// Offset just past the newest pending update, so backlog is skipped.
pub async fn latest_offset(transport: &dyn ChatTransport) -> Result<Option<i64>> {
    let updates = transport.get_updates(None).await?;
    Ok(updates.last().map(|u| u.update_id + 1))
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let mut query = vec![("timeout", POLL_TIMEOUT_SECS.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        let res = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .send()
            .await?;
        let envelope: Envelope<Vec<Update>> = check_status("updates", res).await?.json().await?;
        if !envelope.ok {
            return Err(ApiError::Payload {
                resource: "updates".into(),
                reason: envelope.description.unwrap_or_else(|| "ok=false".into()),
            }
            .into());
        }
        Ok(envelope.result.unwrap_or_default())
    }

    async fn send_message(&self, chat_id: &str, text: &str, format: Format) -> Result<()> {
        let mut payload = json!({ "chat_id": chat_id, "text": text });
        if format == Format::Html {
            payload["parse_mode"] = json!("HTML");
        }
        let res = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await?;
        check_status("sendMessage", res).await?;
        Ok(())
    }
}

/// Sends announcements to one fixed chat.
pub struct TelegramNotifier {
    transport: TelegramClient,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(transport: TelegramClient, chat_id: &str) -> Self {
        Self {
            transport,
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        match self
            .transport
            .send_message(&self.chat_id, text, Format::Plain)
            .await
        {
            Ok(()) => info!("Sent to Telegram."),
            Err(e) => error!("Telegram error: {:#}", e),
        }
    }
}
