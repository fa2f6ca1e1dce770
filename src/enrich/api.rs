use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::EventbriteConfig;
use crate::error::check_status;

/// The event listing site's REST API.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn fetch_event(&self, id: &str) -> Result<Value>;
    async fn fetch_venue(&self, id: &str) -> Result<Value>;
    async fn fetch_organizer(&self, id: &str) -> Result<Value>;
}

/// Eventbrite v3 client using a private bearer token.
pub struct EventbriteClient {
    client: Client,
    base_url: String,
    token: String,
}

impl EventbriteClient {
    pub fn new(cfg: &EventbriteConfig) -> Result<Self> {
        let token = cfg.token.clone().context("EVENTBRITE_TOKEN must be set")?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: cfg.api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn get(&self, resource: &str, path: &str) -> Result<Value> {
        let url = format!("{}/{}/", self.base_url, path);
        debug!("GET {}", url);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Ok(check_status(resource, res).await?.json().await?)
    }
}

#[async_trait]
impl EventSource for EventbriteClient {
    async fn fetch_event(&self, id: &str) -> Result<Value> {
        self.get("event", &format!("events/{}", id)).await
    }

    async fn fetch_venue(&self, id: &str) -> Result<Value> {
        self.get("venue", &format!("venues/{}", id)).await
    }

    async fn fetch_organizer(&self, id: &str) -> Result<Value> {
        self.get("organizer", &format!("organizers/{}", id)).await
    }
}
