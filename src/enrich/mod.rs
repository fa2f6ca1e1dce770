pub mod api;

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::llm::Summarizer;
use crate::models::EventDetail;
use crate::notify::Notifier;
use crate::store::RecordStore;
use api::EventSource;

const DEFAULT_NOTICE: &str = "New event added";

/// Turns an event id into a stored `EventDetail`, then announces it.
pub struct Enricher {
    source: Arc<dyn EventSource>,
    details: Arc<dyn RecordStore>,
    notifier: Option<Arc<dyn Notifier>>,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl Enricher {
    pub fn new(source: Arc<dyn EventSource>, details: Arc<dyn RecordStore>) -> Self {
        Self {
            source,
            details,
            notifier: None,
            summarizer: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Fetch, store and announce one event. Fails only when the event itself
    /// cannot be fetched or the row cannot be appended.
    pub async fn enrich(&self, id: &str) -> Result<EventDetail> {
        let detail = self.fetch_detail(id).await?;
        self.store(&detail).await?;
        info!("Stored details for event {}", id);
        self.notify(&detail).await;
        Ok(detail)
    }

    /// The event fetch is fatal; venue and organizer fall back to `{}`.
    pub async fn fetch_detail(&self, id: &str) -> Result<EventDetail> {
        let event = self.source.fetch_event(id).await?;

        let venue = match resource_id(&event, "venue_id") {
            Some(venue_id) => match self.source.fetch_venue(&venue_id).await {
                Ok(v) => v,
                Err(e) => {
                    warn!("Venue {} for event {} unavailable: {:#}", venue_id, id, e);
                    json!({})
                }
            },
            None => json!({}),
        };

        let organizer = match resource_id(&event, "organizer_id") {
            Some(org_id) => match self.source.fetch_organizer(&org_id).await {
                Ok(o) => o,
                Err(e) => {
                    warn!("Organizer {} for event {} unavailable: {:#}", org_id, id, e);
                    json!({})
                }
            },
            None => json!({}),
        };

        Ok(EventDetail::from_resources(&event, &venue, &organizer))
    }

    async fn store(&self, detail: &EventDetail) -> Result<()> {
        let mut header = self.details.read_header_row().await?;
        if header.is_empty() {
            header = EventDetail::FIELDS.iter().map(|f| f.to_string()).collect();
            self.details.write_header_row(&header).await?;
        }
        self.details.append_row(&detail.row_for(&header)).await
    }

    async fn notify(&self, detail: &EventDetail) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let mut text = match &self.summarizer {
            Some(s) => s.summarize(detail).await,
            None => detail
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_NOTICE.to_string()),
        };
        text.push_str(&format!(
            "\n🔗 {}",
            detail.event_url.as_deref().unwrap_or_default()
        ));
        notifier.send(&text).await;
    }
}

/// Resource ids arrive as strings, but numeric ids are accepted too.
fn resource_id(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
