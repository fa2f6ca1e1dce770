use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error};

use crate::browser::Element;
use crate::models::{EventSummary, NOT_AVAILABLE};

/// The card's link that opens the event page in a new tab.
pub const PRIMARY_LINK: &str = r#"[target="_blank"]"#;
const TITLE_PREFIX: &str = "View";

/// Whatever could be read from one card. Attribute failures leave fields unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFields {
    pub title: Option<String>,
    pub url: Option<String>,
    pub identifier: Option<String>,
}

impl CardFields {
    pub fn sentinel() -> Self {
        Self {
            title: Some(NOT_AVAILABLE.into()),
            url: Some(NOT_AVAILABLE.into()),
            identifier: Some(NOT_AVAILABLE.into()),
        }
    }

    /// A storable summary, or `None` when the url or id is missing or the
    /// sentinel. A missing title becomes an empty cell.
    pub fn into_summary(self) -> Option<EventSummary> {
        let url = self.url.filter(|u| !u.is_empty() && u != NOT_AVAILABLE)?;
        let identifier = self.identifier.filter(|i| !i.is_empty() && i != NOT_AVAILABLE)?;
        Some(EventSummary {
            title: self.title.unwrap_or_default(),
            url,
            identifier,
        })
    }
}

/// `"View Yoga Retreat"` → `"Yoga Retreat"`; other labels pass through.
pub fn clean_title(label: &str) -> String {
    match label.strip_prefix(TITLE_PREFIX) {
        Some(rest) => rest.trim().to_string(),
        None => label.to_string(),
    }
}

/// Read title, url and id from a card, then pause `delay` when a link was found.
pub async fn extract(card: &dyn Element, delay: Duration) -> CardFields {
    let link = match card.find_child(PRIMARY_LINK).await {
        Ok(Some(link)) => link,
        Ok(None) => return CardFields::sentinel(),
        Err(e) => {
            error!("Error locating card link: {:#}", e);
            return CardFields::default();
        }
    };

    let mut fields = CardFields::default();
    if let Err(e) = read_link(link.as_ref(), &mut fields).await {
        error!("Error reading card: {:#}", e);
        return fields;
    }

    debug!(
        "Card: title={:?} url={:?} id={:?}",
        fields.title, fields.url, fields.identifier
    );
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    fields
}

async fn read_link(link: &dyn Element, fields: &mut CardFields) -> Result<()> {
    fields.title = link.attribute("aria-label").await?.map(|t| clean_title(&t));
    fields.url = link.attribute("href").await?;
    fields.identifier = link.attribute("data-event-id").await?;
    Ok(())
}
