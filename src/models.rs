use serde_json::Value;

/// Placeholder for a card that has no primary link.
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder for a venue without coordinates.
pub const NO_MAP: &str = "NA";

/// Header of the summaries store. The identifier sits in the third column.
pub const SUMMARY_HEADER: [&str; 3] = ["Title", "URL", "Event ID"];
pub const SUMMARY_ID_COLUMN: usize = 2;

/// One listing card as appended to the summaries store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSummary {
    pub title: String,
    pub url: String,
    pub identifier: String,
}

impl EventSummary {
    pub fn to_row(&self) -> Vec<String> {
        vec![self.title.clone(), self.url.clone(), self.identifier.clone()]
    }
}

/// Full event record assembled from the event, venue and organizer resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDetail {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_local: Option<String>,
    pub end_local: Option<String>,
    pub timezone: Option<String>,
    pub created: Option<String>,
    pub changed: Option<String>,
    pub status: Option<String>,
    pub currency: Option<String>,
    pub capacity: Option<i64>,
    pub is_free: Option<bool>,
    pub online_event: Option<bool>,
    pub language: Option<String>,
    pub event_url: Option<String>,
    pub venue_name: Option<String>,
    pub venue_address: Option<String>,
    pub venue_lat: Option<String>,
    pub venue_lon: Option<String>,
    pub map_location: String,
    pub organizer_name: Option<String>,
    pub organizer_description: Option<String>,
    pub organizer_url: Option<String>,
}

impl EventDetail {
    /// Column names, in header order.
    pub const FIELDS: [&'static str; 22] = [
        "title",
        "description",
        "start_local",
        "end_local",
        "timezone",
        "created",
        "changed",
        "status",
        "currency",
        "capacity",
        "is_free",
        "online_event",
        "language",
        "event_url",
        "venue_name",
        "venue_address",
        "venue_lat",
        "venue_lon",
        "map_location",
        "organizer_name",
        "organizer_description",
        "organizer_url",
    ];

    /// Flatten the three API resources. Missing paths become `None`; an empty
    /// object stands in for a venue or organizer that was absent or failed.
    pub fn from_resources(event: &Value, venue: &Value, organizer: &Value) -> Self {
        Self {
            title: text_at(event, "/name/text"),
            description: text_at(event, "/description/text"),
            start_local: text_at(event, "/start/local"),
            end_local: text_at(event, "/end/local"),
            timezone: text_at(event, "/start/timezone"),
            created: text_at(event, "/created"),
            changed: text_at(event, "/changed"),
            status: text_at(event, "/status"),
            currency: text_at(event, "/currency"),
            capacity: event.pointer("/capacity").and_then(as_int),
            is_free: event.pointer("/is_free").and_then(Value::as_bool),
            online_event: event.pointer("/online_event").and_then(Value::as_bool),
            language: text_at(event, "/locale"),
            event_url: text_at(event, "/url"),
            venue_name: text_at(venue, "/name"),
            venue_address: text_at(venue, "/address/localized_address_display"),
            venue_lat: text_at(venue, "/latitude"),
            venue_lon: text_at(venue, "/longitude"),
            map_location: map_link(venue),
            organizer_name: text_at(organizer, "/name"),
            organizer_description: text_at(organizer, "/description/text"),
            organizer_url: text_at(organizer, "/url"),
        }
    }

    /// Cell text for a header name; `None` when the name is not a field.
    pub fn cell(&self, field: &str) -> Option<String> {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let flag = |v: Option<bool>| v.map(|b| b.to_string()).unwrap_or_default();

        let cell = match field {
            "title" => text(&self.title),
            "description" => text(&self.description),
            "start_local" => text(&self.start_local),
            "end_local" => text(&self.end_local),
            "timezone" => text(&self.timezone),
            "created" => text(&self.created),
            "changed" => text(&self.changed),
            "status" => text(&self.status),
            "currency" => text(&self.currency),
            "capacity" => self.capacity.map(|c| c.to_string()).unwrap_or_default(),
            "is_free" => flag(self.is_free),
            "online_event" => flag(self.online_event),
            "language" => text(&self.language),
            "event_url" => text(&self.event_url),
            "venue_name" => text(&self.venue_name),
            "venue_address" => text(&self.venue_address),
            "venue_lat" => text(&self.venue_lat),
            "venue_lon" => text(&self.venue_lon),
            "map_location" => self.map_location.clone(),
            "organizer_name" => text(&self.organizer_name),
            "organizer_description" => text(&self.organizer_description),
            "organizer_url" => text(&self.organizer_url),
            _ => return None,
        };
        Some(cell)
    }

    /// Row laid out to match an existing header; unknown columns stay blank.
    pub fn row_for(&self, header: &[String]) -> Vec<String> {
        header
            .iter()
            .map(|h| self.cell(h).unwrap_or_default())
            .collect()
    }
}

/// Google Maps link for a venue, or `"NA"` unless both coordinates are set.
pub fn map_link(venue: &Value) -> String {
    match (text_at(venue, "/latitude"), text_at(venue, "/longitude")) {
        (Some(lat), Some(lon)) => format!("https://www.google.com/maps?q={},{}", lat, lon),
        _ => NO_MAP.to_string(),
    }
}

/// String or number at a JSON pointer. Nulls and empty strings count as absent.
fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_event() -> Value {
        json!({
            "name": { "text": "Morning Yoga" },
            "description": { "text": "Stretch by the river" },
            "start": { "local": "2026-11-02T09:00:00", "timezone": "Europe/Paris" },
            "end": { "local": "2026-11-02T10:30:00" },
            "created": "2026-10-01T12:00:00Z",
            "changed": "2026-10-03T08:00:00Z",
            "status": "live",
            "currency": "EUR",
            "capacity": 40,
            "is_free": true,
            "online_event": false,
            "locale": "fr_FR",
            "url": "https://www.eventbrite.com/e/morning-yoga-123",
            "venue_id": "77",
            "organizer_id": "88"
        })
    }

    #[test]
    fn map_link_from_numeric_coordinates() {
        let venue = json!({ "latitude": 48.85, "longitude": 2.35 });
        assert_eq!(map_link(&venue), "https://www.google.com/maps?q=48.85,2.35");
    }

    #[test]
    fn map_link_from_string_coordinates() {
        let venue = json!({ "latitude": "48.85", "longitude": "2.35" });
        assert_eq!(map_link(&venue), "https://www.google.com/maps?q=48.85,2.35");
    }

    #[test]
    fn map_link_needs_both_coordinates() {
        assert_eq!(map_link(&json!({ "longitude": "2.35" })), "NA");
        assert_eq!(map_link(&json!({ "latitude": "48.85" })), "NA");
        assert_eq!(map_link(&json!({})), "NA");
    }

    #[test]
    fn flatten_without_venue_or_organizer() {
        let empty = json!({});
        let d = EventDetail::from_resources(&sample_event(), &empty, &empty);

        assert_eq!(d.title.as_deref(), Some("Morning Yoga"));
        assert_eq!(d.timezone.as_deref(), Some("Europe/Paris"));
        assert_eq!(d.capacity, Some(40));
        assert_eq!(d.is_free, Some(true));
        assert_eq!(d.online_event, Some(false));
        assert_eq!(d.language.as_deref(), Some("fr_FR"));

        assert_eq!(d.venue_name, None);
        assert_eq!(d.venue_address, None);
        assert_eq!(d.venue_lat, None);
        assert_eq!(d.organizer_name, None);
        assert_eq!(d.organizer_description, None);
        assert_eq!(d.organizer_url, None);
        assert_eq!(d.map_location, "NA");
    }

    #[test]
    fn flatten_with_venue_and_organizer() {
        let venue = json!({
            "name": "Parc de la Villette",
            "address": { "localized_address_display": "211 Av. Jean Jaurès, Paris" },
            "latitude": "48.8938",
            "longitude": "2.3908"
        });
        let organizer = json!({
            "name": "Calm Collective",
            "description": { "text": "Weekly sessions" },
            "url": "https://www.eventbrite.com/o/calm-collective-1"
        });
        let d = EventDetail::from_resources(&sample_event(), &venue, &organizer);

        assert_eq!(d.venue_name.as_deref(), Some("Parc de la Villette"));
        assert_eq!(d.venue_address.as_deref(), Some("211 Av. Jean Jaurès, Paris"));
        assert_eq!(d.map_location, "https://www.google.com/maps?q=48.8938,2.3908");
        assert_eq!(d.organizer_description.as_deref(), Some("Weekly sessions"));
    }

    #[test]
    fn null_nested_fields_are_absent() {
        let event = json!({ "name": null, "description": { "text": null }, "capacity": null });
        let d = EventDetail::from_resources(&event, &json!({}), &json!({}));
        assert_eq!(d.title, None);
        assert_eq!(d.description, None);
        assert_eq!(d.capacity, None);
    }

    #[test]
    fn row_follows_existing_header_order() {
        let d = EventDetail::from_resources(&sample_event(), &json!({}), &json!({}));
        let header: Vec<String> = ["event_url", "unknown", "title", "is_free", "venue_name"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            d.row_for(&header),
            vec![
                "https://www.eventbrite.com/e/morning-yoga-123",
                "",
                "Morning Yoga",
                "true",
                "",
            ]
        );
    }

    #[test]
    fn every_field_has_a_cell() {
        let d = EventDetail::default();
        for field in EventDetail::FIELDS {
            assert!(d.cell(field).is_some(), "no cell for {}", field);
        }
    }
}
