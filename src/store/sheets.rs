use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::debug;

use super::RecordStore;
use crate::error::{check_status, ApiError};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// One tab of a Google spreadsheet, accessed through the v4 values API with a
/// ready-made bearer token. Without an explicit tab name the first tab by
/// position is used, looked up once and cached.
pub struct SheetsStore {
    client: Client,
    spreadsheet_id: String,
    token: String,
    tab: OnceCell<String>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

impl SpreadsheetMeta {
    fn first_title(self) -> Option<String> {
        self.sheets.into_iter().next().map(|s| s.properties.title)
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

impl SheetsStore {
    pub fn new(spreadsheet_id: &str, token: &str, tab: Option<&str>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
            tab: match tab {
                Some(t) => OnceCell::new_with(Some(t.to_string())),
                None => OnceCell::new(),
            },
        })
    }

    async fn tab(&self) -> Result<&str> {
        let tab = self
            .tab
            .get_or_try_init(|| async {
                let res = self
                    .client
                    .get(format!("{}/{}", SHEETS_API, self.spreadsheet_id))
                    .bearer_auth(&self.token)
                    .query(&[("fields", "sheets.properties.title")])
                    .send()
                    .await?;
                let meta: SpreadsheetMeta =
                    check_status("spreadsheet", res).await?.json().await?;
                let title = meta.first_title().ok_or_else(|| ApiError::Payload {
                    resource: "spreadsheet".into(),
                    reason: format!("{} has no tabs", self.spreadsheet_id),
                })?;
                debug!("Using tab '{}' of {}", title, self.spreadsheet_id);
                Ok::<_, anyhow::Error>(title)
            })
            .await?;
        Ok(tab.as_str())
    }

    /// The store's tab in A1 notation, narrowed to `cells` when given.
    async fn range(&self, cells: Option<&str>) -> Result<String> {
        let tab = quote_tab(self.tab().await?);
        Ok(match cells {
            Some(c) => format!("{}!{}", tab, c),
            None => tab,
        })
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/{}/values/{}", SHEETS_API, self.spreadsheet_id, range)
    }

    async fn get_range(&self, range: &str, major_dimension: &str) -> Result<Vec<Vec<String>>> {
        let res = self
            .client
            .get(self.values_url(range))
            .bearer_auth(&self.token)
            .query(&[("majorDimension", major_dimension)])
            .send()
            .await?;
        let body: ValueRange = check_status("sheet range", res).await?.json().await?;
        Ok(body.values)
    }
}

/// Tab names are always quoted so spaces and punctuation survive A1 parsing.
fn quote_tab(tab: &str) -> String {
    format!("'{}'", tab.replace('\'', "''"))
}

/// A1 column letters for a 0-based index: 0 → A, 25 → Z, 26 → AA.
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[async_trait]
impl RecordStore for SheetsStore {
    fn name(&self) -> &str {
        &self.spreadsheet_id
    }

    async fn read_column(&self, index: usize) -> Result<Vec<String>> {
        let col = column_letter(index);
        let range = self.range(Some(&format!("{}:{}", col, col))).await?;
        let mut columns = self.get_range(&range, "COLUMNS").await?;
        Ok(if columns.is_empty() {
            Vec::new()
        } else {
            columns.swap_remove(0)
        })
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        let url = format!("{}:append", self.values_url(&self.range(None).await?));
        let res = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        check_status("sheet append", res).await?;
        debug!("Appended {} cells to {}", values.len(), self.spreadsheet_id);
        Ok(())
    }

    async fn read_header_row(&self) -> Result<Vec<String>> {
        let mut rows = self.get_range(&self.range(Some("1:1")).await?, "ROWS").await?;
        Ok(if rows.is_empty() {
            Vec::new()
        } else {
            rows.swap_remove(0)
        })
    }

    async fn write_header_row(&self, values: &[String]) -> Result<()> {
        let res = self
            .client
            .put(self.values_url(&self.range(Some("A1")).await?))
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        check_status("sheet header", res).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(2), "C");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn first_tab_title_from_metadata() {
        let meta: SpreadsheetMeta = serde_json::from_str(
            r#"{"sheets":[{"properties":{"title":"Feuille 1"}},{"properties":{"title":"Archive"}}]}"#,
        )
        .unwrap();
        assert_eq!(meta.first_title().as_deref(), Some("Feuille 1"));

        let empty: SpreadsheetMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.first_title(), None);
    }

    #[test]
    fn tab_names_are_quoted() {
        assert_eq!(quote_tab("Feuille 1"), "'Feuille 1'");
        assert_eq!(quote_tab("Bob's"), "'Bob''s'");
    }

    #[tokio::test]
    async fn configured_tab_skips_lookup() {
        let store = SheetsStore::new("sheet-id", "token", Some("Events")).unwrap();
        assert_eq!(store.range(Some("C:C")).await.unwrap(), "'Events'!C:C");
        assert_eq!(store.range(None).await.unwrap(), "'Events'");
    }

    #[test]
    fn missing_values_key_is_empty() {
        let body: ValueRange = serde_json::from_str(r#"{"range":"Sheet1!C1:C1000"}"#).unwrap();
        assert!(body.values.is_empty());
    }
}
