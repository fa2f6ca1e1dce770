pub mod sheets;
pub mod sqlite;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::SUMMARY_HEADER;

/// Append-only table with a header row. Row 1 is the header when one exists;
/// `read_column` returns it along with the data cells.
///
/// Nothing here is atomic across calls: a check-then-append from two writers
/// can race, so each store is assumed to have a single writer.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn name(&self) -> &str;

    /// Cells of one column (0-based), header included. Short rows yield "".
    async fn read_column(&self, index: usize) -> Result<Vec<String>>;

    async fn append_row(&self, values: &[String]) -> Result<()>;

    /// First row, or empty when the store has no rows yet.
    async fn read_header_row(&self) -> Result<Vec<String>>;

    /// Replace row 1, inserting it when the store is empty.
    async fn write_header_row(&self, values: &[String]) -> Result<()>;
}

pub struct Stores {
    pub summaries: Arc<dyn RecordStore>,
    pub details: Arc<dyn RecordStore>,
}

pub fn open(cfg: &StoreConfig) -> Result<Stores> {
    match cfg.backend {
        StoreBackend::Sqlite => {
            if let Some(dir) = cfg.path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating {}", dir.display()))?;
            }
            let summaries = sqlite::SqliteSheet::open(&cfg.path, &cfg.summaries_name)?;
            let details = sqlite::SqliteSheet::open(&cfg.path, &cfg.details_name)?;
            Ok(Stores {
                summaries: Arc::new(summaries),
                details: Arc::new(details),
            })
        }
        StoreBackend::Sheets => {
            let token = cfg
                .sheets_token
                .as_deref()
                .context("SHEETS_ACCESS_TOKEN must be set for the sheets backend")?;
            let tab = cfg.sheets_tab.as_deref();
            Ok(Stores {
                summaries: Arc::new(sheets::SheetsStore::new(&cfg.summaries_name, token, tab)?),
                details: Arc::new(sheets::SheetsStore::new(&cfg.details_name, token, tab)?),
            })
        }
    }
}

/// Write the summaries header unless the first cell already reads "Title".
pub async fn ensure_summary_header(store: &dyn RecordStore) -> Result<()> {
    let header = store.read_header_row().await?;
    if header.first().map(String::as_str) == Some(SUMMARY_HEADER[0]) {
        return Ok(());
    }
    info!("Writing header row to {}", store.name());
    let values: Vec<String> = SUMMARY_HEADER.iter().map(|s| s.to_string()).collect();
    store.write_header_row(&values).await
}

/// Number of data rows, derived from the first column.
pub async fn count_rows(store: &dyn RecordStore) -> Result<usize> {
    let col = store.read_column(0).await?;
    Ok(col.len().saturating_sub(1))
}
