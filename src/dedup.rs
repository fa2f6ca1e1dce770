use std::collections::HashSet;

use tracing::{error, info};

use crate::store::RecordStore;

/// Identifiers already present in a store, loaded at the start of a run.
#[derive(Debug, Default)]
pub struct DedupIndex {
    seen: HashSet<String>,
}

impl DedupIndex {
    /// Load every identifier below the header row of `column`.
    ///
    /// A failed read yields an empty index rather than an error, so a store
    /// outage lets already-seen events through again.
    pub async fn build(store: &dyn RecordStore, column: usize) -> Self {
        match store.read_column(column).await {
            Ok(cells) => {
                let seen: HashSet<String> = cells
                    .into_iter()
                    .skip(1)
                    .filter(|c| !c.is_empty())
                    .collect();
                info!("Loaded {} existing ids from {}", seen.len(), store.name());
                Self { seen }
            }
            Err(e) => {
                error!("Failed to get existing event IDs from {}: {:#}", store.name(), e);
                Self::default()
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Returns false when the id was already present.
    pub fn add(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
