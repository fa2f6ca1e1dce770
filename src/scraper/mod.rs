pub mod card;
pub mod scroll;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::browser::{BrowserLauncher, Page};
use crate::config::ScrapeSettings;
use crate::dedup::DedupIndex;
use crate::enrich::Enricher;
use crate::error::ApiError;
use crate::models::SUMMARY_ID_COLUMN;
use crate::store::{self, RecordStore};
use scroll::{ScrollOutcome, ScrollPlan};

pub(crate) const LISTING_MARKER: &str = r#"header[class="search-header"]"#;
pub(crate) const EVENT_CARD: &str = r#"li > div[class*="SearchResultPanelContentEventCardList"]"#;

/// One search to run: the listing URL and the keyword it stands for.
#[derive(Debug, Clone)]
pub struct SearchTarget {
    pub url: String,
    pub keyword: String,
}

/// Outcome of scraping one keyword.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub keyword: String,
    pub listing_loaded: bool,
    pub cards: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub insert_failures: usize,
    pub enrich_failures: usize,
    pub scroll: Option<ScrollOutcome>,
}

/// Drives the browser over search results and feeds new events to enrichment.
///
/// The dedup check and the append are separate calls, so two scrapers writing
/// the same summaries store at once can insert the same event twice.
pub struct Scraper {
    launcher: Arc<dyn BrowserLauncher>,
    summaries: Arc<dyn RecordStore>,
    enricher: Enricher,
    settings: ScrapeSettings,
    show_progress: bool,
}

impl Scraper {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        summaries: Arc<dyn RecordStore>,
        enricher: Enricher,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            launcher,
            summaries,
            enricher,
            settings,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub async fn run(&self, search_url: &str, keyword: &str) -> Result<RunReport> {
        let target = SearchTarget {
            url: search_url.to_string(),
            keyword: keyword.to_string(),
        };
        let mut reports = self.run_all(std::slice::from_ref(&target)).await?;
        Ok(reports.pop().unwrap_or_default())
    }

    /// Scrape each target in turn on one browser session. The session is
    /// closed whether or not the targets succeed.
    pub async fn run_all(&self, targets: &[SearchTarget]) -> Result<Vec<RunReport>> {
        if let Err(e) = store::ensure_summary_header(self.summaries.as_ref()).await {
            warn!("Could not verify header of {}: {:#}", self.summaries.name(), e);
        }

        let session = self.launcher.launch().await?;
        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            reports.push(self.scrape_keyword(session.page(), target).await);
        }
        if let Err(e) = session.close().await {
            warn!("Browser session did not close cleanly: {:#}", e);
        }
        Ok(reports)
    }

    async fn scrape_keyword(&self, page: &dyn Page, target: &SearchTarget) -> RunReport {
        let t0 = Instant::now();
        let mut report = RunReport {
            keyword: target.keyword.clone(),
            ..Default::default()
        };
        let mut seen = DedupIndex::build(self.summaries.as_ref(), SUMMARY_ID_COLUMN).await;

        info!("--- Starting search for keyword: '{}' ---", target.keyword);
        if !self.open_listing(page, &target.url, &target.keyword).await {
            return report;
        }
        report.listing_loaded = true;

        let plan = ScrollPlan {
            max_attempts: self.settings.max_scroll_attempts,
            scroll_pause: self.settings.scroll_pause,
            load_more_pause: self.settings.load_more_pause,
        };
        report.scroll = Some(scroll::load_all(page, plan).await);

        let cards = match page.query_all(EVENT_CARD).await {
            Ok(cards) => cards,
            Err(e) => {
                error!("Could not list event cards for '{}': {:#}", target.keyword, e);
                return report;
            }
        };
        report.cards = cards.len();
        info!("Total visible events: {}", cards.len());

        let pb = self.progress_bar(cards.len());
        for el in &cards {
            let fields = card::extract(el.as_ref(), self.settings.card_delay).await;
            pb.inc(1);

            let Some(summary) = fields.into_summary() else {
                info!("Card without link or id skipped");
                report.skipped += 1;
                continue;
            };
            if seen.contains(&summary.identifier) {
                info!("Duplicate event skipped: {}", summary.identifier);
                report.duplicates += 1;
                continue;
            }

            if let Err(e) = self.summaries.append_row(&summary.to_row()).await {
                error!("Failed to insert event {}: {:#}", summary.identifier, e);
                report.insert_failures += 1;
                continue;
            }
            info!("Inserted event: {}", summary.title);
            seen.add(&summary.identifier);
            report.inserted += 1;

            if let Err(e) = self.enricher.enrich(&summary.identifier).await {
                let not_found = e
                    .downcast_ref::<ApiError>()
                    .and_then(ApiError::status)
                    == Some(404);
                if not_found {
                    warn!("Event {} is gone from the API: {:#}", summary.identifier, e);
                } else {
                    error!("Enrichment failed for {}: {:#}", summary.identifier, e);
                }
                report.enrich_failures += 1;
            }
        }
        pb.finish_and_clear();

        info!(
            "Keyword '{}': {} cards, {} new, {} duplicates, {} skipped in {:.1}s",
            report.keyword,
            report.cards,
            report.inserted,
            report.duplicates,
            report.skipped,
            t0.elapsed().as_secs_f64()
        );
        report
    }

    /// Navigate and wait for the results header. False means skip the keyword.
    async fn open_listing(&self, page: &dyn Page, url: &str, keyword: &str) -> bool {
        info!("Navigating to: {}", url);
        match tokio::time::timeout(self.settings.navigation_timeout, page.goto(url)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Navigation failed for '{}', skipping: {:#}", keyword, e);
                return false;
            }
            Err(_) => {
                warn!("Navigation timeout for '{}', skipping.", keyword);
                return false;
            }
        }

        match tokio::time::timeout(self.settings.listing_timeout, page.wait_for(LISTING_MARKER))
            .await
        {
            Ok(Ok(())) => {
                info!("Event list container loaded.");
                true
            }
            Ok(Err(e)) => {
                warn!("Listing wait failed for '{}', skipping: {:#}", keyword, e);
                false
            }
            Err(_) => {
                warn!("Timeout for '{}', skipping.", keyword);
                false
            }
        }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} cards ({per_sec})")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb
    }
}
