use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::browser::Page;

pub const LOAD_MORE_BUTTON: &str = r#"button[data-testid="load-more-events-button"]"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrollState {
    Scrolling,
    Done(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ran out of attempts with a "load more" button still showing.
    Exhausted,
    NoMoreContent,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollOutcome {
    pub attempts: u32,
    pub clicks: u32,
    pub reason: StopReason,
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollPlan {
    pub max_attempts: u32,
    pub scroll_pause: Duration,
    pub load_more_pause: Duration,
}

/// Scroll to the bottom and click "load more" until it disappears, an error
/// occurs, or `max_attempts` is spent.
pub async fn load_all(page: &dyn Page, plan: ScrollPlan) -> ScrollOutcome {
    let mut state = ScrollState::Scrolling;
    let mut attempts = 0;
    let mut clicks = 0;

    while state == ScrollState::Scrolling {
        if attempts >= plan.max_attempts {
            state = ScrollState::Done(StopReason::Exhausted);
            break;
        }
        attempts += 1;
        info!("Scrolling attempt {}", attempts);

        state = match attempt(page, plan).await {
            Ok(true) => {
                clicks += 1;
                ScrollState::Scrolling
            }
            Ok(false) => ScrollState::Done(StopReason::NoMoreContent),
            Err(e) => {
                warn!("Scroll error: {:#}", e);
                ScrollState::Done(StopReason::Error)
            }
        };
    }

    let reason = match state {
        ScrollState::Done(reason) => reason,
        ScrollState::Scrolling => StopReason::Exhausted,
    };
    ScrollOutcome {
        attempts,
        clicks,
        reason,
    }
}

/// One cycle. Returns whether a "load more" button was clicked.
async fn attempt(page: &dyn Page, plan: ScrollPlan) -> Result<bool> {
    page.press_end().await?;
    pause(plan.scroll_pause).await;

    let Some(button) = page.query(LOAD_MORE_BUTTON).await? else {
        return Ok(false);
    };
    if !button.is_visible().await? {
        return Ok(false);
    }
    button.click().await?;
    pause(plan.load_more_pause).await;
    Ok(true)
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{FakeElement, FakePage};

    fn plan(max_attempts: u32) -> ScrollPlan {
        ScrollPlan {
            max_attempts,
            scroll_pause: Duration::ZERO,
            load_more_pause: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn always_present_button_is_bounded() {
        let button = FakeElement::new();
        let page = FakePage::new().with(LOAD_MORE_BUTTON, button.clone());

        let out = load_all(&page, plan(5)).await;
        assert_eq!(out.clicks, 5);
        assert_eq!(out.attempts, 5);
        assert_eq!(out.reason, StopReason::Exhausted);
        assert_eq!(button.click_count(), 5);
        assert_eq!(page.end_count(), 5);
    }

    #[tokio::test]
    async fn stops_without_button() {
        let page = FakePage::new();
        let out = load_all(&page, plan(5)).await;
        assert_eq!(out.attempts, 1);
        assert_eq!(out.clicks, 0);
        assert_eq!(out.reason, StopReason::NoMoreContent);
    }

    #[tokio::test]
    async fn hidden_button_counts_as_end() {
        let button = FakeElement::new().hidden();
        let page = FakePage::new().with(LOAD_MORE_BUTTON, button.clone());
        let out = load_all(&page, plan(5)).await;
        assert_eq!(out.reason, StopReason::NoMoreContent);
        assert_eq!(button.click_count(), 0);
    }

    #[tokio::test]
    async fn error_stops_scrolling() {
        let page = FakePage::new()
            .with(LOAD_MORE_BUTTON, FakeElement::new())
            .failing_end();
        let out = load_all(&page, plan(5)).await;
        assert_eq!(out.attempts, 1);
        assert_eq!(out.clicks, 0);
        assert_eq!(out.reason, StopReason::Error);
    }

    #[tokio::test]
    async fn zero_attempts_does_nothing() {
        let page = FakePage::new().with(LOAD_MORE_BUTTON, FakeElement::new());
        let out = load_all(&page, plan(0)).await;
        assert_eq!(out.attempts, 0);
        assert_eq!(page.end_count(), 0);
        assert_eq!(out.reason, StopReason::Exhausted);
    }
}
