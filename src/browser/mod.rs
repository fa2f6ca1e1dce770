pub mod chrome;
#[cfg(test)]
pub mod fake;

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// A rendered DOM node.
#[async_trait]
pub trait Element: Send + Sync {
    /// First descendant matching a CSS selector.
    async fn find_child(&self, selector: &str) -> Result<Option<Box<dyn Element>>>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn is_visible(&self) -> Result<bool>;

    async fn click(&self) -> Result<()>;
}

/// The single tab a scrape run drives.
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    /// Resolves once `selector` matches. Lookup errors are retried and it never
    /// times out on its own; callers bound it.
    async fn wait_for(&self, selector: &str) -> Result<()>;

    /// Press End on the document to trigger lazy loading.
    async fn press_end(&self) -> Result<()>;

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn Element>>>;

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>>;
}

/// A browser plus one open page, owned by a single run.
#[async_trait]
pub trait Session: Send + Sync {
    fn page(&self) -> &dyn Page;

    async fn close(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Session>>;
}

/// Re-run `probe` every `interval` until it reports true. Errors count as "not
/// yet" since execution contexts vanish during redirects and re-renders.
pub async fn poll_until<F, Fut>(what: &str, interval: Duration, mut probe: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    loop {
        match probe().await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => debug!("Polling for {} failed, retrying: {:#}", what, e),
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn polling_survives_transient_errors() {
        let calls = AtomicUsize::new(0);
        poll_until("marker", Duration::ZERO, || async {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 | 1 => Err(anyhow::anyhow!("Cannot find context with specified id")),
                2 => Ok(false),
                _ => Ok(true),
            }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn polling_stays_pending_while_errors_persist() {
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            poll_until("marker", Duration::from_millis(5), || async {
                Err::<bool, _>(anyhow::anyhow!("detached"))
            }),
        )
        .await;
        assert!(waited.is_err());
    }
}
