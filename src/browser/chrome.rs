use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{poll_until, BrowserLauncher, Element, Page, Session};
use crate::config;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

const VISIBLE_JS: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    const s = window.getComputedStyle(this); \
    return s.visibility !== 'hidden' && s.display !== 'none' && r.width > 0 && r.height > 0; \
}";

/// Launches a local Chromium through the DevTools protocol.
pub struct ChromeLauncher {
    headless: bool,
    user_agent: String,
}

impl ChromeLauncher {
    pub fn new(cfg: &config::BrowserConfig) -> Self {
        Self {
            headless: cfg.headless,
            user_agent: cfg.user_agent.clone(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn Session>> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.user_agent));
        if !self.headless {
            builder = builder.with_head();
        }
        let browser_cfg = builder
            .build()
            .map_err(|e| anyhow!("Browser config error: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_cfg)
            .await
            .context("Browser launch failed")?;
        let handler_task = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to open page")?;
        info!("Browser session started (headless: {})", self.headless);

        Ok(Box::new(ChromeSession {
            browser,
            page: ChromePage { page },
            handler_task,
        }))
    }
}

struct ChromeSession {
    browser: Browser,
    page: ChromePage,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl Session for ChromeSession {
    fn page(&self) -> &dyn Page {
        &self.page
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let ChromeSession {
            mut browser,
            page,
            handler_task,
        } = *self;

        if let Err(e) = page.page.close().await {
            debug!("Page close error: {}", e);
        }
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            warn!("Browser did not exit cleanly: {}", e);
        }
        handler_task.abort();
        closed.context("Browser close failed")?;
        info!("Browser session closed");
        Ok(())
    }
}

struct ChromePage {
    page: chromiumoxide::Page,
}

#[async_trait]
impl Page for ChromePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Navigation to {} failed", url))?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str) -> Result<()> {
        poll_until(selector, POLL_INTERVAL, || async {
            Ok::<_, anyhow::Error>(!self.page.find_elements(selector).await?.is_empty())
        })
        .await;
        Ok(())
    }

    async fn press_end(&self) -> Result<()> {
        self.page.find_element("body").await?.press_key("End").await?;
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn Element>>> {
        let found = self.page.find_elements(selector).await?;
        Ok(found
            .into_iter()
            .next()
            .map(|el| Box::new(ChromeElement(el)) as Box<dyn Element>))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>> {
        let found = self.page.find_elements(selector).await?;
        Ok(found
            .into_iter()
            .map(|el| Box::new(ChromeElement(el)) as Box<dyn Element>)
            .collect())
    }
}

struct ChromeElement(chromiumoxide::element::Element);

#[async_trait]
impl Element for ChromeElement {
    async fn find_child(&self, selector: &str) -> Result<Option<Box<dyn Element>>> {
        let found = self.0.find_elements(selector).await?;
        Ok(found
            .into_iter()
            .next()
            .map(|el| Box::new(ChromeElement(el)) as Box<dyn Element>))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        Ok(self.0.attribute(name).await?)
    }

    async fn is_visible(&self) -> Result<bool> {
        let ret = self.0.call_js_fn(VISIBLE_JS, false).await?;
        Ok(ret
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn click(&self) -> Result<()> {
        self.0.click().await?;
        Ok(())
    }
}
