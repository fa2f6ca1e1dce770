//! In-memory page and elements for driving the scraper without Chromium.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{BrowserLauncher, Element, Page, Session};

#[derive(Clone, Default)]
pub struct FakeElement {
    attrs: HashMap<String, String>,
    children: HashMap<String, FakeElement>,
    visible: bool,
    broken_attrs: Vec<String>,
    pub clicks: Arc<AtomicUsize>,
}

impl FakeElement {
    pub fn new() -> Self {
        Self {
            visible: true,
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn child(mut self, selector: &str, el: FakeElement) -> Self {
        self.children.insert(selector.to_string(), el);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Reading this attribute fails, as a detached node would.
    pub fn broken_attr(mut self, name: &str) -> Self {
        self.broken_attrs.push(name.to_string());
        self
    }

    /// A listing card whose primary link carries the given attributes.
    pub fn card(label: Option<&str>, href: &str, id: &str) -> Self {
        let mut link = FakeElement::new()
            .attr("target", "_blank")
            .attr("href", href)
            .attr("data-event-id", id);
        if let Some(label) = label {
            link = link.attr("aria-label", label);
        }
        FakeElement::new().child(crate::scraper::card::PRIMARY_LINK, link)
    }

    pub fn click_count(&self) -> usize {
        self.clicks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn find_child(&self, selector: &str) -> Result<Option<Box<dyn Element>>> {
        Ok(self
            .children
            .get(selector)
            .map(|c| Box::new(c.clone()) as Box<dyn Element>))
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        if self.broken_attrs.iter().any(|a| a == name) {
            bail!("Node is detached from document");
        }
        Ok(self.attrs.get(name).cloned())
    }

    async fn is_visible(&self) -> Result<bool> {
        Ok(self.visible)
    }

    async fn click(&self) -> Result<()> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A page with a fixed set of elements keyed by selector.
#[derive(Clone, Default)]
pub struct FakePage {
    elements: HashMap<String, Vec<FakeElement>>,
    pub visited: Arc<Mutex<Vec<String>>>,
    pub end_presses: Arc<AtomicUsize>,
    fail_goto: bool,
    fail_end: bool,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, selector: &str, el: FakeElement) -> Self {
        self.elements.entry(selector.to_string()).or_default().push(el);
        self
    }

    pub fn failing_goto(mut self) -> Self {
        self.fail_goto = true;
        self
    }

    pub fn failing_end(mut self) -> Self {
        self.fail_end = true;
        self
    }

    pub fn end_count(&self) -> usize {
        self.end_presses.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        if self.fail_goto {
            bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        if let Ok(mut v) = self.visited.lock() {
            v.push(url.to_string());
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str) -> Result<()> {
        if self.elements.contains_key(selector) {
            return Ok(());
        }
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn press_end(&self) -> Result<()> {
        if self.fail_end {
            bail!("Target closed");
        }
        self.end_presses.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn Element>>> {
        Ok(self
            .elements
            .get(selector)
            .and_then(|els| els.first())
            .map(|el| Box::new(el.clone()) as Box<dyn Element>))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>> {
        Ok(self
            .elements
            .get(selector)
            .map(|els| {
                els.iter()
                    .map(|el| Box::new(el.clone()) as Box<dyn Element>)
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Hands out sessions over clones of one page and counts open/close calls.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    page: FakePage,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(page: FakePage) -> Self {
        Self {
            page,
            ..Default::default()
        }
    }

    pub fn open_sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.closed.load(Ordering::SeqCst)
    }
}

struct FakeSession {
    page: FakePage,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl Session for FakeSession {
    fn page(&self) -> &dyn Page {
        &self.page
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Session>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }
}
