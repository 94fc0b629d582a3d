//! The browser seam the shopping flow runs against
//!
//! Probe, login, cart and checkout only ever see [`BrowserSession`]. The real
//! implementation drives Chrome; tests drive an in-memory page model.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::browser::Browser;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::selector::Selector;
use crate::BrowserConfig;

/// Handle to an element found by a lookup. Valid until the next lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub i32);

/// One exclusively owned browser window
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Wait until at least one element matches; `Error::Timeout` otherwise
    async fn wait_for_presence(&self, selector: &Selector, timeout: Duration) -> Result<Vec<NodeId>>;

    /// Wait until a matching element is rendered and enabled
    async fn wait_for_clickable(&self, selector: &Selector, timeout: Duration) -> Result<NodeId>;

    /// Elements matching right now; empty if none
    async fn find_all(&self, selector: &Selector) -> Result<Vec<NodeId>>;

    async fn click(&self, node: NodeId) -> Result<()>;

    async fn type_text(&self, node: NodeId, text: &str) -> Result<()>;

    async fn text(&self, node: NodeId) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    /// Shut the browser down. Calling it again is a no-op.
    async fn close(&self) -> Result<()>;

    /// Let the window outlive this process
    fn leave_open(&self);
}

/// [`BrowserSession`] backed by a real Chrome window
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    closed: AtomicBool,
}

impl ChromeSession {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let browser = Browser::launch(config).await?;
        let page = browser.new_page().await?;
        Ok(Self {
            browser,
            page,
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

fn wrap(nodes: Vec<i32>) -> Vec<NodeId> {
    nodes.into_iter().map(NodeId).collect()
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.ensure_open()?;
        tracing::debug!("navigating to {}", url);
        self.page.goto(url).await
    }

    async fn wait_for_presence(&self, selector: &Selector, timeout: Duration) -> Result<Vec<NodeId>> {
        self.ensure_open()?;
        self.page.wait_for(selector, timeout).await.map(wrap)
    }

    async fn wait_for_clickable(&self, selector: &Selector, timeout: Duration) -> Result<NodeId> {
        self.ensure_open()?;
        self.page.wait_for_clickable(selector, timeout).await.map(NodeId)
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<NodeId>> {
        self.ensure_open()?;
        self.page.query(selector).await.map(wrap)
    }

    async fn click(&self, node: NodeId) -> Result<()> {
        self.ensure_open()?;
        self.page.click(node.0).await
    }

    async fn type_text(&self, node: NodeId, text: &str) -> Result<()> {
        self.ensure_open()?;
        self.page.type_into(node.0, text).await
    }

    async fn text(&self, node: NodeId) -> Result<String> {
        self.ensure_open()?;
        self.page.text(node.0).await
    }

    async fn current_url(&self) -> Result<String> {
        self.ensure_open()?;
        self.page.url().await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("Closing browser");
        self.browser.close().await
    }

    fn leave_open(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.browser.leave_open();
        }
    }
}
