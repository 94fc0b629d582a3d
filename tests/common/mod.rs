//! A scripted in-memory browser for driving the shopping flow without Chrome
//!
//! Pages are keyed by URL. Elements are matched by selector equality, so
//! fixtures are built from the same `SiteProfile` the code under test uses.
//! Waits that would never succeed sleep for their full timeout, so tests run
//! with `start_paused = true`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use restock::{BrowserSession, Error, Item, NodeId, Notify, Result, Selector, SiteProfile};

pub const CHECKOUT_URL: &str = "https://www.target.com/checkout";

/// What a click on an element does
#[derive(Debug, Clone)]
pub enum Effect {
    /// Show hidden elements carrying this key
    Reveal(&'static str),
    /// Load another page
    Navigate(String),
}

#[derive(Debug, Clone)]
pub struct El {
    pub selector: Selector,
    pub text: String,
    pub clickable: bool,
    /// Hidden until an `Effect::Reveal` with this key fires
    pub hidden_until: Option<&'static str>,
    pub effects: Vec<Effect>,
}

impl El {
    pub fn new(selector: &Selector) -> Self {
        Self {
            selector: selector.clone(),
            text: String::new(),
            clickable: true,
            hidden_until: None,
            effects: Vec::new(),
        }
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.clickable = false;
        self
    }

    pub fn hidden_until(mut self, key: &'static str) -> Self {
        self.hidden_until = Some(key);
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub elements: Vec<El>,
}

impl FakePage {
    /// A loaded page: has a `<body>`
    pub fn new() -> Self {
        Self::blank().with(El::new(&Selector::tag("body")))
    }

    /// Nothing rendered at all
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn with(mut self, el: El) -> Self {
        self.elements.push(el);
        self
    }
}

/// Everything the code under test did to the browser, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Navigate(String),
    Click { url: String, selector: Selector },
    Type { selector: Selector, text: String },
    Close,
    LeaveOpen,
}

#[derive(Default)]
struct Inner {
    pages: HashMap<String, Vec<FakePage>>,
    visits: HashMap<String, usize>,
    failing: HashSet<String>,
    current_url: String,
    current: FakePage,
    revealed: HashSet<&'static str>,
    log: Vec<Action>,
    closes: u32,
    left_open: bool,
}

impl Inner {
    fn load(&mut self, url: &str) {
        let visit = self.visits.entry(url.to_string()).or_insert(0);
        let page = self
            .pages
            .get(url)
            .and_then(|pages| pages.get((*visit).min(pages.len().saturating_sub(1))))
            .cloned()
            .unwrap_or_else(FakePage::blank);
        *visit += 1;

        self.current_url = url.to_string();
        self.current = page;
        self.revealed.clear();
    }

    fn visible(&self, el: &El) -> bool {
        el.hidden_until.map_or(true, |key| self.revealed.contains(key))
    }

    fn matching(&self, selector: &Selector, clickable_only: bool) -> Vec<NodeId> {
        self.current
            .elements
            .iter()
            .enumerate()
            .filter(|(_, el)| el.selector == *selector && self.visible(el))
            .filter(|(_, el)| !clickable_only || el.clickable)
            .map(|(i, _)| NodeId(i as i32))
            .collect()
    }

    fn element(&self, node: NodeId) -> Result<El> {
        self.current
            .elements
            .get(node.0 as usize)
            .filter(|el| self.visible(el))
            .cloned()
            .ok_or_else(|| Error::ElementNotFound(format!("node {}", node.0)))
    }
}

pub struct FakeSession {
    inner: Mutex<Inner>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                current_url: "about:blank".to_string(),
                ..Default::default()
            }),
        }
    }

    /// Serve `page` for every visit to `url`
    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.pages(url, vec![page])
    }

    /// Serve `pages` on successive visits to `url`; the last one repeats
    pub fn pages(self, url: &str, pages: Vec<FakePage>) -> Self {
        self.inner.lock().unwrap().pages.insert(url.to_string(), pages);
        self
    }

    /// Navigation to `url` fails outright
    pub fn failing(self, url: &str) -> Self {
        self.inner.lock().unwrap().failing.insert(url.to_string());
        self
    }

    /// Pretend the browser is already showing `url`
    pub fn at(self, url: &str) -> Self {
        self.inner.lock().unwrap().load(url);
        self
    }

    pub fn log(&self) -> Vec<Action> {
        self.inner.lock().unwrap().log.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|a| match a {
                Action::Navigate(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// URLs at which `selector` was clicked
    pub fn clicks_on(&self, selector: &Selector) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|a| match a {
                Action::Click { url, selector: s } if s == *selector => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn typed_into(&self, selector: &Selector) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|a| match a {
                Action::Type { selector: s, text } if s == *selector => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> u32 {
        self.inner.lock().unwrap().closes
    }

    pub fn left_open(&self) -> bool {
        self.inner.lock().unwrap().left_open
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.log.push(Action::Navigate(url.to_string()));
        if inner.failing.contains(url) {
            return Err(Error::Navigation(format!("{}: net::ERR_CONNECTION_RESET", url)));
        }
        inner.load(url);
        Ok(())
    }

    async fn wait_for_presence(&self, selector: &Selector, timeout: Duration) -> Result<Vec<NodeId>> {
        let found = self.inner.lock().unwrap().matching(selector, false);
        if !found.is_empty() {
            return Ok(found);
        }
        tokio::time::sleep(timeout).await;
        Err(Error::Timeout(format!("'{}' not found", selector)))
    }

    async fn wait_for_clickable(&self, selector: &Selector, timeout: Duration) -> Result<NodeId> {
        let found = self.inner.lock().unwrap().matching(selector, true);
        if let Some(node) = found.first() {
            return Ok(*node);
        }
        tokio::time::sleep(timeout).await;
        Err(Error::Timeout(format!("'{}' not clickable", selector)))
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<NodeId>> {
        Ok(self.inner.lock().unwrap().matching(selector, false))
    }

    async fn click(&self, node: NodeId) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let el = inner.element(node)?;
        let url = inner.current_url.clone();
        inner.log.push(Action::Click {
            url,
            selector: el.selector.clone(),
        });
        for effect in el.effects {
            match effect {
                Effect::Reveal(key) => {
                    inner.revealed.insert(key);
                }
                Effect::Navigate(url) => inner.load(&url),
            }
        }
        Ok(())
    }

    async fn type_text(&self, node: NodeId, text: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let el = inner.element(node)?;
        inner.log.push(Action::Type {
            selector: el.selector,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn text(&self, node: NodeId) -> Result<String> {
        Ok(self.inner.lock().unwrap().element(node)?.text)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.inner.lock().unwrap().current_url.clone())
    }

    async fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.closes += 1;
        inner.log.push(Action::Close);
        Ok(())
    }

    fn leave_open(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.left_open = true;
        inner.log.push(Action::LeaveOpen);
    }
}

/// Keeps every message instead of sending it
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn subjects(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }
}

#[async_trait]
impl Notify for RecordingNotifier {
    async fn notify(&self, subject: &str, body: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
        true
    }
}

// =========================================================================
// Page fixtures
// =========================================================================

pub fn item(n: u32) -> Item {
    Item::new(
        format!("https://www.target.com/p/item-{}/-/A-{}", n, 1000 + n),
        format!("Item {}", n),
    )
}

pub fn out_of_stock_page(site: &SiteProfile) -> FakePage {
    FakePage::new()
        .with(El::new(&site.out_of_stock).text("Out of stock"))
        .with(El::new(&site.add_to_cart).text("Add to cart").disabled())
}

/// Product page whose add-to-cart button shows the confirmation banner
pub fn in_stock_page(site: &SiteProfile) -> FakePage {
    FakePage::new()
        .with(
            El::new(&site.add_to_cart)
                .text("Add to cart")
                .on_click(Effect::Reveal("added")),
        )
        .with(
            El::new(&site.added_to_cart)
                .text("Added to cart")
                .hidden_until("added"),
        )
}

/// Product page whose add-to-cart button does nothing visible
pub fn broken_cart_page(site: &SiteProfile) -> FakePage {
    FakePage::new().with(El::new(&site.add_to_cart).text("Add to cart"))
}

/// Login form that signs in on submit
pub fn login_page(site: &SiteProfile) -> FakePage {
    FakePage::new()
        .with(El::new(&site.username_field))
        .with(El::new(&site.password_field))
        .with(El::new(&site.login_button).on_click(Effect::Reveal("signed-in")))
        .with(El::new(&site.account_marker).hidden_until("signed-in"))
        .with(
            El::new(&site.account_name)
                .text("Ash")
                .hidden_until("signed-in"),
        )
}

/// Login form that rejects the credentials
pub fn rejecting_login_page(site: &SiteProfile) -> FakePage {
    FakePage::new()
        .with(El::new(&site.username_field))
        .with(El::new(&site.password_field))
        .with(El::new(&site.login_button).on_click(Effect::Reveal("rejected")))
        .with(
            El::new(&site.login_error)
                .text("That password is incorrect.")
                .hidden_until("rejected"),
        )
}

pub fn cart_page(site: &SiteProfile) -> FakePage {
    FakePage::new()
        .with(El::new(&site.cart_ready).text("Cart"))
        .with(
            El::new(&site.checkout_button)
                .text("Check out")
                .on_click(Effect::Navigate(CHECKOUT_URL.to_string())),
        )
}

pub fn checkout_page(site: &SiteProfile) -> FakePage {
    FakePage::new()
        .with(El::new(&site.checkout_page).text("Shipping"))
        .with(El::new(&site.place_order).text("Place order"))
}

/// A store where login, cart and checkout all work
pub fn store(site: &SiteProfile) -> FakeSession {
    FakeSession::new()
        .page(&site.account_url, login_page(site))
        .page(&site.cart_url, cart_page(site))
        .page(CHECKOUT_URL, checkout_page(site))
}
