//! Items, verdicts and notifications

use std::fmt;
use std::hash::{Hash, Hasher};

/// A product page to watch. Identity is the URL.
#[derive(Debug, Clone, Eq)]
pub struct Item {
    pub url: String,
    pub display_name: String,
}

impl Item {
    pub fn new(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.into(),
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Why a probe could not classify a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownCause {
    /// The base page structure never appeared
    PageLoadTimeout,
    /// Neither an out-of-stock marker nor an add-to-cart control showed up
    NoMarker,
    /// The browser failed while looking things up
    Lookup(String),
}

/// Outcome of one stock probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    InStock,
    OutOfStock,
    Unknown(UnknownCause),
}

impl Verdict {
    /// Only an in-stock verdict leads to a purchase attempt
    pub fn is_actionable(&self) -> bool {
        matches!(self, Verdict::InStock)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::InStock => f.write_str("in stock"),
            Verdict::OutOfStock => f.write_str("out of stock"),
            Verdict::Unknown(UnknownCause::PageLoadTimeout) => {
                f.write_str("unknown (page did not load)")
            }
            Verdict::Unknown(UnknownCause::NoMarker) => f.write_str("unknown (no stock marker)"),
            Verdict::Unknown(UnknownCause::Lookup(reason)) => write!(f, "unknown ({})", reason),
        }
    }
}

/// One email-worthy event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn in_stock(item: &Item) -> Self {
        Self {
            subject: format!("In stock: {}", item.display_name),
            body: format!(
                "{} is in stock. Attempting to add it to the cart.\n\n{}",
                item.display_name, item.url
            ),
        }
    }

    pub fn cart_failed(item: &Item, reason: &str, retry_count: u32, max_retries: u32) -> Self {
        Self {
            subject: format!("Add to cart failed: {}", item.display_name),
            body: format!(
                "Could not add {} to the cart: {}\nAttempt {} of {}.\n\n{}",
                item.display_name, reason, retry_count, max_retries, item.url
            ),
        }
    }

    pub fn checkout_failed(item: &Item, reason: &str, retry_count: u32, max_retries: u32) -> Self {
        Self {
            subject: format!("Checkout failed: {}", item.display_name),
            body: format!(
                "{} is in the cart but checkout did not reach order review: {}\nAttempt {} of {}.",
                item.display_name, reason, retry_count, max_retries
            ),
        }
    }

    pub fn review_ready(item: &Item) -> Self {
        Self {
            subject: format!("Ready to place order: {}", item.display_name),
            body: format!(
                "Checkout for {} reached the order review screen and was held there for review.\n\
                 The order has NOT been placed. Only a click on \"Place order\" by you submits it.",
                item.display_name
            ),
        }
    }
}
