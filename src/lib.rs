//! # Restock
//!
//! Watches retail product pages and, when one comes back in stock, drives a
//! real Chrome window through login, add-to-cart and checkout. It stops at
//! the order review screen. Placing the order is always left to a person.
//!
//! Chrome is driven over a small built-in CDP client with the automation
//! switches hidden and human-like mouse and keyboard input.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use restock::{ChromeSession, Config, MailNotifier, RestockController, SiteProfile};
//!
//! #[tokio::main]
//! async fn main() -> restock::Result<()> {
//!     let config = Config::from_env()?;
//!     let site = SiteProfile::target();
//!     let session = ChromeSession::launch(&config.browser).await?;
//!     let notifier = MailNotifier::new(config.mail.clone());
//!
//!     let report = RestockController::new(&config, &site, &session, &notifier)
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!
//!     println!("finished in {:?}", report.state);
//!     Ok(())
//! }
//! ```
//!
//! ## Testing without a browser
//!
//! Everything above the browser goes through [`BrowserSession`]. Implement it
//! over an in-memory page model to exercise the stock checks, the purchase
//! steps and the retry logic without launching Chrome.

use std::path::PathBuf;

pub mod auth;
pub mod browser;
pub mod cart;
pub mod cdp;
pub mod checkout;
pub mod config;
pub mod controller;
pub mod error;
pub mod human;
pub mod model;
pub mod notify;
pub mod page;
pub mod probe;
pub mod selector;
pub mod session;
pub mod site;
pub mod stealth;

// Re-exports
pub use auth::{Authenticator, LoginReport};
pub use browser::Browser;
pub use cart::{CartComposer, CartConfirmation};
pub use checkout::{CheckoutDriver, ReviewReached};
pub use config::{Config, Credentials, MailSettings, RetentionPolicy, Timing};
pub use controller::{
    check_once, login_dry_run, AbortReason, Disposition, Event, Machine, RestockController,
    RunReport, SessionState, State,
};
pub use error::{Error, Result, StepError};
pub use model::{Item, Notification, UnknownCause, Verdict};
pub use notify::{MailNotifier, NoopNotifier, Notify};
pub use page::Page;
pub use probe::StockProber;
pub use selector::Selector;
pub use session::{BrowserSession, ChromeSession, NodeId};
pub use site::SiteProfile;

/// How Chrome is launched
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Headless mode. Off by default so checkout can be finished by hand.
    pub headless: bool,
    /// Path to Chrome/Chromium binary (None = search well-known locations)
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Use human-like mouse paths and typing cadence
    pub human_input: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            user_agent: stealth::DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1366,
            viewport_height: 768,
            human_input: true,
        }
    }
}
