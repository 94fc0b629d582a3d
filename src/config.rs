//! Runtime configuration
//!
//! Everything is read once at startup from the environment (optionally seeded
//! from a `.env` file) into an immutable [`Config`] that is handed to each
//! component. Nothing reads the environment after that.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::Item;
use crate::BrowserConfig;

/// The products watched by default
pub fn default_items() -> Vec<Item> {
    vec![Item::new(
        "https://www.target.com/p/pok-233-mon-trading-card-game-scarlet-38-violet-151-binder-collection/-/A-89444929",
        "Pokémon Scarlet & Violet 151 Binder Collection",
    )]
}

/// Account credentials for the retailer
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Email safe to print: first and last three characters only
    pub fn masked_email(&self) -> String {
        mask(&self.email)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.masked_email())
            .field("password", &"********")
            .finish()
    }
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Outbound mail settings. Sending needs `enabled` plus recipient and password.
#[derive(Clone)]
pub struct MailSettings {
    pub enabled: bool,
    pub recipient: Option<String>,
    pub password: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl MailSettings {
    /// Recipient and password, if mail is enabled and fully configured
    pub fn ready(&self) -> Option<(&str, &str)> {
        if !self.enabled {
            return None;
        }
        match (self.recipient.as_deref(), self.password.as_deref()) {
            (Some(to), Some(pw)) if !to.is_empty() && !pw.is_empty() => Some((to, pw)),
            _ => None,
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            recipient: None,
            password: None,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
        }
    }
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("enabled", &self.enabled)
            .field("recipient", &self.recipient.as_deref().map(mask))
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .finish()
    }
}

/// What to do with the browser when a run stops mid-purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Leave the window open if the run stopped while acting on an item
    /// with retries still available, so a human can finish the order
    #[default]
    KeepOpenWhenReviewPending,
    /// Always close the browser on exit
    AlwaysClose,
}

impl FromStr for RetentionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "review-pending" | "review_pending" | "keep" => {
                Ok(RetentionPolicy::KeepOpenWhenReviewPending)
            }
            "never" | "close" | "always-close" => Ok(RetentionPolicy::AlwaysClose),
            other => Err(Error::config(format!(
                "KEEP_BROWSER_OPEN must be 'review-pending' or 'never', got '{}'",
                other
            ))),
        }
    }
}

/// Every timeout and pause in the flow
#[derive(Debug, Clone)]
pub struct Timing {
    /// Wait for the base page structure after navigating
    pub page_load: Duration,
    /// Random pause before inspecting a product page (seconds)
    pub probe_pause: RangeInclusive<f64>,
    /// Wait for the add-to-cart control while probing
    pub stock_marker: Duration,
    pub login_form: Duration,
    /// Pause between filling the form and submitting it (seconds)
    pub typing_pause: RangeInclusive<f64>,
    pub passcode_prompt: Duration,
    pub login_confirm: Duration,
    pub add_to_cart: Duration,
    pub cart_banner: Duration,
    pub cart_count: Duration,
    pub cart_page: Duration,
    pub checkout_button: Duration,
    pub checkout_page: Duration,
    pub place_order: Duration,
    /// How long the window stays up at order review before the run finishes
    pub review_hold: Duration,
    /// Half-width of the random jitter added to the check interval
    pub interval_jitter: Duration,
    /// Gap between items in a one-shot stock check
    pub check_gap: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(10),
            probe_pause: 1.0..=3.0,
            stock_marker: Duration::from_secs(5),
            login_form: Duration::from_secs(10),
            typing_pause: 0.5..=1.5,
            passcode_prompt: Duration::from_secs(10),
            login_confirm: Duration::from_secs(15),
            add_to_cart: Duration::from_secs(10),
            cart_banner: Duration::from_secs(10),
            cart_count: Duration::from_secs(5),
            cart_page: Duration::from_secs(10),
            checkout_button: Duration::from_secs(10),
            checkout_page: Duration::from_secs(15),
            place_order: Duration::from_secs(15),
            review_hold: Duration::from_secs(600),
            interval_jitter: Duration::from_secs(5),
            check_gap: Duration::from_secs(5),
        }
    }
}

/// Immutable process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub check_interval: Duration,
    pub max_retries: u32,
    pub credentials: Option<Credentials>,
    pub mail: MailSettings,
    pub browser: BrowserConfig,
    pub timing: Timing,
    pub retention: RetentionPolicy,
    pub items: Vec<Item>,
    pub log_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            max_retries: 3,
            credentials: None,
            mail: MailSettings::default(),
            browser: BrowserConfig::default(),
            timing: Timing::default(),
            retention: RetentionPolicy::default(),
            items: default_items(),
            log_file: PathBuf::from("restock.log"),
        }
    }
}

impl Config {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::config(format!(".env: {}", e))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset and blank keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let check_interval = Duration::from_secs(parse_or(&get, "CHECK_INTERVAL", 60u64)?);
        let max_retries = parse_or(&get, "MAX_RETRIES", defaults.max_retries)?;

        let credentials = match (get("TARGET_EMAIL"), get("TARGET_PASSWORD")) {
            (Some(email), Some(password)) => Some(Credentials { email, password }),
            _ => None,
        };

        let mail = MailSettings {
            enabled: flag_or(&get, "SEND_EMAIL_NOTIFICATIONS", false)?,
            recipient: get("NOTIFICATION_EMAIL"),
            password: get("EMAIL_PASSWORD"),
            smtp_host: get("SMTP_SERVER").unwrap_or(defaults.mail.smtp_host),
            smtp_port: parse_or(&get, "SMTP_PORT", defaults.mail.smtp_port)?,
        };

        let browser = BrowserConfig {
            headless: flag_or(&get, "HEADLESS", defaults.browser.headless)?,
            chrome_path: get("CHROME_PATH").map(PathBuf::from),
            user_agent: get("USER_AGENT").unwrap_or(defaults.browser.user_agent),
            ..defaults.browser
        };

        let timing = Timing {
            review_hold: Duration::from_secs(parse_or(&get, "REVIEW_HOLD_SECS", 600u64)?),
            ..defaults.timing
        };

        let retention = match get("KEEP_BROWSER_OPEN") {
            Some(value) => value.parse()?,
            None => defaults.retention,
        };

        Ok(Self {
            check_interval,
            max_retries,
            credentials,
            mail,
            browser,
            timing,
            retention,
            items: defaults.items,
            log_file: get("RESTOCK_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_file),
        })
    }

    /// Credentials, or a configuration error naming the missing variables
    pub fn require_credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            Error::config("TARGET_EMAIL and TARGET_PASSWORD must be set (environment or .env)")
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::config(format!("{}='{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn flag_or<F>(get: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::config(format!("{} must be true or false, got '{}'", key, v))),
        },
    }
}
