//! Error types for restock

use std::time::Duration;

use thiserror::Error;

/// Result type for browser and startup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the browser layer and process startup
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to launch Chrome
    #[error("Failed to launch Chrome: {0}")]
    Launch(String),

    /// Transport error
    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// CDP protocol error
    #[error("CDP error in {method}: {message} (code {code})")]
    Cdp {
        method: String,
        code: i64,
        message: String,
    },

    /// JavaScript evaluated in the page threw or returned nothing
    #[error("Script error: {0}")]
    Script(String),

    /// Navigation error
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// Element not found in DOM
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Chrome not found
    #[error("Chrome not found (set CHROME_PATH)")]
    ChromeNotFound,

    /// Browser session already closed
    #[error("Browser session is closed")]
    Closed,

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    /// Create a transport error with IO source
    pub fn transport_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create a CDP error with full context
    pub fn cdp(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a "box model" error (element not rendered)
    pub fn is_not_rendered(&self) -> bool {
        matches!(self, Error::Cdp { message, .. } if message.contains("box model"))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }
}

/// Failure of one side-effecting step (login, add-to-cart, checkout)
#[derive(Debug, Error)]
pub enum StepError {
    /// A marker did not show up in time
    #[error("timed out after {}s waiting for {what}", after.as_secs())]
    Timeout { what: &'static str, after: Duration },

    /// The browser failed underneath the step
    #[error("browser failure while {step}: {source}")]
    Browser {
        step: &'static str,
        #[source]
        source: Error,
    },

    /// The action ran but no confirmation signal appeared
    #[error("no confirmation that {0}")]
    Unconfirmed(&'static str),
}

impl StepError {
    /// Classify a browser error raised while waiting for `what`.
    ///
    /// Timeouts keep their own variant so logs read as "waited N s for X"
    /// instead of a generic browser failure.
    pub fn waiting(what: &'static str, after: Duration) -> impl FnOnce(Error) -> StepError {
        move |err| match err {
            Error::Timeout(_) => StepError::Timeout { what, after },
            source => StepError::Browser { step: what, source },
        }
    }

    /// Wrap a browser error raised while performing `step`
    pub fn browser(step: &'static str) -> impl FnOnce(Error) -> StepError {
        move |source| StepError::Browser { step, source }
    }
}
