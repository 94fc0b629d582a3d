//! Browser Launcher
//!
//! Finds Chrome, launches it with the anti-detection flags and a throwaway
//! profile, and opens pages with the evasion script installed.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Global counter for unique user data directories
static BROWSER_COUNTER: AtomicU64 = AtomicU64::new(0);

use crate::cdp::{launch_chrome, Connection, Transport};
use crate::error::Result;
use crate::page::Page;
use crate::stealth::{find_chrome, launch_args, WEBDRIVER_EVASION};
use crate::BrowserConfig;

/// A running Chrome instance
pub struct Browser {
    connection: Connection,
    config: BrowserConfig,
    /// User data directory (removed on close)
    user_data_dir: PathBuf,
    closed: AtomicBool,
}

impl Browser {
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let instance_id = BROWSER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "restock-browser-{}-{}",
            std::process::id(),
            instance_id
        ));

        // Clean up any stale data
        let _ = std::fs::remove_dir_all(&user_data_dir);
        std::fs::create_dir_all(&user_data_dir)?;

        let chrome_path = find_chrome(config.chrome_path.as_deref())?;
        let args = launch_args(config, &user_data_dir);

        tracing::info!("Launching Chrome from {:?}", chrome_path);
        let (child, ws_url) = launch_chrome(&chrome_path, &args)?;

        let transport = Transport::connect(child, &ws_url)?;
        let connection = Connection::new(transport);

        let version = connection.version().await?;
        tracing::info!("Connected to Chrome: {}", version.product);

        Ok(Self {
            connection,
            config: config.clone(),
            user_data_dir,
            closed: AtomicBool::new(false),
        })
    }

    /// Open a blank tab with the evasion script installed
    pub async fn new_page(&self) -> Result<Page> {
        let session = self.connection.open_page("about:blank").await?;
        session.page_enable().await?;
        // Must be installed before the first real navigation
        session.add_script_on_new_document(WEBDRIVER_EVASION).await?;

        Ok(Page::new(session, self.config.human_input))
    }

    pub async fn version(&self) -> Result<String> {
        let v = self.connection.version().await?;
        Ok(v.product)
    }

    /// Close the browser. Later calls are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.connection.close().await?;
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
        Ok(())
    }

    /// Let Chrome outlive this process, window and profile intact
    pub fn leave_open(&self) {
        self.connection.transport().detach();
        self.closed.store(true, Ordering::SeqCst);
        tracing::info!(
            "Leaving Chrome running (profile at {})",
            self.user_data_dir.display()
        );
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        // The transport's Drop kills Chrome unless it was detached
        if !self.connection.transport().is_detached() {
            let _ = std::fs::remove_dir_all(&self.user_data_dir);
        }
    }
}
