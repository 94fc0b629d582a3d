//! Anti-detection launch settings
//!
//! Chrome flags that hide the automation switches, the user agent, and the
//! script that masks `navigator.webdriver` before any page script runs.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::BrowserConfig;

/// A current desktop Chrome on macOS
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Injected into every new document before page scripts run
pub const WEBDRIVER_EVASION: &str = r#"
(() => {
    try {
        Object.defineProperty(Object.getPrototypeOf(navigator), 'webdriver', {
            get: () => undefined,
            configurable: true,
        });
    } catch (e) {}

    for (const prop of ['domAutomation', 'domAutomationController', '_selenium',
                        '__webdriver_script_fn', '__driver_evaluate', '__webdriver_evaluate']) {
        try { if (prop in window) delete window[prop]; } catch (e) {}
    }
})();
"#;

/// Chrome command line for a run
pub fn launch_args(config: &BrowserConfig, user_data_dir: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "--disable-blink-features=AutomationControlled",
        "--excludeSwitches=enable-automation",
        "--disable-infobars",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--disable-gpu",
        "--no-first-run",
        "--no-default-browser-check",
        "--password-store=basic",
        "--use-mock-keychain",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    args.push(format!(
        "--window-size={},{}",
        config.viewport_width, config.viewport_height
    ));
    args.push(format!("--user-agent={}", config.user_agent));
    args.push(format!("--user-data-dir={}", user_data_dir.display()));

    if config.headless {
        args.push("--headless=new".into());
    }

    args
}

/// Find the Chrome binary: explicit path first, then well-known install locations
pub fn find_chrome(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::Launch(format!("{} does not exist", path.display())))
        };
    }

    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "linux") {
        &[
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/snap/bin/chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[]
    };

    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
        .ok_or(Error::ChromeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_hide_automation_and_set_identity() {
        let config = BrowserConfig::default();
        let args = launch_args(&config, Path::new("/tmp/restock-test"));

        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&format!("--user-agent={}", DEFAULT_USER_AGENT)));
        assert!(args.contains(&"--window-size=1366,768".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/restock-test".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn headless_flag_is_opt_in() {
        let config = BrowserConfig {
            headless: true,
            ..Default::default()
        };
        let args = launch_args(&config, Path::new("/tmp/x"));
        assert!(args.contains(&"--headless=new".to_string()));
    }

    #[test]
    fn missing_explicit_chrome_is_a_launch_error() {
        let err = find_chrome(Some(Path::new("/definitely/not/chrome"))).unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
    }

    #[test]
    fn evasion_script_is_wrapped_in_iife() {
        let script = WEBDRIVER_EVASION.trim();
        assert!(script.starts_with("(() => {"));
        assert!(script.ends_with("})();"));
    }
}
