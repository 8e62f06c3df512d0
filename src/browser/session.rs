use crate::config::ScrapeConfig;
use crate::error::{AppError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const LAUNCH_ATTEMPTS: u64 = 3;

/// Exclusively-owned browser page for one retrieval request. The persistent
/// user-data-dir doubles as the session provider: login cookies live in the
/// Chrome profile and are reused across runs, so a one-time manual login in
/// headed mode is enough.
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Option<Page>,
}

impl BrowserSession {
    pub async fn launch(config: &ScrapeConfig) -> Result<Self> {
        let profile_dir = profile_dir(config)?;
        info!(profile = %profile_dir.display(), headless = config.headless, "launching Chrome");

        clear_stale_lock(&profile_dir);

        let mut builder = BrowserConfig::builder()
            .window_size(1280, 1024)
            .user_data_dir(&profile_dir)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-renderer-backgrounding")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage");

        if config.headless {
            builder = builder.arg("--headless").arg("--disable-gpu");
        } else {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| AppError::Browser(format!("failed to build browser config: {}", e)))?;

        let mut last_error = None;
        for attempt in 1..=LAUNCH_ATTEMPTS {
            match Browser::launch(browser_config.clone()).await {
                Ok((browser, mut handler)) => {
                    tokio::spawn(async move {
                        while let Some(event) = handler.next().await {
                            if let Err(e) = event {
                                let text = format!("{:?}", e);
                                // CDP ships events this client version cannot
                                // deserialize; those are noise, not failures.
                                if !text.contains("data did not match any variant") {
                                    debug!(error = %text, "browser handler event");
                                }
                            }
                        }
                    });

                    let page = browser
                        .new_page("about:blank")
                        .await
                        .map_err(|e| AppError::Browser(format!("failed to create page: {}", e)))?;

                    info!("Chrome launched, page created");
                    return Ok(Self {
                        browser: Some(browser),
                        page: Some(page),
                    });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "browser launch failed");
                    last_error = Some(e);
                    if attempt < LAUNCH_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(1000 * attempt)).await;
                        clear_stale_lock(&profile_dir);
                    }
                }
            }
        }

        Err(AppError::Browser(format!(
            "failed to launch browser after {} attempts: {}",
            LAUNCH_ATTEMPTS,
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        )))
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| AppError::Browser("no page available".to_string()))
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        info!(url, "navigating");
        let page = self.page()?;

        page.goto(url)
            .await
            .map_err(|e| AppError::Browser(format!("failed to navigate: {}", e)))?;

        tokio::time::sleep(Duration::from_millis(500)).await;

        // The page keeps streaming content after load; a missed navigation
        // event here is tolerable, the structural waits below are not.
        match tokio::time::timeout(Duration::from_secs(5), page.wait_for_navigation()).await {
            Ok(Ok(_)) => debug!("navigation complete"),
            Ok(Err(e)) => debug!(error = %e, "navigation wait error, continuing"),
            Err(_) => debug!("navigation wait timed out, continuing"),
        }

        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.page()?;
        let result = page
            .evaluate(script)
            .await
            .map_err(|e| AppError::Browser(format!("failed to evaluate script: {}", e)))?;
        result
            .into_value()
            .map_err(|e| AppError::Browser(format!("failed to read script result: {}", e)))
    }

    /// Poll for a selector to appear. Timing out here means the page never
    /// produced the structure we depend on, which is fatal for the caller.
    pub async fn wait_for_selector(&self, selector: &str, timeout_secs: u64) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = Duration::from_secs(timeout_secs);
        let script = format!(
            "() => document.querySelector({}) !== null",
            serde_json::to_string(selector)?
        );

        loop {
            if self
                .evaluate(&script)
                .await?
                .as_bool()
                .unwrap_or(false)
            {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(AppError::Structural(format!(
                    "timeout waiting for selector: {}",
                    selector
                )));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        debug!("closing browser");
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            browser
                .close()
                .await
                .map_err(|e| AppError::Browser(format!("failed to close browser: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = browser.close().await;
                });
            }
        }
    }
}

fn profile_dir(config: &ScrapeConfig) -> Result<PathBuf> {
    let dir = match &config.profile_dir {
        Some(dir) => PathBuf::from(dir),
        None => dirs::data_dir()
            .ok_or_else(|| AppError::Browser("could not determine data directory".to_string()))?
            .join("xhs_scrape")
            .join("ChromeProfile"),
    };
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), "created browser profile directory");
    }
    Ok(dir)
}

// A crashed run can leave Chrome's SingletonLock behind; anything older
// than five minutes cannot belong to a live browser of ours.
fn clear_stale_lock(profile_dir: &Path) {
    let lock_path = profile_dir.join("SingletonLock");
    if !lock_path.exists() {
        return;
    }
    let stale = fs::metadata(&lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|elapsed| elapsed.as_secs() > 300)
        .unwrap_or(true);
    if stale {
        warn!(path = %lock_path.display(), "removing stale SingletonLock");
        let _ = fs::remove_file(&lock_path);
    }
}
