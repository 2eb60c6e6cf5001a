//! Chrome/Chromium sessions driven over the DevTools protocol
//!
//! Every session owns one browser process, its CDP handler task and a private
//! profile directory. Launch parameters come from an explicit [`ChromeConfig`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig, HeadlessMode};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::pool::{BrowserSession, SessionFactory};
use crate::config::BrowserConfig;

/// Browser launch parameters
#[derive(Debug, Clone)]
pub struct ChromeConfig {
    /// Browser executable; auto-detected when `None`
    pub executable: Option<PathBuf>,

    /// Run without a visible window
    pub headless: bool,

    /// Extra command-line arguments
    pub args: Vec<String>,
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            args: Vec::new(),
        }
    }
}

impl From<&BrowserConfig> for ChromeConfig {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            headless: config.headless,
            args: config.args.clone(),
        }
    }
}

/// Launches one Chrome process per session
#[derive(Debug)]
pub struct ChromeSessionFactory {
    config: ChromeConfig,
    next_id: AtomicU64,
}

impl ChromeSessionFactory {
    pub fn new(config: ChromeConfig) -> Self {
        Self {
            config,
            next_id: AtomicU64::new(0),
        }
    }

    fn launch_config(&self, profile_dir: PathBuf) -> Result<CdpConfig> {
        let mut builder = CdpConfig::builder()
            .request_timeout(Duration::from_secs(30))
            .user_data_dir(profile_dir)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-extensions")
            .arg("--disable-notifications")
            .arg("--mute-audio");

        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }

        builder = if self.config.headless {
            builder.headless_mode(HeadlessMode::default())
        } else {
            builder.with_head()
        };

        for arg in &self.config.args {
            builder = builder.arg(arg.as_str());
        }

        builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {e}"))
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    type Session = ChromeSession;

    async fn create(&self) -> Result<ChromeSession> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let profile_dir = std::env::temp_dir()
            .join(format!("fleetcrawl-chrome-{}-{id}", std::process::id()));
        std::fs::create_dir_all(&profile_dir)
            .with_context(|| format!("Failed to create profile dir {}", profile_dir.display()))?;

        let (browser, mut handler) = Browser::launch(self.launch_config(profile_dir.clone())?)
            .await
            .context("Failed to launch browser")?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let message = e.to_string();
                    // Unknown CDP events fail to deserialize; they are harmless
                    if message.contains("did not match any variant")
                        || message.contains("Failed to deserialize WS response")
                    {
                        trace!("Ignored CDP message error: {message}");
                    } else {
                        error!("Browser handler error: {message}");
                    }
                }
            }
            debug!("Browser handler task completed");
        });

        info!(session = id, "Launched browser session");

        Ok(ChromeSession {
            id,
            browser,
            handler: handler_task,
            page: None,
            profile_dir,
        })
    }
}

/// One browser process with a reusable tab
pub struct ChromeSession {
    id: u64,
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
    profile_dir: PathBuf,
}

impl ChromeSession {
    async fn page(&mut self) -> Result<&Page> {
        if self.page.is_none() {
            let page = self
                .browser
                .new_page("about:blank")
                .await
                .context("Failed to open tab")?;
            self.page = Some(page);
        }
        self.page.as_ref().context("Tab missing after open")
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn render(&mut self, url: &str, settle: Duration) -> Result<String> {
        let page = self.page().await?;
        page.goto(url)
            .await
            .with_context(|| format!("Navigation to {url} failed"))?;

        tokio::time::sleep(settle).await;

        page.content().await.context("Failed to read page content")
    }

    async fn abandon(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(session = self.id, error = %e, "Failed to close abandoned tab");
            }
        }
    }

    async fn close(&mut self) {
        self.abandon().await;
        if let Err(e) = self.browser.close().await {
            warn!(session = self.id, error = %e, "Failed to close browser");
        }
        if let Err(e) = self.browser.wait().await {
            warn!(session = self.id, error = %e, "Failed to wait for browser exit");
        }
        self.handler.abort();

        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            debug!(session = self.id, error = %e, "Profile directory not removed");
        }
        info!(session = self.id, "Closed browser session");
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
