use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use uuid::Uuid;

use crate::error::BotError;
use crate::models::{ChartImage, MarketPair};
use crate::Result;

pub const DEFAULT_CHART_URL: &str = "https://upbit.com/full_chart?code=CRIX.UPBIT.{market}";

/// Produces a picture of the pair's recent price action
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render_chart(&self, pair: &MarketPair) -> Result<ChartImage>;
}

/// Removes the screenshot file however rendering ends
struct ScreenshotFile(PathBuf);

impl ScreenshotFile {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("autotrade-chart-{}.png", Uuid::new_v4())))
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScreenshotFile {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = std::fs::remove_file(&self.0) {
                tracing::warn!("Failed to remove chart screenshot {}: {}", self.0.display(), e);
            }
        }
    }
}

/// Screenshots a chart page with a headless Chromium-family browser
///
/// The page behind `url_template` decides what is drawn (interval, overlays).
/// The `{market}` placeholder is replaced with the pair, e.g. `KRW-BTC`.
#[derive(Debug, Clone)]
pub struct HeadlessBrowserRenderer {
    browser: String,
    url_template: String,
    width: u32,
    height: u32,
    timeout: Duration,
    /// Time the page gets to run its scripts before the capture
    render_budget: Duration,
}

impl HeadlessBrowserRenderer {
    pub fn new(browser: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            browser: browser.into(),
            url_template: url_template.into(),
            width: 1920,
            height: 1080,
            timeout: Duration::from_secs(60),
            render_budget: Duration::from_secs(10),
        }
    }

    pub fn with_window(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn chart_url(&self, pair: &MarketPair) -> String {
        self.url_template.replace("{market}", &pair.to_string())
    }

    fn browser_args(&self, screenshot: &Path, url: &str) -> Vec<String> {
        vec![
            "--headless=new".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--hide-scrollbars".to_string(),
            format!("--window-size={},{}", self.width, self.height),
            format!("--virtual-time-budget={}", self.render_budget.as_millis()),
            format!("--screenshot={}", screenshot.display()),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl ChartRenderer for HeadlessBrowserRenderer {
    async fn render_chart(&self, pair: &MarketPair) -> Result<ChartImage> {
        let screenshot = ScreenshotFile::new();
        let url = self.chart_url(pair);

        tracing::debug!(browser = %self.browser, url = %url, "Rendering chart");

        let status = tokio::time::timeout(
            self.timeout,
            Command::new(&self.browser)
                .args(self.browser_args(screenshot.path(), &url))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await
        .map_err(|_| BotError::ChartRender(format!("browser timed out after {:?}", self.timeout)))?
        .map_err(|e| BotError::ChartRender(format!("failed to launch '{}': {}", self.browser, e)))?;

        if !status.success() {
            return Err(BotError::ChartRender(format!("browser exited with {}", status)));
        }

        let bytes = tokio::fs::read(screenshot.path())
            .await
            .map_err(|e| BotError::ChartRender(format!("no screenshot produced: {}", e)))?;

        if bytes.is_empty() {
            return Err(BotError::ChartRender("empty screenshot".to_string()));
        }

        tracing::info!("Rendered {} chart ({} bytes)", pair, bytes.len());
        Ok(ChartImage::png(bytes))
    }
}
