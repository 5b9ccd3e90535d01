//! Headless Chrome listing browser using chromiumoxide

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::DiscoveryConfig;
use crate::error::{PipelineError, Result};
use crate::traits::{ListingBrowser, ListingElement, ListingSession};

const SCROLL_SCRIPT: &str = "window.scrollBy(0, window.innerHeight);";
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches a fresh browser for every listing page
pub struct ChromeBrowser {
    config: DiscoveryConfig,
}

impl ChromeBrowser {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self, url: &str) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--lang={}", self.config.locale))
            .arg(format!("--user-agent={}", self.config.user_agent))
            .request_timeout(self.config.navigation_timeout());

        if !self.config.headless {
            builder = builder.with_head();
        }

        builder
            .build()
            .map_err(|e| PipelineError::navigation(url, format!("failed to build browser config: {e}")))
    }

    /// Navigate, settle, then scroll so lazy-loaded results render
    async fn load(&self, browser: &Browser, url: &str) -> Result<Page> {
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| PipelineError::navigation(url, format!("failed to create page: {e}")))?;

        page.wait_for_navigation()
            .await
            .map_err(|e| PipelineError::navigation(url, e))?;

        tokio::time::sleep(self.config.initial_settle()).await;

        for step in 0..self.config.scroll_count {
            if let Err(e) = page.evaluate(SCROLL_SCRIPT).await {
                warn!(url = %url, step, error = %e, "Scroll failed");
            }
            tokio::time::sleep(self.config.scroll_settle()).await;
        }

        Ok(page)
    }
}

#[async_trait]
impl ListingBrowser for ChromeBrowser {
    async fn open(&self, url: &str) -> Result<Box<dyn ListingSession>> {
        let browser_config = self.browser_config(url)?;

        let (mut browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            PipelineError::navigation(
                url,
                format!("failed to launch browser: {e}. Is Chrome or Chromium installed and in PATH?"),
            )
        })?;

        let handler = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        // The limit wraps only the load so a timeout still reaches shutdown
        let loaded = within(self.config.navigation_timeout(), url, self.load(&browser, url)).await;
        match loaded {
            Ok(page) => Ok(Box::new(ChromeSession {
                browser,
                page: Some(page),
                handler,
            })),
            Err(e) => {
                shutdown(&mut browser, handler).await;
                Err(e)
            }
        }
    }
}

/// One browser with one loaded listing page
pub struct ChromeSession {
    browser: Browser,
    page: Option<Page>,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    async fn snapshot(&self, selector: &str, attributes: &[&str]) -> Result<Vec<ListingElement>> {
        let Some(page) = self.page.as_ref() else {
            return Ok(Vec::new());
        };

        let script = snapshot_script(selector, attributes)?;
        page.evaluate(script)
            .await
            .map_err(|e| PipelineError::navigation("", format!("script execution failed: {e}")))?
            .into_value::<Vec<ListingElement>>()
            .map_err(|e| PipelineError::navigation("", format!("failed to parse snapshot: {e:?}")))
    }
}

#[async_trait]
impl ListingSession for ChromeSession {
    async fn query(
        &mut self,
        selector: &str,
        attributes: &[&str],
        wait: Duration,
    ) -> Result<Vec<ListingElement>> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            let elements = self.snapshot(selector, attributes).await?;
            if !elements.is_empty() || tokio::time::Instant::now() >= deadline {
                return Ok(elements);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(mut self: Box<Self>) {
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            debug!(error = %e, "Failed to close page");
        }
        let ChromeSession {
            mut browser,
            handler,
            ..
        } = *self;
        shutdown(&mut browser, handler).await;
    }
}

async fn shutdown(browser: &mut Browser, handler: JoinHandle<()>) {
    if let Err(e) = browser.close().await {
        debug!(error = %e, "Failed to close browser");
    }
    if let Err(e) = browser.wait().await {
        debug!(error = %e, "Failed to wait for browser exit");
    }
    handler.abort();
}

/// Await `future` for at most `limit`, turning expiry into a navigation error
async fn within<T>(
    limit: Duration,
    url: &str,
    future: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, future)
        .await
        .unwrap_or_else(|_| {
            Err(PipelineError::navigation(
                url,
                format!("timed out after {}s", limit.as_secs()),
            ))
        })
}

/// Build the in-page script that snapshots every element matching `selector`
///
/// Selector and attribute names go through JSON encoding so quotes inside
/// attribute selectors survive.
fn snapshot_script(selector: &str, attributes: &[&str]) -> Result<String> {
    let selector = serde_json::to_string(selector)
        .map_err(|e| PipelineError::navigation("", format!("failed to encode selector: {e}")))?;
    let attributes = serde_json::to_string(attributes)
        .map_err(|e| PipelineError::navigation("", format!("failed to encode attributes: {e}")))?;

    Ok(format!(
        r#"
        (() => {{
            const names = {attributes};
            return Array.from(document.querySelectorAll({selector})).map(el => {{
                const attributes = {{}};
                for (const name of names) {{
                    const value = el.getAttribute(name);
                    if (value !== null) {{
                        attributes[name] = value;
                    }}
                }}
                return {{ attributes, text: el.innerText || '' }};
            }});
        }})()
        "#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_slow_load_times_out_as_navigation_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(90)).await;
            Ok(())
        };
        let err = within(Duration::from_secs(60), "https://shop.example/s", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Navigation { ref reason, .. } if reason == "timed out after 60s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_within_limit_passes_through() {
        let quick = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(7)
        };
        assert_eq!(within(Duration::from_secs(60), "u", quick).await.unwrap(), 7);
    }

    #[test]
    fn test_snapshot_script_escapes_selector() {
        let script = snapshot_script(r#"a[href*="/item/"]"#, &["href"]).unwrap();
        assert!(script.contains(r#"document.querySelectorAll("a[href*=\"/item/\"]")"#));
        assert!(script.contains(r#"const names = ["href"];"#));
    }

    #[test]
    fn test_snapshot_result_deserializes_into_elements() {
        let value = serde_json::json!([
            { "attributes": { "href": "/item/1.html" }, "text": "Case\nUS $1" },
            { "attributes": {}, "text": "" }
        ]);
        let elements: Vec<ListingElement> = serde_json::from_value(value).unwrap();
        assert_eq!(elements[0].title().as_deref(), Some("Case"));
        assert!(elements[1].attributes.is_empty());
    }
}
