//! Static HTML listing pages fetched with reqwest and matched with `scraper`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::traits::{ListingBrowser, ListingElement, ListingSession};

/// Listing browser for server-rendered pages
///
/// Does not run scripts, so lazy-loaded results never appear. Useful for
/// sites that render search results on the server.
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::navigation("", e))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl ListingBrowser for HttpBrowser {
    async fn open(&self, url: &str) -> Result<Box<dyn ListingSession>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::navigation(url, e))?;

        if !response.status().is_success() {
            return Err(PipelineError::navigation(
                url,
                format!("HTTP {}", response.status()),
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| PipelineError::navigation(url, e))?;

        debug!(url = %url, bytes = html.len(), "Fetched static listing");
        Ok(Box::new(StaticSession::new(html)))
    }
}

/// A listing page held as raw HTML
pub struct StaticSession {
    html: String,
}

impl StaticSession {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

#[async_trait]
impl ListingSession for StaticSession {
    async fn query(
        &mut self,
        selector: &str,
        attributes: &[&str],
        _wait: Duration,
    ) -> Result<Vec<ListingElement>> {
        select_elements(&self.html, selector, attributes)
    }

    async fn close(self: Box<Self>) {}
}

/// Match `selector` against `html` and snapshot each element
///
/// The parsed document never outlives this call, so it is never held across an await.
fn select_elements(html: &str, selector: &str, attributes: &[&str]) -> Result<Vec<ListingElement>> {
    let selector = Selector::parse(selector).map_err(|e| {
        PipelineError::navigation("", format!("invalid selector '{selector}': {e:?}"))
    })?;

    let document = Html::parse_document(html);
    let elements = document
        .select(&selector)
        .map(|element| snapshot(element, attributes))
        .collect();

    Ok(elements)
}

fn snapshot(element: ElementRef<'_>, attributes: &[&str]) -> ListingElement {
    let attributes: HashMap<String, String> = attributes
        .iter()
        .filter_map(|name| {
            element
                .value()
                .attr(name)
                .map(|value| ((*name).to_string(), value.to_string()))
        })
        .collect();

    // Text nodes joined by newlines approximate innerText line breaks
    let text = element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    ListingElement { attributes, text }
}
