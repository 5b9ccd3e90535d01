//! Product discovery on keyword search listings
//!
//! A listing page is opened once per keyword, then the configured selector
//! strategies are tried in priority order. The first strategy that matches
//! anything wins; its elements are turned into candidates in page order.

mod fingerprint;

pub use fingerprint::FingerprintTracker;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::models::CandidateProduct;
use crate::traits::{
    ListingBrowser, ListingConfig, ListingElement, ListingSession, SelectorStrategy,
};

/// Discovery engine for one listing site
pub struct ProductScraper {
    browser: Arc<dyn ListingBrowser>,
    config: ListingConfig,
    strategy_wait: Duration,
}

impl ProductScraper {
    pub fn new(
        browser: Arc<dyn ListingBrowser>,
        config: ListingConfig,
        strategy_wait: Duration,
    ) -> Self {
        Self {
            browser,
            config,
            strategy_wait,
        }
    }

    /// Discover up to `max_results` candidates for `keyword` with a fresh tracker
    pub async fn discover(&self, keyword: &str, max_results: usize) -> Result<Vec<CandidateProduct>> {
        let mut tracker = FingerprintTracker::new();
        self.discover_with(keyword, max_results, &mut tracker).await
    }

    /// Discover candidates, skipping ids already recorded in `tracker`
    ///
    /// # Errors
    /// * `EmptyQuery` - the keyword is blank
    /// * `Navigation` - the listing page could not be opened; the browser
    ///   applies its own load limit and cleans up before reporting it
    /// * `SelectorExhausted` - no strategy matched a single element
    pub async fn discover_with(
        &self,
        keyword: &str,
        max_results: usize,
        tracker: &mut FingerprintTracker,
    ) -> Result<Vec<CandidateProduct>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(PipelineError::EmptyQuery);
        }

        let url = self.config.build_search_url(keyword);
        info!(keyword = %keyword, url = %url, "Opening {} listing", self.config.name);

        let mut session = self.browser.open(&url).await?;

        let outcome = self
            .extract_candidates(session.as_mut(), keyword, max_results, tracker)
            .await;
        session.close().await;

        let candidates = outcome?;
        info!(
            keyword = %keyword,
            "Found {} candidate products on {}",
            candidates.len(),
            self.config.name
        );
        Ok(candidates)
    }

    async fn extract_candidates(
        &self,
        session: &mut dyn ListingSession,
        keyword: &str,
        max_results: usize,
        tracker: &mut FingerprintTracker,
    ) -> Result<Vec<CandidateProduct>> {
        for strategy in &self.config.strategies {
            let attributes = [strategy.id_source.attribute()];
            let elements = match session
                .query(&strategy.selector, &attributes, self.strategy_wait)
                .await
            {
                Ok(elements) => elements,
                Err(e) => {
                    debug!(keyword = %keyword, strategy = %strategy.name, error = %e, "Strategy query failed");
                    continue;
                }
            };

            if elements.is_empty() {
                debug!(keyword = %keyword, strategy = %strategy.name, "Strategy matched nothing");
                continue;
            }

            info!(
                keyword = %keyword,
                strategy = %strategy.name,
                "Strategy matched {} elements",
                elements.len()
            );
            return Ok(collect_candidates(
                strategy,
                elements,
                keyword,
                max_results,
                tracker,
            ));
        }

        warn!(keyword = %keyword, "No selector strategy matched on {}", self.config.name);
        Err(PipelineError::SelectorExhausted {
            keyword: keyword.to_string(),
        })
    }
}

fn collect_candidates(
    strategy: &SelectorStrategy,
    elements: Vec<ListingElement>,
    keyword: &str,
    max_results: usize,
    tracker: &mut FingerprintTracker,
) -> Vec<CandidateProduct> {
    let mut candidates = Vec::new();

    for element in elements {
        if candidates.len() >= max_results {
            break;
        }

        let Some(product_id) = element
            .attributes
            .get(strategy.id_source.attribute())
            .and_then(|value| strategy.id_source.parse(value))
        else {
            continue;
        };

        let Some(title) = element.title() else {
            debug!(keyword = %keyword, product_id = %product_id, "Skipping element without title");
            continue;
        };

        if !tracker.insert(&product_id) {
            debug!(keyword = %keyword, product_id = %product_id, "Skipping duplicate product");
            continue;
        }

        info!(keyword = %keyword, product_id = %product_id, title = %title, "Candidate product");
        candidates.push(CandidateProduct { product_id, title });
    }

    candidates
}
