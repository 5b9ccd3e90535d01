//! Listing browsers and site configurations

pub mod aliexpress;
pub mod chrome;
pub mod http;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{DiscoveryConfig, Renderer};
use crate::traits::{ListingBrowser, ListingConfig};

pub use chrome::ChromeBrowser;
pub use http::HttpBrowser;

/// Build the listing browser selected in the configuration
pub fn browser_for(config: &DiscoveryConfig) -> Result<Arc<dyn ListingBrowser>> {
    let browser: Arc<dyn ListingBrowser> = match config.renderer {
        Renderer::Chrome => Arc::new(ChromeBrowser::new(config.clone())),
        Renderer::Http => Arc::new(HttpBrowser::new(
            &config.user_agent,
            config.navigation_timeout(),
        )?),
    };
    Ok(browser)
}

/// Load the listing configuration, falling back to the AliExpress defaults
pub fn listing_config(config: &DiscoveryConfig) -> Result<ListingConfig> {
    let Some(path) = &config.listing_config_path else {
        return Ok(aliexpress::listing_config());
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read listing config {}", path.display()))?;
    let listing: ListingConfig = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse listing config {}", path.display()))?;

    anyhow::ensure!(
        !listing.strategies.is_empty(),
        "Listing config {} has no selector strategies",
        path.display()
    );
    Ok(listing)
}
