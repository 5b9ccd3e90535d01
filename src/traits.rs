//! Traits and interfaces for site-agnostic product discovery and enrichment

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    BuyingGuide, Enrichment, GuideRow, KeywordTask, ResultRow, ReviewRecord, Summary,
};

/// Configuration for a listing site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Display name for the website
    pub name: String,
    /// Search URL pattern with {query} placeholder
    pub search_url_pattern: String,
    /// Extraction strategies, tried in priority order
    pub strategies: Vec<SelectorStrategy>,
}

impl ListingConfig {
    /// Process a search term to create the search URL
    ///
    /// # Arguments
    /// * `search_term` - The term to search for
    ///
    /// # Returns
    /// * `String` - The complete search URL
    pub fn build_search_url(&self, search_term: &str) -> String {
        let encoded_term = urlencoding::encode(search_term);
        self.search_url_pattern.replace("{query}", &encoded_term)
    }
}

/// One way of finding product elements on a listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorStrategy {
    /// Name used in logs
    pub name: String,
    /// CSS selector matching one element per product
    pub selector: String,
    /// Where the product identifier lives on a matched element
    pub id_source: IdSource,
}

/// Location of the product identifier on a matched element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdSource {
    /// Identifier is the full value of an attribute
    Attribute { name: String },
    /// Identifier is the path token right after `marker` in an URL attribute
    PathSegment { attribute: String, marker: String },
}

impl IdSource {
    /// Attribute that has to be read from the element
    pub fn attribute(&self) -> &str {
        match self {
            Self::Attribute { name } => name,
            Self::PathSegment { attribute, .. } => attribute,
        }
    }

    /// Extract the identifier from an attribute value
    ///
    /// Returns `None` when the value does not carry a usable identifier.
    pub fn parse(&self, value: &str) -> Option<String> {
        let token = match self {
            Self::Attribute { .. } => value.trim(),
            Self::PathSegment { marker, .. } => {
                let (_, rest) = value.split_once(marker.as_str())?;
                rest.split(['.', '/', '?', '#']).next().unwrap_or_default().trim()
            }
        };

        (!token.is_empty()).then(|| token.to_string())
    }
}

/// Snapshot of one element matched on a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListingElement {
    /// Requested attributes that were present on the element
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    /// Visible text of the element
    #[serde(default)]
    pub text: String,
}

impl ListingElement {
    /// First non-blank line of the element text
    pub fn title(&self) -> Option<String> {
        self.text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// Opens listing pages, one scoped session per keyword
#[async_trait]
pub trait ListingBrowser: Send + Sync {
    /// Navigate to `url`, let content settle, and scroll to trigger lazy loading
    async fn open(&self, url: &str) -> Result<Box<dyn ListingSession>>;
}

/// A loaded listing page
#[async_trait]
pub trait ListingSession: Send {
    /// Wait up to `wait` for `selector` and snapshot every match in document order
    async fn query(
        &mut self,
        selector: &str,
        attributes: &[&str],
        wait: Duration,
    ) -> Result<Vec<ListingElement>>;

    /// Release the page and everything behind it
    async fn close(self: Box<Self>);
}

/// Source of review texts for a product
#[async_trait]
pub trait ReviewSource: Send + Sync {
    async fn fetch_reviews(&self, product_id: &str) -> Result<Vec<ReviewRecord>>;
}

/// Turns review texts into two marketing strings
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, product_title: &str, reviews: &[String]) -> Result<Summary>;
}

/// Writes a buying guide for a search keyword
#[async_trait]
pub trait GuideWriter: Send + Sync {
    async fn write_guide(&self, keyword: &str) -> Result<BuyingGuide>;
}

/// Adds price and affiliate data to a product
#[async_trait]
pub trait ProductEnricher: Send + Sync {
    async fn enrich(&self, product_id: &str) -> Result<Enrichment>;
}

/// Spreadsheet-like storage for tasks and results
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Tasks scheduled for `date`, in insertion order
    async fn tasks_for_date(&self, date: NaiveDate) -> Result<Vec<KeywordTask>>;

    /// Add a task; returns false when it already exists
    async fn add_task(&self, task: &KeywordTask) -> Result<bool>;

    /// Insert or update rows keyed by `(date, keyword, product_id)`
    async fn upsert_results(&self, rows: &[ResultRow]) -> Result<usize>;

    /// Result rows stored for `date`
    async fn results_for_date(&self, date: NaiveDate) -> Result<Vec<ResultRow>>;

    /// Attach buying guides to their tasks, adding tasks that are missing
    async fn save_guides(&self, guides: &[GuideRow]) -> Result<usize>;

    /// Buying guides stored for `date`
    async fn guides_for_date(&self, date: NaiveDate) -> Result<Vec<GuideRow>>;
}
