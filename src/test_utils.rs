//! In-memory doubles for the pipeline seams

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{PipelineError, Result};
use crate::models::{BuyingGuide, Enrichment, GuideRow, KeywordTask, ResultRow, ReviewRecord, Summary};
use crate::scrapers::http::StaticSession;
use crate::traits::{
    GuideWriter, ListingBrowser, ListingElement, ListingSession, ProductEnricher, ReviewSource,
    SheetStore, Summarizer,
};

/// Serves fixed HTML per URL; unknown URLs fail navigation
#[derive(Default)]
pub struct FixtureBrowser {
    pages: HashMap<String, String>,
    open_delay: Duration,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FixtureBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Make every open take `delay` before the page is served
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    pub fn opened(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opened)
    }

    pub fn closed(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closed)
    }
}

#[async_trait]
impl ListingBrowser for FixtureBrowser {
    async fn open(&self, url: &str) -> Result<Box<dyn ListingSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        let html = self
            .pages
            .get(url)
            .ok_or_else(|| PipelineError::navigation(url, "no fixture page"))?;

        Ok(Box::new(CountingSession {
            inner: StaticSession::new(html.clone()),
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct CountingSession {
    inner: StaticSession,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl ListingSession for CountingSession {
    async fn query(
        &mut self,
        selector: &str,
        attributes: &[&str],
        wait: Duration,
    ) -> Result<Vec<ListingElement>> {
        self.inner.query(selector, attributes, wait).await
    }

    async fn close(self: Box<Self>) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns a fixed number of reviews per product id and records every call
#[derive(Default)]
pub struct FakeReviews {
    counts: HashMap<String, usize>,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeReviews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, product_id: &str, count: usize) -> Self {
        self.counts.insert(product_id.to_string(), count);
        self
    }

    /// Fetches for `product_id` fail like an HTTP 500
    pub fn failing(mut self, product_id: &str) -> Self {
        self.failing.insert(product_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReviewSource for FakeReviews {
    async fn fetch_reviews(&self, product_id: &str) -> Result<Vec<ReviewRecord>> {
        self.calls.lock().unwrap().push(product_id.to_string());

        if self.failing.contains(product_id) {
            return Err(PipelineError::fetch(product_id, "HTTP 500"));
        }

        let count = self.counts.get(product_id).copied().unwrap_or(0);
        Ok((0..count)
            .map(|i| ReviewRecord::new(format!("review {i} of {product_id}")))
            .collect())
    }
}

/// Echoes the title back and records what it was asked to summarize
#[derive(Default)]
pub struct FakeSummarizer {
    failing: HashSet<String>,
    requests: Mutex<Vec<(String, usize)>>,
}

impl FakeSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, title: &str) -> Self {
        self.failing.insert(title.to_string());
        self
    }

    /// `(title, review count)` per call
    pub fn requests(&self) -> Vec<(String, usize)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for FakeSummarizer {
    async fn summarize(&self, product_title: &str, reviews: &[String]) -> Result<Summary> {
        self.requests
            .lock()
            .unwrap()
            .push((product_title.to_string(), reviews.len()));

        if self.failing.contains(product_title) {
            return Err(PipelineError::Summarization("model unavailable".into()));
        }

        Ok(Summary {
            primary: format!("{product_title} highlight"),
            secondary: format!("{} happy buyers", reviews.len()),
        })
    }
}

/// Hands out a predictable affiliate link per product id
#[derive(Default)]
pub struct FakeEnricher {
    failing: HashSet<String>,
}

impl FakeEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, product_id: &str) -> Self {
        self.failing.insert(product_id.to_string());
        self
    }
}

#[async_trait]
impl ProductEnricher for FakeEnricher {
    async fn enrich(&self, product_id: &str) -> Result<Enrichment> {
        if self.failing.contains(product_id) {
            return Err(PipelineError::enrichment(product_id, "API error 401"));
        }

        Ok(Enrichment {
            sale_price: Some("9900".into()),
            image_url: None,
            affiliate_link: Some(format!("https://s.click.example/{product_id}")),
        })
    }
}

/// A store whose every call fails as if the connection were gone
pub struct BrokenStore;

#[async_trait]
impl SheetStore for BrokenStore {
    async fn tasks_for_date(&self, _date: NaiveDate) -> Result<Vec<KeywordTask>> {
        Err(sqlx::Error::PoolClosed.into())
    }

    async fn add_task(&self, _task: &KeywordTask) -> Result<bool> {
        Err(sqlx::Error::PoolClosed.into())
    }

    async fn upsert_results(&self, _rows: &[ResultRow]) -> Result<usize> {
        Err(sqlx::Error::PoolClosed.into())
    }

    async fn results_for_date(&self, _date: NaiveDate) -> Result<Vec<ResultRow>> {
        Err(sqlx::Error::PoolClosed.into())
    }

    async fn save_guides(&self, _guides: &[GuideRow]) -> Result<usize> {
        Err(sqlx::Error::PoolClosed.into())
    }

    async fn guides_for_date(&self, _date: NaiveDate) -> Result<Vec<GuideRow>> {
        Err(sqlx::Error::PoolClosed.into())
    }
}

/// Sheets kept in plain vectors, for tests that must not touch SQLite
#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<Vec<KeywordTask>>,
    results: Mutex<Vec<ResultRow>>,
    guides: Mutex<Vec<GuideRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SheetStore for MemoryStore {
    async fn tasks_for_date(&self, date: NaiveDate) -> Result<Vec<KeywordTask>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(tasks.iter().filter(|t| t.date == date).cloned().collect())
    }

    async fn add_task(&self, task: &KeywordTask) -> Result<bool> {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains(task) {
            return Ok(false);
        }
        tasks.push(task.clone());
        Ok(true)
    }

    async fn upsert_results(&self, rows: &[ResultRow]) -> Result<usize> {
        let mut results = self.results.lock().unwrap();
        for row in rows {
            results.retain(|r| {
                (r.date, &r.keyword, &r.product_id) != (row.date, &row.keyword, &row.product_id)
            });
            results.push(row.clone());
        }
        Ok(rows.len())
    }

    async fn results_for_date(&self, date: NaiveDate) -> Result<Vec<ResultRow>> {
        let results = self.results.lock().unwrap();
        Ok(results.iter().filter(|r| r.date == date).cloned().collect())
    }

    async fn save_guides(&self, rows: &[GuideRow]) -> Result<usize> {
        let mut guides = self.guides.lock().unwrap();
        for row in rows {
            guides.retain(|g| (g.date, &g.keyword) != (row.date, &row.keyword));
            guides.push(row.clone());
        }
        Ok(rows.len())
    }

    async fn guides_for_date(&self, date: NaiveDate) -> Result<Vec<GuideRow>> {
        let guides = self.guides.lock().unwrap();
        Ok(guides.iter().filter(|g| g.date == date).cloned().collect())
    }
}

/// Returns a short guide naming the keyword and records every keyword asked for
#[derive(Default)]
pub struct FakeGuideWriter {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeGuideWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, keyword: &str) -> Self {
        self.failing.insert(keyword.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GuideWriter for FakeGuideWriter {
    async fn write_guide(&self, keyword: &str) -> Result<BuyingGuide> {
        self.calls.lock().unwrap().push(keyword.to_string());

        if self.failing.contains(keyword) {
            return Err(PipelineError::Guide("model unavailable".into()));
        }

        Ok(BuyingGuide {
            selection_points: format!("How to pick a {keyword}"),
            checklist: "Check the size".into(),
            faq: "Ships in a week".into(),
        })
    }
}
