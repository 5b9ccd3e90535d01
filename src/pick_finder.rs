use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{ErrorKind, PipelineError, Result};
use crate::models::{GuideRow, KeywordTask, ResultRow, RunReport};
use crate::reviews::accumulate_until_threshold;
use crate::scraper::{FingerprintTracker, ProductScraper};
use crate::traits::{GuideWriter, ProductEnricher, ReviewSource, SheetStore, Summarizer};

/// Runs the keyword → products → reviews → summary pipeline
pub struct PickFinder {
    scraper: ProductScraper,
    reviews: Arc<dyn ReviewSource>,
    summarizer: Arc<dyn Summarizer>,
    enricher: Option<Arc<dyn ProductEnricher>>,
    guide_writer: Option<Arc<dyn GuideWriter>>,
    store: Arc<dyn SheetStore>,
    config: PipelineConfig,
}

impl PickFinder {
    pub fn new(
        scraper: ProductScraper,
        reviews: Arc<dyn ReviewSource>,
        summarizer: Arc<dyn Summarizer>,
        store: Arc<dyn SheetStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            scraper,
            reviews,
            summarizer,
            enricher: None,
            guide_writer: None,
            store,
            config,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn ProductEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Also write a buying guide for every attempted keyword
    pub fn with_guide_writer(mut self, writer: Arc<dyn GuideWriter>) -> Self {
        self.guide_writer = Some(writer);
        self
    }

    /// Load the tasks scheduled for `date` and run them
    ///
    /// # Errors
    /// * `Store` - the task list could not be read
    pub async fn run_for_date(&self, date: NaiveDate) -> Result<RunReport> {
        let tasks = self.store.tasks_for_date(date).await.map_err(|e| {
            error!(%date, error = %e, "Failed to load tasks");
            e
        })?;

        info!(%date, "Loaded {} tasks", tasks.len());
        Ok(self.run(&tasks).await)
    }

    /// Process every task in order and persist the resulting rows in one batch
    ///
    /// Never fails: per-keyword errors and a failed write are counted in the report.
    pub async fn run(&self, tasks: &[KeywordTask]) -> RunReport {
        let mut report = RunReport::default();
        let tasks = dedup_tasks(tasks);
        report.keywords_total = tasks.len();

        let done = self.completed_keywords(&tasks).await;
        let mut rows = Vec::new();
        let mut guides = Vec::new();
        let mut tracker = FingerprintTracker::new();
        let mut first = true;

        for task in &tasks {
            if done.contains(&(task.date, task.keyword.clone())) {
                info!(keyword = %task.keyword, "Already summarized, skipping");
                report.keywords_already_done += 1;
                continue;
            }

            if !first {
                tokio::time::sleep(self.config.keyword_delay()).await;
            }
            first = false;

            // Duplicates are only suppressed within one keyword
            tracker.reset();
            match self.process_keyword(task, &mut tracker, &mut report).await {
                Ok(Some(row)) => {
                    report.keywords_processed += 1;
                    report.products_summarized += 1;
                    rows.push(row);
                }
                Ok(None) => {
                    warn!(keyword = %task.keyword, "No usable candidates, skipping keyword");
                    report.keywords_skipped += 1;
                }
                Err(e) => {
                    warn!(keyword = %task.keyword, kind = ?e.kind(), error = %e, "Skipping keyword");
                    if let PipelineError::Exhausted { fetch_failures, .. } = &e {
                        report.record_n(ErrorKind::Fetch, *fetch_failures);
                    }
                    report.record(e.kind());
                    report.keywords_skipped += 1;
                }
            }

            if let Some(writer) = &self.guide_writer {
                match writer.write_guide(&task.keyword).await {
                    Ok(guide) => guides.push(GuideRow::new(task, &guide)),
                    Err(e) => {
                        warn!(keyword = %task.keyword, error = %e, "No buying guide for keyword");
                        report.record(e.kind());
                    }
                }
            }
        }

        match self.store.upsert_results(&rows).await {
            Ok(written) => report.rows_persisted = written,
            Err(e) => {
                error!(rows = rows.len(), error = %e, "Failed to persist results");
                report.record(e.kind());
            }
        }

        if !guides.is_empty() {
            match self.store.save_guides(&guides).await {
                Ok(written) => report.guides_written = written,
                Err(e) => {
                    error!(guides = guides.len(), error = %e, "Failed to persist buying guides");
                    report.record(e.kind());
                }
            }
        }

        info!(
            total = report.keywords_total,
            processed = report.keywords_processed,
            skipped = report.keywords_skipped,
            already_done = report.keywords_already_done,
            persisted = report.rows_persisted,
            guides = report.guides_written,
            errors = ?report.errors,
            "Run finished"
        );
        report
    }

    async fn process_keyword(
        &self,
        task: &KeywordTask,
        tracker: &mut FingerprintTracker,
        report: &mut RunReport,
    ) -> Result<Option<ResultRow>> {
        let candidates = self
            .scraper
            .discover_with(&task.keyword, self.config.max_results, tracker)
            .await?;
        if candidates.is_empty() {
            return Ok(None);
        }

        let accumulated = accumulate_until_threshold(
            self.reviews.as_ref(),
            &candidates,
            self.config.review_threshold,
        )
        .await?;
        report.record_n(ErrorKind::Fetch, accumulated.fetch_failures);

        let texts: Vec<String> = accumulated.reviews.into_iter().map(|r| r.text).collect();
        let product = accumulated.product;
        let summary = self.summarizer.summarize(&product.title, &texts).await?;

        let mut row = ResultRow::new(task, &product, summary);
        if let Some(enricher) = &self.enricher {
            match enricher.enrich(&product.product_id).await {
                Ok(enrichment) => row = row.with_enrichment(enrichment),
                Err(e) => {
                    warn!(
                        keyword = %task.keyword,
                        product_id = %product.product_id,
                        error = %e,
                        "Keeping row without affiliate data"
                    );
                    report.record(e.kind());
                }
            }
        }

        info!(
            keyword = %task.keyword,
            product_id = %row.product_id,
            primary = %row.summary_primary,
            "Recorded result"
        );
        Ok(Some(row))
    }

    /// `(date, keyword)` pairs that already have a stored result
    async fn completed_keywords(&self, tasks: &[KeywordTask]) -> HashSet<(NaiveDate, String)> {
        let mut done = HashSet::new();
        if !self.config.skip_completed {
            return done;
        }

        let dates: HashSet<NaiveDate> = tasks.iter().map(|t| t.date).collect();
        for date in dates {
            match self.store.results_for_date(date).await {
                Ok(rows) => done.extend(rows.into_iter().map(|row| (row.date, row.keyword))),
                Err(e) => warn!(%date, error = %e, "Could not read existing results, processing all keywords"),
            }
        }
        done
    }
}

/// Drop repeated `(date, keyword)` tasks, keeping the first occurrence
fn dedup_tasks(tasks: &[KeywordTask]) -> Vec<KeywordTask> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .map(|task| KeywordTask::new(task.date, task.keyword.trim()))
        .filter(|task| seen.insert((task.date, task.keyword.clone())))
        .collect()
}
