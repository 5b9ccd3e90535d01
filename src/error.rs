//! Error taxonomy for the pick pipeline

use serde::Serialize;
use thiserror::Error;

/// Everything that can go wrong while turning a keyword into a result row.
///
/// Only a `Store` error while loading tasks stops a run. Every other variant
/// is caught at keyword or product granularity, logged, and counted.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("search keyword is empty")]
    EmptyQuery,

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no selector strategy matched the listing for '{keyword}'")]
    SelectorExhausted { keyword: String },

    #[error("review fetch for product {product_id} failed: {reason}")]
    Fetch { product_id: String, reason: String },

    #[error(
        "only {collected} reviews across {candidates} candidates ({fetch_failures} fetch failures)"
    )]
    Exhausted {
        collected: usize,
        candidates: usize,
        fetch_failures: usize,
    },

    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error("buying guide generation failed: {0}")]
    Guide(String),

    #[error("affiliate enrichment for product {product_id} failed: {reason}")]
    Enrichment { product_id: String, reason: String },

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Discriminant used to count failures in a run report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyQuery,
    Navigation,
    SelectorExhausted,
    Fetch,
    Exhausted,
    Summarization,
    Guide,
    Enrichment,
    Store,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyQuery => ErrorKind::EmptyQuery,
            Self::Navigation { .. } => ErrorKind::Navigation,
            Self::SelectorExhausted { .. } => ErrorKind::SelectorExhausted,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
            Self::Summarization(_) => ErrorKind::Summarization,
            Self::Guide(_) => ErrorKind::Guide,
            Self::Enrichment { .. } => ErrorKind::Enrichment,
            Self::Store(_) | Self::Migration(_) => ErrorKind::Store,
        }
    }

    pub(crate) fn navigation(url: &str, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn fetch(product_id: &str, reason: impl ToString) -> Self {
        Self::Fetch {
            product_id: product_id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn enrichment(product_id: &str, reason: impl ToString) -> Self {
        Self::Enrichment {
            product_id: product_id.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
