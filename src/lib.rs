//! # Pickview
//!
//! Picks well-reviewed products for a list of search keywords and writes a
//! short review-based summary for each.
//!
//! ```text
//! Tasks → Discovery → Review accumulation → Summary → (Affiliate) → Store
//! ```
//!
//! - [`scraper`]: listing discovery with prioritized selector strategies
//! - [`reviews`]: paginated feedback fetching and threshold pooling
//! - [`summarizer`]: chat-completion summaries
//! - [`guide`]: per-keyword buying guides
//! - [`affiliate`]: signed affiliate API lookups
//! - [`database`]: SQLite task and result sheets
//! - [`pick_finder`]: the per-keyword pipeline

pub mod affiliate;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod guide;
pub mod models;
pub mod pick_finder;
pub mod reviews;
pub mod scraper;
pub mod scrapers;
pub mod summarizer;
pub mod traits;

#[cfg(test)]
mod test_utils;
