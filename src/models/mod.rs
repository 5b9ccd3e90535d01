//! Data models for keyword tasks, scraped products, and language-model payloads

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// One row of the task list: search `keyword` on `date`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTask {
    pub date: NaiveDate,
    pub keyword: String,
}

impl KeywordTask {
    pub fn new(date: NaiveDate, keyword: impl Into<String>) -> Self {
        Self {
            date,
            keyword: keyword.into(),
        }
    }
}

/// A product found on a listing page, not yet enriched with reviews
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateProduct {
    pub product_id: String,
    pub title: String,
}

impl CandidateProduct {
    pub fn new(product_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            title: title.into(),
        }
    }
}

/// A single usable review text from the feedback endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub text: String,
    pub language_hint: Option<String>,
}

impl ReviewRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language_hint: None,
        }
    }
}

/// Two marketing strings generated from accumulated reviews
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub primary: String,
    pub secondary: String,
}

/// Affiliate data attached to a summarized product when credentials are configured
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub sale_price: Option<String>,
    pub image_url: Option<String>,
    pub affiliate_link: Option<String>,
}

/// A row of the result sheet, keyed by `(date, keyword, product_id)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub date: NaiveDate,
    pub keyword: String,
    pub product_id: String,
    pub title: String,
    pub summary_primary: String,
    pub summary_secondary: String,
    pub sale_price: Option<String>,
    pub image_url: Option<String>,
    pub affiliate_link: Option<String>,
}

impl ResultRow {
    pub fn new(task: &KeywordTask, product: &CandidateProduct, summary: Summary) -> Self {
        Self {
            date: task.date,
            keyword: task.keyword.clone(),
            product_id: product.product_id.clone(),
            title: product.title.clone(),
            summary_primary: summary.primary,
            summary_secondary: summary.secondary,
            sale_price: None,
            image_url: None,
            affiliate_link: None,
        }
    }

    pub fn with_enrichment(mut self, enrichment: Enrichment) -> Self {
        self.sale_price = enrichment.sale_price;
        self.image_url = enrichment.image_url;
        self.affiliate_link = enrichment.affiliate_link;
        self
    }
}

/// Three-part buying guide written for a keyword
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyingGuide {
    pub selection_points: String,
    pub checklist: String,
    pub faq: String,
}

impl BuyingGuide {
    /// Render the guide as the HTML fragment stored next to the keyword
    pub fn to_html(&self, keyword: &str) -> String {
        format!(
            "<h2>{} 구매 가이드</h2>\n\
             <p><strong>1. 제품 선택 포인트</strong>: {}</p>\n\
             <p><strong>2. 구매 전 체크리스트</strong>: {}</p>\n\
             <p><strong>3. 자주 묻는 질문</strong>: {}</p>",
            escape_html(keyword),
            escape_html(&self.selection_points),
            escape_html(&self.checklist),
            escape_html(&self.faq)
        )
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Buying guide HTML stored on a task row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideRow {
    pub date: NaiveDate,
    pub keyword: String,
    pub html: String,
}

impl GuideRow {
    pub fn new(task: &KeywordTask, guide: &BuyingGuide) -> Self {
        Self {
            date: task.date,
            keyword: task.keyword.clone(),
            html: guide.to_html(&task.keyword),
        }
    }
}

/// Counters describing what a run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub keywords_total: usize,
    pub keywords_processed: usize,
    pub keywords_skipped: usize,
    pub keywords_already_done: usize,
    pub products_summarized: usize,
    pub rows_persisted: usize,
    pub guides_written: usize,
    pub errors: BTreeMap<ErrorKind, usize>,
}

impl RunReport {
    pub fn record(&mut self, kind: ErrorKind) {
        self.record_n(kind, 1);
    }

    pub fn record_n(&mut self, kind: ErrorKind, count: usize) {
        if count > 0 {
            *self.errors.entry(kind).or_default() += count;
        }
    }

    pub fn errors_of(&self, kind: ErrorKind) -> usize {
        self.errors.get(&kind).copied().unwrap_or(0)
    }
}

/// Chat message sent to the completion endpoint
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// Requested response format for the completion endpoint
#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: &'static str,
}

/// Chat completion request payload
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

/// Chat completion response payload, reduced to what the summarizer reads
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub content: Option<String>,
}
