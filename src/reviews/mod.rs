//! Review acquisition from the product feedback endpoint
//!
//! Reviews are pulled page by page for one product at a time and pooled
//! across candidates until a keyword has enough material to summarize.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ReviewConfig;
use crate::error::{PipelineError, Result};
use crate::models::{CandidateProduct, ReviewRecord};
use crate::traits::ReviewSource;

/// HTTP client for the paginated feedback endpoint
pub struct FeedbackClient {
    client: Client,
    config: ReviewConfig,
}

impl FeedbackClient {
    pub fn new(config: ReviewConfig, user_agent: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout())
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch_page(&self, product_id: &str, page: u32) -> Result<Value> {
        let page = page.to_string();
        let page_size = self.config.page_size.to_string();

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("productId", product_id),
                ("lang", self.config.lang.as_str()),
                ("country", self.config.country.as_str()),
                ("page", page.as_str()),
                ("pageSize", page_size.as_str()),
                ("filter", self.config.filter.as_str()),
                ("sort", self.config.sort.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::fetch(product_id, e))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        check_response(product_id, status.as_u16(), &content_type)?;

        response
            .json::<Value>()
            .await
            .map_err(|e| PipelineError::fetch(product_id, format!("invalid JSON body: {e}")))
    }
}

#[async_trait]
impl ReviewSource for FeedbackClient {
    async fn fetch_reviews(&self, product_id: &str) -> Result<Vec<ReviewRecord>> {
        let mut reviews = Vec::new();

        for page in 1..=self.config.max_pages.max(1) {
            let body = match self.fetch_page(product_id, page).await {
                Ok(body) => body,
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(product_id = %product_id, page, error = %e, "Stopping review pagination early");
                    break;
                }
            };

            let (entries, mut records) = parse_feedback_page(&body, &self.config);
            reviews.append(&mut records);

            if entries < self.config.page_size as usize {
                break;
            }
        }

        info!(product_id = %product_id, "Fetched {} usable reviews", reviews.len());
        Ok(reviews)
    }
}

/// Reject responses that are not a successful JSON payload
pub fn check_response(product_id: &str, status: u16, content_type: &str) -> Result<()> {
    if !(200..300).contains(&status) {
        return Err(PipelineError::fetch(product_id, format!("HTTP {status}")));
    }
    if !content_type.to_ascii_lowercase().contains("json") {
        return Err(PipelineError::fetch(
            product_id,
            format!("unexpected content type '{content_type}'"),
        ));
    }
    Ok(())
}

/// Pull usable review texts out of one feedback page
///
/// Returns the number of raw entries on the page alongside the reviews, so
/// the caller can tell a short (final) page from a filtered one.
pub fn parse_feedback_page(body: &Value, config: &ReviewConfig) -> (usize, Vec<ReviewRecord>) {
    let entries = config
        .list_path
        .split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(body, |value, segment| value.get(segment))
        .and_then(Value::as_array);

    let Some(entries) = entries else {
        return (0, Vec::new());
    };

    let reviews = entries
        .iter()
        .filter_map(|entry| {
            config.text_fields.iter().enumerate().find_map(|(position, field)| {
                let text = entry.get(field)?.as_str()?.trim();
                if text.is_empty() {
                    return None;
                }
                Some(ReviewRecord {
                    text: text.to_string(),
                    // The first configured field is the translated one
                    language_hint: (position == 0).then(|| config.lang.clone()),
                })
            })
        })
        .collect();

    (entries.len(), reviews)
}

/// Reviews pooled until the threshold was reached
#[derive(Debug, Clone)]
pub struct Accumulated {
    pub reviews: Vec<ReviewRecord>,
    /// Last product that contributed; its title is used for summarization
    pub product: CandidateProduct,
    pub fetch_failures: usize,
}

/// Pool reviews across `products` in order until at least `threshold` are collected
///
/// A product whose fetch fails contributes nothing and the next one is tried.
/// Collection stops at the product boundary where the threshold is crossed.
///
/// # Errors
/// * `Exhausted` - every candidate was consumed without reaching the threshold
pub async fn accumulate_until_threshold(
    source: &dyn ReviewSource,
    products: &[CandidateProduct],
    threshold: usize,
) -> Result<Accumulated> {
    let threshold = threshold.max(1);
    let mut buffer: Vec<ReviewRecord> = Vec::new();
    let mut fetch_failures = 0;

    for product in products {
        match source.fetch_reviews(&product.product_id).await {
            Ok(mut reviews) => {
                if reviews.is_empty() {
                    info!(product_id = %product.product_id, "No qualifying reviews");
                    continue;
                }
                buffer.append(&mut reviews);
                info!(
                    product_id = %product.product_id,
                    "Review buffer at {}/{}",
                    buffer.len(),
                    threshold
                );

                if buffer.len() >= threshold {
                    return Ok(Accumulated {
                        reviews: buffer,
                        product: product.clone(),
                        fetch_failures,
                    });
                }
            }
            Err(e) => {
                warn!(product_id = %product.product_id, error = %e, "Skipping product after review fetch failure");
                fetch_failures += 1;
            }
        }
    }

    Err(PipelineError::Exhausted {
        collected: buffer.len(),
        candidates: products.len(),
        fetch_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeReviews;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// `(status, content type, body)` served for one page number
    type PageReply = (u16, &'static str, String);

    /// Serve feedback pages over local HTTP; unknown pages get a 404.
    /// Returns the endpoint URL and the page numbers requested so far.
    async fn serve_pages(pages: Vec<(u32, PageReply)>) -> (String, Arc<Mutex<Vec<u32>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requested = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requested);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let request = String::from_utf8_lossy(&request);
                let page: u32 = request
                    .lines()
                    .next()
                    .and_then(|line| line.split("&page=").nth(1))
                    .and_then(|rest| rest.split(['&', ' ']).next())
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0);
                seen.lock().unwrap().push(page);

                let (status, content_type, body) = pages
                    .iter()
                    .find(|(n, _)| *n == page)
                    .map(|(_, reply)| reply.clone())
                    .unwrap_or((404, "text/plain", "missing".to_string()));
                let response = format!(
                    "HTTP/1.1 {status} Fixture\r\nContent-Type: {content_type}\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/feedback"), requested)
    }

    fn feedback_page(count: usize) -> PageReply {
        let entries: Vec<_> = (0..count)
            .map(|i| json!({ "buyerTranslationFeedback": format!("Review {i}") }))
            .collect();
        (
            200,
            "application/json;charset=UTF-8",
            json!({ "data": { "evaViewList": entries } }).to_string(),
        )
    }

    fn client_for(endpoint: String) -> FeedbackClient {
        let config = ReviewConfig {
            endpoint,
            ..ReviewConfig::default()
        };
        FeedbackClient::new(config, "pickview-test").unwrap()
    }

    fn products(ids: &[&str]) -> Vec<CandidateProduct> {
        ids.iter()
            .map(|id| CandidateProduct::new(*id, format!("Product {id}")))
            .collect()
    }

    #[test]
    fn test_parse_prefers_translated_text_and_drops_empty_entries() {
        let body = json!({
            "data": {
                "evaViewList": [
                    { "buyerTranslationFeedback": "Great fit", "buyerFeedback": "Sehr gut" },
                    { "buyerTranslationFeedback": "", "buyerFeedback": "Bonne qualité" },
                    { "buyerTranslationFeedback": "   " },
                    { "anonymous": true }
                ]
            }
        });
        let config = ReviewConfig::default();

        let (entries, reviews) = parse_feedback_page(&body, &config);
        assert_eq!(entries, 4);
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].text, "Great fit");
        assert_eq!(reviews[0].language_hint.as_deref(), Some("ko_KR"));
        assert_eq!(reviews[1].text, "Bonne qualité");
        assert_eq!(reviews[1].language_hint, None);
    }

    #[test]
    fn test_parse_missing_list_is_empty() {
        let config = ReviewConfig::default();
        assert_eq!(parse_feedback_page(&json!({ "data": {} }), &config).0, 0);
        assert!(parse_feedback_page(&json!([]), &config).1.is_empty());
    }

    #[test]
    fn test_check_response_rejects_errors_and_non_json() {
        assert!(check_response("1", 200, "application/json;charset=UTF-8").is_ok());
        assert!(matches!(
            check_response("1", 500, "application/json"),
            Err(PipelineError::Fetch { .. })
        ));
        assert!(matches!(
            check_response("1", 200, "text/html"),
            Err(PipelineError::Fetch { .. })
        ));
    }

    #[tokio::test]
    async fn test_accumulation_spans_products_and_credits_the_last_one() {
        let source = FakeReviews::new().with("a", 3).with("b", 4).with("c", 10);
        let candidates = products(&["a", "b", "c"]);

        let accumulated = accumulate_until_threshold(&source, &candidates, 5).await.unwrap();
        assert_eq!(accumulated.reviews.len(), 7);
        assert_eq!(accumulated.product.product_id, "b");
        assert_eq!(accumulated.fetch_failures, 0);
        assert_eq!(source.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_accumulation_stops_at_first_sufficient_product() {
        let source = FakeReviews::new().with("a", 6).with("b", 6);
        let accumulated = accumulate_until_threshold(&source, &products(&["a", "b"]), 5)
            .await
            .unwrap();
        assert_eq!(accumulated.reviews.len(), 6);
        assert_eq!(accumulated.product.product_id, "a");
        assert_eq!(source.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_moves_on_to_next_candidate() {
        let source = FakeReviews::new().failing("a").with("b", 5);
        let accumulated = accumulate_until_threshold(&source, &products(&["a", "b"]), 5)
            .await
            .unwrap();
        assert_eq!(accumulated.product.product_id, "b");
        assert_eq!(accumulated.reviews.len(), 5);
        assert_eq!(accumulated.fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_exhausted_when_candidates_run_out() {
        let source = FakeReviews::new().with("a", 1).failing("b").with("c", 0);
        let err = accumulate_until_threshold(&source, &products(&["a", "b", "c"]), 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Exhausted {
                collected: 1,
                candidates: 3,
                fetch_failures: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_zero_threshold_still_needs_one_review() {
        let source = FakeReviews::new().with("a", 0).with("b", 1);
        let accumulated = accumulate_until_threshold(&source, &products(&["a", "b"]), 0)
            .await
            .unwrap();
        assert_eq!(accumulated.product.product_id, "b");
    }

    #[tokio::test]
    async fn test_later_page_error_keeps_earlier_reviews() {
        let (endpoint, requested) = serve_pages(vec![
            (1, feedback_page(10)),
            (2, (500, "application/json", "{}".to_string())),
        ])
        .await;

        let reviews = client_for(endpoint).fetch_reviews("1005").await.unwrap();
        assert_eq!(reviews.len(), 10);
        assert_eq!(reviews[0].text, "Review 0");
        assert_eq!(*requested.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_html_first_page_is_a_fetch_error() {
        let (endpoint, _) = serve_pages(vec![(
            1,
            (200, "text/html", "<html>captcha</html>".to_string()),
        )])
        .await;

        let err = client_for(endpoint).fetch_reviews("1005").await.unwrap_err();
        match err {
            PipelineError::Fetch { product_id, reason } => {
                assert_eq!(product_id, "1005");
                assert_eq!(reason, "unexpected content type 'text/html'");
            }
            other => panic!("expected a fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_short_page_ends_pagination() {
        let (endpoint, requested) = serve_pages(vec![(1, feedback_page(3)), (2, feedback_page(10))]).await;

        let reviews = client_for(endpoint).fetch_reviews("1005").await.unwrap();
        assert_eq!(reviews.len(), 3);
        assert_eq!(*requested.lock().unwrap(), vec![1]);
    }
}
