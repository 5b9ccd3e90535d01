//! # Review Summarization
//!
//! Turns pooled review texts and a product title into two short marketing
//! strings through an OpenAI-compatible chat completion endpoint.
//!
//! ## Output
//!
//! - **primary**: a self-contained highlight, aimed at 10-20 characters
//! - **secondary**: further positive attributes not repeated from the
//!   primary string, aimed at 15-40 characters
//!
//! Length targets are steered by the prompt only. The adapter guarantees
//! just that both strings come back non-empty.
//!
//! ## Environment Configuration
//!
//! Set `OPENAI_API_KEY`. `OPENAI_MODEL` and `OPENAI_BASE_URL` switch the
//! model or point at a compatible gateway.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SummarizerConfig;
use crate::error::{PipelineError, Result};
use crate::models::{ChatMessage, ChatRequest, ChatResponse, ResponseFormat, Summary};
use crate::traits::Summarizer;

/// Chat-completion backed summarizer
pub struct OpenAiSummarizer {
    client: Client,
    api_key: String,
    config: SummarizerConfig,
}

impl OpenAiSummarizer {
    pub fn new(config: SummarizerConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn request(&self, product_title: &str, reviews: &[String]) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!(
                        "You write short shopping highlights in {} from customer reviews. \
                         Reply with a JSON object with the keys \"primary\" and \"secondary\". \
                         \"primary\" is one self-contained highlight of 10 to 20 characters. \
                         \"secondary\" lists other positive points in 15 to 40 characters \
                         without repeating the primary highlight.",
                        self.config.language
                    ),
                },
                ChatMessage {
                    role: "user",
                    content: build_prompt(
                        product_title,
                        reviews,
                        self.config.max_reviews,
                        self.config.max_review_chars,
                    ),
                },
            ],
            temperature: 0.3,
            max_tokens: 200,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, product_title: &str, reviews: &[String]) -> Result<Summary> {
        if reviews.is_empty() {
            return Err(PipelineError::Summarization("no reviews to summarize".to_string()));
        }

        debug!(model = %self.config.model, reviews = reviews.len(), "Chat completion request");
        let content = complete(
            &self.client,
            &self.api_key,
            &self.config.base_url,
            &self.request(product_title, reviews),
        )
        .await
        .map_err(PipelineError::Summarization)?;

        let summary = parse_summary(&content)?;
        info!(title = %product_title, primary = %summary.primary, "Summarized reviews");
        Ok(summary)
    }
}

/// Send one chat completion request and return the text of the first choice
pub(crate) async fn complete(
    client: &Client,
    api_key: &str,
    base_url: &str,
    request: &ChatRequest,
) -> std::result::Result<String, String> {
    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .bearer_auth(api_key)
        .json(request)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(format!("API error ({status}): {error_text}"));
    }

    let chat: ChatResponse = response
        .json()
        .await
        .map_err(|e| format!("invalid response body: {e}"))?;

    chat.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| "no completion returned".to_string())
}

/// Build the user message from a title and review texts
pub fn build_prompt(
    product_title: &str,
    reviews: &[String],
    max_reviews: usize,
    max_review_chars: usize,
) -> String {
    let mut prompt = format!("Product: {product_title}\nReviews:\n");
    for (index, review) in reviews.iter().take(max_reviews).enumerate() {
        let review: String = review.chars().take(max_review_chars).collect();
        prompt.push_str(&format!("{}. {}\n", index + 1, review.replace('\n', " ")));
    }
    prompt
}

#[derive(Deserialize)]
struct SummaryReply {
    primary: String,
    secondary: String,
}

/// Read the two strings from a model reply
///
/// JSON is expected; a numbered or bulleted two-line reply is accepted too.
pub fn parse_summary(content: &str) -> Result<Summary> {
    let (primary, secondary) = match parse_json_reply(content) {
        Some(reply) => (reply.primary, reply.secondary),
        None => {
            let mut lines = content
                .lines()
                .map(|line| strip_label(strip_list_marker(line), SUMMARY_LABELS))
                .filter(|l| !l.is_empty());
            (
                lines.next().unwrap_or_default().to_string(),
                lines.next().unwrap_or_default().to_string(),
            )
        }
    };

    let primary = primary.trim().to_string();
    let secondary = secondary.trim().to_string();
    if primary.is_empty() || secondary.is_empty() {
        return Err(PipelineError::Summarization(format!(
            "reply is missing a summary string: {content:?}"
        )));
    }

    Ok(Summary { primary, secondary })
}

fn parse_json_reply(content: &str) -> Option<SummaryReply> {
    let trimmed = content.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    serde_json::from_str(trimmed.get(start..=end)?).ok()
}

/// Labels a model may put in front of the two summary lines
const SUMMARY_LABELS: &[&str] = &[
    "primary",
    "secondary",
    "summary",
    "highlight",
    "요약",
    "핵심 요약",
    "추가 요약",
    "한줄 요약",
];

/// Drop a leading `-`, `*`, `•`, `1.` or `1)` marker
pub(crate) fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    line.strip_prefix(['-', '*', '•'])
        .unwrap_or_else(|| {
            let digits = line.chars().take_while(char::is_ascii_digit).count();
            match line[digits..].strip_prefix(['.', ')']) {
                Some(rest) if digits > 0 => rest,
                _ => line,
            }
        })
        .trim()
}

/// Drop a `label:` prefix when the label is one of `labels`
///
/// Matching ignores case and surrounding `*` emphasis. Any other text before
/// a colon is content and is kept.
pub(crate) fn strip_label<'a>(line: &'a str, labels: &[&str]) -> &'a str {
    let Some((label, rest)) = line.split_once(':') else {
        return line;
    };
    let label = label.trim().trim_matches('*').trim();
    if labels.iter().any(|known| known.eq_ignore_ascii_case(label)) {
        rest.trim().trim_start_matches('*').trim()
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_reply() {
        let summary =
            parse_summary(r#"{"primary": " 착용감 최고 ", "secondary": "가볍고 그립감 좋은 케이스"}"#)
                .unwrap();
        assert_eq!(summary.primary, "착용감 최고");
        assert_eq!(summary.secondary, "가볍고 그립감 좋은 케이스");
    }

    #[test]
    fn test_parse_json_wrapped_in_code_fence() {
        let content = "```json\n{\"primary\": \"Snug fit\", \"secondary\": \"Light and grippy\"}\n```";
        let summary = parse_summary(content).unwrap();
        assert_eq!(summary.primary, "Snug fit");
    }

    #[test]
    fn test_parse_numbered_lines() {
        let content = "1. Primary: Snug fit\n\n2. Secondary: Light, grippy, no yellowing";
        let summary = parse_summary(content).unwrap();
        assert_eq!(summary.primary, "Snug fit");
        assert_eq!(summary.secondary, "Light, grippy, no yellowing");
    }

    #[test]
    fn test_parse_keeps_colons_that_are_content() {
        let summary = parse_summary("1. 가성비 최고: 튼튼함\n2. 가볍고 그립감 좋음").unwrap();
        assert_eq!(summary.primary, "가성비 최고: 튼튼함");
        assert_eq!(summary.secondary, "가볍고 그립감 좋음");
    }

    #[test]
    fn test_parse_strips_known_labels_only() {
        let summary = parse_summary("- **요약**: 착용감 최고\n- Secondary: Ratio 2:1 fits").unwrap();
        assert_eq!(summary.primary, "착용감 최고");
        assert_eq!(summary.secondary, "Ratio 2:1 fits");
    }

    #[test]
    fn test_parse_rejects_empty_field() {
        let err = parse_summary(r#"{"primary": "Snug fit", "secondary": "  "}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Summarization(_)));
        assert!(parse_summary("only one line").is_err());
    }

    #[test]
    fn test_prompt_bounds_review_count_and_length() {
        let reviews: Vec<String> = (0..5).map(|i| format!("review {i} {}", "x".repeat(50))).collect();
        let prompt = build_prompt("Slim Case", &reviews, 3, 10);
        assert!(prompt.starts_with("Product: Slim Case\n"));
        assert!(prompt.contains("1. review 0"));
        assert!(prompt.contains("3. review 2"));
        assert!(!prompt.contains("review 3"));
        assert!(!prompt.contains(&"x".repeat(11)));
    }

    #[tokio::test]
    async fn test_summarize_requires_reviews() {
        let summarizer = OpenAiSummarizer::new(SummarizerConfig {
            api_key: Some("sk-test".into()),
            ..SummarizerConfig::default()
        })
        .unwrap();
        let err = summarizer.summarize("Slim Case", &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Summarization(_)));
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        assert!(OpenAiSummarizer::new(SummarizerConfig::default()).is_err());
    }
}
