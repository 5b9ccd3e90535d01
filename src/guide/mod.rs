//! Keyword buying guides
//!
//! One chat completion per keyword produces three sections: what to look
//! for, what to check before buying, and common questions. The rendered
//! HTML is stored next to the keyword in the task sheet.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::SummarizerConfig;
use crate::error::{PipelineError, Result};
use crate::models::{BuyingGuide, ChatMessage, ChatRequest, ResponseFormat};
use crate::summarizer::{complete, strip_label, strip_list_marker};
use crate::traits::GuideWriter;

const GUIDE_LABELS: &[&str] = &[
    "selection points",
    "selection_points",
    "checklist",
    "faq",
    "제품 선택 포인트",
    "구매 전 체크리스트",
    "자주 묻는 질문",
];

pub struct OpenAiGuideWriter {
    client: Client,
    api_key: String,
    config: SummarizerConfig,
}

impl OpenAiGuideWriter {
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

    fn request(&self, keyword: &str) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!(
                        "You write concise buying guides in {} for online shoppers. \
                         Reply with a JSON object with the keys \"selection_points\", \
                         \"checklist\" and \"faq\". \"selection_points\" explains the key \
                         features and how to choose for the intended use in about 300 \
                         characters. \"checklist\" lists what to verify before buying in \
                         about 200 characters. \"faq\" answers common buyer questions in \
                         about 300 characters.",
                        self.config.language
                    ),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Keyword: {keyword}"),
                },
            ],
            temperature: 0.5,
            max_tokens: 800,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }
}

#[async_trait]
impl GuideWriter for OpenAiGuideWriter {
    async fn write_guide(&self, keyword: &str) -> Result<BuyingGuide> {
        debug!(keyword = %keyword, model = %self.config.model, "Buying guide request");

        let content = complete(
            &self.client,
            &self.api_key,
            &self.config.base_url,
            &self.request(keyword),
        )
        .await
        .map_err(PipelineError::Guide)?;

        let guide = parse_guide(&content)?;
        info!(keyword = %keyword, "Wrote buying guide");
        Ok(guide)
    }
}

#[derive(Deserialize)]
struct GuideReply {
    selection_points: String,
    checklist: String,
    faq: String,
}

/// Read the three guide sections from a model reply
///
/// JSON is expected; three numbered or labelled lines are accepted too.
/// Every section has to be non-empty.
pub fn parse_guide(content: &str) -> Result<BuyingGuide> {
    let trimmed = content.trim();
    let json = trimmed
        .find('{')
        .zip(trimmed.rfind('}'))
        .and_then(|(start, end)| trimmed.get(start..=end))
        .and_then(|body| serde_json::from_str::<GuideReply>(body).ok());

    let sections = match json {
        Some(reply) => [reply.selection_points, reply.checklist, reply.faq],
        None => {
            let mut lines = content
                .lines()
                .map(|line| strip_label(strip_list_marker(line), GUIDE_LABELS))
                .filter(|line| !line.is_empty())
                .map(str::to_string);
            [
                lines.next().unwrap_or_default(),
                lines.next().unwrap_or_default(),
                lines.next().unwrap_or_default(),
            ]
        }
    };

    let [selection_points, checklist, faq] = sections.map(|s| s.trim().to_string());
    if selection_points.is_empty() || checklist.is_empty() || faq.is_empty() {
        return Err(PipelineError::Guide(format!(
            "reply is missing a guide section: {content:?}"
        )));
    }

    Ok(BuyingGuide {
        selection_points,
        checklist,
        faq,
    })
}
