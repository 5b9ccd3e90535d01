//! Environment-driven configuration
//!
//! Every collaborator gets its own section. Values come from the process
//! environment (after `.env` is loaded with dotenvy); anything unset falls
//! back to the defaults below.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// How listing pages are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    /// Headless Chrome, runs page scripts and scrolls
    Chrome,
    /// Plain HTTP fetch of server-rendered HTML
    Http,
}

impl FromStr for Renderer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chrome" => Ok(Self::Chrome),
            "http" => Ok(Self::Http),
            other => bail!("unknown renderer '{other}', expected 'chrome' or 'http'"),
        }
    }
}

/// Listing page discovery settings
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub renderer: Renderer,
    /// JSON file replacing the built-in selector strategies
    pub listing_config_path: Option<PathBuf>,
    pub headless: bool,
    pub locale: String,
    pub user_agent: String,
    pub navigation_timeout_secs: u64,
    /// Wait after the first load, in milliseconds
    pub initial_settle_ms: u64,
    pub scroll_count: u32,
    /// Wait after each scroll, in milliseconds
    pub scroll_settle_ms: u64,
    /// Bounded wait per selector strategy, in milliseconds
    pub strategy_wait_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            renderer: Renderer::Chrome,
            listing_config_path: None,
            headless: true,
            locale: "ko-KR".to_string(),
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            navigation_timeout_secs: 60,
            initial_settle_ms: 3000,
            scroll_count: 2,
            scroll_settle_ms: 2000,
            strategy_wait_ms: 4000,
        }
    }
}

impl DiscoveryConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn strategy_wait(&self) -> Duration {
        Duration::from_millis(self.strategy_wait_ms)
    }
}

/// Feedback endpoint settings
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub endpoint: String,
    pub lang: String,
    pub country: String,
    pub page_size: u32,
    /// Rating filter sent as the `filter` parameter
    pub filter: String,
    pub sort: String,
    pub max_pages: u32,
    pub timeout_secs: u64,
    /// Dotted path to the review list inside the JSON body
    pub list_path: String,
    /// Entry fields holding review text, translated first
    pub text_fields: Vec<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://feedback.aliexpress.com/pc/searchEvaluation.do".to_string(),
            lang: "ko_KR".to_string(),
            country: "KR".to_string(),
            page_size: 10,
            filter: "5".to_string(),
            sort: "complex_default".to_string(),
            max_pages: 2,
            timeout_secs: 30,
            list_path: "data.evaViewList".to_string(),
            text_fields: vec![
                "buyerTranslationFeedback".to_string(),
                "buyerFeedback".to_string(),
            ],
        }
    }
}

impl ReviewConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Language-model settings
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// Language the marketing strings are written in
    pub language: String,
    pub timeout_secs: u64,
    pub max_reviews: usize,
    pub max_review_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            language: "Korean".to_string(),
            timeout_secs: 30,
            max_reviews: 20,
            max_review_chars: 500,
        }
    }
}

impl SummarizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Affiliate API credentials and locale
#[derive(Debug, Clone)]
pub struct AffiliateConfig {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
    pub gateway_url: String,
    pub locale: String,
    pub country: String,
    pub currency: String,
    pub timeout_secs: u64,
}

impl AffiliateConfig {
    pub fn new(
        app_key: impl Into<String>,
        app_secret: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            access_token: access_token.into(),
            gateway_url: "https://api-sg.aliexpress.com/sync".to_string(),
            locale: "ko_KR".to_string(),
            country: "KR".to_string(),
            currency: "KRW".to_string(),
            timeout_secs: 30,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Orchestration settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_results: usize,
    pub review_threshold: usize,
    /// Pause between keywords, in milliseconds
    pub keyword_delay_ms: u64,
    /// Skip keywords that already have a result row for the date
    pub skip_completed: bool,
    /// Write a buying guide for every attempted keyword
    pub write_guides: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_results: 5,
            review_threshold: 5,
            keyword_delay_ms: 2000,
            skip_completed: true,
            write_guides: true,
        }
    }
}

impl PipelineConfig {
    pub fn keyword_delay(&self) -> Duration {
        Duration::from_millis(self.keyword_delay_ms)
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub schedule_cron: String,
    pub discovery: DiscoveryConfig,
    pub reviews: ReviewConfig,
    pub summarizer: SummarizerConfig,
    pub affiliate: Option<AffiliateConfig>,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a key to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discovery_defaults = DiscoveryConfig::default();
        let discovery = DiscoveryConfig {
            renderer: parse_or(&get, "LISTING_RENDERER", discovery_defaults.renderer)?,
            listing_config_path: get("LISTING_CONFIG_PATH").map(PathBuf::from),
            headless: parse_or(&get, "CHROME_HEADLESS", discovery_defaults.headless)?,
            locale: get("BROWSER_LOCALE").unwrap_or(discovery_defaults.locale),
            user_agent: get("USER_AGENT").unwrap_or(discovery_defaults.user_agent),
            navigation_timeout_secs: parse_or(
                &get,
                "NAVIGATION_TIMEOUT_SECS",
                discovery_defaults.navigation_timeout_secs,
            )?,
            initial_settle_ms: parse_or(&get, "INITIAL_SETTLE_MS", discovery_defaults.initial_settle_ms)?,
            scroll_count: parse_or(&get, "SCROLL_COUNT", discovery_defaults.scroll_count)?,
            scroll_settle_ms: parse_or(&get, "SCROLL_SETTLE_MS", discovery_defaults.scroll_settle_ms)?,
            strategy_wait_ms: parse_or(&get, "STRATEGY_WAIT_MS", discovery_defaults.strategy_wait_ms)?,
        };

        let review_defaults = ReviewConfig::default();
        let http_timeout = parse_or(&get, "HTTP_TIMEOUT_SECS", review_defaults.timeout_secs)?;
        let reviews = ReviewConfig {
            endpoint: get("FEEDBACK_URL").unwrap_or(review_defaults.endpoint),
            lang: get("FEEDBACK_LANG").unwrap_or(review_defaults.lang),
            country: get("FEEDBACK_COUNTRY").unwrap_or(review_defaults.country),
            page_size: parse_or(&get, "FEEDBACK_PAGE_SIZE", review_defaults.page_size)?,
            filter: get("FEEDBACK_FILTER").unwrap_or(review_defaults.filter),
            max_pages: parse_or(&get, "FEEDBACK_MAX_PAGES", review_defaults.max_pages)?,
            timeout_secs: http_timeout,
            ..review_defaults
        };

        let summarizer_defaults = SummarizerConfig::default();
        let summarizer = SummarizerConfig {
            api_key: get("OPENAI_API_KEY"),
            model: get("OPENAI_MODEL").unwrap_or(summarizer_defaults.model),
            base_url: get("OPENAI_BASE_URL").unwrap_or(summarizer_defaults.base_url),
            language: get("SUMMARY_LANGUAGE").unwrap_or(summarizer_defaults.language),
            timeout_secs: http_timeout,
            ..summarizer_defaults
        };

        let affiliate = match (
            get("ALIEXPRESS_APP_KEY"),
            get("ALIEXPRESS_APP_SECRET"),
            get("ALIEXPRESS_ACCESS_TOKEN"),
        ) {
            (Some(key), Some(secret), Some(token)) => Some(AffiliateConfig {
                timeout_secs: http_timeout,
                ..AffiliateConfig::new(key, secret, token)
            }),
            _ => None,
        };

        let pipeline_defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            max_results: parse_or(&get, "MAX_RESULTS", pipeline_defaults.max_results)?,
            review_threshold: parse_or(&get, "REVIEW_THRESHOLD", pipeline_defaults.review_threshold)?,
            keyword_delay_ms: parse_or(&get, "KEYWORD_DELAY_MS", pipeline_defaults.keyword_delay_ms)?,
            skip_completed: parse_or(&get, "SKIP_COMPLETED", pipeline_defaults.skip_completed)?,
            write_guides: parse_or(&get, "WRITE_GUIDES", pipeline_defaults.write_guides)?,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite:database/pickview.db".to_string()),
            schedule_cron: get("SCHEDULE_CRON").unwrap_or_else(|| "0 0 9 * * *".to_string()),
            discovery,
            reviews,
            summarizer,
            affiliate,
            pipeline,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid value '{raw}' for {key}")),
        None => Ok(default),
    }
}
