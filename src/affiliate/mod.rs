//! AliExpress affiliate API client
//!
//! Adds sale price, image, and a promotion link to summarized products.
//! Requests are signed with HMAC-SHA256 over the sorted parameters.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info};

use crate::config::AffiliateConfig;
use crate::error::{PipelineError, Result};
use crate::models::Enrichment;
use crate::traits::ProductEnricher;

type HmacSha256 = Hmac<Sha256>;

const DETAIL_METHOD: &str = "aliexpress.affiliate.productdetail.get";
const LINK_METHOD: &str = "aliexpress.affiliate.link.generate";

pub struct AffiliateClient {
    client: Client,
    config: AffiliateConfig,
}

impl AffiliateClient {
    pub fn new(config: AffiliateConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    fn base_params(&self, method: &str, product_id: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app_key".to_string(), self.config.app_key.clone()),
            ("access_token".to_string(), self.config.access_token.clone()),
            ("method".to_string(), method.to_string()),
            ("product_id".to_string(), product_id.to_string()),
            ("local".to_string(), self.config.locale.clone()),
            (
                "timestamp".to_string(),
                Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
            ("sign_method".to_string(), "hmac-sha256".to_string()),
        ])
    }

    async fn call(&self, product_id: &str, mut params: BTreeMap<String, String>) -> Result<Value> {
        let sign = sign(&params, &self.config.app_secret)
            .map_err(|e| PipelineError::enrichment(product_id, e))?;
        params.insert("sign".to_string(), sign);

        debug!(product_id = %product_id, method = %params["method"], "Affiliate API request");

        let response = self
            .client
            .get(&self.config.gateway_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| PipelineError::enrichment(product_id, e))?;

        if !response.status().is_success() {
            return Err(PipelineError::enrichment(
                product_id,
                format!("HTTP {}", response.status()),
            ));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::enrichment(product_id, format!("invalid JSON body: {e}")))?;

        if let Some(error) = body.get("error_response") {
            return Err(PipelineError::enrichment(
                product_id,
                format!(
                    "API error {}: {}",
                    value_text(error.get("code")).unwrap_or_default(),
                    value_text(error.get("msg")).unwrap_or_default()
                ),
            ));
        }

        Ok(body)
    }
}

#[async_trait]
impl ProductEnricher for AffiliateClient {
    async fn enrich(&self, product_id: &str) -> Result<Enrichment> {
        let mut detail_params = self.base_params(DETAIL_METHOD, product_id);
        detail_params.insert("countryCode".to_string(), self.config.country.clone());
        detail_params.insert("currency".to_string(), self.config.currency.clone());
        detail_params.insert(
            "fields".to_string(),
            "product_id,product_title,target_sale_price,product_main_image_url,detail_url".to_string(),
        );
        let detail = self.call(product_id, detail_params).await?;

        let mut link_params = self.base_params(LINK_METHOD, product_id);
        link_params.insert("promotion_link_type".to_string(), "0".to_string());
        link_params.insert(
            "source_values".to_string(),
            format!("https://www.aliexpress.com/item/{product_id}.html"),
        );
        let link = self.call(product_id, link_params).await?;

        let enrichment = parse_enrichment(&detail, &link);
        info!(
            product_id = %product_id,
            has_link = enrichment.affiliate_link.is_some(),
            "Enriched product"
        );
        Ok(enrichment)
    }
}

/// Sign sorted parameters as `key1value1key2value2...` with HMAC-SHA256, upper-case hex
pub fn sign(params: &BTreeMap<String, String>, secret: &str) -> std::result::Result<String, String> {
    let canonical: String = params
        .iter()
        .filter(|(key, _)| key.as_str() != "sign")
        .map(|(key, value)| format!("{key}{value}"))
        .collect();

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| e.to_string())?;
    mac.update(canonical.as_bytes());
    Ok(hex::encode_upper(mac.finalize().into_bytes()))
}

/// Combine the detail and link responses into an enrichment
pub fn parse_enrichment(detail: &Value, link: &Value) -> Enrichment {
    let product = result_node(detail, "aliexpress_affiliate_productdetail_get_response").map(|result| {
        result
            .pointer("/products/product/0")
            .unwrap_or(result)
    });

    let promotion = result_node(link, "aliexpress_affiliate_link_generate_response").map(|result| {
        result
            .pointer("/promotion_links/promotion_link/0")
            .unwrap_or(result)
    });

    Enrichment {
        sale_price: product.and_then(|p| {
            value_text(p.get("target_sale_price")).or_else(|| value_text(p.get("sale_price")))
        }),
        image_url: product.and_then(|p| value_text(p.get("product_main_image_url"))),
        affiliate_link: promotion.and_then(|p| value_text(p.get("promotion_link"))),
    }
}

/// The `result` object, either directly under the response or inside `resp_result`
fn result_node<'a>(body: &'a Value, response_key: &str) -> Option<&'a Value> {
    let response = body.get(response_key)?;
    response
        .pointer("/resp_result/result")
        .or_else(|| response.get("result"))
}

fn value_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
