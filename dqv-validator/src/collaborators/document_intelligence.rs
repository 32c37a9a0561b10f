//! Document Intelligence OCR adapter
//!
//! Submit: `POST {endpoint}/formrecognizer/documentModels/{model}:analyze`
//! with `{"base64Source": ...}`; the service answers 202 with an
//! `Operation-Location` header. Poll that URL until the status is
//! `succeeded` (text in `analyzeResult.content`) or `failed`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use dqv_common::config::OcrConfig;
use reqwest::{header::HeaderValue, Client};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::text_extractor::{OcrError, TextExtractor};

const USER_AGENT: &str = concat!("dqv-validator/", env!("CARGO_PKG_VERSION"));
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const MAX_POLLS: u32 = 300;
const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    analyze_result: Option<AnalyzeResult>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
}

/// OCR through an Azure Document Intelligence resource
pub struct DocumentIntelligenceExtractor {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    api_version: String,
    poll_interval: Duration,
}

impl DocumentIntelligenceExtractor {
    pub fn new(
        config: &OcrConfig,
        api_key: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, OcrError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| OcrError::InvalidConfig("ocr.endpoint is required".to_string()))?;
        let api_key = api_key.ok_or_else(|| {
            OcrError::InvalidConfig(
                "OCR API key is required (DQV_OCR_API_KEY or ocr.api_key)".to_string(),
            )
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| OcrError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            api_version: config.api_version.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze",
            self.endpoint, self.model
        )
    }

    async fn submit(&self, document: &Bytes) -> Result<String, OcrError> {
        let body = serde_json::json!({ "base64Source": STANDARD.encode(document) });

        let response = self
            .client
            .post(self.analyze_url())
            .query(&[("api-version", self.api_version.as_str())])
            .header(KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OcrError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OcrError::Api {
                status: status.as_u16(),
                body: text.chars().take(200).collect(),
            });
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| OcrError::Failed("analyze response without Operation-Location".to_string()))
    }

    async fn poll(&self, operation_url: &str) -> Result<String, OcrError> {
        for attempt in 1..=MAX_POLLS {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .client
                .get(operation_url)
                .header(KEY_HEADER, &self.api_key)
                .send()
                .await
                .map_err(|e| OcrError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(OcrError::Api {
                    status: status.as_u16(),
                    body: text.chars().take(200).collect(),
                });
            }

            let operation: AnalyzeOperation = response
                .json()
                .await
                .map_err(|e| OcrError::Failed(format!("unreadable analyze result: {}", e)))?;

            match operation.status.as_str() {
                "succeeded" => {
                    debug!(attempt, "Document analysis succeeded");
                    return Ok(operation
                        .analyze_result
                        .map(|r| r.content)
                        .unwrap_or_default());
                }
                "failed" => {
                    let detail = operation
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no error detail".to_string());
                    warn!(%detail, "Document analysis failed");
                    return Err(OcrError::Failed(detail));
                }
                other => debug!(attempt, status = other, "Document analysis pending"),
            }
        }

        Err(OcrError::Failed(format!(
            "analysis still running after {} polls",
            MAX_POLLS
        )))
    }
}

#[async_trait]
impl TextExtractor for DocumentIntelligenceExtractor {
    fn name(&self) -> &'static str {
        "document-intelligence"
    }

    async fn extract(&self, document: Bytes) -> Result<String, OcrError> {
        let operation_url = self.submit(&document).await?;
        self.poll(&operation_url).await
    }

    async fn ping(&self) -> bool {
        self.client
            .get(&self.endpoint)
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .is_ok()
    }
}
