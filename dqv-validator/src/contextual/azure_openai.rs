//! Azure OpenAI chat-completions adapter
//!
//! Deployment URL layout:
//! `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
//! with the key in the `api-key` header. Requests ask for a JSON object reply.
//! HTTP 429 is retried a bounded number of times with linear backoff; the
//! orchestrator's reasoning timeout caps the whole exchange.

use async_trait::async_trait;
use dqv_common::config::ReasoningConfig;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    prompt, response_parser, ContextualError, ContextualRequest, ContextualValidator,
    SemanticJudgment,
};

const USER_AGENT: &str = concat!("dqv-validator/", env!("CARGO_PKG_VERSION"));
const VALIDATION_MAX_TOKENS: u32 = 500;
const STRUCTURE_MAX_TOKENS: u32 = 800;
const STRUCTURE_MAX_CHARS: usize = 1000;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(15);
const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Reasoning validator backed by an Azure OpenAI deployment
pub struct AzureOpenAiValidator {
    client: Client,
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: String,
    max_prompt_chars: usize,
    rate_limit_retries: u32,
    backoff: Duration,
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl AzureOpenAiValidator {
    pub fn new(
        endpoint: String,
        api_key: String,
        config: &ReasoningConfig,
        request_timeout: Duration,
    ) -> Result<Self, ContextualError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ContextualError::Transport(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            ContextualError::InvalidConfig("requests_per_second must be at least 1".to_string())
        })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment: config.deployment.clone(),
            api_version: config.api_version.clone(),
            api_key,
            max_prompt_chars: config.max_prompt_chars,
            rate_limit_retries: config.rate_limit_retries,
            backoff: DEFAULT_BACKOFF,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    /// Override the 429 backoff step (attempt `n` waits `n * backoff`)
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions",
            self.endpoint, self.deployment
        )
    }

    /// Send one chat exchange and return the reply text
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, ContextualError> {
        let body = ChatRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.1,
            max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let url = self.completions_url();
        let mut attempt: u32 = 0;

        loop {
            self.rate_limiter.until_ready().await;

            debug!(deployment = %self.deployment, attempt, "Sending chat completion request");

            let response = self
                .client
                .post(&url)
                .query(&[("api-version", self.api_version.as_str())])
                .header("api-key", &self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| ContextualError::Transport(e.to_string()))?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < self.rate_limit_retries {
                    attempt += 1;
                    let wait = self.backoff * attempt;
                    warn!(
                        attempt,
                        max_retries = self.rate_limit_retries,
                        wait_ms = wait.as_millis() as u64,
                        "Reasoning provider rate limited, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(ContextualError::RateLimited(self.rate_limit_retries));
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(ContextualError::Api {
                    status: status.as_u16(),
                    body: prompt::truncate_chars(&text, 200).to_string(),
                });
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| ContextualError::UnparsableResponse(e.to_string()))?;

            return parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| {
                    ContextualError::UnparsableResponse("empty completion".to_string())
                });
        }
    }
}

#[async_trait]
impl ContextualValidator for AzureOpenAiValidator {
    fn name(&self) -> &'static str {
        "azure-openai"
    }

    async fn validate(
        &self,
        request: &ContextualRequest<'_>,
    ) -> Result<SemanticJudgment, ContextualError> {
        let user = prompt::validation_prompt(request, self.max_prompt_chars);
        let content = self
            .complete(prompt::VALIDATION_SYSTEM_PROMPT, &user, VALIDATION_MAX_TOKENS)
            .await?;
        response_parser::parse_judgment(&content)
    }

    async fn describe_structure(
        &self,
        document_text: &str,
    ) -> Result<serde_json::Value, ContextualError> {
        let user = prompt::structure_prompt(document_text, STRUCTURE_MAX_CHARS);
        let content = self
            .complete(prompt::STRUCTURE_SYSTEM_PROMPT, &user, STRUCTURE_MAX_TOKENS)
            .await?;
        response_parser::parse_structure(&content)
    }

    /// Any HTTP answer from the endpoint counts as reachable
    async fn ping(&self) -> bool {
        self.client
            .get(&self.endpoint)
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .is_ok()
    }
}
