use std::env;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::gateway::{
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
    LlmTokenUsage, is_retryable_status,
};
use crate::billing::{BillingPolicy, ClassifyProviderError, ErrorClass, ProviderError};
use crate::config::{ConfigError, RetrySettings};
use crate::config_env::{optional_trimmed_var, parse_u64_var, require_var};
use crate::retry::{RetryError, RetryOptions, retry_with_cancel};

const DEFAULT_CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const MAX_ERROR_MESSAGE_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct OpenRouterGatewayConfig {
    pub chat_completions_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub model: String,
    pub retry: RetrySettings,
}

impl OpenRouterGatewayConfig {
    pub fn from_env() -> Result<Self, OpenRouterConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self, OpenRouterConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let api_key = require_var(&lookup, "OPENROUTER_API_KEY")?;
        let chat_completions_url = optional_trimmed_var(&lookup, "OPENROUTER_CHAT_COMPLETIONS_URL")
            .unwrap_or_else(|| DEFAULT_CHAT_COMPLETIONS_URL.to_string());
        if !chat_completions_url.starts_with("http://")
            && !chat_completions_url.starts_with("https://")
        {
            return Err(OpenRouterConfigError::InvalidConfiguration(
                "OPENROUTER_CHAT_COMPLETIONS_URL must start with http:// or https://".to_string(),
            ));
        }

        let timeout_ms = parse_u64_var(&lookup, "OPENROUTER_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        if timeout_ms == 0 {
            return Err(OpenRouterConfigError::InvalidConfiguration(
                "OPENROUTER_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            chat_completions_url,
            api_key,
            timeout_ms,
            model: optional_trimmed_var(&lookup, "OPENROUTER_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            retry: RetrySettings::from_lookup(&lookup)?,
        })
    }
}

#[derive(Debug, Error)]
pub enum OpenRouterConfigError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to build OpenRouter http client: {0}")]
    HttpClient(String),
}

/// Chat-completions client whose every request runs through the retry
/// wrapper.
///
/// Beyond the billing rule, the gateway narrows retries to failures that
/// can heal on their own: timeouts, connection errors, throttling and
/// server errors. Auth failures, other 4xx responses and malformed
/// payloads surface after one attempt.
#[derive(Clone)]
pub struct OpenRouterGateway {
    client: reqwest::Client,
    config: OpenRouterGatewayConfig,
    retry_options: RetryOptions<LlmGatewayError>,
}

impl OpenRouterGateway {
    pub fn new(config: OpenRouterGatewayConfig) -> Result<Self, OpenRouterConfigError> {
        config.retry.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| OpenRouterConfigError::HttpClient(err.to_string()))?;

        let billing = config.retry.billing.clone();
        let retry_options = config
            .retry
            .to_options::<LlmGatewayError>()
            .with_predicate(move |err: &LlmGatewayError| is_transient_failure(err, &billing));

        Ok(Self {
            client,
            config,
            retry_options,
        })
    }

    pub fn billing_policy(&self) -> &BillingPolicy {
        &self.config.retry.billing
    }

    pub async fn generate_with_cancel(
        &self,
        request: &LlmGatewayRequest,
        token: &CancellationToken,
    ) -> Result<LlmGatewayResponse, LlmGatewayError> {
        let result = retry_with_cancel(|| self.send_once(request), &self.retry_options, token).await;

        match result {
            Ok(response) => Ok(response),
            Err(RetryError::Cancelled { .. }) => Err(LlmGatewayError::Cancelled),
            Err(RetryError::Operation(err)) => {
                let class = err.error_class(self.billing_policy());
                if class == ErrorClass::Billing {
                    warn!(
                        class = class.as_str(),
                        status = ?err.status(),
                        error = %err,
                        "provider rejected request for billing or quota reasons"
                    );
                }
                Err(err)
            }
        }
    }

    async fn send_once(
        &self,
        request: &LlmGatewayRequest,
    ) -> Result<LlmGatewayResponse, LlmGatewayError> {
        let mut request_body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt }
            ],
        });
        if request.json_output {
            request_body["response_format"] = json!({ "type": "json_object" });
        }
        if let Some(requester_id) = request.requester_id.as_deref() {
            request_body["user"] = Value::String(requester_id.to_string());
        }

        let response = self
            .client
            .post(&self.config.chat_completions_url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    LlmGatewayError::Timeout
                } else {
                    LlmGatewayError::Unavailable(err.without_url().to_string())
                }
            })?;

        let status = response.status();
        let header_request_id = header_request_id(response.headers());
        // A body cut off mid-stream is a transport failure, not a malformed reply.
        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                LlmGatewayError::Timeout
            } else {
                LlmGatewayError::Unavailable(err.without_url().to_string())
            }
        })?;

        if !status.is_success() {
            return Err(LlmGatewayError::Provider(parse_provider_error(
                status.as_u16(),
                &body,
            )));
        }

        let parsed: OpenRouterSuccessResponse = serde_json::from_str(&body).map_err(|_| {
            LlmGatewayError::InvalidProviderPayload("response_json_parse_failed".to_string())
        })?;

        // Some providers report failures inside a 200 envelope.
        if let Some(error) = parsed.error {
            return Err(LlmGatewayError::Provider(error.into_provider_error(None)));
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmGatewayError::InvalidProviderPayload("missing_choice".to_string()))?
            .message
            .content;

        let output = if request.json_output {
            parse_json_content(content)?
        } else {
            content
        };

        Ok(LlmGatewayResponse {
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            provider_request_id: header_request_id.or(parsed.id),
            output,
            usage: parsed.usage.map(|usage| LlmTokenUsage {
                prompt_tokens: clamp_u64_to_u32(usage.prompt_tokens.unwrap_or(0)),
                completion_tokens: clamp_u64_to_u32(usage.completion_tokens.unwrap_or(0)),
                total_tokens: clamp_u64_to_u32(usage.total_tokens.unwrap_or(0)),
            }),
        })
    }
}

impl LlmGateway for OpenRouterGateway {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            let token = CancellationToken::new();
            self.generate_with_cancel(&request, &token).await
        })
    }
}

fn is_transient_failure(err: &LlmGatewayError, billing: &BillingPolicy) -> bool {
    match err {
        LlmGatewayError::Timeout | LlmGatewayError::Unavailable(_) => true,
        LlmGatewayError::Provider(error) => {
            !billing.is_billing(error) && error.status.is_none_or(is_retryable_status)
        }
        LlmGatewayError::InvalidProviderPayload(_) | LlmGatewayError::Cancelled => false,
    }
}

#[derive(Debug, Deserialize)]
struct OpenRouterSuccessResponse {
    id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
    usage: Option<OpenRouterUsage>,
    error: Option<ProviderErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterMessage,
}

#[derive(Debug, Deserialize)]
struct OpenRouterMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct OpenRouterUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorEnvelope {
    error: Option<ProviderErrorDetails>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetails {
    code: Option<Value>,
    message: Option<String>,
}

impl ProviderErrorDetails {
    fn into_provider_error(self, status: Option<u16>) -> ProviderError {
        let code = match self.code {
            Some(Value::String(code)) => Some(code),
            Some(Value::Number(code)) => Some(code.to_string()),
            _ => None,
        };
        // Numeric codes mirror the HTTP status when the envelope came with a 200.
        let status = status.or_else(|| {
            code.as_deref()
                .and_then(|code| code.parse::<u16>().ok())
                .filter(|code| (400..600).contains(code))
        });
        ProviderError {
            status,
            code,
            message: self.message.map(|message| truncate_chars(&message)),
        }
    }
}

fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match serde_json::from_str::<ProviderErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
    {
        Some(details) => details.into_provider_error(Some(status)),
        None => {
            let trimmed = body.trim();
            ProviderError {
                status: Some(status),
                code: None,
                message: (!trimmed.is_empty()).then(|| truncate_chars(trimmed)),
            }
        }
    }
}

fn parse_json_content(content: Value) -> Result<Value, LlmGatewayError> {
    match content {
        Value::String(raw) => serde_json::from_str::<Value>(&raw).map_err(|_| {
            LlmGatewayError::InvalidProviderPayload("content_not_json".to_string())
        }),
        value @ (Value::Object(_) | Value::Array(_)) => Ok(value),
        _ => Err(LlmGatewayError::InvalidProviderPayload(
            "unsupported_content_shape".to_string(),
        )),
    }
}

fn header_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn truncate_chars(value: &str) -> String {
    value.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}

fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
