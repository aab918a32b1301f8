use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::billing::{BillingPolicy, ClassifyProviderError, ProviderError};

pub type LlmGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LlmGatewayResponse, LlmGatewayError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct LlmGatewayRequest {
    pub requester_id: Option<String>,
    pub system_prompt: String,
    pub user_prompt: String,
    /// Ask the provider for a JSON object and parse the reply as JSON.
    pub json_output: bool,
}

impl LlmGatewayRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            requester_id: None,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            json_output: false,
        }
    }

    pub fn with_requester_id(mut self, requester_id: impl AsRef<str>) -> Self {
        let trimmed = requester_id.as_ref().trim();
        if !trimmed.is_empty() {
            self.requester_id = Some(trimmed.to_string());
        }
        self
    }

    pub fn expect_json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmTokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGatewayResponse {
    pub model: String,
    pub provider_request_id: Option<String>,
    pub output: Value,
    pub usage: Option<LlmTokenUsage>,
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("llm provider request timed out")]
    Timeout,
    #[error("llm provider unreachable: {0}")]
    Unavailable(String),
    #[error("llm provider request failed: {0}")]
    Provider(ProviderError),
    #[error("llm provider returned an invalid payload: {0}")]
    InvalidProviderPayload(String),
    #[error("llm request cancelled")]
    Cancelled,
}

impl LlmGatewayError {
    pub fn is_billing(&self, policy: &BillingPolicy) -> bool {
        self.provider_error()
            .is_some_and(|error| policy.is_billing(error))
    }

    pub fn status(&self) -> Option<u16> {
        self.provider_error().and_then(|error| error.status)
    }
}

impl ClassifyProviderError for LlmGatewayError {
    fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(error) => Some(error),
            _ => None,
        }
    }
}

pub trait LlmGateway: Send + Sync {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a>;
}

/// HTTP statuses worth another attempt: timeouts, throttling, server errors.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 425 | 429 | 500..=599)
}
