use crate::billing::BillingPolicy;

use super::gateway::{LlmGatewayError, is_retryable_status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// Account-level problem; trying again will not help.
    Billing,
    Retryable,
    Fatal,
    Cancelled,
}

impl NoticeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Retryable => "retryable",
            Self::Fatal => "fatal",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Human-readable description of a final generation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub kind: NoticeKind,
    pub message: String,
}

impl FailureNotice {
    pub fn from_error(err: &LlmGatewayError, policy: &BillingPolicy) -> Self {
        if err.is_billing(policy) {
            return Self::new(
                NoticeKind::Billing,
                "The AI provider refused the request because of a billing or quota problem on \
                 your account. Check your plan or add credits before generating again.",
            );
        }

        match err {
            LlmGatewayError::Cancelled => Self::new(NoticeKind::Cancelled, "Generation cancelled."),
            LlmGatewayError::Timeout | LlmGatewayError::Unavailable(_) => Self::new(
                NoticeKind::Retryable,
                "The AI provider could not be reached. Please try again in a moment.",
            ),
            LlmGatewayError::InvalidProviderPayload(_) => Self::new(
                NoticeKind::Retryable,
                "The AI provider returned an unexpected response. Please try again.",
            ),
            LlmGatewayError::Provider(error) => match error.status {
                Some(401 | 403) => Self::new(
                    NoticeKind::Fatal,
                    "The AI provider rejected the API key. Check your credentials.",
                ),
                Some(status) if is_retryable_status(status) => Self::new(
                    NoticeKind::Retryable,
                    format!(
                        "The AI provider is temporarily unavailable (HTTP {status}). \
                         Please try again in a moment."
                    ),
                ),
                None => Self::new(
                    NoticeKind::Retryable,
                    "The AI provider reported an error. Please try again.",
                ),
                Some(_) => Self::new(
                    NoticeKind::Fatal,
                    format!("The AI provider rejected the request: {error}"),
                ),
            },
        }
    }

    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
