//! Classification of provider failures into billing/quota errors and
//! everything else.
//!
//! Billing failures mean the account itself cannot be served (payment
//! required, credits exhausted, hard quota reached). Retrying them only
//! burns time, so the retry wrapper's default predicate refuses to retry
//! anything this module flags.

use std::fmt;

use serde::{Deserialize, Serialize};

const DEFAULT_BILLING_STATUSES: &[u16] = &[402];

const DEFAULT_BILLING_CODES: &[&str] = &[
    "insufficient_quota",
    "insufficient_credits",
    "quota_exceeded",
    "billing_hard_limit_reached",
    "billing_not_active",
    "payment_required",
];

const DEFAULT_BILLING_MESSAGE_MARKERS: &[&str] = &[
    "billing",
    "quota exceeded",
    "insufficient credits",
    "insufficient_quota",
    "payment required",
    "credit balance",
    "exceeded your current quota",
];

/// Structured view of a failed provider call.
///
/// Every field is optional: transport failures carry no status, some
/// providers omit machine-readable codes, and bodies are not always JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: Option<String>,
}

impl ProviderError {
    pub fn with_status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "status={status}")?,
            None => write!(f, "status=none")?,
        }
        write!(f, " code={}", self.code.as_deref().unwrap_or("unknown"))?;
        if let Some(message) = self.message.as_deref() {
            write!(f, " message={message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Billing,
    Transient,
}

impl ErrorClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Billing => "billing",
            Self::Transient => "transient",
        }
    }
}

/// Signals that mark a provider failure as a billing/quota error.
///
/// Codes and message markers are compared case-insensitively; markers
/// match as substrings of the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingPolicy {
    pub statuses: Vec<u16>,
    pub codes: Vec<String>,
    pub message_markers: Vec<String>,
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            statuses: DEFAULT_BILLING_STATUSES.to_vec(),
            codes: DEFAULT_BILLING_CODES
                .iter()
                .map(|code| (*code).to_string())
                .collect(),
            message_markers: DEFAULT_BILLING_MESSAGE_MARKERS
                .iter()
                .map(|marker| (*marker).to_string())
                .collect(),
        }
    }
}

impl BillingPolicy {
    /// A policy that never classifies anything as billing.
    pub fn empty() -> Self {
        Self {
            statuses: Vec::new(),
            codes: Vec::new(),
            message_markers: Vec::new(),
        }
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        for status in statuses {
            if !self.statuses.contains(&status) {
                self.statuses.push(status);
            }
        }
        self
    }

    pub fn with_codes<S: AsRef<str>>(mut self, codes: impl IntoIterator<Item = S>) -> Self {
        extend_normalized(&mut self.codes, codes);
        self
    }

    pub fn with_message_markers<S: AsRef<str>>(
        mut self,
        markers: impl IntoIterator<Item = S>,
    ) -> Self {
        extend_normalized(&mut self.message_markers, markers);
        self
    }

    pub fn classify(&self, error: &ProviderError) -> ErrorClass {
        if self.matches_status(error) || self.matches_code(error) || self.matches_message(error) {
            ErrorClass::Billing
        } else {
            ErrorClass::Transient
        }
    }

    pub fn is_billing(&self, error: &ProviderError) -> bool {
        self.classify(error) == ErrorClass::Billing
    }

    fn matches_status(&self, error: &ProviderError) -> bool {
        error
            .status
            .is_some_and(|status| self.statuses.contains(&status))
    }

    fn matches_code(&self, error: &ProviderError) -> bool {
        let Some(code) = error.code.as_deref().map(str::trim) else {
            return false;
        };
        !code.is_empty()
            && self
                .codes
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(code))
    }

    fn matches_message(&self, error: &ProviderError) -> bool {
        let Some(message) = error.message.as_deref() else {
            return false;
        };
        let message = message.to_lowercase();
        self.message_markers
            .iter()
            .filter(|marker| !marker.is_empty())
            .any(|marker| message.contains(&marker.to_lowercase()))
    }
}

/// Errors that can expose a [`ProviderError`] view for classification.
///
/// Errors without a provider view (timeouts, connection resets) are
/// never billing errors.
pub trait ClassifyProviderError {
    fn provider_error(&self) -> Option<&ProviderError>;

    fn error_class(&self, policy: &BillingPolicy) -> ErrorClass {
        self.provider_error()
            .map_or(ErrorClass::Transient, |error| policy.classify(error))
    }
}

impl ClassifyProviderError for ProviderError {
    fn provider_error(&self) -> Option<&ProviderError> {
        Some(self)
    }
}

fn extend_normalized<S: AsRef<str>>(target: &mut Vec<String>, values: impl IntoIterator<Item = S>) {
    for value in values {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        if !target
            .iter()
            .any(|existing| existing.eq_ignore_ascii_case(trimmed))
        {
            target.push(trimmed.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BillingPolicy, ClassifyProviderError, ErrorClass, ProviderError};

    #[test]
    fn payment_required_status_is_billing() {
        let policy = BillingPolicy::default();
        assert_eq!(
            policy.classify(&ProviderError::with_status(402)),
            ErrorClass::Billing
        );
    }

    #[test]
    fn quota_codes_are_billing_regardless_of_case() {
        let policy = BillingPolicy::default();
        for code in [
            "insufficient_quota",
            "INSUFFICIENT_CREDITS",
            "Quota_Exceeded",
            "billing_hard_limit_reached",
            "billing_not_active",
            "payment_required",
        ] {
            let error = ProviderError::with_status(429).code(code);
            assert!(policy.is_billing(&error), "code {code} should be billing");
        }
    }

    #[test]
    fn billing_message_markers_match_case_insensitively() {
        let policy = BillingPolicy::default();
        for message in [
            "Billing details are missing for this account",
            "You exceeded your current QUOTA, please check your plan",
            "Insufficient credits. Add more using https://openrouter.ai/credits",
            "Payment Required",
            "Your credit balance is too low",
        ] {
            let error = ProviderError::default().message(message);
            assert!(policy.is_billing(&error), "message {message:?} should be billing");
        }
    }

    #[test]
    fn rate_limit_without_quota_signal_is_transient() {
        let policy = BillingPolicy::default();
        let error = ProviderError::with_status(429)
            .code("rate_limit_exceeded")
            .message("Too many requests, slow down");
        assert_eq!(policy.classify(&error), ErrorClass::Transient);
    }

    #[test]
    fn passing_mention_of_quota_in_rate_limit_is_transient() {
        let policy = BillingPolicy::default();
        let error = ProviderError::with_status(429)
            .code("RESOURCE_EXHAUSTED")
            .message("Resource has been exhausted (e.g. check quota).");
        assert_eq!(policy.classify(&error), ErrorClass::Transient);
        assert_eq!(policy.classify(&error).as_str(), "transient");

        let error = ProviderError::with_status(429).message("Monthly quota exceeded for this key");
        assert_eq!(policy.classify(&error).as_str(), "billing");
    }

    #[test]
    fn errors_without_signals_are_transient() {
        let policy = BillingPolicy::default();
        assert_eq!(
            policy.classify(&ProviderError::default()),
            ErrorClass::Transient
        );
        assert_eq!(
            policy.classify(&ProviderError::with_status(503).code("").message("")),
            ErrorClass::Transient
        );
    }

    #[test]
    fn empty_policy_never_flags_billing() {
        let policy = BillingPolicy::empty();
        let error = ProviderError::with_status(402)
            .code("insufficient_quota")
            .message("quota exhausted");
        assert_eq!(policy.classify(&error), ErrorClass::Transient);
    }

    #[test]
    fn policy_extensions_add_provider_specific_signals() {
        let policy = BillingPolicy::default()
            .with_statuses([403, 402])
            .with_codes(["RESOURCE_EXHAUSTED", " ", "insufficient_quota"])
            .with_message_markers(["spending cap"]);

        assert_eq!(policy.statuses, vec![402, 403]);
        assert_eq!(
            policy
                .codes
                .iter()
                .filter(|code| code.eq_ignore_ascii_case("insufficient_quota"))
                .count(),
            1
        );
        assert!(policy.is_billing(&ProviderError::with_status(403)));
        assert!(policy.is_billing(&ProviderError::default().code("resource_exhausted")));
        assert!(
            policy.is_billing(&ProviderError::default().message("Monthly spending cap reached"))
        );
    }

    #[test]
    fn provider_error_is_its_own_provider_view() {
        let error = ProviderError::with_status(402);
        assert_eq!(
            error.error_class(&BillingPolicy::default()),
            ErrorClass::Billing
        );
    }

    #[test]
    fn display_includes_status_and_code() {
        let error = ProviderError::with_status(503).code("overloaded");
        assert_eq!(error.to_string(), "status=503 code=overloaded");
        assert_eq!(
            ProviderError::default().message("boom").to_string(),
            "status=none code=unknown message=boom"
        );
    }
}
