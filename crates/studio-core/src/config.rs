use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::billing::{BillingPolicy, ClassifyProviderError};
use crate::config_env::{
    parse_f64_var, parse_list_var, parse_optional_u64_var, parse_u16_list_var, parse_u32_var,
    parse_u64_var,
};
use crate::retry::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_ATTEMPTS, RetryOptions,
};


#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {key}: {value}")]
    ParseInt { key: String, value: String },
    #[error("invalid float in env var {key}: {value}")]
    ParseFloat { key: String, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to load .env file: {0}")]
    DotEnv(String),
}

/// Loads `.env` from the working directory if present.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(ConfigError::DotEnv(err.to_string())),
    }
}

/// Process-wide retry defaults, read once at startup and turned into
/// per-call [`RetryOptions`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: Option<u64>,
    pub billing: BillingPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: u64::try_from(DEFAULT_INITIAL_DELAY.as_millis()).unwrap_or(1_000),
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_delay_ms: None,
            billing: BillingPolicy::default(),
        }
    }
}

impl RetrySettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup` instead of the process environment.
    ///
    /// Billing lists extend the built-in signals rather than replacing them.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let billing = defaults
            .billing
            .with_statuses(parse_u16_list_var(&lookup, "BILLING_ERROR_STATUSES")?)
            .with_codes(parse_list_var(&lookup, "BILLING_ERROR_CODES"))
            .with_message_markers(parse_list_var(&lookup, "BILLING_ERROR_MESSAGE_MARKERS"));

        let settings = Self {
            max_attempts: parse_u32_var(&lookup, "RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            initial_delay_ms: parse_u64_var(
                &lookup,
                "RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay_ms,
            )?,
            backoff_multiplier: parse_f64_var(
                &lookup,
                "RETRY_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            )?,
            max_delay_ms: parse_optional_u64_var(&lookup, "RETRY_MAX_DELAY_MS")?,
            billing,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "RETRY_MAX_ATTEMPTS must be greater than 0".to_string(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidConfiguration(
                "RETRY_BACKOFF_MULTIPLIER must be a finite number >= 1".to_string(),
            ));
        }
        if let Some(max_delay_ms) = self.max_delay_ms
            && max_delay_ms < self.initial_delay_ms
        {
            return Err(ConfigError::InvalidConfiguration(
                "RETRY_MAX_DELAY_MS must not be below RETRY_INITIAL_DELAY_MS".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds options whose predicate refuses to retry billing errors
    /// under this settings' policy.
    pub fn to_options<E>(&self) -> RetryOptions<E>
    where
        E: ClassifyProviderError + 'static,
    {
        RetryOptions::default()
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_backoff_multiplier(self.backoff_multiplier)
            .with_max_delay(self.max_delay_ms.map(Duration::from_millis))
            .with_billing_policy(self.billing.clone())
    }
}
