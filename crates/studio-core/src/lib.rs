//! Retry and failure-classification core for listing-studio's calls to AI
//! providers.

pub mod billing;
pub mod config;
mod config_env;
pub mod llm;
pub mod retry;

pub use billing::{BillingPolicy, ClassifyProviderError, ErrorClass, ProviderError};
pub use config::{ConfigError, RetrySettings, load_dotenv};
pub use retry::{
    Cancelled, RetryDecision, RetryError, RetryOptions, cancellable_sleep, retry_with_backoff,
    retry_with_cancel,
};
