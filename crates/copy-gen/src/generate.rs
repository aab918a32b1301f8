use studio_core::llm::{
    FailureNotice, LlmGatewayRequest, LlmGatewayResponse, NoticeKind, OpenRouterConfigError,
    OpenRouterGateway, OpenRouterGatewayConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CliOptions;

const LISTING_COPY_SYSTEM_PROMPT: &str = "You write marketplace listing copy for handmade and \
     vintage goods. Reply with a JSON object containing `title` (at most 140 characters), \
     `tags` (up to 13 short phrases) and `description` (two short paragraphs).";

#[derive(Debug)]
pub enum Outcome {
    Generated(LlmGatewayResponse),
    Failed(FailureNotice),
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Generated(_) => 0,
            Self::Failed(notice) => match notice.kind {
                NoticeKind::Billing => 1,
                NoticeKind::Retryable | NoticeKind::Fatal => 2,
                NoticeKind::Cancelled => 130,
            },
        }
    }
}

pub fn build_request(options: &CliOptions) -> LlmGatewayRequest {
    let request = LlmGatewayRequest::new(
        LISTING_COPY_SYSTEM_PROMPT,
        format!("Product: {}", options.product),
    )
    .expect_json();

    match options.shop_id.as_deref() {
        Some(shop_id) => request.with_requester_id(shop_id),
        None => request,
    }
}

pub async fn run_generation(
    options: &CliOptions,
    token: &CancellationToken,
) -> Result<Outcome, OpenRouterConfigError> {
    let mut config = OpenRouterGatewayConfig::from_env()?;
    if let Some(max_attempts) = options.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    info!(
        model = %config.model,
        max_attempts = config.retry.max_attempts,
        "generating listing copy"
    );

    let gateway = OpenRouterGateway::new(config)?;
    match gateway
        .generate_with_cancel(&build_request(options), token)
        .await
    {
        Ok(response) => Ok(Outcome::Generated(response)),
        Err(err) => {
            let notice = FailureNotice::from_error(&err, gateway.billing_policy());
            warn!(error = %err, kind = notice.kind.as_str(), "listing copy generation failed");
            Ok(Outcome::Failed(notice))
        }
    }
}
