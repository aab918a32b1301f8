pub mod gateway;
pub mod notice;
pub mod openrouter;

pub use gateway::{
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
    LlmTokenUsage,
};
pub use notice::{FailureNotice, NoticeKind};
pub use openrouter::{OpenRouterConfigError, OpenRouterGateway, OpenRouterGatewayConfig};
