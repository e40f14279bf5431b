//! Web 搜索层：搜索并摘要的网关抽象与实现（Gemini grounding / Mock）

pub mod gemini;
pub mod mock;
pub mod traits;

use std::sync::Arc;

use crate::config::SearchSection;
use crate::llm::RetryConfig;
use crate::prompts::PromptTemplates;

pub use gemini::GeminiSearchClient;
pub use mock::MockSearchClient;
pub use traits::{SearchOutcome, SourceRecord, WebSearchClient};

/// 按 [search] 配置创建搜索客户端；API Key 优先取配置，其次 GEMINI_API_KEY / GOOGLE_API_KEY
pub fn create_search_from_config(
    cfg: &SearchSection,
    prompts: Arc<PromptTemplates>,
    retry: RetryConfig,
) -> Arc<dyn WebSearchClient> {
    if !cfg.provider.eq_ignore_ascii_case("gemini") {
        tracing::warn!(provider = %cfg.provider, "unknown search provider, using gemini");
    }
    let api_key = cfg
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
        .unwrap_or_default();
    if api_key.is_empty() {
        tracing::warn!("no API key configured for search provider");
    }
    Arc::new(GeminiSearchClient::new(
        cfg.base_url.as_deref(),
        api_key,
        cfg.timeout_secs,
        prompts,
        retry,
    ))
}
