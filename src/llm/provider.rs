//! 后端选择：根据 [llm] 配置构建 LLM 客户端
//!
//! Gemini 与 DeepSeek 均提供 OpenAI 兼容端点，统一由 OpenAiClient 调用；
//! API Key 优先取配置，其次取各后端约定的环境变量。

use std::sync::Arc;

use crate::config::LlmSection;
use crate::llm::{LlmClient, OpenAiClient, RetryConfig, RetryingLlmClient};

pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";

/// 支持的后端
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    DeepSeek,
    OpenAi,
}

impl LlmProvider {
    /// 未知名称回退为 OpenAI 兼容（配合自定义 base_url 使用）
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => Self::Gemini,
            "deepseek" => Self::DeepSeek,
            _ => Self::OpenAi,
        }
    }

    fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some(GEMINI_OPENAI_BASE_URL),
            Self::DeepSeek => Some(DEEPSEEK_BASE_URL),
            Self::OpenAi => None,
        }
    }

    fn api_key_env(self) -> &'static [&'static str] {
        match self {
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
            Self::DeepSeek => &["DEEPSEEK_API_KEY", "OPENAI_API_KEY"],
            Self::OpenAi => &["OPENAI_API_KEY"],
        }
    }
}

/// 按配置创建带瞬时重试的 LLM 客户端
pub fn create_llm_from_config(cfg: &LlmSection) -> Arc<dyn LlmClient> {
    let provider = LlmProvider::parse(&cfg.provider);
    let api_key = cfg
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            provider
                .api_key_env()
                .iter()
                .find_map(|name| std::env::var(name).ok())
        })
        .unwrap_or_else(|| {
            tracing::warn!(provider = ?provider, "no API key configured for LLM provider");
            "sk-placeholder".to_string()
        });

    let base_url = cfg.base_url.as_deref().or(provider.default_base_url());
    tracing::info!(provider = ?provider, base_url = ?base_url, "LLM gateway configured");

    let client: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(
        base_url,
        &api_key,
        cfg.timeouts.request,
    ));
    Arc::new(RetryingLlmClient::new(
        client,
        RetryConfig {
            max_retries: cfg.retry.max_retries,
            base_delay_ms: cfg.retry.base_delay_ms,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider() {
        assert_eq!(LlmProvider::parse("Gemini"), LlmProvider::Gemini);
        assert_eq!(LlmProvider::parse("deepseek"), LlmProvider::DeepSeek);
        assert_eq!(LlmProvider::parse("my-proxy"), LlmProvider::OpenAi);
    }

    #[test]
    fn test_default_base_urls() {
        assert_eq!(
            LlmProvider::Gemini.default_base_url(),
            Some(GEMINI_OPENAI_BASE_URL)
        );
        assert_eq!(LlmProvider::OpenAi.default_base_url(), None);
    }

    #[test]
    fn test_base_urls_join_cleanly() {
        // async-openai 以 api_base + "/chat/completions" 拼接
        for base in [GEMINI_OPENAI_BASE_URL, DEEPSEEK_BASE_URL] {
            assert!(!base.ends_with('/'), "{base}");
            assert!(!format!("{base}/chat/completions").contains("//chat"));
        }
    }
}
