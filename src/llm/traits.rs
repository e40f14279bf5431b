//! LLM 网关抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / DeepSeek / Mock）实现 LlmClient：
//! complete（自由文本）与 complete_structured（按 JSON Schema 约束的结构化输出）。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::structured::{extract_json, schema_instruction};

/// 消息角色（与 Chat API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条对话消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 上游服务（LLM / 搜索）失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Malformed provider output: {0}")]
    MalformedOutput(String),
}

impl ProviderError {
    /// 限流与超时属于瞬时错误，可退避重试
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Timeout)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedOutput(_))
    }

    /// 根据错误文本粗分类（async-openai / reqwest 的错误只暴露字符串）
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("429") || lower.contains("rate limit") || lower.contains("quota") {
            Self::RateLimited {
                retry_after_ms: 1000,
            }
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout
        } else {
            Self::Api(message)
        }
    }
}

/// LLM 客户端 trait：自由文本生成与结构化生成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成，model 为本次调用使用的模型 ID
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<String, ProviderError>;

    /// 结构化完成：默认实现将 Schema 注入 system 消息，再从回复中提取 JSON。
    /// 无法解析时返回 MalformedOutput，由调用方决定是否重试。
    async fn complete_structured(
        &self,
        model: &str,
        messages: &[Message],
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut full = Vec::with_capacity(messages.len() + 1);
        full.push(Message::system(schema_instruction(schema)));
        full.extend_from_slice(messages);
        let raw = self.complete(model, &full).await?;
        extract_json(&raw)
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 瞬时错误的退避重试配置
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

impl RetryConfig {
    /// 第 attempt 次重试前的等待（指数退避，限流时取服务端建议的较大值）
    fn delay_for(&self, attempt: u32, err: &ProviderError) -> Duration {
        let backoff = self.base_delay_ms.saturating_mul(1u64 << attempt.min(6));
        let hinted = match err {
            ProviderError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => 0,
        };
        Duration::from_millis(backoff.max(hinted))
    }

    /// 执行 op，瞬时错误最多重试 max_retries 次；非瞬时错误立即返回
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt, &e);
                    tracing::warn!(
                        call = label,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// 为任意 LlmClient 加上瞬时错误重试
pub struct RetryingLlmClient {
    inner: Arc<dyn LlmClient>,
    retry: RetryConfig,
}

impl RetryingLlmClient {
    pub fn new(inner: Arc<dyn LlmClient>, retry: RetryConfig) -> Self {
        Self { inner, retry }
    }
}

#[async_trait]
impl LlmClient for RetryingLlmClient {
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<String, ProviderError> {
        self.retry
            .run("llm.complete", || self.inner.complete(model, messages))
            .await
    }

    async fn complete_structured(
        &self,
        model: &str,
        messages: &[Message],
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        self.retry
            .run("llm.complete_structured", || {
                self.inner.complete_structured(model, messages, schema)
            })
            .await
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.inner.token_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_classify_errors() {
        assert!(matches!(
            ProviderError::classify("HTTP 429 Too Many Requests"),
            ProviderError::RateLimited { .. }
        ));
        assert_eq!(ProviderError::classify("request timed out"), ProviderError::Timeout);
        assert!(matches!(
            ProviderError::classify("invalid api key"),
            ProviderError::Api(_)
        ));
    }

    #[tokio::test]
    async fn test_retry_transient_then_succeed() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_error(ProviderError::Timeout)
                .with_response("done"),
        );
        let client = RetryingLlmClient::new(
            mock.clone(),
            RetryConfig {
                max_retries: 2,
                base_delay_ms: 1,
            },
        );
        let out = client.complete("m", &[Message::user("hi")]).await.unwrap();
        assert_eq!(out, "done");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_permanent_errors() {
        let mock = Arc::new(
            MockLlmClient::new()
                .with_error(ProviderError::Api("bad key".into()))
                .with_response("never"),
        );
        let client = RetryingLlmClient::new(mock.clone(), RetryConfig::default());
        let err = client.complete("m", &[Message::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_structured_default_extracts_fenced_json() {
        let mock = MockLlmClient::new().with_response("Sure:\n```json\n{\"ok\": true}\n```");
        let schema = serde_json::json!({"type": "object"});
        let value = mock
            .complete_structured("m", &[Message::user("q")], &schema)
            .await
            .unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
        let calls = mock.calls();
        assert_eq!(calls[0].messages[0].role, Role::System);
    }
}
