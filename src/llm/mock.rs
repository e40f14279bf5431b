//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按顺序弹出预置回复；同时记录每次调用的模型与消息，便于断言各阶段的 prompt 与调用次数。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, ProviderError};

/// 一次被记录的调用
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Mock 客户端：脚本化回复队列，队列耗尽时返回 Api 错误
#[derive(Debug, Default)]
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.push(Ok(response.into()));
        self
    }

    pub fn with_error(self, err: ProviderError) -> Self {
        self.push(Err(err));
        self
    }

    /// 以 JSON 值作为下一条回复
    pub fn with_json(self, value: serde_json::Value) -> Self {
        self.with_response(value.to_string())
    }

    fn push(&self, item: Result<String, ProviderError>) {
        if let Ok(mut q) = self.responses.lock() {
            q.push_back(item);
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// 尚未被消费的预置回复数
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, model: &str, messages: &[Message]) -> Result<String, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model: model.to_string(),
                messages: messages.to_vec(),
            });
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Err(ProviderError::Api("mock responses exhausted".to_string())))
    }
}
