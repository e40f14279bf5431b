//! Web 搜索网关抽象
//!
//! search_and_summarize 返回一段摘要文本与其引用的来源列表。
//! 文本内的 `[k]` 标记（k 从 1 开始）指向 sources 中第 k 个来源。

use async_trait::async_trait;

use crate::llm::ProviderError;

/// 搜索服务给出的来源（provider_url 通常是重定向链接，不直接展示给用户）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub provider_url: String,
    pub display_title: String,
}

impl SourceRecord {
    pub fn new(provider_url: impl Into<String>, display_title: impl Into<String>) -> Self {
        Self {
            provider_url: provider_url.into(),
            display_title: display_title.into(),
        }
    }
}

/// 一次搜索的结果：摘要文本 + 来源
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub prose: String,
    pub sources: Vec<SourceRecord>,
}

#[async_trait]
pub trait WebSearchClient: Send + Sync {
    async fn search_and_summarize(
        &self,
        query: &str,
        model: &str,
    ) -> Result<SearchOutcome, ProviderError>;
}
