//! Mock 搜索客户端（用于测试，无需网络）
//!
//! 可为特定查询预置结果或错误；未预置的查询返回一条带 `[1]` 标记的默认摘要，
//! 来源 URL 由查询文本派生。可选的延迟用于验证同批查询并发执行。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::ProviderError;
use crate::search::{SearchOutcome, SourceRecord, WebSearchClient};

#[derive(Debug, Default)]
pub struct MockSearchClient {
    scripted: HashMap<String, Result<SearchOutcome, ProviderError>>,
    fail_all: Option<ProviderError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl MockSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, query: &str, prose: &str, sources: Vec<SourceRecord>) -> Self {
        self.scripted.insert(
            query.to_string(),
            Ok(SearchOutcome {
                prose: prose.to_string(),
                sources,
            }),
        );
        self
    }

    pub fn with_failure(mut self, query: &str, err: ProviderError) -> Self {
        self.scripted.insert(query.to_string(), Err(err));
        self
    }

    /// 所有未单独预置的查询都返回该错误
    pub fn failing(mut self, err: ProviderError) -> Self {
        self.fail_all = Some(err);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 观测到的最大并发调用数
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn default_outcome(query: &str) -> SearchOutcome {
        let slug: String = query
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        SearchOutcome {
            prose: format!("Findings about {query}. [1]"),
            sources: vec![SourceRecord::new(
                format!("https://example.com/{slug}"),
                format!("example.com/{slug}"),
            )],
        }
    }
}

#[async_trait]
impl WebSearchClient for MockSearchClient {
    async fn search_and_summarize(
        &self,
        query: &str,
        _model: &str,
    ) -> Result<SearchOutcome, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.to_string());
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match (self.scripted.get(query), &self.fail_all) {
            (Some(result), _) => result.clone(),
            (None, Some(err)) => Err(err.clone()),
            (None, None) => Ok(Self::default_outcome(query)),
        }
    }
}
