//! 研究执行器：单条查询的搜索 + 摘要 + 引用抽取
//!
//! 搜索失败不抛出，而是返回带 error 的空证据 SummaryRecord，避免一条坏查询拖垮整轮；
//! 整轮是否失败由循环控制器判断。

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::{ResearchError, TaskScheduler};
use crate::research::citation::{has_markers, rewrite_markers};
use crate::research::{CitationEntry, CitationResolver, SearchQuery, SummaryRecord};
use crate::search::{SearchOutcome, WebSearchClient};

pub struct ResearchExecutor {
    search: Arc<dyn WebSearchClient>,
    resolver: Arc<CitationResolver>,
    model: String,
}

impl ResearchExecutor {
    pub fn new(
        search: Arc<dyn WebSearchClient>,
        resolver: Arc<CitationResolver>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            search,
            resolver,
            model: model.into(),
        }
    }

    /// 执行一条查询，永不返回错误
    pub async fn execute(&self, query: &SearchQuery) -> SummaryRecord {
        match self.search.search_and_summarize(&query.text, &self.model).await {
            Ok(outcome) => {
                let record = self.summarize(&query.text, outcome);
                tracing::info!(
                    query = %query.text,
                    citations = record.citation_ids_used.len(),
                    chars = record.prose_summary.len(),
                    "web research done"
                );
                record
            }
            Err(e) => {
                tracing::warn!(query = %query.text, error = %e, "web research failed, recording empty evidence");
                let reason = ResearchError::search_failed(&query.text, e).to_string();
                SummaryRecord::failed(&query.text, reason)
            }
        }
    }

    /// 并发执行一批查询；结果顺序与输入一致
    pub async fn execute_batch(
        &self,
        queries: &[SearchQuery],
        scheduler: &TaskScheduler,
    ) -> Vec<SummaryRecord> {
        let tasks: Vec<_> = queries.iter().map(|q| self.execute(q)).collect();
        scheduler.run_batch(tasks).await
    }

    /// 解析来源并把局部 `[k]` 标记改写为全局短链标记
    fn summarize(&self, query: &str, outcome: SearchOutcome) -> SummaryRecord {
        let local: Vec<Option<CitationEntry>> = outcome
            .sources
            .iter()
            .map(|s| {
                let canonical = s.provider_url.trim();
                (!canonical.is_empty()).then(|| self.resolver.resolve(canonical, &s.display_title))
            })
            .collect();

        let mut prose = outcome.prose.trim().to_string();
        // 没有行内标记但有来源：在末尾附上全部来源，避免丢失出处
        if !prose.is_empty() && !has_markers(&prose) && local.iter().any(Option::is_some) {
            for k in 1..=local.len() {
                prose.push_str(&format!(" [{k}]"));
            }
        }

        let (prose, used) = rewrite_markers(&prose, |k| {
            k.checked_sub(1)
                .and_then(|i| local.get(i))
                .and_then(|e| e.clone())
        });

        SummaryRecord {
            source_query: query.to_string(),
            prose_summary: prose,
            citation_ids_used: used.iter().map(|e| e.short_id).collect::<BTreeSet<_>>(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderError;
    use crate::search::{MockSearchClient, SourceRecord};

    const PREFIX: &str = "https://s.test/id/";

    fn executor(search: MockSearchClient, resolver: Arc<CitationResolver>) -> ResearchExecutor {
        ResearchExecutor::new(Arc::new(search), resolver, "search-model")
    }

    #[tokio::test]
    async fn test_local_markers_become_global_ids() {
        let resolver = Arc::new(CitationResolver::new(PREFIX));
        resolver.resolve("https://seen-before", "Earlier");
        let search = MockSearchClient::new().with_outcome(
            "q",
            "Fact one. [2] Fact two. [1][2] Bogus. [5]",
            vec![
                SourceRecord::new("https://a", "A"),
                SourceRecord::new("https://seen-before", "Different title"),
            ],
        );
        let record = executor(search, resolver.clone())
            .execute(&SearchQuery::new("q", "r"))
            .await;

        assert_eq!(
            record.prose_summary,
            "Fact one. [1](https://s.test/id/1) Fact two. [2](https://s.test/id/2)[1](https://s.test/id/1) Bogus."
        );
        assert_eq!(record.citation_ids_used, BTreeSet::from([1, 2]));
        assert_eq!(resolver.get(1).unwrap().display_title, "Earlier");
        assert!(!record.is_failed());
    }

    #[tokio::test]
    async fn test_unmarked_prose_gets_trailing_sources() {
        let resolver = Arc::new(CitationResolver::new(PREFIX));
        let search = MockSearchClient::new().with_outcome(
            "q",
            "No markers here.",
            vec![SourceRecord::new("https://a", "A"), SourceRecord::new("", "")],
        );
        let record = executor(search, resolver).execute(&SearchQuery::new("q", "r")).await;
        assert_eq!(record.prose_summary, "No markers here. [1](https://s.test/id/1)");
        assert_eq!(record.citation_ids_used, BTreeSet::from([1]));
    }

    #[tokio::test]
    async fn test_failure_becomes_empty_record() {
        let resolver = Arc::new(CitationResolver::new(PREFIX));
        let search = MockSearchClient::new().with_failure("bad", ProviderError::Timeout);
        let record = executor(search, resolver.clone())
            .execute(&SearchQuery::new("bad", "r"))
            .await;
        assert!(record.is_failed());
        assert!(record.error.as_deref().unwrap().starts_with("web research failed (query: bad)"));
        assert!(record.is_empty());
        assert!(record.citation_ids_used.is_empty());
        assert!(resolver.is_empty());
    }

    #[tokio::test]
    async fn test_batch_shares_resolver_and_runs_concurrently() {
        let resolver = Arc::new(CitationResolver::new(PREFIX));
        let shared = vec![SourceRecord::new("https://shared", "First title")];
        let search = MockSearchClient::new()
            .with_outcome("a", "A says [1]", shared.clone())
            .with_outcome(
                "b",
                "B says [1]",
                vec![SourceRecord::new("https://shared", "Second title")],
            )
            .with_delay(std::time::Duration::from_millis(20));
        let search = Arc::new(search);
        let exec = ResearchExecutor::new(search.clone(), resolver.clone(), "m");
        let queries = vec![SearchQuery::new("a", "r"), SearchQuery::new("b", "r")];

        let records = exec.execute_batch(&queries, &TaskScheduler::new(4)).await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_query, "a");
        assert_eq!(resolver.len(), 1);
        assert_eq!(records[0].citation_ids_used, records[1].citation_ids_used);
        assert_eq!(search.max_in_flight(), 2);
    }
}
