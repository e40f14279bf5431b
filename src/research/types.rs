//! 研究数据模型：请求、查询、引用、摘要、结果

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// 研究请求；计数类字段允许越界值，由 ResearchSettings 统一夹取
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub initial_search_query_count: Option<i64>,
    #[serde(default)]
    pub max_research_loops: Option<i64>,
    #[serde(default)]
    pub query_generator_model: Option<String>,
    #[serde(default)]
    pub reflection_model: Option<String>,
    #[serde(default)]
    pub answer_model: Option<String>,
    /// 可选背景信息，传给查询生成
    #[serde(default)]
    pub context: Option<String>,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// 一条搜索查询及其用意
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub rationale: String,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, rationale: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rationale: rationale.into(),
        }
    }
}

/// 去重后的引用条目，short_id 从 1 开始按首次出现顺序分配
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEntry {
    pub short_id: usize,
    pub short_url: String,
    pub display_title: String,
    pub canonical_url: String,
}

impl CitationEntry {
    /// 答案中使用的行内标记
    pub fn marker(&self) -> String {
        format!("[{}]({})", self.short_id, self.short_url)
    }
}

/// 一次查询执行的摘要；失败的查询以空证据 + error 记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub source_query: String,
    pub prose_summary: String,
    pub citation_ids_used: BTreeSet<usize>,
    pub error: Option<String>,
}

impl SummaryRecord {
    pub fn failed(source_query: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source_query: source_query.into(),
            prose_summary: String::new(),
            citation_ids_used: BTreeSet::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.prose_summary.trim().is_empty()
    }
}

/// 反思结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionOutcome {
    pub is_sufficient: bool,
    pub knowledge_gap: String,
    pub follow_up_queries: Vec<SearchQuery>,
}

/// 最终结果：citations 只包含答案中实际引用的条目
#[derive(Debug, Clone, Serialize)]
pub struct ResearchResult {
    pub answer_text: String,
    pub citations: Vec<CitationEntry>,
    pub loop_count: usize,
    pub executed_queries: Vec<String>,
}
