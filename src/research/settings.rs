//! 单次研究的参数对象：配置默认值 + 请求覆盖，越界值在此夹取

use crate::config::{ResearchSection, SearchSection};
use crate::research::ResearchRequest;

/// 首轮查询数上限
pub const MAX_INITIAL_QUERIES: usize = 10;
/// 追加研究轮数上限
pub const MAX_RESEARCH_LOOPS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchSettings {
    pub initial_query_count: usize,
    pub max_research_loops: usize,
    pub max_follow_up_queries: usize,
    pub max_concurrent_searches: usize,
    pub query_generator_model: String,
    pub reflection_model: String,
    pub answer_model: String,
    pub web_search_model: String,
    pub short_url_prefix: String,
    /// 请求附带的背景信息，仅用于首批查询生成
    pub rationale_context: Option<String>,
}

impl ResearchSettings {
    pub fn from_config(research: &ResearchSection, search: &SearchSection) -> Self {
        Self {
            initial_query_count: research.number_of_initial_queries,
            max_research_loops: research.max_research_loops,
            max_follow_up_queries: research.max_follow_up_queries,
            max_concurrent_searches: research.max_concurrent_searches,
            query_generator_model: research.query_generator_model.clone(),
            reflection_model: research.reflection_model.clone(),
            answer_model: research.answer_model.clone(),
            web_search_model: search.model.clone(),
            short_url_prefix: research.short_url_prefix.clone(),
            rationale_context: None,
        }
        .clamped()
    }

    /// 应用请求中的覆盖项
    pub fn with_request(mut self, request: &ResearchRequest) -> Self {
        if let Some(n) = request.initial_search_query_count {
            self.initial_query_count = n.clamp(1, MAX_INITIAL_QUERIES as i64) as usize;
        }
        if let Some(n) = request.max_research_loops {
            self.max_research_loops = n.clamp(0, MAX_RESEARCH_LOOPS as i64) as usize;
        }
        let pick = |over: &Option<String>, current: &mut String| {
            if let Some(model) = over.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
                *current = model.to_string();
            }
        };
        pick(&request.query_generator_model, &mut self.query_generator_model);
        pick(&request.reflection_model, &mut self.reflection_model);
        pick(&request.answer_model, &mut self.answer_model);
        self.rationale_context = request
            .context
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        self.clamped()
    }

    fn clamped(mut self) -> Self {
        self.initial_query_count = self.initial_query_count.clamp(1, MAX_INITIAL_QUERIES);
        self.max_research_loops = self.max_research_loops.min(MAX_RESEARCH_LOOPS);
        self.max_follow_up_queries = self.max_follow_up_queries.max(1);
        self.max_concurrent_searches = self.max_concurrent_searches.max(1);
        self
    }
}

impl Default for ResearchSettings {
    fn default() -> Self {
        Self::from_config(&ResearchSection::default(), &SearchSection::default())
    }
}
