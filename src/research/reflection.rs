//! 反思：基于全部累积证据判断是否足以作答，不足时给出补充查询
//!
//! 输出必须形态正确：充分时查询列表为空，不充分时至少一条（上限 max_follow_up）。
//! 补充查询与已执行查询、彼此之间去重；去重后为空同样视为格式错误。
//! 格式错误时以更严格的 prompt 重试一次，仍错误则以 MalformedReflection 失败。

use std::collections::HashSet;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::core::{ResearchError, Stage};
use crate::llm::{parse_structured, schema_value, LlmClient, Message, ProviderError};
use crate::prompts::PromptTemplates;
use crate::research::query::normalize_query;
use crate::research::{ReflectionOutcome, SearchQuery, SummaryRecord};

#[derive(Debug, Deserialize, JsonSchema)]
struct ReflectionVerdict {
    /// 现有摘要是否足以回答问题
    is_sufficient: bool,
    /// 缺失的信息；充分时为空字符串
    #[serde(default)]
    knowledge_gap: String,
    /// 补充搜索查询；充分时为空数组
    #[serde(default)]
    follow_up_queries: Vec<String>,
}

/// 把证据池拼成 prompt 用的摘要文本，跳过空证据
pub fn format_summaries(evidence: &[SummaryRecord]) -> String {
    evidence
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| format!("Query: {}\n{}", r.source_query, r.prose_summary))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub struct ReflectionAnalyzer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptTemplates>,
    model: String,
    max_follow_up: usize,
}

impl ReflectionAnalyzer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptTemplates>,
        model: impl Into<String>,
        max_follow_up: usize,
    ) -> Self {
        Self {
            llm,
            prompts,
            model: model.into(),
            max_follow_up: max_follow_up.max(1),
        }
    }

    pub async fn reflect(
        &self,
        question: &str,
        evidence: &[SummaryRecord],
        executed_queries: &[String],
    ) -> Result<ReflectionOutcome, ResearchError> {
        let schema = schema_value::<ReflectionVerdict>();
        let summaries = format_summaries(evidence);
        let base = self
            .prompts
            .render_reflection(question, &summaries, self.max_follow_up);
        tracing::debug!(
            summaries = evidence.len(),
            prompt_chars = base.len(),
            "reflecting on evidence"
        );

        let mut problem = String::new();
        for attempt in 0..2 {
            let prompt = if attempt == 0 {
                base.clone()
            } else {
                format!(
                    "{base}\n\nYour previous answer was rejected: {problem}. Return a JSON object with \
                     a boolean \"is_sufficient\", a string \"knowledge_gap\" and an array \
                     \"follow_up_queries\". When is_sufficient is false the array must contain between 1 \
                     and {} new queries that were not already run:\n{}",
                    self.max_follow_up,
                    executed_queries
                        .iter()
                        .map(|q| format!("- {q}"))
                        .collect::<Vec<_>>()
                        .join("\n")
                )
            };

            let verdict = self
                .llm
                .complete_structured(&self.model, &[Message::user(prompt)], &schema)
                .await
                .and_then(parse_structured::<ReflectionVerdict>)
                .and_then(|v| self.validate(v, executed_queries));

            match verdict {
                Ok(outcome) => {
                    tracing::info!(
                        is_sufficient = outcome.is_sufficient,
                        follow_ups = outcome.follow_up_queries.len(),
                        gap = %outcome.knowledge_gap,
                        "reflection done"
                    );
                    return Ok(outcome);
                }
                Err(e) if e.is_malformed() => {
                    tracing::warn!(attempt, error = %e, "reflection output malformed");
                    problem = e.to_string();
                }
                Err(e) => return Err(ResearchError::provider(Stage::Reflection, e)),
            }
        }

        Err(ResearchError::MalformedReflection(problem))
    }

    fn validate(
        &self,
        verdict: ReflectionVerdict,
        executed_queries: &[String],
    ) -> Result<ReflectionOutcome, ProviderError> {
        if verdict.is_sufficient {
            return Ok(ReflectionOutcome {
                is_sufficient: true,
                knowledge_gap: String::new(),
                follow_up_queries: Vec::new(),
            });
        }

        let mut seen: HashSet<String> = executed_queries.iter().map(|q| normalize_query(q)).collect();
        let gap = verdict.knowledge_gap.trim().to_string();
        let follow_up_queries: Vec<SearchQuery> = verdict
            .follow_up_queries
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty() && seen.insert(normalize_query(q)))
            .take(self.max_follow_up)
            .map(|q| SearchQuery::new(q, gap.clone()))
            .collect();

        if follow_up_queries.is_empty() {
            return Err(ProviderError::MalformedOutput(
                "evidence judged insufficient but no new follow-up queries were given".to_string(),
            ));
        }
        Ok(ReflectionOutcome {
            is_sufficient: false,
            knowledge_gap: gap,
            follow_up_queries,
        })
    }
}
