//! 查询生成：从用户问题得到首批互不重复的搜索查询
//!
//! 结构化输出 `{"queries": [{"query", "rationale"}]}`；空查询与重复查询（忽略大小写与空白）被剔除。
//! 数量不足或格式错误时用更严格的 prompt（列出已接受与被拒绝的查询）重试一次，仍不足则整次研究失败。

use std::collections::HashSet;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use crate::core::{ResearchError, Stage};
use crate::llm::{parse_structured, schema_value, LlmClient, Message};
use crate::prompts::PromptTemplates;
use crate::research::SearchQuery;

#[derive(Debug, Deserialize, JsonSchema)]
struct QueryItem {
    /// 搜索查询文本
    query: String,
    /// 该查询覆盖的问题方面
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct QueryBatch {
    /// 互不重复的搜索查询
    queries: Vec<QueryItem>,
}

/// 比较用的归一化形式
pub(crate) fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

pub struct QueryGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptTemplates>,
    model: String,
}

impl QueryGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: Arc<PromptTemplates>, model: impl Into<String>) -> Self {
        Self {
            llm,
            prompts,
            model: model.into(),
        }
    }

    /// 生成恰好 count 条（至少 1 条）互不重复的查询
    pub async fn generate(
        &self,
        question: &str,
        count: usize,
        rationale_context: Option<&str>,
    ) -> Result<Vec<SearchQuery>, ResearchError> {
        let count = count.max(1);
        let schema = schema_value::<QueryBatch>();
        let mut accepted: Vec<SearchQuery> = Vec::with_capacity(count);
        let mut seen: HashSet<String> = HashSet::new();
        let mut rejected: Vec<String> = Vec::new();
        let mut last_problem = String::new();
        let base = self.base_prompt(question, count, rationale_context);

        for attempt in 0..2 {
            let prompt = if attempt == 0 {
                base.clone()
            } else {
                Self::stricter_prompt(&base, count, &accepted, &rejected, &last_problem)
            };

            let batch = match self
                .llm
                .complete_structured(&self.model, &[Message::user(prompt)], &schema)
                .await
                .and_then(parse_structured::<QueryBatch>)
            {
                Ok(batch) => batch,
                Err(e) if e.is_malformed() => {
                    tracing::warn!(attempt, error = %e, "query generation output malformed");
                    last_problem = e.to_string();
                    continue;
                }
                Err(e) => return Err(ResearchError::provider(Stage::QueryGeneration, e)),
            };

            for item in batch.queries {
                if accepted.len() == count {
                    break;
                }
                let text = item.query.trim().to_string();
                if text.is_empty() {
                    continue;
                }
                if !seen.insert(normalize_query(&text)) {
                    rejected.push(text);
                    continue;
                }
                accepted.push(SearchQuery::new(text, item.rationale.trim()));
            }

            if accepted.len() == count {
                tracing::info!(count, attempt, "initial queries generated");
                return Ok(accepted);
            }
            last_problem = format!(
                "expected {} distinct queries, got {}",
                count,
                accepted.len()
            );
            tracing::warn!(attempt, problem = %last_problem, "query generation incomplete");
        }

        Err(ResearchError::MalformedQueries(last_problem))
    }

    /// 查询模板 + 可选的背景信息（用户提供，供各查询的 rationale 参考）
    fn base_prompt(&self, question: &str, count: usize, rationale_context: Option<&str>) -> String {
        let mut prompt = self.prompts.render_query_writer(question, count);
        if let Some(ctx) = rationale_context.map(str::trim).filter(|c| !c.is_empty()) {
            prompt.push_str(&format!(
                "\n\nBackground provided by the user (use it to aim the queries and explain each rationale):\n{ctx}"
            ));
        }
        prompt
    }

    fn stricter_prompt(
        base: &str,
        count: usize,
        accepted: &[SearchQuery],
        rejected: &[String],
        problem: &str,
    ) -> String {
        let mut prompt = base.to_string();
        prompt.push_str(&format!(
            "\n\nYour previous answer was rejected ({problem}). Return exactly {count} queries as JSON, \
             each with a non-empty \"query\" that differs from every other query."
        ));
        if !accepted.is_empty() {
            prompt.push_str("\nAlready accepted (you may repeat these verbatim as part of the list):\n");
            for q in accepted {
                prompt.push_str(&format!("- {}\n", q.text));
            }
        }
        if !rejected.is_empty() {
            prompt.push_str("\nRejected as duplicates, do not use:\n");
            for q in rejected {
                prompt.push_str(&format!("- {}\n", q));
            }
        }
        prompt
    }
}
