//! 作答：基于全部证据生成最终答案并解析引用
//!
//! 生成后扫描答案中的 `[n]` / `[n](...)` 标记：已知 short_id 规范化为 `[n](short_url)`，
//! 未知的直接移除；citations 只保留答案中实际出现的条目。生成失败时没有降级答案。

use std::sync::Arc;

use crate::core::{ResearchError, Stage};
use crate::llm::{LlmClient, Message};
use crate::prompts::PromptTemplates;
use crate::research::citation::rewrite_markers;
use crate::research::reflection::format_summaries;
use crate::research::{CitationEntry, CitationResolver, SummaryRecord};

pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptTemplates>,
    resolver: Arc<CitationResolver>,
    model: String,
}

impl AnswerSynthesizer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptTemplates>,
        resolver: Arc<CitationResolver>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            prompts,
            resolver,
            model: model.into(),
        }
    }

    /// 返回 (答案文本, 实际引用的条目)
    pub async fn finalize(
        &self,
        question: &str,
        evidence: &[SummaryRecord],
    ) -> Result<(String, Vec<CitationEntry>), ResearchError> {
        let prompt = self
            .prompts
            .render_answer(question, &format_summaries(evidence));
        let raw = self
            .llm
            .complete(&self.model, &[Message::user(prompt)])
            .await
            .map_err(|e| ResearchError::provider(Stage::AnswerSynthesis, e))?;

        let (answer, citations) = rewrite_markers(raw.trim(), |id| self.resolver.get(id));
        tracing::info!(
            cited = citations.len(),
            known = self.resolver.len(),
            chars = answer.len(),
            "answer synthesized"
        );
        Ok((answer, citations))
    }
}
