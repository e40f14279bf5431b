//! 研究主循环
//!
//! Initial -> Researching -> Reflecting -> (Researching | Finalizing)。
//! 首轮为第 0 轮，不计入 loop_count；之后每追加一轮 loop_count + 1，达到 max_research_loops
//! 后不再反思，直接作答。一轮内所有查询完成后才进入反思。

use std::sync::Arc;

use crate::core::{ResearchError, ResearchPhase, RunState, TaskScheduler};
use crate::llm::LlmClient;
use crate::prompts::PromptTemplates;
use crate::research::{
    AnswerSynthesizer, CitationResolver, QueryGenerator, ReflectionAnalyzer, ResearchExecutor,
    ResearchResult, ResearchSettings,
};
use crate::search::WebSearchClient;

/// 单次研究的控制器：持有本次运行的全部组件与引用表，run 消费自身
pub struct LoopController {
    settings: ResearchSettings,
    generator: QueryGenerator,
    executor: ResearchExecutor,
    reflection: ReflectionAnalyzer,
    synthesizer: AnswerSynthesizer,
    scheduler: TaskScheduler,
}

impl LoopController {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn WebSearchClient>,
        prompts: Arc<PromptTemplates>,
        settings: ResearchSettings,
    ) -> Self {
        let resolver = Arc::new(CitationResolver::new(settings.short_url_prefix.clone()));
        Self {
            generator: QueryGenerator::new(
                llm.clone(),
                prompts.clone(),
                settings.query_generator_model.clone(),
            ),
            executor: ResearchExecutor::new(
                search,
                resolver.clone(),
                settings.web_search_model.clone(),
            ),
            reflection: ReflectionAnalyzer::new(
                llm.clone(),
                prompts.clone(),
                settings.reflection_model.clone(),
                settings.max_follow_up_queries,
            ),
            synthesizer: AnswerSynthesizer::new(
                llm,
                prompts,
                resolver,
                settings.answer_model.clone(),
            ),
            scheduler: TaskScheduler::new(settings.max_concurrent_searches),
            settings,
        }
    }

    pub async fn run(self, question: &str) -> Result<ResearchResult, ResearchError> {
        let mut state = RunState::new();

        state.pending_queries = self
            .generator
            .generate(
                question,
                self.settings.initial_query_count,
                self.settings.rationale_context.as_deref(),
            )
            .await?;

        loop {
            state.transition(ResearchPhase::Researching);
            self.research_round(&mut state).await?;

            state.transition(ResearchPhase::Reflecting);
            if state.loop_count >= self.settings.max_research_loops {
                tracing::info!(
                    loop_count = state.loop_count,
                    max = self.settings.max_research_loops,
                    "research loop budget spent"
                );
                break;
            }

            let outcome = self
                .reflection
                .reflect(question, &state.evidence_pool, &state.executed_queries)
                .await?;
            if outcome.is_sufficient {
                break;
            }
            state.schedule_follow_up(outcome.follow_up_queries);
        }

        state.transition(ResearchPhase::Finalizing);
        tracing::info!(
            usable = state.usable_evidence().count(),
            total = state.evidence_pool.len(),
            loop_count = state.loop_count,
            "synthesizing answer"
        );
        let (answer_text, citations) = self
            .synthesizer
            .finalize(question, &state.evidence_pool)
            .await?;

        Ok(ResearchResult {
            answer_text,
            citations,
            loop_count: state.loop_count,
            executed_queries: state.executed_queries,
        })
    }

    /// 执行当前批次；整批失败时终止本次研究
    async fn research_round(&self, state: &mut RunState) -> Result<(), ResearchError> {
        let batch = state.take_batch();
        tracing::info!(
            round = state.round,
            queries = batch.len(),
            concurrency = self.scheduler.max_concurrent(),
            "research round started"
        );

        let records = self.executor.execute_batch(&batch, &self.scheduler).await;
        let failures: Vec<String> = records
            .iter()
            .filter_map(|r| r.error.clone())
            .collect();

        if !records.is_empty() && failures.len() == records.len() {
            return Err(ResearchError::InsufficientBatch {
                round: state.round,
                attempted: records.len(),
                failures,
            });
        }
        if !failures.is_empty() {
            tracing::warn!(round = state.round, failed = failures.len(), "some searches failed");
        }

        state.record_round(records);
        Ok(())
    }
}
