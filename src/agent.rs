//! Headless 研究运行时
//!
//! 供 CLI 与 HTTP 外壳调用：create_research_agent 按配置构建 LLM / 搜索网关与 Prompt，
//! ResearchAgent::run 对单个请求校验、夹取参数，然后在总超时内跑一次完整研究循环。
//! 每次运行独立创建引用表与状态，运行结束即丢弃。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::core::ResearchError;
use crate::llm::{create_llm_from_config, LlmClient, RetryConfig};
use crate::prompts::PromptTemplates;
use crate::research::{LoopController, ResearchRequest, ResearchResult, ResearchSettings};
use crate::search::{create_search_from_config, WebSearchClient};

/// 问题文本的最大字符数
pub const MAX_QUERY_CHARS: usize = 1000;

/// 可跨请求共享的研究入口（只共享无状态的网关与模板）
pub struct ResearchAgent {
    llm: Arc<dyn LlmClient>,
    search: Arc<dyn WebSearchClient>,
    prompts: Arc<PromptTemplates>,
    defaults: ResearchSettings,
    run_timeout: Duration,
}

/// 从配置创建 ResearchAgent
pub fn create_research_agent(cfg: &AppConfig) -> ResearchAgent {
    let prompts = Arc::new(PromptTemplates::load(cfg.research.prompts_dir.as_deref()));
    let llm = create_llm_from_config(&cfg.llm);
    let search = create_search_from_config(
        &cfg.search,
        prompts.clone(),
        RetryConfig {
            max_retries: cfg.llm.retry.max_retries,
            base_delay_ms: cfg.llm.retry.base_delay_ms,
        },
    );
    ResearchAgent::new(llm, search, prompts, ResearchSettings::from_config(&cfg.research, &cfg.search))
        .with_run_timeout(Duration::from_secs(cfg.research.run_timeout_secs.max(1)))
}

impl ResearchAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        search: Arc<dyn WebSearchClient>,
        prompts: Arc<PromptTemplates>,
        defaults: ResearchSettings,
    ) -> Self {
        Self {
            llm,
            search,
            prompts,
            defaults,
            run_timeout: Duration::from_secs(300),
        }
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// 执行一次研究（带总超时）
    pub async fn run(&self, request: ResearchRequest) -> Result<ResearchResult, ResearchError> {
        self.run_with_cancel(request, CancellationToken::new()).await
    }

    /// 执行一次研究；token 被取消或超时时放弃所有在途调用
    pub async fn run_with_cancel(
        &self,
        request: ResearchRequest,
        cancel: CancellationToken,
    ) -> Result<ResearchResult, ResearchError> {
        let question = request.query.trim().to_string();
        if question.is_empty() {
            return Err(ResearchError::InvalidRequest("query must not be empty".to_string()));
        }
        let chars = question.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(ResearchError::InvalidRequest(format!(
                "query is {chars} characters, limit is {MAX_QUERY_CHARS}"
            )));
        }

        let settings = self.defaults.clone().with_request(&request);
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("research", %run_id);

        async move {
            tracing::info!(
                question = %question,
                initial_queries = settings.initial_query_count,
                max_loops = settings.max_research_loops,
                "research started"
            );
            let started = Instant::now();
            let controller = LoopController::new(
                self.llm.clone(),
                self.search.clone(),
                self.prompts.clone(),
                settings,
            );

            let result = tokio::select! {
                _ = cancel.cancelled() => Err(ResearchError::Cancelled),
                r = tokio::time::timeout(self.run_timeout, controller.run(&question)) => {
                    r.unwrap_or(Err(ResearchError::Timeout(self.run_timeout.as_secs())))
                }
            };

            let (prompt_tokens, completion_tokens, _) = self.llm.token_usage();
            match &result {
                Ok(r) => tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    loop_count = r.loop_count,
                    queries = r.executed_queries.len(),
                    citations = r.citations.len(),
                    prompt_tokens,
                    completion_tokens,
                    "research completed"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    stage = ?e.stage(),
                    error = %e,
                    "research failed"
                ),
            }
            result
        }
        .instrument(span)
        .await
    }
}
