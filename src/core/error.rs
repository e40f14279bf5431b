//! 研究运行错误类型
//!
//! 单条搜索失败在执行器内部吸收为空证据；其余错误携带阶段与查询上下文原样传到请求边界，
//! 由外层（CLI / HTTP）通过 status_code 决定如何呈现。

use std::fmt;

use thiserror::Error;

use crate::llm::ProviderError;

/// 研究流程中的阶段（用于错误上下文与日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    QueryGeneration,
    WebResearch,
    Reflection,
    AnswerSynthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::QueryGeneration => "query generation",
            Stage::WebResearch => "web research",
            Stage::Reflection => "reflection",
            Stage::AnswerSynthesis => "answer synthesis",
        };
        f.write_str(name)
    }
}

fn query_suffix(query: &Option<String>) -> String {
    query
        .as_deref()
        .map(|q| format!(" (query: {q})"))
        .unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("{stage} failed{}: {source}", query_suffix(.query))]
    Provider {
        stage: Stage,
        query: Option<String>,
        #[source]
        source: ProviderError,
    },

    /// 某一轮所有搜索均失败
    #[error("all {attempted} searches failed in research round {round}: {}", .failures.join("; "))]
    InsufficientBatch {
        round: usize,
        attempted: usize,
        failures: Vec<String>,
    },

    #[error("Reflection output malformed after retry: {0}")]
    MalformedReflection(String),

    #[error("Query generation output unusable after retry: {0}")]
    MalformedQueries(String),

    #[error("Invalid research request: {0}")]
    InvalidRequest(String),

    #[error("Research cancelled")]
    Cancelled,

    #[error("Research timed out after {0}s")]
    Timeout(u64),
}

impl ResearchError {
    pub fn provider(stage: Stage, source: ProviderError) -> Self {
        Self::Provider {
            stage,
            query: None,
            source,
        }
    }

    /// 单条搜索失败（带查询文本）；执行器把它的描述记入空证据
    pub fn search_failed(query: impl Into<String>, source: ProviderError) -> Self {
        Self::Provider {
            stage: Stage::WebResearch,
            query: Some(query.into()),
            source,
        }
    }

    /// 外层传输映射：请求错误 400，上游失败 502，超时 504，客户端取消 499
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Provider { .. }
            | Self::InsufficientBatch { .. }
            | Self::MalformedReflection(_)
            | Self::MalformedQueries(_) => 502,
            Self::Timeout(_) => 504,
            Self::Cancelled => 499,
        }
    }

    /// 出错的阶段（取消 / 超时 / 请求错误没有阶段）
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Provider { stage, .. } => Some(*stage),
            Self::InsufficientBatch { .. } => Some(Stage::WebResearch),
            Self::MalformedReflection(_) => Some(Stage::Reflection),
            Self::MalformedQueries(_) => Some(Stage::QueryGeneration),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_message_includes_stage_and_query() {
        let err = ResearchError::search_failed("rust 2024 edition", ProviderError::Timeout);
        let msg = err.to_string();
        assert!(msg.starts_with("web research failed (query: rust 2024 edition)"));
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ResearchError::InvalidRequest("empty".into()).status_code(), 400);
        assert_eq!(ResearchError::Timeout(30).status_code(), 504);
        assert_eq!(ResearchError::Cancelled.status_code(), 499);
        assert_eq!(
            ResearchError::MalformedReflection("x".into()).stage(),
            Some(Stage::Reflection)
        );
    }

    #[test]
    fn test_insufficient_batch_lists_failures() {
        let err = ResearchError::InsufficientBatch {
            round: 0,
            attempted: 2,
            failures: vec!["a: timeout".into(), "b: quota".into()],
        };
        assert_eq!(
            err.to_string(),
            "all 2 searches failed in research round 0: a: timeout; b: quota"
        );
    }
}
