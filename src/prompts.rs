//! Prompt 模板：查询生成、网页研究、反思、作答
//!
//! 默认模板内置；若 `<prompts_dir>/<name>.txt` 存在则覆盖（未指定目录时依次查找
//! config/prompts、../config/prompts）。占位符：{current_date}、{research_topic}、
//! {number_queries}、{summaries}、{max_follow_up}。

use std::path::{Path, PathBuf};

const QUERY_WRITER: &str = r#"Your goal is to generate sophisticated and diverse web search queries. These queries are intended for an advanced automated web research tool capable of analyzing complex results, following links, and synthesizing information.

Instructions:
- Produce exactly {number_queries} search queries.
- Every query must be distinct: each one targets a different aspect of the research topic. Do not produce paraphrases of another query.
- Queries should ensure that the most current information is gathered. The current date is {current_date}.
- Give a short rationale for each query explaining what aspect it covers.

Research topic: {research_topic}"#;

const WEB_SEARCHER: &str = r#"Conduct targeted Google Searches to gather the most recent, credible information on "{research_topic}" and synthesize it into a verifiable text artifact.

Instructions:
- Query should ensure that the most current information is gathered. The current date is {current_date}.
- Conduct multiple, diverse searches to gather comprehensive information.
- Consolidate key findings while meticulously tracking the source(s) for each specific piece of information.
- The output should be a well-written summary or report based on your search findings.
- Only include the information found in the search results, don't make up any information.

Research Topic:
{research_topic}"#;

const REFLECTION: &str = r#"You are an expert research assistant analyzing summaries about "{research_topic}".

Instructions:
- Judge whether the summaries, taken together, are sufficient to answer the research topic.
- If they are not, identify the knowledge gap and generate at most {max_follow_up} follow-up search queries that close it.
- If the summaries are sufficient, set is_sufficient to true, leave knowledge_gap empty and return no follow-up queries.
- Follow-up queries must be self-contained and must not repeat queries that were already run.
- Focus on technical details, implementation specifics, or emerging trends that weren't fully covered.
- The current date is {current_date}.

Summaries:
{summaries}"#;

const ANSWER: &str = r#"Generate a high-quality answer to the user's question based on the provided summaries.

Instructions:
- The current date is {current_date}.
- You are the final step of a multi-step research process, don't mention that you are the final step.
- Use only the information in the summaries; do not invent facts.
- Cite sources inline by copying the exact citation markers from the summaries, e.g. [3](https://vertexaisearch.cloud.google.com/id/3). Every marker you keep must support the claim it is attached to. THIS IS A MUST.
- Drop markers whose source you do not rely on.

User Context:
- {research_topic}

Summaries:
{summaries}"#;

/// 模板集合，一次运行内只读
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub query_writer: String,
    pub web_searcher: String,
    pub reflection: String,
    pub answer: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            query_writer: QUERY_WRITER.to_string(),
            web_searcher: WEB_SEARCHER.to_string(),
            reflection: REFLECTION.to_string(),
            answer: ANSWER.to_string(),
        }
    }
}

/// 当前日期（如 "October 18, 2026"）
pub fn current_date() -> String {
    chrono::Local::now().format("%B %d, %Y").to_string()
}

impl PromptTemplates {
    /// 从目录加载覆盖模板，缺失的文件使用内置默认
    pub fn load(dir: Option<&Path>) -> Self {
        let dirs: Vec<PathBuf> = match dir {
            Some(d) => vec![d.to_path_buf()],
            None => vec![PathBuf::from("config/prompts"), PathBuf::from("../config/prompts")],
        };
        let read = |name: &str, fallback: &str| -> String {
            dirs.iter()
                .map(|d| d.join(format!("{name}.txt")))
                .find_map(|p| std::fs::read_to_string(&p).ok())
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            query_writer: read("query_writer", QUERY_WRITER),
            web_searcher: read("web_searcher", WEB_SEARCHER),
            reflection: read("reflection", REFLECTION),
            answer: read("answer", ANSWER),
        }
    }

    pub fn render_query_writer(&self, topic: &str, number_queries: usize) -> String {
        self.query_writer
            .replace("{current_date}", &current_date())
            .replace("{number_queries}", &number_queries.to_string())
            .replace("{research_topic}", topic)
    }

    pub fn render_web_searcher(&self, topic: &str) -> String {
        self.web_searcher
            .replace("{current_date}", &current_date())
            .replace("{research_topic}", topic)
    }

    pub fn render_reflection(&self, topic: &str, summaries: &str, max_follow_up: usize) -> String {
        self.reflection
            .replace("{current_date}", &current_date())
            .replace("{max_follow_up}", &max_follow_up.to_string())
            .replace("{research_topic}", topic)
            .replace("{summaries}", summaries)
    }

    pub fn render_answer(&self, topic: &str, summaries: &str) -> String {
        self.answer
            .replace("{current_date}", &current_date())
            .replace("{research_topic}", topic)
            .replace("{summaries}", summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_placeholders() {
        let prompts = PromptTemplates::default();
        let text = prompts.render_query_writer("rust async runtimes", 4);
        assert!(text.contains("exactly 4 search queries"));
        assert!(text.contains("rust async runtimes"));
        assert!(!text.contains("{current_date}"));

        let reflection = prompts.render_reflection("t", "S1", 3);
        assert!(reflection.contains("at most 3 follow-up"));
        assert!(reflection.contains("S1"));
    }

    #[test]
    fn test_load_overrides_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("answer.txt"), "ANSWER {research_topic}").unwrap();
        let prompts = PromptTemplates::load(Some(dir.path()));
        assert_eq!(prompts.render_answer("q", ""), "ANSWER q");
        assert_eq!(prompts.reflection, REFLECTION);
    }
}
