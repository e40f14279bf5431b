//! Gemini 搜索网关：generateContent + google_search 工具
//!
//! 模型自行检索并生成摘要；groundingMetadata 中的 groundingChunks 转为 SourceRecord，
//! groundingSupports 的每个片段在其结束位置插入 `[k]` 标记（k 为 chunk 下标 + 1）。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::llm::{ProviderError, RetryConfig};
use crate::prompts::PromptTemplates;
use crate::search::{SearchOutcome, SourceRecord, WebSearchClient};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
    #[serde(default)]
    grounding_supports: Vec<GroundingSupport>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingSupport {
    segment: Option<Segment>,
    #[serde(default)]
    grounding_chunk_indices: Vec<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Segment {
    /// UTF-8 字节偏移
    end_index: Option<usize>,
}

/// Gemini 搜索客户端
pub struct GeminiSearchClient {
    client: Client,
    base_url: String,
    api_key: String,
    prompts: Arc<PromptTemplates>,
    retry: RetryConfig,
}

impl GeminiSearchClient {
    pub fn new(
        base_url: Option<&str>,
        api_key: impl Into<String>,
        timeout_secs: u64,
        prompts: Arc<PromptTemplates>,
        retry: RetryConfig,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url
                .unwrap_or(GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            prompts,
            retry,
        }
    }

    async fn generate(&self, query: &str, model: &str) -> Result<SearchOutcome, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": self.prompts.render_web_searcher(query) }]
            }],
            "tools": [{ "google_search": {} }],
            "generationConfig": { "temperature": 0 }
        });

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Api(format!("Request failed: {}", e))
                }
            })?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_ms: 2000,
            });
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!(
                "HTTP {}: {}",
                status,
                text.chars().take(300).collect::<String>()
            )));
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::MalformedOutput(format!("generateContent body: {}", e)))?;
        outcome_from_response(parsed)
    }
}

#[async_trait]
impl WebSearchClient for GeminiSearchClient {
    async fn search_and_summarize(
        &self,
        query: &str,
        model: &str,
    ) -> Result<SearchOutcome, ProviderError> {
        tracing::debug!(query = %query, model = %model, "gemini grounded search");
        self.retry
            .run("search.gemini", || self.generate(query, model))
            .await
    }
}

/// 将 generateContent 响应转为 SearchOutcome，并在文本中插入局部 `[k]` 标记
fn outcome_from_response(resp: GenerateContentResponse) -> Result<SearchOutcome, ProviderError> {
    let candidate = resp
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedOutput("no candidates in response".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let metadata = candidate.grounding_metadata.unwrap_or_default();
    let sources: Vec<SourceRecord> = metadata
        .grounding_chunks
        .iter()
        .map(|chunk| {
            let (uri, title) = chunk
                .web
                .as_ref()
                .map(|w| (w.uri.clone().unwrap_or_default(), w.title.clone().unwrap_or_default()))
                .unwrap_or_default();
            SourceRecord::new(uri, title)
        })
        .collect();

    let mut inserts: Vec<(usize, String)> = metadata
        .grounding_supports
        .iter()
        .filter_map(|support| {
            let end = support.segment.as_ref()?.end_index?;
            let marker: String = support
                .grounding_chunk_indices
                .iter()
                .filter(|&&i| i < sources.len() && !sources[i].provider_url.is_empty())
                .map(|i| format!("[{}]", i + 1))
                .collect();
            (!marker.is_empty()).then(|| (end, format!(" {}", marker)))
        })
        .collect();

    Ok(SearchOutcome {
        prose: insert_markers(&text, &mut inserts),
        sources,
    })
}

/// 从后往前插入，保证先插入的不影响后续偏移；偏移落在字符中间时后移到下一个字符边界
fn insert_markers(text: &str, inserts: &mut [(usize, String)]) -> String {
    inserts.sort_by(|a, b| b.0.cmp(&a.0));
    let mut out = text.to_string();
    for (end, marker) in inserts.iter() {
        let mut pos = (*end).min(out.len());
        while pos < out.len() && !out.is_char_boundary(pos) {
            pos += 1;
        }
        out.insert_str(pos, marker);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_grounding_to_markers() {
        let resp = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Rust is fast. It is safe." }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://redirect/a", "title": "rust-lang.org" } },
                        { "web": { "uri": "https://redirect/b", "title": "blog.example" } }
                    ],
                    "groundingSupports": [
                        { "segment": { "startIndex": 0, "endIndex": 13 }, "groundingChunkIndices": [0] },
                        { "segment": { "startIndex": 14, "endIndex": 25 }, "groundingChunkIndices": [0, 1] }
                    ]
                }
            }]
        }));
        let outcome = outcome_from_response(resp).unwrap();
        assert_eq!(outcome.prose, "Rust is fast. [1] It is safe. [1][2]");
        assert_eq!(outcome.sources.len(), 2);
        assert_eq!(outcome.sources[1].display_title, "blog.example");
    }

    #[test]
    fn test_ignores_out_of_range_chunks() {
        let resp = parse(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Hi" }] },
                "groundingMetadata": {
                    "groundingChunks": [],
                    "groundingSupports": [
                        { "segment": { "endIndex": 2 }, "groundingChunkIndices": [4] }
                    ]
                }
            }]
        }));
        let outcome = outcome_from_response(resp).unwrap();
        assert_eq!(outcome.prose, "Hi");
        assert!(outcome.sources.is_empty());
    }

    #[test]
    fn test_no_candidates_is_malformed() {
        let err = outcome_from_response(parse(json!({ "candidates": [] }))).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_insert_respects_char_boundary() {
        let mut inserts = vec![(1, " [1]".to_string())];
        // 'é' 占两个字节，偏移 1 落在字符中间
        assert_eq!(insert_markers("é!", &mut inserts), "é [1]!");
    }
}
