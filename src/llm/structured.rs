//! 结构化输出：schemars 生成 Schema 注入 prompt，回复中提取 JSON
//!
//! 兼容 ```json ... ``` 代码块、前后夹杂说明文字的回复与纯 JSON。

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

use crate::llm::ProviderError;

/// 类型 T 的 JSON Schema（作为 serde_json::Value）
pub fn schema_value<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// 拼入 system 消息的格式约束
pub fn schema_instruction(schema: &serde_json::Value) -> String {
    let pretty = serde_json::to_string_pretty(schema).unwrap_or_default();
    format!(
        "Respond with a single JSON object that conforms to the following JSON Schema. \
         Output only the JSON object, without Markdown, comments or any other text.\n\n{pretty}"
    )
}

/// 从 LLM 文本回复中提取第一个 JSON 对象
pub fn extract_json(output: &str) -> Result<serde_json::Value, ProviderError> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            &trimmed[start..=end]
        } else {
            trimmed
        }
    } else {
        trimmed
    };

    serde_json::from_str(json_str).map_err(|e| {
        ProviderError::MalformedOutput(format!("{}: {}", e, preview(json_str, 200)))
    })
}

/// 将结构化 Value 解析为目标类型，字段不符即视为格式错误
pub fn parse_structured<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ProviderError> {
    serde_json::from_value(value).map_err(|e| ProviderError::MalformedOutput(e.to_string()))
}

fn preview(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[allow(dead_code)]
    #[derive(Debug, Deserialize, JsonSchema)]
    struct Verdict {
        /// 是否通过
        ok: bool,
    }

    #[test]
    fn test_extract_plain_and_wrapped() {
        assert_eq!(extract_json("{\"a\": 1}").unwrap()["a"], 1);
        assert_eq!(
            extract_json("Here you go: {\"a\": 2} hope it helps").unwrap()["a"],
            2
        );
        assert_eq!(extract_json("```json\n{\"a\": 3}\n```").unwrap()["a"], 3);
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let err = extract_json("no json here").unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn test_schema_contains_fields() {
        let schema = schema_value::<Verdict>();
        assert!(schema.to_string().contains("\"ok\""));
        assert!(schema_instruction(&schema).contains("JSON Schema"));
    }

    #[test]
    fn test_parse_structured_type_mismatch() {
        let err = parse_structured::<Verdict>(serde_json::json!({"ok": "yes"})).unwrap_err();
        assert!(err.is_malformed());
    }
}
