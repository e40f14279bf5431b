//! LLM 层：网关抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock）

pub mod mock;
pub mod openai;
pub mod provider;
pub mod structured;
pub mod traits;

pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use provider::{create_llm_from_config, LlmProvider};
pub use structured::{extract_json, parse_structured, schema_value};
pub use traits::{LlmClient, Message, ProviderError, RetryConfig, RetryingLlmClient, Role};
