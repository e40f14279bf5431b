//! Bee Research - 搜索增强的迭代研究引擎
//!
//! 模块划分：
//! - **agent**: 无头研究运行时（供 CLI / HTTP 调用），负责超时、取消与 run_id 日志
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误分类、研究状态机、批次并发调度
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / DeepSeek / Mock），结构化输出与重试
//! - **search**: 搜索摘要网关（Gemini Google Search grounding / Mock）
//! - **prompts**: 各阶段 Prompt 模板（可由 config/prompts 覆盖）
//! - **research**: 查询生成、研究执行、反思、作答与引用解析

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod prompts;
pub mod research;
pub mod search;

pub use agent::{create_research_agent, ResearchAgent};
