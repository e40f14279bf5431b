//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `BEE__*` 覆盖（双下划线表示嵌套，如 `BEE__RESEARCH__MAX_RESEARCH_LOOPS=3`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub search: SearchSection,
    pub research: ResearchSection,
}

/// [llm] 段：后端选择、超时与重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：gemini / deepseek / openai
    pub provider: String,
    pub base_url: Option<String>,
    /// 未设置时按后端读取 GEMINI_API_KEY / DEEPSEEK_API_KEY / OPENAI_API_KEY
    pub api_key: Option<String>,
    pub timeouts: LlmTimeoutsSection,
    pub retry: RetrySection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            base_url: None,
            api_key: None,
            timeouts: LlmTimeoutsSection::default(),
            retry: RetrySection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [llm.retry] 段：限流 / 超时的退避重试
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

/// [search] 段：搜索并摘要服务
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub provider: String,
    /// 网页研究使用的模型
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

/// [research] 段：研究循环默认参数（可被单次请求覆盖）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResearchSection {
    pub number_of_initial_queries: usize,
    /// 首轮之后最多追加的研究轮数
    pub max_research_loops: usize,
    /// 反思每次最多给出的补充查询数
    pub max_follow_up_queries: usize,
    /// 同一批次内同时进行的搜索数上限
    pub max_concurrent_searches: usize,
    pub query_generator_model: String,
    pub reflection_model: String,
    pub answer_model: String,
    /// 短链前缀，短链 = 前缀 + short_id
    pub short_url_prefix: String,
    /// 单次研究的总超时（秒）
    pub run_timeout_secs: u64,
    /// Prompt 覆盖目录，未设置时查找 config/prompts
    pub prompts_dir: Option<PathBuf>,
}

impl Default for ResearchSection {
    fn default() -> Self {
        Self {
            number_of_initial_queries: 3,
            max_research_loops: 2,
            max_follow_up_queries: 3,
            max_concurrent_searches: 5,
            query_generator_model: "gemini-2.0-flash".to_string(),
            reflection_model: "gemini-2.5-flash".to_string(),
            answer_model: "gemini-2.5-pro".to_string(),
            short_url_prefix: "https://vertexaisearch.cloud.google.com/id/".to_string(),
            run_timeout_secs: 300,
            prompts_dir: None,
        }
    }
}

/// 从 config 目录加载配置，环境变量 BEE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 BEE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("BEE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
