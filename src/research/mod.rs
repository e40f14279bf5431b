//! 研究层：查询生成、并发执行、引用解析、反思、主循环与作答

pub mod answer;
pub mod citation;
pub mod executor;
pub mod loop_;
pub mod query;
pub mod reflection;
pub mod settings;
pub mod types;

pub use answer::AnswerSynthesizer;
pub use citation::CitationResolver;
pub use executor::ResearchExecutor;
pub use loop_::LoopController;
pub use query::QueryGenerator;
pub use reflection::ReflectionAnalyzer;
pub use settings::ResearchSettings;
pub use types::{
    CitationEntry, ReflectionOutcome, ResearchRequest, ResearchResult, SearchQuery, SummaryRecord,
};
