//! Bee Research 命令行入口
//!
//! 用法: cargo run -- "问题" [--queries N] [--loops N] [--config path]
//! 需要 GEMINI_API_KEY（或按 [llm].provider 配置对应的 Key）。

use std::path::PathBuf;

use anyhow::Context;
use bee_research::config::load_config;
use bee_research::research::ResearchRequest;
use bee_research::{create_research_agent, observability};
use clap::Parser;

/// Bee Research: 搜索增强的迭代研究
#[derive(Parser, Debug)]
#[command(name = "bee-research", version, about, long_about = None)]
struct Cli {
    /// 研究问题（多个词会以空格拼接）
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,

    /// 首轮查询数（1-10）
    #[arg(short, long)]
    queries: Option<i64>,

    /// 首轮之后最多追加的研究轮数（0-10）
    #[arg(short, long)]
    loops: Option<i64>,

    /// 作答模型
    #[arg(long)]
    answer_model: Option<String>,

    /// 供查询生成参考的背景信息
    #[arg(long)]
    context: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_request(self) -> ResearchRequest {
        ResearchRequest {
            initial_search_query_count: self.queries,
            max_research_loops: self.loops,
            answer_model: self.answer_model,
            context: self.context,
            ..ResearchRequest::new(self.question.join(" "))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init();

    let cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    let agent = create_research_agent(&cfg);

    let result = agent
        .run(cli.into_request())
        .await
        .context("Research failed")?;

    println!("{}\n", result.answer_text);
    if !result.citations.is_empty() {
        println!("Sources:");
        for c in &result.citations {
            println!("  [{}] {} - {}", c.short_id, c.display_title, c.canonical_url);
        }
    }
    println!(
        "\n{} research loop(s), {} queries executed",
        result.loop_count,
        result.executed_queries.len()
    );
    Ok(())
}
