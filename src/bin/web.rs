//! Bee Research HTTP 服务
//!
//! 启动: cargo run --bin bee-research-web --features web
//! 端口: BEE_WEB_PORT（默认 8080）
//!
//! - POST /api/research  执行一次研究
//! - GET  /health        健康检查
//!
//! 客户端断开时 axum 丢弃处理 future，在途的搜索与模型调用随之取消。

#[cfg(feature = "web")]
mod server {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::{
        extract::State,
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use bee_research::core::ResearchError;
    use bee_research::research::{ResearchRequest, ResearchResult};
    use bee_research::ResearchAgent;
    use serde::Serialize;
    use serde_json::{json, Value};

    #[derive(Debug, Serialize)]
    pub struct SourceItem {
        pub label: String,
        pub short_url: String,
        pub value: String,
    }

    #[derive(Debug, Serialize)]
    pub struct ResearchResponse {
        pub answer: String,
        pub sources: Vec<SourceItem>,
        pub research_loop_count: usize,
        pub queries_executed: Vec<String>,
        pub processing_time_seconds: f64,
    }

    impl ResearchResponse {
        fn from_result(result: ResearchResult, started: Instant) -> Self {
            Self {
                answer: result.answer_text,
                sources: result
                    .citations
                    .into_iter()
                    .map(|c| SourceItem {
                        label: c.display_title,
                        short_url: c.short_url,
                        value: c.canonical_url,
                    })
                    .collect(),
                research_loop_count: result.loop_count,
                queries_executed: result.executed_queries,
                processing_time_seconds: started.elapsed().as_secs_f64(),
            }
        }
    }

    type ApiError = (StatusCode, Json<Value>);

    fn api_error(err: ResearchError) -> ApiError {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let stage = err.stage().map(|s| s.to_string());
        (status, Json(json!({ "detail": err.to_string(), "stage": stage })))
    }

    async fn research(
        State(agent): State<Arc<ResearchAgent>>,
        Json(request): Json<ResearchRequest>,
    ) -> Result<Json<ResearchResponse>, ApiError> {
        let started = Instant::now();
        let result = agent.run(request).await.map_err(api_error)?;
        Ok(Json(ResearchResponse::from_result(result, started)))
    }

    async fn health() -> Json<Value> {
        Json(json!({ "status": "healthy", "service": "bee-research" }))
    }

    pub fn create_router(agent: Arc<ResearchAgent>) -> Router {
        Router::new()
            .route("/api/research", post(research))
            .route("/health", get(health))
            .with_state(agent)
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use axum::body::{to_bytes, Body};
        use axum::http::Request;
        use bee_research::llm::MockLlmClient;
        use bee_research::prompts::PromptTemplates;
        use bee_research::research::ResearchSettings;
        use bee_research::search::MockSearchClient;
        use tower::ServiceExt;

        fn router(llm: MockLlmClient) -> Router {
            let agent = ResearchAgent::new(
                Arc::new(llm),
                Arc::new(MockSearchClient::new()),
                Arc::new(PromptTemplates::default()),
                ResearchSettings::default(),
            );
            create_router(Arc::new(agent))
        }

        async fn post_json(app: Router, body: Value) -> (StatusCode, Value) {
            let response = app
                .oneshot(
                    Request::post("/api/research")
                        .header("content-type", "application/json")
                        .body(Body::from(body.to_string()))
                        .unwrap(),
                )
                .await
                .unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            (status, serde_json::from_slice(&bytes).unwrap())
        }

        #[tokio::test]
        async fn test_research_endpoint_shapes_response() {
            let llm = MockLlmClient::new()
                .with_json(json!({"queries": [{"query": "alpha", "rationale": "r"}]}))
                .with_response("Alpha is documented [1].");
            let (status, body) = post_json(
                router(llm),
                json!({"query": "what is alpha", "initial_search_query_count": 1, "max_research_loops": 0}),
            )
            .await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["research_loop_count"], 0);
            assert_eq!(body["queries_executed"], json!(["alpha"]));
            assert_eq!(body["sources"][0]["value"], "https://example.com/alpha");
            assert_eq!(
                body["sources"][0]["short_url"],
                "https://vertexaisearch.cloud.google.com/id/1"
            );
            assert!(body["answer"].as_str().unwrap().contains("[1]("));
        }

        #[tokio::test]
        async fn test_empty_query_is_bad_request() {
            let (status, body) = post_json(router(MockLlmClient::new()), json!({"query": ""})).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(body["detail"].as_str().unwrap().contains("empty"));
        }

        #[tokio::test]
        async fn test_health() {
            let response = router(MockLlmClient::new())
                .oneshot(Request::get("/health").body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}

#[cfg(feature = "web")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use std::sync::Arc;

    use anyhow::Context;
    use bee_research::config::load_config;
    use bee_research::{create_research_agent, observability};

    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let agent = Arc::new(create_research_agent(&cfg));
    let app = server::create_router(agent);

    let port = std::env::var("BEE_WEB_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Bee Research API: http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(not(feature = "web"))]
fn main() {
    eprintln!("请使用 --features web 编译: cargo run --bin bee-research-web --features web");
    std::process::exit(1);
}
