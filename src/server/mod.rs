//! HTTP API
//!
//! `GET /`, `POST /analyze`, `POST /analyze/no-rag` and `POST /reload`.
//! Handlers hand the blocking pipeline to `spawn_blocking`.

use crate::error::Error;
use crate::rag::{
    AnalysisMode, AnalyzeRequest, AnalyzeResponse, Analyzer, HealthResponse, ReloadResponse,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinError;
use tower_http::trace::TraceLayer;

/// Shared state injected into every handler
#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(analyzer: Arc<Analyzer>) -> Self {
        Self { analyzer }
    }

    pub fn analyzer(&self) -> &Arc<Analyzer> {
        &self.analyzer
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler failure mapped to an HTTP status
#[derive(Debug)]
pub enum ApiError {
    /// The corpus could not be read for a reload
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<JoinError> for ApiError {
    fn from(e: JoinError) -> Self {
        tracing::error!("Blocking task failed: {}", e);
        ApiError::Internal("request processing failed".to_string())
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::Corpus(_) => ApiError::Unavailable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/analyze", post(analyze))
        .route("/analyze/no-rag", post(analyze_no_rag))
        .route("/reload", post(reload))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    run_analysis(state, request, AnalysisMode::Rag).await
}

async fn analyze_no_rag(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    run_analysis(state, request, AnalysisMode::NoRag).await
}

async fn run_analysis(
    state: AppState,
    request: AnalyzeRequest,
    mode: AnalysisMode,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let analyzer = Arc::clone(&state.analyzer);
    let response = tokio::task::spawn_blocking(move || analyzer.analyze(&request, mode)).await?;
    Ok(Json(response))
}

async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    let retrievers = Arc::clone(state.analyzer.retrievers());
    let status = tokio::task::spawn_blocking(move || retrievers.reload()).await??;
    Ok(Json(status))
}

/// Serve until Ctrl-C
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::pipeline::tests::{
        corpus_file, market, token_embedder, CountingRetriever, ScriptedGenerator, NEWS,
    };
    use crate::rag::{IndexBuilder, RetrieverHandle};
    use crate::retrieval::{HybridConfig, HybridRetriever, Retriever};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn app_for(path: &std::path::Path, top_k: usize) -> Router {
        let builder = IndexBuilder::new(path, HybridConfig::default()).with_embedder(token_embedder());
        let handle = Arc::new(RetrieverHandle::open(builder));
        let generator = ScriptedGenerator::replying("결정: [매수]\n이유: 1. 수요 증가 2. 실적 개선");
        let analyzer = Analyzer::new(handle, generator, market(), top_k);
        router(AppState::new(Arc::new(analyzer)))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let file = corpus_file(NEWS);
        let response = app_for(file.path(), 2)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "RAG Server is Running");
    }

    #[tokio::test]
    async fn test_analyze_returns_referenced_cases() {
        let file = corpus_file(NEWS);
        let response = app_for(file.path(), 1)
            .oneshot(post_json(
                "/analyze",
                r#"{"stock_name": "삼성전자", "content": "반도체 수요 증가"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["stock"], "삼성전자");
        assert_eq!(body["decision_report"]["decision"], "매수");
        assert_eq!(
            body["referenced_cases"][0],
            "삼성전자, 반도체 수요 급증으로 분기 최대 실적 달성"
        );
        assert_eq!(body["market_data_used"]["bok_rate"], "2.50%");
    }

    #[tokio::test]
    async fn test_no_rag_has_no_cases_and_skips_retrieval() {
        let counting = Arc::new(CountingRetriever {
            calls: AtomicUsize::new(0),
        });
        let retriever = HybridRetriever::new(
            None,
            Some(counting.clone() as Arc<dyn Retriever>),
            HybridConfig::default(),
        );
        let handle = Arc::new(RetrieverHandle::new(
            retriever,
            ReloadResponse {
                records: 0,
                dense: false,
                sparse: true,
            },
            IndexBuilder::new("unused.json", HybridConfig::default()),
        ));
        let analyzer = Analyzer::new(handle, ScriptedGenerator::replying("결정: 중립"), market(), 2);
        let app = router(AppState::new(Arc::new(analyzer)));

        let response = app
            .oneshot(post_json(
                "/analyze/no-rag",
                r#"{"stock_name": "현대차", "content": "전기차 판매 호조", "kospi_status": "상승", "nasdaq_status": "하락"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["referenced_cases"], serde_json::json!([]));
        assert_eq!(body["market_data_used"]["kospi"], "상승");
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let file = corpus_file(NEWS);
        let app = app_for(file.path(), 2);

        let missing_field = app
            .clone()
            .oneshot(post_json("/analyze", r#"{"stock_name": "삼성전자"}"#))
            .await
            .unwrap();
        assert!(missing_field.status().is_client_error());

        let not_json = app.oneshot(post_json("/analyze", "stock=삼성전자")).await.unwrap();
        assert!(not_json.status().is_client_error());
    }

    #[test]
    fn test_error_status_mapping() {
        let corpus = ApiError::from(Error::Corpus("missing".to_string())).into_response();
        assert_eq!(corpus.status(), StatusCode::SERVICE_UNAVAILABLE);

        let config = ApiError::from(Error::Config("bad weights".to_string())).into_response();
        assert_eq!(config.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "disk"));
        assert_eq!(ApiError::from(io).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_reload() {
        let file = corpus_file(r#"[{"DETAIL": "국제 유가 급등에 정유주 강세"}]"#);
        let app = app_for(file.path(), 2);

        std::fs::write(file.path(), NEWS).unwrap();
        let response = app
            .clone()
            .oneshot(post_json("/reload", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            serde_json::json!({"records": 4, "dense": true, "sparse": true})
        );

        std::fs::write(file.path(), "not json").unwrap();
        let response = app.oneshot(post_json("/reload", "")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
