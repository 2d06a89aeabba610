//! HTTP server for the chat and CSV export endpoints.
//!
//! The server is organized into separate concerns:
//! - `types`: request and response bodies, stream frames
//! - `handler`: maps pipeline outcomes to HTTP responses
//! - `stream`: newline-delimited JSON framing of the answer stream

mod handler;
mod stream;
mod types;

pub use stream::GENERIC_ERROR;
pub use types::{
    ChatRequestBody, ChatResponseBody, ChunkType, CsvQuery, ErrorBody, Message, StreamChunk,
};

use crate::config::{Config, ConfigError};
use crate::export::CsvExporter;
use crate::pipeline::ChatPipeline;
use crate::provider::{AnthropicProvider, Provider, ProviderError};
use crate::rag::{create_document_store, Retriever, StoreError, SupabaseEmbedder};
use crate::supabase::SupabaseClient;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Shared, read-only request state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ChatPipeline>,
    pub exporter: Arc<CsvExporter>,
}

impl AppState {
    pub fn new(pipeline: ChatPipeline, exporter: CsvExporter) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            exporter: Arc::new(exporter),
        }
    }

    /// Builds every service client from the configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = SupabaseClient::new(&config.store)?;
        let embedder = Arc::new(SupabaseEmbedder::new(
            client.clone(),
            config.store.embedding_function.clone(),
        ));
        let store = create_document_store(&config.store, client).await?;
        let provider: Arc<dyn Provider> = Arc::new(AnthropicProvider::new(&config.llm)?);

        let retriever = Retriever::new(embedder, store, config.pipeline.filter_mode);
        let pipeline = ChatPipeline::new(
            retriever.clone(),
            provider,
            config.llm.clone(),
            config.pipeline.clone(),
        );
        let exporter = CsvExporter::new(retriever, config.export.clone());

        Ok(Self::new(pipeline, exporter))
    }
}

/// Builds the router with all routes.
///
/// With a public base URL only that origin may call the API; without one
/// any origin may.
pub fn build_router(state: AppState, public_base_url: Option<&str>) -> Result<Router> {
    let cors = match public_base_url {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin.trim_end_matches('/')).map_err(|_| {
                ConfigError::Invalid(format!("public_base_url '{}' is not a valid origin", origin))
            })?;
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE])
        }
        None => CorsLayer::permissive(),
    };

    Ok(Router::new()
        .route("/healthz", get(handler::healthz))
        .route("/api/chat", post(handler::chat))
        .route("/api/csv", get(handler::csv))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// HTTP server bound to the configured address.
pub struct Server {
    config: Config,
    state: AppState,
}

impl Server {
    pub async fn new(config: Config) -> Result<Self> {
        let state = AppState::from_config(&config).await?;
        Ok(Self { config, state })
    }

    /// Serves until Ctrl-C.
    pub async fn start(self) -> Result<()> {
        let app = build_router(self.state, self.config.server.public_base_url.as_deref())?;
        let listener = TcpListener::bind(&self.config.server.bind).await?;

        info!(bind = %self.config.server.bind, "Server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExportConfig, FilterMode, LlmConfig, PipelineConfig, ResponseMode};
    use crate::pipeline::testing::{FakeEmbedder, FakeProvider, FakeStore};
    use crate::prompt;
    use crate::rag::DocumentRow;
    use axum::body::{to_bytes, Body};
    use axum::http::header::CONTENT_DISPOSITION;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    const BODY_LIMIT: usize = 1_048_576;

    fn alameda_rows() -> Vec<DocumentRow> {
        vec![
            DocumentRow::new("1", "Quiet hours are 10 p.m. to 7 a.m.")
                .with_jurisdiction("Alameda County")
                .with_citation("6", "6.04", "6.04.010")
                .with_similarity(0.8),
            DocumentRow::new("2", "Construction noise is limited on Sundays.")
                .with_jurisdiction("Alameda County")
                .with_citation("6", "6.04", "6.04.020")
                .with_similarity(0.6),
            DocumentRow::new("3", "Say \"no\" to leaf blowers after dark.")
                .with_jurisdiction("Alameda County")
                .with_citation("6", "6.08", "6.08.030")
                .with_similarity(0.15),
        ]
    }

    struct TestApp {
        router: Router,
        embedder: Arc<FakeEmbedder>,
        store: Arc<FakeStore>,
        provider: Arc<FakeProvider>,
    }

    fn test_app(
        embedder: FakeEmbedder,
        store: FakeStore,
        provider: FakeProvider,
        config: PipelineConfig,
    ) -> TestApp {
        let embedder = Arc::new(embedder);
        let store = Arc::new(store);
        let provider = Arc::new(provider);
        let retriever = Retriever::new(embedder.clone(), store.clone(), FilterMode::Strict);
        let pipeline = ChatPipeline::new(
            retriever.clone(),
            provider.clone(),
            LlmConfig::default(),
            config,
        );
        let exporter = CsvExporter::new(retriever, ExportConfig::default());
        let router = build_router(AppState::new(pipeline, exporter), None).unwrap();

        TestApp {
            router,
            embedder,
            store,
            provider,
        }
    }

    fn default_app() -> TestApp {
        test_app(
            FakeEmbedder::default(),
            FakeStore::with_rows(alameda_rows()),
            FakeProvider::answering(&[
                "Quiet hours run overnight. ",
                "[Source: Alameda County, Title 6, Chapter 6.04, Section 6.04.010]",
            ]),
            PipelineConfig::default(),
        )
    }

    fn chat_request(query: &str, county: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "messages": [{ "role": "user", "content": query }],
                    "county": county
                })
                .to_string(),
            ))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn frames(body: &str) -> Vec<Value> {
        body.lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = default_app();
        let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_streams_cited_answer() {
        let app = default_app();

        let response = app
            .router
            .oneshot(chat_request("What are the noise ordinance rules?", "Alameda County"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "application/x-ndjson; charset=utf-8"
        );

        let frames = frames(&body_text(response).await);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0]["type"], "chunk");
        assert_eq!(frames[2]["type"], "done");
        let answer = frames[2]["content"].as_str().unwrap();
        assert!(answer.contains("[Source: Alameda County, "));
    }

    #[tokio::test]
    async fn test_chat_greeting_skips_upstream() {
        let app = default_app();

        let response = app.router.oneshot(chat_request("hello", "calaveras")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let frames = frames(&body_text(response).await);
        assert_eq!(
            frames.last().unwrap()["content"],
            prompt::greeting_reply(Some(crate::Jurisdiction::CalaverasCounty))
        );
        assert_eq!(app.embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(app.store.search_calls.load(Ordering::SeqCst), 0);
        assert_eq!(app.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chat_no_documents_is_204() {
        let app = test_app(
            FakeEmbedder::default(),
            FakeStore::with_rows(alameda_rows()),
            FakeProvider::answering(&["unused"]),
            PipelineConfig::default(),
        );

        let response = app
            .router
            .oneshot(chat_request("Tree permits?", "Sierra Madre"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_text(response).await.is_empty());
        assert_eq!(app.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chat_embedding_failure_is_500() {
        let app = test_app(
            FakeEmbedder {
                fail: true,
                ..FakeEmbedder::default()
            },
            FakeStore::with_rows(alameda_rows()),
            FakeProvider::answering(&["unused"]),
            PipelineConfig::default(),
        );

        let response = app.router.oneshot(chat_request("Noise?", "alameda")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], GENERIC_ERROR);
    }

    #[tokio::test]
    async fn test_chat_buffered_response() {
        let config = PipelineConfig {
            response_mode: ResponseMode::Buffered,
            ..PipelineConfig::default()
        };
        let app = test_app(
            FakeEmbedder::default(),
            FakeStore::with_rows(alameda_rows()),
            FakeProvider::answering(&["Quiet hours apply."]),
            config,
        );

        let response = app.router.oneshot(chat_request("Noise?", "alameda")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body, json!({ "response": "Quiet hours apply." }));
    }

    #[tokio::test]
    async fn test_chat_invalid_body_is_400() {
        let app = default_app();
        let request = Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_csv_export() {
        let app = default_app();
        let request = Request::builder()
            .uri("/api/csv?query=noise&county=alameda")
            .body(Body::empty())
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/csv; charset=utf-8");
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"data.csv\""
        );

        let body = body_text(response).await;
        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let contents: Vec<String> = reader.records().map(|r| r.unwrap()[3].to_string()).collect();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[2], "Say \"no\" to leaf blowers after dark.");
    }

    #[tokio::test]
    async fn test_csv_no_matches_is_204() {
        let app = test_app(
            FakeEmbedder::default(),
            FakeStore::default(),
            FakeProvider::default(),
            PipelineConfig::default(),
        );
        let request = Request::builder()
            .uri("/api/csv?query=fireworks&county=alameda")
            .body(Body::empty())
            .unwrap();

        let response = app.router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(body_text(response).await.is_empty());
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let app = default_app();
        let result = build_router(
            AppState::new(
                ChatPipeline::new(
                    Retriever::new(app.embedder.clone(), app.store.clone(), FilterMode::Strict),
                    app.provider.clone(),
                    LlmConfig::default(),
                    PipelineConfig::default(),
                ),
                CsvExporter::new(
                    Retriever::new(app.embedder.clone(), app.store.clone(), FilterMode::Strict),
                    ExportConfig::default(),
                ),
            ),
            Some("https://bad\norigin"),
        );
        assert!(matches!(result, Err(ServerError::Config(_))));
    }
}
