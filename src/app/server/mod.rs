use crate::app::runner::NerPipeline;
use crate::core::model::ModelRegistry;
use crate::core::{segment, NerError, TaggedToken, WordSegmenter};
use crate::envconfig::Settings;
use crate::infra::storage::{AuditPolicy, JsonlPredictionStore, NewPrediction, PredictionStore, MAX_PAGE};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

pub const API_PREFIX: &str = "/api/v1";

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub segmenter: WordSegmenter,
    pub store: Arc<dyn PredictionStore>,
    pub audit: AuditPolicy,
    pub max_text_chars: usize,
}

impl AppState {
    pub fn new(registry: Arc<ModelRegistry>, store: Arc<dyn PredictionStore>) -> Self {
        Self {
            registry,
            segmenter: WordSegmenter::default(),
            store,
            audit: AuditPolicy::default(),
            max_text_chars: 5000,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub text: String,
    pub entities: Vec<TaggedToken>,
    /// Milliseconds.
    pub processing_time: u64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

/// Error body `{"detail": ...}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

impl From<NerError> for ApiError {
    fn from(e: NerError) -> Self {
        let status = match &e {
            NerError::NotLoaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            NerError::Config(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/history", get(history));

    Router::new()
        .route("/", get(root))
        .nest(API_PREFIX, api)
        .layer(axum::middleware::from_fn(crate::middleware::cors_middleware))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Khmer NER API is running" }))
}

async fn health(State(state): State<AppState>) -> Response {
    let health = state.registry.health();
    match state.registry.get_bundle() {
        Ok(bundle) => {
            let info = bundle.info();
            Json(json!({
                "status": "healthy",
                "models_loaded": true,
                "device": info.device,
                "labels": info.labels,
                "embedding_dim": info.embedding_dim,
                "bundle_digest": info.digest,
                "segmenter": state.segmenter.capability(),
            }))
            .into_response()
        }
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "models_loaded": false,
                "error": health.error,
            })),
        )
            .into_response(),
    }
}

async fn predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let chars = req.text.chars().count();
    if chars > state.max_text_chars {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("text has {} characters, the limit is {}", chars, state.max_text_chars),
        ));
    }

    let bundle = state.registry.get_bundle()?;
    let pipeline = NerPipeline::new(bundle).segmenter(state.segmenter.clone());

    let start = Instant::now();
    let text = req.text.clone();
    let entities = tokio::task::spawn_blocking(move || pipeline.predict(&text))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("inference task failed: {}", e)))??;
    let processing_time = start.elapsed().as_millis() as u64;

    tracing::info!(
        chars,
        tokens = entities.len(),
        processing_time_ms = processing_time,
        "prediction served"
    );

    let record = NewPrediction {
        input_text: req.text.clone(),
        predictions: entities.clone(),
        processing_time,
    };
    if let Err(e) = state.store.append(record).await {
        match state.audit {
            AuditPolicy::Strict => return Err(e.into()),
            AuditPolicy::BestEffort => {
                tracing::error!(error = %e, "prediction record dropped");
            }
        }
    }

    Ok(Json(PredictResponse {
        text: req.text,
        entities,
        processing_time,
    }))
}

async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let records = state
        .store
        .list(query.skip, query.limit.min(MAX_PAGE))
        .await?;
    Ok(Json(records).into_response())
}

pub struct Server {
    host: String,
    port: u16,
    router: Router,
}

impl Server {
    pub fn new(router: Router) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            router,
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        tracing::info!("Khmer NER listening on {}", addr);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Loads the model bundle, opens the prediction log and serves HTTP until
/// interrupted. A bundle that fails to load leaves the server up and
/// reporting unhealthy.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    let registry = Arc::new(ModelRegistry::new());
    let segmenter = WordSegmenter::new(segment::from_spec(&settings.segmenter)?);

    {
        let registry = Arc::clone(&registry);
        let paths = settings.bundle_paths();
        let labels = settings.labels.clone();
        let device = settings.device;
        let loaded = tokio::task::spawn_blocking(move || registry.initialize(&paths, labels, device)).await?;
        if let Err(e) = loaded {
            tracing::error!(error = %e, "serving without models");
        }
    }

    let store: Arc<dyn PredictionStore> = Arc::new(JsonlPredictionStore::open(&settings.history_path).await?);

    let state = AppState {
        registry,
        segmenter,
        store,
        audit: settings.audit,
        max_text_chars: settings.max_text_chars,
    };

    Server::new(router(state))
        .host(settings.host.host.clone())
        .port(settings.host.port)
        .run()
        .await
}
