//! API сервер для ML моделей

use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use osm_ml::engine::PredictionEngine;
use osm_ml::error::EngineError;
use osm_ml::registry::store::ArtifactStore;
use osm_ml::registry::ModelRegistry;
use osm_ml::training::TrainingPipeline;
use osm_ml::types::{ModelInfo, PredictionRequest, PredictionResponse};

#[derive(Clone)]
struct AppState {
    engine: Arc<PredictionEngine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let models_dir = std::env::var("MODELS_DIR").unwrap_or_else(|_| "models".to_string());
    let datasets_dir = std::env::var("DATASETS_DIR").unwrap_or_else(|_| "datasets".to_string());

    let registry = ModelRegistry::load(ArtifactStore::new(&models_dir)?);
    tracing::info!("Registry loaded: {} artifacts", registry.len());

    let state = AppState {
        engine: Arc::new(PredictionEngine::new(
            registry,
            TrainingPipeline::new(&datasets_dir),
        )),
    };

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/retrain", post(retrain))
        .route("/models", get(models))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], 8000));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "OSM Activity ML API (Rust)",
        "version": "0.1.0"
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn predict(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<PredictionResponse>, (StatusCode, Json<serde_json::Value>)> {
    tracing::info!(
        "Predict request: {} in {}, {} historical records, {} elements",
        request.shop_type,
        request.bbox,
        request.historical_data.len(),
        request.features.elements.len()
    );

    // Предсказание (и возможное синхронное переобучение) — на блокирующем потоке
    let engine = Arc::clone(&state.engine);
    let result = tokio::task::spawn_blocking(move || engine.predict(&request)).await;

    match result {
        Ok(Ok(response)) => Ok(Json(response)),
        Ok(Err(e)) => Err(error_response(e)),
        Err(e) => {
            tracing::error!("Prediction task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal server error" })),
            ))
        }
    }
}

async fn retrain(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    // Переобучение запускается в фоне и не блокирует ответ
    let engine = Arc::clone(&state.engine);
    tokio::task::spawn_blocking(move || {
        let committed = engine.retrain_all();
        tracing::info!("Background retraining finished: {} models committed", committed);
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "retraining started" })),
    )
}

async fn models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(state.engine.list_models())
}

/// Преобразование ошибки движка в HTTP-ответ с непустым описанием
fn error_response(err: EngineError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        EngineError::ModelUnavailable(_) | EngineError::NoTrainingData(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidBoundingBox(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}
