//! HTTP boundary over the shared store.
//!
//! Routes:
//! - `POST /ingest` append a sample and recompute the user's prediction
//! - `GET /predict/:user_id` last committed prediction
//! - `GET /insights/:user_id` insight messages of the last prediction
//! - `POST /coach/:user_id` coaching recommendations for the current risk
//! - `GET /health` liveness and tracking stats (no auth)
//!
//! Every route except `/health` requires the configured token in `X-API-Key`.
//!
//! ```text
//! producer ──→ POST /ingest ──→ StoreCoordinator ──→ PredictionCache
//!                                      ↑                   │
//!                              RefreshScheduler      GET /predict ...
//! ```

use crate::config::Config;
use crate::core::prediction::RiskLevel;
use crate::core::sample::Sample;
use crate::refresh::RefreshScheduler;
use crate::store::{StoreCoordinator, StoreError};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Header carrying the shared API token.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Token expected in `X-API-Key`
    pub api_token: String,
    /// Interval between background refresh cycles
    pub refresh_interval: Duration,
}

impl ServerConfig {
    /// Create a new server configuration bound to localhost
    pub fn new(port: u16, api_token: impl Into<String>, refresh_interval: Duration) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            api_token: api_token.into(),
            refresh_interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.port, config.api_token.clone(), config.refresh_interval)
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }
}

/// Shared server state
pub struct ServerState {
    store: Arc<StoreCoordinator>,
    api_token: String,
}

/// Response from ingest endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub user_id: String,
    pub stored_events: usize,
    pub last_prediction: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub user_id: String,
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightResponse {
    pub user_id: String,
    pub risk_level: RiskLevel,
    pub probability: f64,
    pub insights: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Optional body of a coaching request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoachRequest {
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachResponse {
    pub user_id: String,
    pub risk_level: RiskLevel,
    pub probability: f64,
    pub recommendations: Vec<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub users_tracked: usize,
    pub model_features: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match &e {
            StoreError::NotFound(_) => api_error(StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
            StoreError::EmptyWindow(_) | StoreError::Scorer(_) => {
                tracing::error!(error = %e, "prediction update failed");
                api_error(StatusCode::INTERNAL_SERVER_ERROR, "SCORER_ERROR", e.to_string())
            }
        }
    }
}

fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if provided == Some(state.api_token.as_str()) {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::UNAUTHORIZED,
            "UNAUTHORIZED",
            "Invalid API key",
        ))
    }
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    let stats = state.store.health();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        users_tracked: stats.tracked_user_count,
        model_features: stats.feature_count,
    })
}

/// POST /ingest
async fn ingest(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    payload: Result<Json<Sample>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    authorize(&state, &headers)?;

    // Schema errors (bad timestamp, missing reading) surface as 422
    let Json(sample) = payload.map_err(|rejection| {
        api_error(rejection.status(), "INVALID_SAMPLE", rejection.body_text())
    })?;

    let non_finite = sample.non_finite_signals();
    if !non_finite.is_empty() {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_SAMPLE",
            format!("non-finite readings: {}", non_finite.join(", ")),
        ));
    }

    let user_id = sample.user_id.clone();
    let outcome = state.store.ingest(sample).await?;

    Ok(Json(IngestResponse {
        user_id,
        stored_events: outcome.stored_count,
        last_prediction: outcome.last_probability,
    }))
}

/// GET /predict/:user_id
async fn predict(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<PredictionResponse>, ApiError> {
    authorize(&state, &headers)?;
    let entry = state.store.get_prediction(&user_id)?;

    Ok(Json(PredictionResponse {
        user_id,
        probability: entry.probability,
        risk_level: entry.risk_level,
        updated_at: entry.computed_at,
    }))
}

/// GET /insights/:user_id
async fn insights(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<InsightResponse>, ApiError> {
    authorize(&state, &headers)?;
    let entry = state.store.get_prediction(&user_id)?;

    Ok(Json(InsightResponse {
        user_id,
        risk_level: entry.risk_level,
        probability: entry.probability,
        insights: entry.insights.clone(),
        generated_at: entry.computed_at,
    }))
}

/// POST /coach/:user_id
///
/// The optional context is accepted for logging only; recommendations
/// depend on the risk level alone.
async fn coach(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    request: Option<Json<CoachRequest>>,
) -> Result<Json<CoachResponse>, ApiError> {
    authorize(&state, &headers)?;
    let (entry, recommendations) = state.store.get_coaching(&user_id)?;

    if let Some(context) = request.and_then(|Json(r)| r.context) {
        tracing::debug!(user_id = %user_id, context = %context, "coaching context received");
    }

    Ok(Json(CoachResponse {
        user_id,
        risk_level: entry.risk_level,
        probability: entry.probability,
        recommendations: recommendations.iter().map(|r| r.to_string()).collect(),
    }))
}

/// Build the router over a store.
pub fn router(store: Arc<StoreCoordinator>, api_token: impl Into<String>) -> Router {
    let state = Arc::new(ServerState {
        store,
        api_token: api_token.into(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/predict/:user_id", get(predict))
        .route("/insights/:user_id", get(insights))
        .route("/coach/:user_id", post(coach))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves.
///
/// The refresh scheduler runs alongside the server. On shutdown in-flight
/// requests drain first, then the scheduler is cancelled and joined.
pub async fn serve(
    listener: TcpListener,
    config: ServerConfig,
    store: Arc<StoreCoordinator>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let scheduler = RefreshScheduler::start(store.clone(), config.refresh_interval);
    let app = router(store, config.api_token);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Server shutdown signal received");
        })
        .await;

    scheduler.shutdown().await;
    result?;
    Ok(())
}

/// Run the HTTP server in the background
pub async fn run(
    config: ServerConfig,
    store: Arc<StoreCoordinator>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Head Start server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = serve(listener, config, store, shutdown).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
