//! HTTP server for the cancellations API.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                              |
//! |--------|-----------------------|------------------------------------------|
//! | GET    | `/health`             | Health check                             |
//! | GET    | `/api/cancellations`  | Enriched rows, filtered by query string  |
//! | GET    | `/api/programs`       | Per-offering withdrawal breakdown        |
//! | GET    | `/api/status`         | Current snapshot metadata                |
//! | POST   | `/api/refresh`        | Run an ingestion pass now                |
//! | POST   | `/api/upload`         | Replace the workbook and re-ingest       |
//! | GET    | `/api/logs`           | SSE stream of ingestion logs             |

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, sse::KeepAlive, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::LOG_BROADCASTER;
use super::types::{error_response, CancellationsResponse, ProgramsResponse};
use crate::config::{Settings, MAX_UPLOAD_BYTES};
use crate::error::{ServerError, ServerResult};
use crate::ingest::{spawn_refresh_loop, Ingestor};
use crate::query::CancellationQuery;
use crate::store::{SnapshotStore, SnapshotSummary};

type ApiError = (StatusCode, Json<Value>);

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
}

/// Build the router; the caller owns scheduling.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/cancellations", get(list_cancellations))
        .route("/api/programs", get(list_programs))
        .route("/api/status", get(status))
        .route("/api/refresh", post(refresh))
        .route("/api/upload", post(upload_workbook))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start ingesting on a timer and serve the API until the process exits.
pub async fn start_server(settings: Settings) -> ServerResult<()> {
    let store = Arc::new(SnapshotStore::new());
    let ingestor = Arc::new(Ingestor::for_path(settings.source.clone(), store));
    let _refresh = spawn_refresh_loop(Arc::clone(&ingestor), settings.refresh_interval);

    let app = router(AppState { ingestor });

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    tracing::info!(
        source = %settings.source.display(),
        refresh_secs = settings.refresh_interval.as_secs(),
        "cancellations server running on http://localhost:{}",
        settings.port
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn api_error(err: ServerError) -> ApiError {
    let status = match err {
        ServerError::BadRequest(_) | ServerError::Source(_) => StatusCode::BAD_REQUEST,
        ServerError::Io(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(%status, "request failed: {}", err);
    (status, Json(error_response(&err.to_string())))
}

/// Health check endpoint
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "cancellations",
        "version": env!("CARGO_PKG_VERSION"),
        "source": state.ingestor.source_description(),
        "endpoints": {
            "cancellations": "GET /api/cancellations",
            "programs": "GET /api/programs",
            "status": "GET /api/status",
            "refresh": "POST /api/refresh",
            "upload": "POST /api/upload",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

async fn list_cancellations(
    State(state): State<AppState>,
    Query(query): Query<CancellationQuery>,
) -> Json<CancellationsResponse> {
    let snapshot = state.ingestor.store().current();
    Json(CancellationsResponse::filtered(&snapshot, &query))
}

async fn list_programs(State(state): State<AppState>) -> Json<ProgramsResponse> {
    let snapshot = state.ingestor.store().current();
    Json(ProgramsResponse::from(snapshot.as_ref()))
}

async fn status(State(state): State<AppState>) -> Json<SnapshotSummary> {
    Json(state.ingestor.store().current().summary())
}

async fn refresh(State(state): State<AppState>) -> Json<SnapshotSummary> {
    Json(state.ingestor.refresh().await.summary())
}

/// Upload workbook endpoint (multipart field `file`)
async fn upload_workbook(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SnapshotSummary>, ApiError> {
    let mut file_data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(ServerError::BadRequest(format!("Multipart error: {}", e))))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| api_error(ServerError::BadRequest(format!("Read error: {}", e))))?;
            file_data = Some(bytes.to_vec());
        }
    }

    let bytes = file_data.ok_or_else(|| api_error(ServerError::BadRequest("No file provided".into())))?;
    tracing::info!(
        file = file_name.as_deref().unwrap_or("unknown"),
        bytes = bytes.len(),
        "workbook upload"
    );

    let snapshot = state.ingestor.replace_workbook(bytes).await.map_err(api_error)?;
    Ok(Json(snapshot.summary()))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        // Lagged receivers skip what they missed
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
