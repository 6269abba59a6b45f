use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use log::error;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::{
    error::SyncError,
    model::{Action, FileUpdates, RawFileUpdates},
    Container,
};

/// Container plus the lock serializing its synchronizations.
pub struct SyncService {
    container: Container,
    in_flight: Mutex<()>,
}

impl SyncService {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            in_flight: Mutex::new(()),
        }
    }
}

#[derive(Serialize)]
struct Status {
    container: String,
    running: bool,
}

pub fn router(service: SyncService) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/rules", get(rules))
        .route("/plan", post(plan))
        .route("/sync", post(sync))
        .with_state(Arc::new(service))
}

async fn status(State(service): State<Arc<SyncService>>) -> impl IntoResponse {
    service
        .container
        .check_running()
        .await
        .map(|running| {
            Json(Status {
                container: service.container.id().to_string(),
                running,
            })
        })
        .map_err(|e| failure("status", e))
}

async fn rules(State(service): State<Arc<SyncService>>) -> impl IntoResponse {
    Json(service.container.rules().to_vec())
}

// Bodies are validated here rather than by the extractor so invalid sets
// answer 400 instead of axum's 422.
async fn plan(State(service): State<Arc<SyncService>>, Json(updates): Json<RawFileUpdates>) -> impl IntoResponse {
    FileUpdates::try_from(updates)
        .map(|updates| Json(service.container.actions_needed(&updates)))
        .map_err(|e| failure("plan", e))
}

async fn sync(
    State(service): State<Arc<SyncService>>,
    Json(updates): Json<RawFileUpdates>,
) -> Result<Json<Vec<Action>>, (StatusCode, String)> {
    let updates = FileUpdates::try_from(updates).map_err(|e| failure("sync", e))?;
    let _guard = service.in_flight.lock().await;
    service
        .container
        .sync(&updates)
        .await
        .map(Json)
        .map_err(|e| failure("sync", e))
}

fn failure(operation: &str, e: SyncError) -> (StatusCode, String) {
    error!("Error during {} {:?}", operation, e);
    let status = match e {
        SyncError::Parse(_) | SyncError::OverlappingUpdates(_) | SyncError::OutsideContext(_) => {
            StatusCode::BAD_REQUEST
        }
        SyncError::NotRunning(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, format!("Something went wrong: {e}"))
}
