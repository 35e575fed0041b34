//! Pipeline run status

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::pipeline::PipelineRun;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(active_runs))
        .route("/:run_id", get(get_run))
}

/// GET /api/v1/runs
async fn active_runs(State(state): State<AppState>) -> Json<Vec<PipelineRun>> {
    Json(state.pipeline().runs().active())
}

/// GET /api/v1/runs/:run_id
async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<PipelineRun>> {
    let id = Uuid::parse_str(&run_id)
        .map_err(|_| AppError::BadRequest(format!("Invalid run id: {}", run_id)))?;
    state
        .pipeline()
        .runs()
        .get(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Run {}", run_id)))
}
