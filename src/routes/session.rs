//! Session routes
//!
//! Account and network changes arrive here from the wallet side. Each change
//! is published to the session's subscribers; nothing in the pipeline
//! switches accounts on its own.

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::Deserialize;

use crate::error::Result;
use crate::ledger::AccountAddress;
use crate::pipeline::{require_text, ValidationError};
use crate::session::SessionInfo;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ConnectRequest {
    pub account: String,
}

#[derive(Deserialize)]
pub struct NetworkRequest {
    pub network: String,
}

/// Create the session router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(session_info))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/network", post(switch_network))
}

/// GET /api/v1/session
async fn session_info(State(state): State<AppState>) -> Json<SessionInfo> {
    Json(state.session().info())
}

/// POST /api/v1/session/connect
async fn connect(
    State(state): State<AppState>,
    Json(request): Json<ConnectRequest>,
) -> Result<Json<SessionInfo>> {
    let account = AccountAddress::parse(&request.account).map_err(ValidationError::from)?;
    state.session().connect(account);
    Ok(Json(state.session().info()))
}

/// POST /api/v1/session/disconnect
async fn disconnect(State(state): State<AppState>) -> Json<SessionInfo> {
    state.session().disconnect();
    Json(state.session().info())
}

/// POST /api/v1/session/network
async fn switch_network(
    State(state): State<AppState>,
    Json(request): Json<NetworkRequest>,
) -> Result<Json<SessionInfo>> {
    require_text("network", &request.network)?;
    state.session().switch_network(request.network.trim());
    Ok(Json(state.session().info()))
}
