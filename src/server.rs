use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::RwLock;

use crate::session::{AgentSession, FetchResult, SearchResult, SessionSnapshot, StepStatus};
use crate::settings::AgentSettings;

/// One session per process; the orchestrator and any observers share it
/// through this handle. The lock serializes mutations so readers only ever
/// see a fully-formed snapshot.
#[derive(Clone, Default)]
pub struct AppState {
    pub session: Arc<RwLock<AgentSession>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AppendLogBody {
    pub step: String,
    pub status: StepStatus,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetRunningBody {
    pub running: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetQueryBody {
    pub query: String,
}

async fn get_session(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<SessionSnapshot> {
    let session = state.session.read().await;
    Json(session.snapshot())
}

async fn append_log(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(body): Json<AppendLogBody>,
) -> Json<SessionSnapshot> {
    let mut session = state.session.write().await;
    tracing::debug!(step = %body.step, status = ?body.status, "append_log");
    session.append_log(body.step, body.status, body.message);
    Json(session.snapshot())
}

async fn clear_session(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<SessionSnapshot> {
    let mut session = state.session.write().await;
    tracing::debug!("clear_session");
    session.clear_session();
    Json(session.snapshot())
}

async fn set_running(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(body): Json<SetRunningBody>,
) -> Json<SessionSnapshot> {
    let mut session = state.session.write().await;
    tracing::debug!(running = body.running, "set_running");
    session.set_running(body.running);
    Json(session.snapshot())
}

async fn set_result(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(result): Json<FetchResult>,
) -> Json<SessionSnapshot> {
    let mut session = state.session.write().await;
    tracing::debug!(success = result.success, "set_result");
    session.set_result(result);
    Json(session.snapshot())
}

async fn set_search_results(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(results): Json<Vec<SearchResult>>,
) -> Json<SessionSnapshot> {
    let mut session = state.session.write().await;
    tracing::debug!(count = results.len(), "set_search_results");
    session.set_search_results(results);
    Json(session.snapshot())
}

async fn set_query(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(body): Json<SetQueryBody>,
) -> Json<SessionSnapshot> {
    let mut session = state.session.write().await;
    tracing::debug!(query = %body.query, "set_last_query");
    session.set_last_query(body.query);
    Json(session.snapshot())
}

async fn get_settings(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<AgentSettings> {
    let session = state.session.read().await;
    Json(session.settings().clone())
}

async fn put_settings(
    axum::extract::State(state): axum::extract::State<AppState>,
    Json(settings): Json<AgentSettings>,
) -> Json<AgentSettings> {
    let mut session = state.session.write().await;
    tracing::debug!(model = %settings.selected_model, "update_settings");
    session.update_settings(settings);
    Json(session.settings().clone())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/session", get(get_session))
        .route("/v1/session/logs", post(append_log))
        .route("/v1/session/clear", post(clear_session))
        .route("/v1/session/running", put(set_running))
        .route("/v1/session/result", put(set_result))
        .route("/v1/session/search-results", put(set_search_results))
        .route("/v1/session/query", put(set_query))
        .route("/v1/session/settings", get(get_settings).put(put_settings))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    {
        let session = state.session.read().await;
        tracing::info!(session_id = %session.id, %addr, "serving session state");
    }
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
