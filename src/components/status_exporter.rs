use crate::{
    store::{StatusStore, StoreSnapshot, TransitionLog},
    types::TransitionLogEntry,
};
use anyhow::Result as AnyResult;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

#[derive(Clone, Debug)]
struct ExporterState {
    pub store: Arc<StatusStore>,
    pub log: Arc<TransitionLog>,
}

/// Read-only HTTP view of the current status table and the transition log.
#[derive(Clone, Debug)]
pub struct StatusExporter {
    state: ExporterState,
    listen: SocketAddr,
}

impl StatusExporter {
    pub fn new(store: Arc<StatusStore>, log: Arc<TransitionLog>, listen: SocketAddr) -> Self {
        Self {
            state: ExporterState { store, log },
            listen,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(Self::handle_health))
            .route("/health/history", get(Self::handle_history))
            .route("/health/history.json", get(Self::handle_history_entries))
            .with_state(self.state.clone())
    }

    pub async fn run(&self) -> AnyResult<()> {
        let listener = TcpListener::bind(self.listen).await?;
        info!("Health check API listening at http://{}", listener.local_addr()?);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    async fn handle_health(state: State<ExporterState>) -> Json<StoreSnapshot> {
        Json(state.store.snapshot().await)
    }

    async fn handle_history(state: State<ExporterState>) -> Response {
        match state.log.read_raw().await {
            Ok(Some(history)) => (
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                history,
            )
                .into_response(),
            Ok(None) => (StatusCode::NOT_FOUND, "No history log found.").into_response(),
            Err(e) => {
                error!("Failed to read {}: {}", state.log.path().display(), e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error reading history log.").into_response()
            }
        }
    }

    async fn handle_history_entries(
        state: State<ExporterState>,
    ) -> Result<Json<Vec<TransitionLogEntry>>, StatusCode> {
        state.log.history().await.map(Json).map_err(|e| {
            error!("Failed to read {}: {}", state.log.path().display(), e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
    }
}
