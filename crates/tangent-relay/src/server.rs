use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tangent_core::relay::{ChatFailure, ChatReply, ChatRequest, Relay};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    relay: Arc<Relay>,
}

pub struct RelayServer {
    pub address: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
}

impl RelayServer {
    pub async fn close(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.join.await.context("relay server task failed")
    }
}

pub async fn start_relay_server(relay: Relay, host: &str, port: u16) -> Result<RelayServer> {
    let app = build_router(AppState {
        relay: Arc::new(relay),
    });

    let bind_host = host
        .parse::<std::net::IpAddr>()
        .with_context(|| format!("invalid bind host: {host}"))?;
    let listener = TcpListener::bind((bind_host, port))
        .await
        .context("failed to bind listener")?;

    let address = format!("http://{}", listener.local_addr()?);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = served {
            warn!(error = %e, "relay server stopped with error");
        }
    });

    info!(%address, "relay listening");
    Ok(RelayServer {
        address,
        shutdown: Some(shutdown_tx),
        join,
    })
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/chat", post(chat))
        .with_state(state)
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return failure(
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {e}"),
            );
        }
    };

    match state.relay.handle(request).await {
        Ok(response) => (StatusCode::OK, Json(ChatReply { response })).into_response(),
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(e.to_failure())).into_response()
        }
    }
}

fn failure(status: StatusCode, error: String) -> Response {
    (status, Json(ChatFailure { error })).into_response()
}
