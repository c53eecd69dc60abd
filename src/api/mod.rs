//! HTTP edge for the dispatcher.
//!
//! Registration, submission, and the read-only observability views. The
//! handlers consume only the dispatcher facade; no request-shaping state
//! leaks into the core.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;

/// Deadline applied to every job submitted through the edge.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
}

#[derive(Deserialize)]
pub struct ConnectWorkerRequest {
    pub url: String,
    #[serde(default)]
    pub model: String,
}

#[derive(Serialize)]
struct ConnectWorkerResponse {
    status: &'static str,
    url: String,
}

#[derive(Deserialize)]
pub struct DispatchRequest {
    pub endpoint: String,
    pub body: serde_json::Value,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    reply: String,
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/connect-worker", post(connect_worker_handler))
        .route("/dispatch", post(dispatch_handler))
        .route("/chat", post(chat_handler))
        .route("/stats", get(stats_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: ApiState, shutdown: CancellationToken) {
    let app = router(state);

    tracing::info!(addr = %addr, "Starting dispatcher API");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(addr = %addr, error = %err, "Failed to bind API listener");
            return;
        }
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
    {
        tracing::error!(error = %err, "API server failed");
    }
}

pub async fn connect_worker_handler(
    State(state): State<ApiState>,
    Json(payload): Json<ConnectWorkerRequest>,
) -> Response {
    if payload.url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "url is required".to_string(),
            }),
        )
            .into_response();
    }

    state
        .dispatcher
        .register_worker(&payload.url, &payload.model)
        .await;

    Json(ConnectWorkerResponse {
        status: "registered",
        url: payload.url,
    })
    .into_response()
}

/// Submit an opaque job and relay the worker's reply verbatim.
pub async fn dispatch_handler(
    State(state): State<ApiState>,
    Json(payload): Json<DispatchRequest>,
) -> Response {
    if payload.endpoint.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "endpoint is required".to_string(),
            }),
        )
            .into_response();
    }

    match submit_and_wait(&state, payload.endpoint, payload.body).await {
        Ok(reply) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            reply,
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

/// Shape a chat message into a completion request and return the reply text.
pub async fn chat_handler(
    State(state): State<ApiState>,
    Json(payload): Json<ChatRequest>,
) -> Response {
    if payload.message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "message is required".to_string(),
            }),
        )
            .into_response();
    }

    let body = json!({
        "messages": [{ "role": "user", "content": payload.message }],
        "max_tokens": state.dispatcher.config().default_max_tokens,
    });

    let reply = match submit_and_wait(&state, "/v1/chat/completions".to_string(), body).await {
        Ok(reply) => reply,
        Err(err) => return error_response(err),
    };

    let completion: ChatCompletion = match serde_json::from_slice(&reply) {
        Ok(completion) => completion,
        Err(err) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody {
                    error: format!("invalid completion from worker: {err}"),
                }),
            )
                .into_response();
        }
    };

    let Some(choice) = completion.choices.into_iter().next() else {
        return (
            StatusCode::BAD_GATEWAY,
            Json(ErrorBody {
                error: "completion had no choices".to_string(),
            }),
        )
            .into_response();
    };

    Json(ChatResponse {
        reply: choice.message.content,
    })
    .into_response()
}

pub async fn stats_handler(State(state): State<ApiState>) -> Response {
    Json(state.dispatcher.stats().await).into_response()
}

pub async fn leaderboard_handler(State(state): State<ApiState>) -> Response {
    Json(state.dispatcher.leaderboard().await).into_response()
}

pub async fn health_handler(State(state): State<ApiState>) -> Response {
    let stats = state.dispatcher.stats().await;
    Json(json!({
        "status": "ok",
        "totalWorkers": stats.total_workers,
        "healthyWorkers": stats.healthy_workers,
    }))
    .into_response()
}

async fn submit_and_wait(
    state: &ApiState,
    endpoint: String,
    body: serde_json::Value,
) -> Result<Vec<u8>, DispatchError> {
    let (job, handle) = state.dispatcher.job(endpoint, body);
    job.cancel_after(SUBMIT_TIMEOUT);
    state.dispatcher.enqueue(job).await?;
    handle.outcome().await
}

fn error_response(err: DispatchError) -> Response {
    let status = match err {
        DispatchError::Overloaded
        | DispatchError::QueueClosed
        | DispatchError::NoWorkersAvailable => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        DispatchError::WorkerFailure { .. } => StatusCode::BAD_GATEWAY,
        DispatchError::Config(_) | DispatchError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}
