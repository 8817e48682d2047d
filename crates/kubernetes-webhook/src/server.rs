//! HTTP server for the intent webhook.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, ser::PrettyFormatter, Serializer, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::auth::{self, BasicCredentials};
use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::models::{IntentRequest, OperationResult, WebhookRequest};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Credentials every webhook call must present.
    pub credentials: BasicCredentials,
    /// Intent dispatcher.
    pub dispatcher: Arc<Dispatcher>,
}

/// Build the HTTP router for the webhook service.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(state: AppState, port: u16, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(port = port, "Webhook service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")
}

/// Health check endpoint.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Handle an intent webhook call.
///
/// Every handled outcome is answered with a spoken sentence; only
/// authentication failures get a bare 401.
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !auth::is_authorized(&headers, &state.credentials) {
        warn!("Rejected webhook call with missing or invalid credentials");
        return auth::challenge();
    }

    let request: WebhookRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Failed to parse webhook payload");
            return respond(
                StatusCode::BAD_REQUEST,
                &OperationResult::say("Sorry, I couldn't understand that request."),
            );
        }
    };

    let outcome = match IntentRequest::from_webhook(request) {
        Ok(intent) => state.dispatcher.dispatch(&intent).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(result) => respond(StatusCode::OK, &result),
        Err(DispatchError::UnknownAction(action)) => {
            warn!(
                action = %action,
                error_code = "unknown_action",
                "Ignoring unknown action"
            );
            respond(
                StatusCode::BAD_REQUEST,
                &OperationResult::say(format!(
                    "Sorry, I don't know how to handle the {action} action."
                )),
            )
        }
        Err(e @ DispatchError::ClusterStatus(_)) => {
            let cluster_id = &state.dispatcher.context().cluster_id;
            error!(
                cluster_id = %cluster_id,
                error_code = e.code(),
                error = %e,
                "Failed to read cluster status"
            );
            respond(
                StatusCode::OK,
                &OperationResult::say(format!(
                    "There was an error while checking the status of the {cluster_id} cluster."
                )),
            )
        }
    }
}

/// Serialize `body` as four-space indented JSON.
fn respond<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let mut buf = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    if let Err(e) = body.serialize(&mut serializer) {
        error!(error = %e, "Failed to serialize response");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        )],
        buf,
    )
        .into_response()
}
