//! Webhook endpoint and its status mapping.

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tower_http::trace::TraceLayer;

use cascade_bitbucket::{PullRequestEvent, PullRequestState};

/// Header carrying the optional shared webhook secret.
pub const TOKEN_HEADER: &str = "x-webhook-token";

/// Shared state of the webhook endpoint.
#[derive(Clone)]
pub struct AppState {
    /// Producer side of the bounded event queue.
    pub events: mpsc::Sender<PullRequestEvent>,
    /// Expected token; `None` disables the check.
    pub token: Option<String>,
}

/// Build the webhook router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(receive))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reject requests whose token header does not match the configured
/// shared secret.
async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(expected) = &state.token {
        let supplied = request
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if supplied != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }
    next.run(request).await
}

/// Accept a pull-request event and hand it to the worker.
///
/// The enqueue is non-blocking: a full queue answers 429 and the event
/// is dropped.
async fn receive(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let event: PullRequestEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(error) => {
            tracing::debug!(%error, "rejecting undecodable payload");
            return StatusCode::BAD_REQUEST;
        }
    };

    let Some(pull_request) = event.pull_request.as_ref() else {
        return StatusCode::BAD_REQUEST;
    };

    // take only merged state
    if pull_request.state != PullRequestState::Merged {
        return StatusCode::UNPROCESSABLE_ENTITY;
    }

    match state.events.try_send(event) {
        Ok(()) => StatusCode::CREATED,
        Err(TrySendError::Full(_)) => {
            tracing::warn!("event queue full, dropping event");
            StatusCode::TOO_MANY_REQUESTS
        }
        Err(TrySendError::Closed(_)) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MERGED: &str = include_str!("../tests/fixtures/hook-pull-request-fulfilled.json");
    const CREATED: &str = include_str!("../tests/fixtures/hook-pull-request-created.json");
    const PUSH: &str = include_str!("../tests/fixtures/hook-push.json");
    const GARBAGE: &str = include_str!("../tests/fixtures/hook-bad-request.json");

    /// Serve the router on an ephemeral port, returning its base URL
    /// and the consumer side of the queue.
    async fn spawn_app(
        capacity: usize,
        token: Option<&str>,
    ) -> (String, mpsc::Receiver<PullRequestEvent>) {
        let (events, queue) = mpsc::channel(capacity);
        let app = router(AppState {
            events,
            token: token.map(String::from),
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{address}/"), queue)
    }

    async fn post_payload(url: &str, payload: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(url)
            .body(payload.to_string())
            .send()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn merged_event_is_enqueued() {
        let (url, mut queue) = spawn_app(8, None).await;

        let response = post_payload(&url, MERGED).await;
        assert_eq!(response.status(), 201);

        let event = queue.recv().await.unwrap();
        assert_eq!(
            event.pull_request.unwrap().destination.branch.name,
            "release/48"
        );
    }

    #[tokio::test]
    async fn non_merged_state_is_unprocessable() {
        let (url, mut queue) = spawn_app(8, None).await;

        let response = post_payload(&url, CREATED).await;
        assert_eq!(response.status(), 422);
        assert!(queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn push_event_is_a_bad_request() {
        let (url, _queue) = spawn_app(8, None).await;

        let response = post_payload(&url, PUSH).await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn undecodable_body_is_a_bad_request() {
        let (url, _queue) = spawn_app(8, None).await;

        let response = post_payload(&url, GARBAGE).await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn full_queue_answers_too_many_requests() {
        let (url, mut queue) = spawn_app(1, None).await;

        assert_eq!(post_payload(&url, MERGED).await.status(), 201);
        assert_eq!(post_payload(&url, MERGED).await.status(), 429);

        // the queue still holds exactly the first event
        assert!(queue.try_recv().is_ok());
        assert!(queue.try_recv().is_err());
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let (url, _queue) = spawn_app(8, Some("hunter2")).await;

        let response = post_payload(&url, MERGED).await;
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized() {
        let (url, _queue) = spawn_app(8, Some("hunter2")).await;

        let response = reqwest::Client::new()
            .post(&url)
            .header(TOKEN_HEADER, "nope")
            .body(MERGED.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }

    #[tokio::test]
    async fn matching_token_is_accepted() {
        let (url, mut queue) = spawn_app(8, Some("hunter2")).await;

        let response = reqwest::Client::new()
            .post(&url)
            .header(TOKEN_HEADER, "hunter2")
            .body(MERGED.to_string())
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 201);
        assert!(queue.recv().await.is_some());
    }
}
