//! HTTP surface.
//!
//! ## Endpoints
//!
//! - `GET  /`              - banner
//! - `POST /provision`     - submit `{hostname, ssid, psk, notify?}`
//! - `POST /cancel`        - request cancellation of the running job
//! - `GET  /status`        - latest status event (JSON, `null` before any job)
//! - `GET  /status/events` - SSE stream: latest event first, then live events

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::stream::Stream;
use reqwest::Url;
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::coordinator::JobCoordinator;
use crate::request::{Credentials, ProvisioningRequest};
use crate::session::SessionProvider;
use crate::state_machine::{JobPlan, Rejection};
use crate::status::StatusEvent;

const BANNER: &str = "Router provisioner ready";

/// What the handlers share.
pub struct AppState<P: SessionProvider> {
    pub jobs: Arc<JobCoordinator<P>>,
    pub credentials: Credentials,
    pub hostname_prefix: String,
}

pub fn router<P: SessionProvider>(state: Arc<AppState<P>>) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/provision", post(provision::<P>))
        .route("/cancel", post(cancel::<P>))
        .route("/status", get(status::<P>))
        .route("/status/events", get(status_events::<P>))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve<P: SessionProvider>(state: Arc<AppState<P>>, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            // An error here means no signal handler; keep serving.
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn banner() -> &'static str {
    BANNER
}

/// POST /provision
async fn provision<P: SessionProvider>(
    State(app): State<Arc<AppState<P>>>,
    body: Bytes,
) -> Response {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}")).into_response();
        }
    };

    let request =
        match ProvisioningRequest::from_json(&body, app.credentials.clone(), &app.hostname_prefix) {
            Ok(request) => request,
            Err(e) => {
                tracing::info!(error = %e, "rejected provisioning request");
                return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
            }
        };

    let notify = match body.get("notify") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                return (StatusCode::BAD_REQUEST, format!("Invalid notify URL: {e}"))
                    .into_response();
            }
        },
        Some(_) => {
            return (StatusCode::BAD_REQUEST, "notify must be a string").into_response();
        }
    };

    match app.jobs.submit(JobPlan::Provision(request), notify) {
        Ok(handle) => (StatusCode::ACCEPTED, Json(json!({ "job_id": handle.id }))).into_response(),
        Err(rejection) => (StatusCode::SERVICE_UNAVAILABLE, rejection.to_string()).into_response(),
    }
}

/// POST /cancel
async fn cancel<P: SessionProvider>(State(app): State<Arc<AppState<P>>>) -> Response {
    match app.jobs.cancel() {
        Ok(()) => (StatusCode::OK, "cancel requested").into_response(),
        Err(rejection @ (Rejection::NotProvisioning | Rejection::CancelAlreadyRequested)) => {
            (StatusCode::CONFLICT, rejection.to_string()).into_response()
        }
        Err(rejection) => (StatusCode::INTERNAL_SERVER_ERROR, rejection.to_string()).into_response(),
    }
}

/// GET /status
async fn status<P: SessionProvider>(
    State(app): State<Arc<AppState<P>>>,
) -> Json<Option<StatusEvent>> {
    Json(app.jobs.current_status())
}

/// GET /status/events
async fn status_events<P: SessionProvider>(
    State(app): State<Arc<AppState<P>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = app.jobs.subscribe();

    let snapshot = tokio_stream::iter(
        subscription
            .snapshot
            .map(|event| Ok::<_, Infallible>(sse_event(&event))),
    );
    let live = BroadcastStream::new(subscription.receiver).filter_map(|result| match result {
        Ok(event) => Some(Ok(sse_event(&event))),
        Err(_) => None, // Lagged
    });

    Sse::new(snapshot.chain(live)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn sse_event(event: &StatusEvent) -> Event {
    let json = serde_json::to_string(event).unwrap_or_default();
    Event::default().event("status").data(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timings;
    use crate::session::fake::{FakeProvider, FakeRouter};
    use crate::state_machine::JobState;
    use crate::status::Notifier;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(router: FakeRouter, prefix: &str) -> Arc<AppState<FakeProvider>> {
        let jobs = Arc::new(JobCoordinator::new(
            FakeProvider::new(router),
            "http://192.168.88.1",
            Timings::default(),
            Notifier::new(),
        ));
        Arc::new(AppState {
            jobs,
            credentials: Credentials::new("main-pw", vec![]),
            hostname_prefix: prefix.to_string(),
        })
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn banner_is_served() {
        let response = router(app(FakeRouter::factory_fresh(), ""))
            .oneshot(get("/"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, BANNER);
    }

    #[tokio::test]
    async fn invalid_requests_get_the_validation_message() {
        let state = app(FakeRouter::factory_fresh(), "");
        let cases = [
            (json!({"hostname": 5, "ssid": "s", "psk": "12345678"}), "Hostname must be a string"),
            (
                json!({"hostname": "bad host", "ssid": "s", "psk": "12345678"}),
                "Hostname must be a valid hostname: A-Za-z0-9 and -_",
            ),
            (json!({"hostname": "ap", "psk": "12345678"}), "SSID must be a string"),
            (json!({"hostname": "ap", "ssid": "s", "psk": "short"}), "PSK must be at least 8 characters"),
        ];
        for (body, message) in cases {
            let response = router(state.clone())
                .oneshot(post("/provision", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(text(response).await, message);
        }
        assert_eq!(state.jobs.state(), JobState::Idle);
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/provision")
            .body(Body::from("{not json"))
            .unwrap();
        let response = router(app(FakeRouter::factory_fresh(), ""))
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn bad_notify_url_is_rejected() {
        let body = json!({"hostname": "ap", "ssid": "s", "psk": "12345678", "notify": "not a url"});
        let response = router(app(FakeRouter::factory_fresh(), ""))
            .oneshot(post("/provision", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(start_paused = true)]
    async fn accepted_job_runs_then_second_is_rejected() {
        let fake = FakeRouter::factory_fresh();
        let state = app(fake.clone(), "site1-");
        let body = json!({"hostname": "ap", "ssid": "OfficeWifi", "psk": "12345678"});

        let response = router(state.clone())
            .oneshot(post("/provision", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let reply: Value = serde_json::from_str(&text(response).await).unwrap();
        assert!(reply["job_id"].is_string());

        let response = router(state.clone())
            .oneshot(post("/provision", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(text(response).await, "already provisioning");

        while state.jobs.state().is_active() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(fake.field("#hostname").as_deref(), Some("site1-ap"));

        let response = router(state).oneshot(get("/status")).await.unwrap();
        let status: Value = serde_json::from_str(&text(response).await).unwrap();
        assert_eq!(status["type"], "success");
    }

    #[tokio::test]
    async fn prefix_is_validated_with_the_hostname() {
        let body = json!({"hostname": "ap", "ssid": "s", "psk": "12345678"});
        let response = router(app(FakeRouter::factory_fresh(), "bad prefix "))
            .oneshot(post("/provision", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_without_job_conflicts() {
        let response = router(app(FakeRouter::factory_fresh(), ""))
            .oneshot(post("/cancel", Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(text(response).await, "not provisioning");
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_running() {
        let state = app(FakeRouter::factory_fresh(), "");
        let body = json!({"hostname": "ap", "ssid": "s", "psk": "12345678"});
        router(state.clone())
            .oneshot(post("/provision", body))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let response = router(state.clone())
            .oneshot(post("/cancel", Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router(state.clone())
            .oneshot(post("/cancel", Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(text(response).await, "cancel already requested");
    }

    #[tokio::test]
    async fn status_is_null_before_any_job() {
        let response = router(app(FakeRouter::factory_fresh(), ""))
            .oneshot(get("/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "null");
    }

    #[tokio::test(start_paused = true)]
    async fn event_stream_starts_with_the_snapshot() {
        let state = app(FakeRouter::factory_fresh(), "");
        let body = json!({"hostname": "ap", "ssid": "s", "psk": "12345678"});
        router(state.clone())
            .oneshot(post("/provision", body))
            .await
            .unwrap();
        while state.jobs.state().is_active() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let response = router(state).oneshot(get("/status/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let mut frames = response.into_body().into_data_stream();
        let first = frames.next().await.unwrap().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: status\n"));
        assert!(first.contains(r#"data: {"type":"success"}"#));
    }
}
