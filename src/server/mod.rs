//! HTTP serving layer.
//!
//! Routes:
//! - `POST /run` — start a scan, respond with the live output stream
//! - `POST /input` — inject a line into the running command's terminal
//! - `POST /stop` — request cancellation at the next command boundary
//! - `POST /verify` — check a transcript digest against the notary ledger
//! - `POST /summarize` — summarize a report through the local model
//! - `GET /health` — liveness and session state
//!
//! The `/run` handler is also the streaming consumer: its response body
//! drains the run's output queue chunk by chunk, so the caller sees
//! terminal output in near real time while `/input` runs on a separate
//! serving task.

pub mod messages;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures_util::stream;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::constants::STREAM_POP_TIMEOUT;
use crate::notary::Ledger;
use crate::scan;
use crate::session::{
    InputError, PostRunHook, RunSpec, Session, SessionState, StartError, StreamEvent,
};
use crate::summarize;
use messages::{
    ErrorResponse, HealthResponse, InputRequest, RunRequest, StatusResponse, SummarizeRequest,
    SummarizeResponse, VerifyRequest, VerifyResponse,
};

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The process-wide interactive session.
    pub session: Arc<Session>,
    /// Daemon configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the state for a fresh daemon.
    pub fn new(config: Config) -> Self {
        Self {
            session: Arc::new(Session::new()),
            config: Arc::new(config),
        }
    }
}

/// Build the API router. CORS is fully permissive so browser dashboards
/// on other origins can drive the daemon directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/run", post(run_scan))
        .route("/input", post(send_input))
        .route("/stop", post(stop_scan))
        .route("/verify", post(verify_report))
        .route("/summarize", post(summarize_report))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is terminated.
pub async fn serve(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.bind_addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("opscan listening on {addr}");

    let state = AppState::new(config);
    axum::serve(listener, router(state).into_make_service())
        .await
        .context("server terminated")
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// The post-run hook for the configured notary, if enabled.
///
/// Notary lines go to the queue only: appending them to the transcript
/// would change the digest that was just recorded.
fn notary_hook(config: &Config) -> Option<PostRunHook> {
    if !config.notary_enabled {
        return None;
    }
    let ledger = Ledger::new(config.ledger_path.clone());
    Some(Box::new(move |report, mux| {
        let scan_id = format!("scan_{}", chrono::Utc::now().timestamp());
        mux.queue_only(format!(
            "\n[Notary] Recording report hash under scan id {scan_id}...\n"
        ));
        match ledger.record(report, &scan_id) {
            Ok(entry) => {
                mux.queue_only(format!("[Notary] Recorded. Hash: {}\n", entry.report_hash));
            }
            Err(err) => {
                log::error!("notarization failed: {err:#}");
                mux.queue_only(format!("[Notary] Failed: {err}\n"));
            }
        }
    }))
}

/// `POST /run`: start a scan and stream its output.
///
/// Rejections happen before any streaming byte: `409` while another run
/// is active, `403` without consent, `400` for an unusable target. On
/// acceptance the response body is chunked `text/plain` that ends with
/// the completion marker — never a partial, ambiguous terminal state.
async fn run_scan(State(state): State<AppState>, Json(req): Json<RunRequest>) -> Response {
    if state.session.is_active() {
        return error_response(StatusCode::CONFLICT, "Scan already in progress");
    }

    if !req.consent.user_confirmation {
        return error_response(
            StatusCode::FORBIDDEN,
            "User consent denied. Execution blocked.",
        );
    }

    let plan = match scan::build_plan(&req.target_ip, &req.target_network, &req.options) {
        Ok(plan) => plan,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let spec = RunSpec {
        commands: plan.commands,
        notes: plan.notes,
        transcript_path: state.config.report_path.clone(),
        command_budget: state.config.command_budget(),
    };

    let rx = match state.session.start_run(spec, notary_hook(&state.config)) {
        Ok(rx) => rx,
        Err(StartError::Busy) => {
            return error_response(StatusCode::CONFLICT, "Scan already in progress")
        }
        Err(err @ StartError::Setup(_)) => {
            log::error!("failed to start run: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to start scan");
        }
    };

    // The streaming consumer: bounded pops so a missed sentinel cannot
    // hang the response — on timeout, an idle session with a drained
    // queue means the run is over.
    let session = Arc::clone(&state.session);
    let body = stream::unfold(rx, move |mut rx| {
        let session = Arc::clone(&session);
        async move {
            loop {
                match tokio::time::timeout(STREAM_POP_TIMEOUT, rx.recv()).await {
                    Ok(Some(StreamEvent::Chunk(text))) => {
                        return Some((Ok::<Bytes, Infallible>(Bytes::from(text)), rx));
                    }
                    Ok(Some(StreamEvent::EndOfSession)) | Ok(None) => return None,
                    Err(_elapsed) => {
                        if session.state() == SessionState::Idle && rx.is_empty() {
                            return None;
                        }
                    }
                }
            }
        }
    });

    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response()
}

/// `POST /input`: write a line into the running command's terminal.
async fn send_input(State(state): State<AppState>, Json(req): Json<InputRequest>) -> Response {
    match state.session.send_input(&req.input) {
        Ok(()) => (StatusCode::OK, Json(StatusResponse { status: "sent" })).into_response(),
        Err(InputError::NoActiveSession) => {
            error_response(StatusCode::BAD_REQUEST, "No active interactive session")
        }
        Err(err @ InputError::Write(_)) => {
            log::warn!("input injection failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to write to process")
        }
    }
}

/// `POST /stop`: request cancellation at the next command boundary.
async fn stop_scan(State(state): State<AppState>) -> Response {
    if state.session.request_stop() {
        (
            StatusCode::OK,
            Json(StatusResponse {
                status: "stopping",
            }),
        )
            .into_response()
    } else {
        error_response(StatusCode::BAD_REQUEST, "No active session to stop")
    }
}

/// `POST /verify`: check a transcript digest against the ledger.
async fn verify_report(State(state): State<AppState>, Json(req): Json<VerifyRequest>) -> Response {
    if !state.config.notary_enabled {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Notary disabled");
    }

    let ledger = Ledger::new(state.config.ledger_path.clone());
    let result = match req.report {
        Some(ref text) => ledger.verify_text(text, &req.scan_id),
        None => {
            if !state.config.report_path.exists() {
                return error_response(
                    StatusCode::NOT_FOUND,
                    "No local report found and no report provided",
                );
            }
            ledger.verify_file(&state.config.report_path, &req.scan_id)
        }
    };

    match result {
        Ok(valid) => (
            StatusCode::OK,
            Json(VerifyResponse {
                valid,
                scan_id: req.scan_id,
            }),
        )
            .into_response(),
        Err(err) => {
            log::error!("verification failed: {err:#}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Verification failed")
        }
    }
}

/// `POST /summarize`: run the report through the local model.
async fn summarize_report(
    State(state): State<AppState>,
    Json(req): Json<SummarizeRequest>,
) -> Response {
    let report = match req.report {
        Some(text) if !text.is_empty() => text,
        _ => {
            // Fall back to the last generated transcript.
            match std::fs::read_to_string(&state.config.report_path) {
                Ok(text) => text,
                Err(_) => {
                    return error_response(
                        StatusCode::BAD_REQUEST,
                        "No report content provided or found locally",
                    )
                }
            }
        }
    };

    match summarize::summarize_report(&report, &state.config.summarizer_model).await {
        Ok(summary) => (StatusCode::OK, Json(SummarizeResponse { summary })).into_response(),
        Err(err) => {
            log::error!("summarization failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// `GET /health`: liveness and current session state.
async fn health(State(state): State<AppState>) -> Response {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            session: state.session.state().as_str(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(dir: &tempfile::TempDir) -> AppState {
        AppState::new(Config {
            report_path: dir.path().join("report.txt"),
            ledger_path: dir.path().join("ledger.json"),
            notary_enabled: false,
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_input_without_session_returns_400() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);
        let response = send_input(
            State(state),
            Json(InputRequest {
                input: "secret".to_string(),
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_run_without_consent_returns_403() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);
        let req: RunRequest = serde_json::from_str("{}").expect("parse");
        let response = run_scan(State(state), Json(req)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_stop_when_idle_returns_400() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);
        let response = stop_scan(State(state)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_verify_with_notary_disabled_returns_503() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);
        let response = verify_report(
            State(state),
            Json(VerifyRequest {
                scan_id: "scan_1".to_string(),
                report: None,
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_reports_idle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);
        let response = health(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_run_with_consent_streams_to_completion() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);
        let req: RunRequest =
            serde_json::from_str(r#"{"consent": {"user_confirmation": true}}"#).expect("parse");

        let response = run_scan(State(state), Json(req)).await;
        assert_eq!(response.status(), StatusCode::OK);

        // An empty command list must still produce a bounded stream with
        // the header and completion marker.
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("collect stream");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("=== SESSION STARTED:"));
        assert!(text.contains("=== SCAN COMPLETE ==="));
    }

    #[tokio::test]
    async fn test_second_run_while_active_returns_409() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(&dir);

        // Hold the session busy with a short sleep command.
        let spec = RunSpec {
            commands: vec!["sleep 1".to_string()],
            notes: Vec::new(),
            transcript_path: dir.path().join("busy.txt"),
            command_budget: None,
        };
        let _rx = state.session.start_run(spec, None).expect("first run");

        let req: RunRequest =
            serde_json::from_str(r#"{"consent": {"user_confirmation": true}}"#).expect("parse");
        let response = run_scan(State(state.clone()), Json(req)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
