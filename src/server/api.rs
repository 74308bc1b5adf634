//! HTTP control panel: start, watch and stop one batch at a time

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use crate::core::languages::LanguageEntry;
use crate::core::models::FailurePolicy;
use crate::processors::batch::{BatchOptions, BatchReport, BatchRunner, CancellationToken, ErrorLog};

/// State of the (single) background batch
#[derive(Debug, Default)]
struct Job {
    running: bool,
    cancel: CancellationToken,
    log: Vec<String>,
    errors: ErrorLog,
    report: Option<BatchReport>,
}

/// Application state
#[derive(Clone)]
pub struct AppState {
    runner: BatchRunner,
    job: Arc<Mutex<Job>>,
}

impl AppState {
    pub fn new(runner: BatchRunner) -> Self {
        Self {
            runner,
            job: Arc::new(Mutex::new(Job::default())),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub workspace: String,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceLanguage {
    pub locale: String,
    pub name: String,
    pub supported: bool,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    pub workspace: String,
    pub languages: Vec<WorkspaceLanguage>,
}

/// Body of `POST /batch`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BatchRequest {
    pub dry_run: bool,
    pub only_missing: bool,
    pub policy: FailurePolicy,
    /// Defaults to the configured skip list
    pub skip: Option<Vec<String>>,
    pub only: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct BatchStatus {
    pub running: bool,
    pub cancelled: bool,
    pub error_count: usize,
    pub log: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<BatchReport>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorDetail {
                message: message.into(),
                code: Some(code.to_string()),
            },
        }),
    )
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        workspace: state.runner.workspace().display().to_string(),
    })
}

/// Supported locales
async fn get_languages(State(state): State<AppState>) -> Json<Vec<LanguageEntry>> {
    Json(state.runner.catalog().entries().cloned().collect())
}

/// Bundles found in the workspace
async fn get_workspace(State(state): State<AppState>) -> Result<Json<WorkspaceResponse>, ApiError> {
    let locales = state
        .runner
        .discover_languages()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "workspace_error", e.to_string()))?;

    let catalog = state.runner.catalog();
    let languages = locales
        .into_iter()
        .map(|locale| WorkspaceLanguage {
            name: catalog.display_name(&locale),
            supported: catalog.is_supported(&locale),
            locale,
        })
        .collect();

    Ok(Json(WorkspaceResponse {
        workspace: state.runner.workspace().display().to_string(),
        languages,
    }))
}

/// Start the background batch
async fn start_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchRequest>,
) -> Result<(StatusCode, Json<BatchStatus>), ApiError> {
    let mut job = state.job.lock().await;
    if job.running {
        return Err(api_error(StatusCode::CONFLICT, "batch_running", "A batch is already running"));
    }

    let opts = BatchOptions {
        dry_run: payload.dry_run,
        only_missing: payload.only_missing,
        failure_policy: payload.policy,
        skip: payload
            .skip
            .unwrap_or_else(|| state.runner.config().default_skip.clone()),
        only: payload.only.filter(|only| !only.is_empty()),
    };

    *job = Job {
        running: true,
        ..Job::default()
    };
    job.log.push(format!(
        "Batch started (dry run: {}, policy: {})",
        opts.dry_run, opts.failure_policy
    ));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let runner = state.runner.clone().with_events(tx).with_error_log(job.errors.clone());
    let cancel = job.cancel.clone();
    let shared = state.job.clone();

    info!("Starting batch on {}", runner.workspace().display());

    let work = {
        let shared = shared.clone();
        tokio::spawn(async move {
            let collector = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    shared.lock().await.log.push(event.to_string());
                }
            });

            let result = runner.process_all(&opts, &cancel).await;
            drop(runner);
            if let Err(e) = collector.await {
                warn!("Event collector stopped: {}", e);
            }
            result
        })
    };

    // the job is released even when the worker panics
    tokio::spawn(async move {
        let outcome = work.await;
        let mut job = shared.lock().await;
        match outcome {
            Ok(Ok(report)) => {
                job.log.push(format!(
                    "Batch {}: {} translated, {} errors",
                    if report.cancelled { "stopped" } else { "finished" },
                    report.totals.translated,
                    report.totals.errors
                ));
                job.report = Some(report);
            }
            Ok(Err(e)) => {
                warn!("Batch failed: {}", e);
                job.log.push(format!("Batch failed: {}", e));
            }
            Err(e) => {
                warn!("Batch worker aborted: {}", e);
                job.log.push(format!("Batch aborted: {}", e));
            }
        }
        job.running = false;
    });

    Ok((StatusCode::ACCEPTED, Json(status_of(&job))))
}

/// Ask the running batch to stop after the current file
async fn stop_batch(State(state): State<AppState>) -> Result<Json<BatchStatus>, ApiError> {
    let mut job = state.job.lock().await;
    if !job.running {
        return Err(api_error(StatusCode::CONFLICT, "no_batch", "No batch is running"));
    }

    job.cancel.cancel();
    job.log.push("Stopping after the current file...".to_string());
    Ok(Json(status_of(&job)))
}

/// Current batch status
async fn batch_status(State(state): State<AppState>) -> Json<BatchStatus> {
    let job = state.job.lock().await;
    Json(status_of(&job))
}

fn status_of(job: &Job) -> BatchStatus {
    BatchStatus {
        running: job.running,
        cancelled: job.cancel.is_cancelled(),
        error_count: job.errors.len(),
        log: job.log.clone(),
        report: job.report.clone(),
    }
}

/// Control panel routes
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/languages", get(get_languages))
        .route("/workspace", get(get_workspace))
        .route("/batch", get(batch_status).post(start_batch))
        .route("/batch/stop", post(stop_batch))
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(runner: BatchRunner, host: String, port: u16) -> anyhow::Result<()> {
    let app = router(AppState::new(runner));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Starting control panel on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::service::testing::MockTranslator;
    use crate::processors::batch::tests::{runner, workspace};
    use assert_json_diff::{assert_json_eq, assert_json_include};
    use serde_json::json;
    use std::time::Duration;

    fn state(dir: &std::path::Path) -> AppState {
        AppState::new(runner(dir, Arc::new(MockTranslator::tagging())))
    }

    async fn wait_until_idle(state: &AppState) -> BatchStatus {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let Json(status) = batch_status(State(state.clone())).await;
                if !status.running {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("batch did not finish")
    }

    #[tokio::test]
    async fn test_workspace_lists_bundles() {
        let dir = workspace();
        let Json(response) = get_workspace(State(state(dir.path()))).await.unwrap();

        assert_json_include!(
            actual: serde_json::to_value(&response).unwrap(),
            expected: json!({
                "languages": [
                    {"locale": "de", "name": "German", "supported": true},
                    {"locale": "en", "supported": true},
                    {"locale": "fr", "supported": true},
                    {"locale": "tlh", "name": "TLH", "supported": false},
                    {"locale": "zh-Hans", "supported": true}
                ]
            })
        );
    }

    #[tokio::test]
    async fn test_languages_lists_catalog() {
        let dir = workspace();
        let Json(entries) = get_languages(State(state(dir.path()))).await;

        let zh = entries.iter().find(|e| e.locale == "zh-Hans").unwrap();
        assert_json_eq!(
            serde_json::to_value(zh).unwrap(),
            json!({"locale": "zh-Hans", "service_code": "zh-CN", "name": "Chinese (Simplified)"})
        );
    }

    #[tokio::test]
    async fn test_batch_runs_to_completion() {
        let dir = workspace();
        let state = state(dir.path());
        let request = BatchRequest {
            dry_run: true,
            only: Some(vec!["fr".to_string()]),
            ..Default::default()
        };

        let (status, _) = start_batch(State(state.clone()), Json(request)).await.unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);

        let status = wait_until_idle(&state).await;
        assert!(!status.cancelled);
        assert_eq!(status.error_count, 0);
        assert!(status.log.iter().any(|l| l.contains("Processing French (fr)")));
        assert_eq!(status.log.last().unwrap(), "Batch finished: 3 translated, 0 errors");

        assert_json_include!(
            actual: serde_json::to_value(&status.report).unwrap(),
            expected: json!({"dry_run": true, "totals": {"translated": 3, "errors": 0}})
        );
    }

    #[tokio::test]
    async fn test_panicking_batch_releases_the_job() {
        let dir = workspace();
        let mock = MockTranslator::new(|_| panic!("translator crashed"));
        let state = AppState::new(runner(dir.path(), Arc::new(mock)));
        let request = BatchRequest {
            only: Some(vec!["fr".to_string()]),
            ..Default::default()
        };

        start_batch(State(state.clone()), Json(request.clone())).await.unwrap();
        let status = wait_until_idle(&state).await;

        assert!(status.report.is_none());
        assert!(status.log.iter().any(|l| l.starts_with("Batch aborted")));

        let (status, _) = start_batch(State(state.clone()), Json(request)).await.unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        wait_until_idle(&state).await;
    }

    #[tokio::test]
    async fn test_second_batch_is_rejected_while_running() {
        let dir = workspace();
        let state = state(dir.path());
        state.job.lock().await.running = true;

        let (status, Json(body)) = start_batch(State(state.clone()), Json(BatchRequest::default()))
            .await
            .unwrap_err();

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code.as_deref(), Some("batch_running"));
    }

    #[tokio::test]
    async fn test_stop_cancels_running_batch() {
        let dir = workspace();
        let state = state(dir.path());

        let (status, _) = stop_batch(State(state.clone())).await.unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);

        let token = {
            let mut job = state.job.lock().await;
            job.running = true;
            job.cancel.clone()
        };
        let Json(status) = stop_batch(State(state.clone())).await.unwrap();

        assert!(status.cancelled);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_batch_request_defaults() {
        let request: BatchRequest = serde_json::from_value(json!({"policy": "strict"})).unwrap();
        assert_eq!(request.policy, FailurePolicy::Strict);
        assert!(!request.dry_run);
        assert!(request.skip.is_none());
    }

    #[test]
    fn test_health_check_blocking() {
        let dir = workspace();
        let Json(health) = tokio_test::block_on(health_check(State(state(dir.path()))));
        assert_eq!(health.status, "ok");
        assert_eq!(health.workspace, dir.path().display().to_string());
    }
}
