use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Form, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    config::ServerConfig,
    error::RunError,
    options::{preview_for, Catalog, OptionSet},
    render::{self, ResultsView},
    runner::{self, NmapExecutor, ScanExecutor},
    types::{ScanRequest, ScanResponse, ScanResult},
};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: ServerConfig,
    executor: Arc<dyn ScanExecutor>,
    // fires on shutdown; running scans are killed
    cancel: CancellationToken,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        executor: Arc<dyn ScanExecutor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                executor,
                cancel,
            }),
        }
    }

    pub fn target(&self) -> &str {
        &self.inner.config.target
    }

    async fn scan(&self, options: &OptionSet) -> Result<ScanResult, RunError> {
        runner::run_scan(
            self.inner.executor.as_ref(),
            options,
            self.target(),
            &self.inner.cancel,
        )
        .await
    }
}

#[derive(Debug, Serialize)]
struct TargetBody<'a> {
    target: &'a str,
}

#[derive(Debug, Serialize)]
struct PreviewBody {
    command: String,
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    #[serde(default)]
    options: Option<String>,
}

/// Build the application router: JSON API under `/api`, HTML pages, static fallback.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/options", get(get_options))
        .route("/target", get(get_target))
        .route("/preview", get(get_preview))
        .route("/scan", post(post_scan))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let static_svc =
        ServeDir::new(&state.inner.config.ui_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(index))
        .route("/scan", post(form_scan))
        .nest("/api", api)
        .fallback_service(static_svc)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Bind and serve until Ctrl+C. Scans still running at shutdown are killed.
pub async fn spawn_server(config: ServerConfig) -> Result<()> {
    let executor = NmapExecutor::new(config.nmap_bin.clone(), config.scan_timeout);
    if !executor.available() {
        warn!(bin = %config.nmap_bin.display(), "nmap not found; scans will fail");
    }

    let cancel = CancellationToken::new();
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(
        addr = %listener.local_addr()?,
        target = %config.target,
        "serving UI"
    );

    let state = AppState::new(config, Arc::new(executor), cancel.clone());

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            on_signal.cancel();
        }
    });

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

fn status_for(err: &RunError) -> StatusCode {
    match err {
        RunError::TimedOut(_) => StatusCode::REQUEST_TIMEOUT,
        RunError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        RunError::NotInstalled | RunError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Checkbox forms send one key per ticked option.
fn selected_from_form(fields: &HashMap<String, String>) -> OptionSet {
    OptionSet::from_identifiers(fields.keys())
}

async fn get_options() -> impl IntoResponse {
    Json(Catalog)
}

async fn get_target(State(app): State<AppState>) -> impl IntoResponse {
    Json(TargetBody {
        target: app.target(),
    })
    .into_response()
}

async fn get_preview(
    State(app): State<AppState>,
    Query(q): Query<PreviewQuery>,
) -> impl IntoResponse {
    let raw = q.options.unwrap_or_default();
    let options = OptionSet::from_identifiers(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty()),
    );
    Json(PreviewBody {
        command: preview_for(&options, app.target()),
    })
}

async fn post_scan(State(app): State<AppState>, body: Bytes) -> Response {
    // A missing body means no options, matching what the browser page sends.
    let req: ScanRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ScanRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ScanResponse::failure(format!("invalid request body: {e}"))),
                )
                    .into_response()
            }
        }
    };

    let options = OptionSet::from_identifiers(&req.options);
    match app.scan(&options).await {
        Ok(result) => (StatusCode::OK, Json(ScanResponse::ok(result))).into_response(),
        Err(e) => {
            warn!(error = %e, "scan failed");
            (status_for(&e), Json(ScanResponse::failure(e.to_string()))).into_response()
        }
    }
}

async fn index(
    State(app): State<AppState>,
    Query(fields): Query<HashMap<String, String>>,
) -> Html<String> {
    let selected = if fields.contains_key("submitted") {
        selected_from_form(&fields)
    } else {
        OptionSet::defaults()
    };
    Html(render::index_page(
        app.target(),
        &selected,
        app.inner.executor.available(),
    ))
}

async fn form_scan(
    State(app): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let selected = selected_from_form(&fields);
    match app.scan(&selected).await {
        Ok(result) => {
            let view = ResultsView::from_result(&result);
            Html(render::results_page(app.target(), &selected, &view)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "scan failed");
            (
                status_for(&e),
                Html(render::error_page(app.target(), &selected, &e.to_string())),
            )
                .into_response()
        }
    }
}
