use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{http::StatusCode, routing::post, Json, Router};
use lab_scan_rs::client::{HttpScanApi, ScanApi};
use lab_scan_rs::config::ClientConfig;
use lab_scan_rs::error::{ScanError, CONNECTIVITY_MESSAGE};
use lab_scan_rs::orchestrator::{Orchestrator, Outcome, Phase, ResultsSurface};
use lab_scan_rs::render::{ports_table_html, ResultsView, NO_PORTS_PLACEHOLDER};
use lab_scan_rs::types::{ScanResponse, ScanResult};
use tokio::sync::Notify;

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
    last_view: Mutex<Option<ResultsView>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl ResultsSurface for Recorder {
    fn clear(&self) {
        self.events.lock().unwrap().push("clear".into());
    }

    fn show_results(&self, _result: &ScanResult, view: &ResultsView) {
        self.events
            .lock()
            .unwrap()
            .push(format!("results:{}", view.ports_found));
        *self.last_view.lock().unwrap() = Some(view.clone());
    }

    fn show_error(&self, message: &str) {
        self.events.lock().unwrap().push(format!("error:{message}"));
    }
}

/// Serve `app` on an ephemeral port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn http_api(base: String) -> HttpScanApi {
    HttpScanApi::new(&ClientConfig {
        server_url: base,
        request_timeout: None,
    })
    .unwrap()
}

#[tokio::test]
async fn empty_port_list_renders_placeholder() {
    let app = Router::new().route(
        "/api/scan",
        post(|| async {
            Json(ScanResponse::ok(ScanResult {
                command: "nmap --top-ports 20 scanme.example.com".into(),
                ..Default::default()
            }))
        }),
    );
    let orch = Orchestrator::new(http_api(serve(app).await), Recorder::default());

    let out = orch.run(&[]).await;
    let view = match out {
        Outcome::Displayed(view) => view,
        other => panic!("expected results, got {other:?}"),
    };
    assert_eq!(view.ports_found, 0);
    assert!(ports_table_html(&view).contains(NO_PORTS_PLACEHOLDER));
    assert_eq!(orch.surface().events(), vec!["clear", "results:0"]);
    assert_eq!(orch.phase(), Phase::Displaying);
}

#[tokio::test]
async fn application_error_is_shown_verbatim() {
    let app = Router::new().route(
        "/api/scan",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ScanResponse::failure("host unreachable")),
            )
        }),
    );
    let orch = Orchestrator::new(http_api(serve(app).await), Recorder::default());

    let out = orch.run(&["service_detection".to_string()]).await;
    assert_eq!(
        out,
        Outcome::Failed(ScanError::Application("host unreachable".into()))
    );
    assert_eq!(orch.surface().events(), vec!["clear", "error:host unreachable"]);
    assert!(orch.surface().last_view.lock().unwrap().is_none());
    assert_eq!(orch.phase(), Phase::Displaying);
}

#[tokio::test]
async fn non_json_body_is_a_transport_error() {
    let app = Router::new().route("/api/scan", post(|| async { "<html>oops</html>" }));
    let orch = Orchestrator::new(http_api(serve(app).await), Recorder::default());

    let out = orch.run(&[]).await;
    assert!(matches!(out, Outcome::Failed(ref e) if e.is_transport()));
    assert_eq!(
        orch.surface().events(),
        vec!["clear".to_string(), format!("error:{CONNECTIVITY_MESSAGE}")]
    );
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let orch = Orchestrator::new(http_api(format!("http://{addr}")), Recorder::default());
    let out = orch.run(&[]).await;
    assert!(matches!(out, Outcome::Failed(ScanError::Transport(_))));
    assert_eq!(orch.phase(), Phase::Displaying);

    // Still invocable afterwards.
    let again = orch.run(&[]).await;
    assert!(matches!(again, Outcome::Failed(_)));
}

#[tokio::test]
async fn stalled_backend_times_out_as_transport_error() {
    let app = Router::new().route(
        "/api/scan",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(ScanResponse::ok(ScanResult::default()))
        }),
    );
    let api = HttpScanApi::new(&ClientConfig {
        server_url: serve(app).await,
        request_timeout: Some(Duration::from_millis(50)),
    })
    .unwrap();
    let orch = Orchestrator::new(api, Recorder::default());

    let out = orch.run(&[]).await;
    assert!(matches!(out, Outcome::Failed(ScanError::Transport(_))));
    assert_eq!(
        orch.surface().events(),
        vec!["clear".to_string(), format!("error:{CONNECTIVITY_MESSAGE}")]
    );
    assert!(orch.surface().last_view.lock().unwrap().is_none());
    assert_eq!(orch.phase(), Phase::Displaying);
}

#[tokio::test]
async fn request_carries_selected_options() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen_srv = seen.clone();
    let app = Router::new().route(
        "/api/scan",
        post(move |Json(body): Json<serde_json::Value>| {
            let seen = seen_srv.clone();
            async move {
                let opts: Vec<String> = body["options"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                *seen.lock().unwrap() = opts;
                Json(ScanResponse::ok(ScanResult::default()))
            }
        }),
    );
    let orch = Orchestrator::new(http_api(serve(app).await), Recorder::default());
    let opts = vec!["service_detection".to_string(), "fast_scan".to_string()];
    orch.run(&opts).await;
    assert_eq!(*seen.lock().unwrap(), opts);
}

struct Held {
    release: Arc<Notify>,
    calls: AtomicUsize,
}

#[async_trait]
impl ScanApi for Held {
    async fn scan(&self, _options: &[String]) -> Result<ScanResult, ScanError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(ScanResult::default())
    }
}

#[tokio::test]
async fn second_run_while_pending_is_ignored() {
    let release = Arc::new(Notify::new());
    let orch = Arc::new(Orchestrator::new(
        Held {
            release: release.clone(),
            calls: AtomicUsize::new(0),
        },
        Recorder::default(),
    ));

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.run(&[]).await })
    };
    while orch.api().calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(orch.phase(), Phase::Pending);

    assert_eq!(orch.run(&["verbose".to_string()]).await, Outcome::Ignored);
    assert_eq!(orch.api().calls.load(Ordering::SeqCst), 1);
    assert_eq!(orch.surface().events(), vec!["clear"]);

    release.notify_one();
    assert!(matches!(first.await.unwrap(), Outcome::Displayed(_)));
    assert_eq!(orch.phase(), Phase::Displaying);

    // Displaying -> Pending directly, clearing the previous results first.
    release.notify_one();
    assert!(matches!(orch.run(&[]).await, Outcome::Displayed(_)));
    assert_eq!(orch.api().calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        orch.surface().events(),
        vec!["clear", "results:0", "clear", "results:0"]
    );
}
