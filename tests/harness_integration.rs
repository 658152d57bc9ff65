// tests/harness_integration.rs
// End-to-end runs against an in-process target service
//
// Covers:
// 1. HTTP success with a JSON body ("Found N")
// 2. Expected auth failures (401/403) and basic-auth credentials
// 3. Status mismatch, decode errors and HTTP timeouts
// 4. WebSocket sessions: echo, silence, refused connections
// 5. Ordering, parallel dispatch and repeatability

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

use endpoint_check::config::HarnessConfig;
use endpoint_check::harness::{
    BasicAuth, ErrorKind, Expectation, HttpAction, Probe, ProbeGroup, ProbeKind, ProbeRunner, RunSummary, WsAction,
    WsStep,
};
use endpoint_check::plans::{Entry, PlanParser, ProbePlan, Section};
use endpoint_check::reporters::ConsoleReporter;

// ============================================================================
// TEST TARGET
// ============================================================================

const EXPECTED_AUTH: &str = "Basic dGVzdHVzZXI6cGFzc3dvcmQxMjM=";

struct Target {
    http: String,
    ws: String,
}

/// Starts the target service on an ephemeral port
async fn spawn_target() -> Target {
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/bounties/auctions/", get(list_auctions))
        .route("/bounties/auctions/create/", post(|| async { StatusCode::UNAUTHORIZED }))
        .route("/api/", get(protected_bounties))
        .route("/broken/", get(|| async { "<html>not json</html>" }))
        .route("/slow/", get(slow))
        .route("/error/", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database is locked") }))
        .route("/ws/echo/", get(echo_ws))
        .route("/ws/silent/", get(silent_ws));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Target {
        http: format!("http://{}", addr),
        ws: format!("ws://{}", addr),
    }
}

async fn list_auctions() -> Json<serde_json::Value> {
    Json(json!({
        "count": 2,
        "results": [
            { "id": 1, "title": "Vintage guitar", "current_bid": 120 },
            { "id": 2, "title": "Signed poster", "current_bid": 45 }
        ]
    }))
}

async fn protected_bounties(headers: HeaderMap) -> Response {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(EXPECTED_AUTH) => Json(json!({
            "count": 1,
            "results": [{ "title": "Fix login bug", "reward": 50 }]
        }))
        .into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "late"
}

async fn echo_ws(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        while let Some(Ok(msg)) = socket.recv().await {
            match msg {
                Message::Text(text) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    })
}

async fn silent_ws(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(|mut socket: WebSocket| async move {
        while let Some(Ok(msg)) = socket.recv().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    })
}

/// A port nothing listens on
fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

// ============================================================================
// HELPERS
// ============================================================================

fn config_for(target: &Target) -> HarnessConfig {
    HarnessConfig {
        base_url: target.http.clone(),
        ws_url: format!("{}/ws/echo/", target.ws),
        connect_timeout: Duration::from_secs(2),
        http_timeout: Duration::from_secs(5),
        ws_timeout: Duration::from_secs(1),
        credentials: Some(BasicAuth {
            username: "testuser".to_string(),
            password: Some("password123".to_string()),
        }),
        ..Default::default()
    }
}

fn plan(entries: Vec<Entry>) -> ProbePlan {
    ProbePlan {
        name: "integration".to_string(),
        description: String::new(),
        sections: vec![Section {
            title: "INTEGRATION".to_string(),
            entries,
        }],
        guidance: vec!["Start the target first".to_string()],
    }
}

async fn run(config: HarnessConfig, plans: &[ProbePlan]) -> (RunSummary, String) {
    let runner = ProbeRunner::new(config).unwrap();
    let mut reporter = ConsoleReporter::new(Vec::new(), false);
    let summary = runner.run(plans, &mut reporter).await;
    (summary, String::from_utf8(reporter.into_inner()).unwrap())
}

fn json_count(noun: &str) -> Expectation {
    Expectation::Json {
        status: 200,
        fields: vec!["results".to_string()],
        count_field: Some("count".to_string()),
        noun: Some(noun.to_string()),
    }
}

// ============================================================================
// HTTP
// ============================================================================

#[tokio::test]
async fn http_success_reports_found_count() {
    let target = spawn_target().await;
    let probe = Probe::http("GET /bounties/auctions/", HttpAction::get("/bounties/auctions/"))
        .with_expectation(json_count("auctions"));

    let (summary, output) = run(config_for(&target), &[plan(vec![Entry::Probe(probe)])]).await;

    let outcome = summary.get("GET /bounties/auctions/").unwrap();
    assert!(outcome.succeeded, "{:?}", outcome);
    assert!(outcome.detail.contains("Found 2"));
    assert!(output.contains("PASS GET /bounties/auctions/\n     Found 2 auctions"));
    assert!(output.contains("RESULT: PASSED"));
}

#[tokio::test]
async fn expected_auth_failures_pass() {
    let target = spawn_target().await;
    let entries = vec![
        Entry::Probe(
            Probe::http(
                "create without auth",
                HttpAction::post_json("/bounties/auctions/create/", json!({"title": "Test", "description": "Test"})),
            )
            .with_expectation(Expectation::StatusIn { codes: vec![401, 403] })
            .with_note("Endpoint exists (auth required)"),
        ),
        Entry::Probe(
            Probe::http("bounties without auth", HttpAction::get("/api/"))
                .with_expectation(Expectation::Status { code: 401 }),
        ),
        Entry::Probe(
            Probe::http(
                "bounties with auth",
                HttpAction { use_credentials: true, ..HttpAction::get("/api/") },
            )
            .with_expectation(json_count("bounties")),
        ),
    ];

    let (summary, output) = run(config_for(&target), &[plan(entries)]).await;

    assert!(summary.all_passed(), "{}", output);
    assert_eq!(summary.get("create without auth").unwrap().detail, "Endpoint exists (auth required)");
    assert_eq!(summary.get("bounties with auth").unwrap().detail, "Found 1 bounties");
}

#[tokio::test]
async fn unauthenticated_success_is_unexpected() {
    let target = spawn_target().await;
    let probe = Probe::http("listing must be protected", HttpAction::get("/bounties/auctions/"))
        .with_expectation(Expectation::StatusIn { codes: vec![401, 403] });

    let (summary, _) = run(config_for(&target), &[plan(vec![Entry::Probe(probe)])]).await;

    let outcome = &summary.outcomes[0];
    assert!(!outcome.succeeded);
    assert_eq!(outcome.error_kind, Some(ErrorKind::UnexpectedSuccess));
    assert!(outcome.detail.contains("200"));
}

#[tokio::test]
async fn status_mismatch_names_observed_code() {
    let target = spawn_target().await;
    let probe = Probe::http("missing page", HttpAction::get("/does-not-exist/"));

    let (summary, output) = run(config_for(&target), &[plan(vec![Entry::Probe(probe)])]).await;

    let outcome = &summary.outcomes[0];
    assert!(!outcome.succeeded);
    assert_eq!(outcome.error_kind, Some(ErrorKind::UnexpectedStatus));
    assert!(outcome.detail.contains("404"));
    assert!(output.contains("FAIL missing page"));
    assert!(output.contains("RESULT: FAILED"));
}

#[tokio::test]
async fn non_json_body_is_decode_error() {
    let target = spawn_target().await;
    let probe = Probe::http("broken body", HttpAction::get("/broken/")).with_expectation(Expectation::Json {
        status: 200,
        fields: vec![],
        count_field: None,
        noun: None,
    });

    let (summary, _) = run(config_for(&target), &[plan(vec![Entry::Probe(probe)])]).await;

    let outcome = &summary.outcomes[0];
    assert!(!outcome.succeeded);
    assert_eq!(outcome.error_kind, Some(ErrorKind::DecodeError));
    assert!(outcome.detail.contains("<html>not json</html>"));
}

#[tokio::test]
async fn server_error_detail_shows_response_body() {
    let target = spawn_target().await;
    let probe = Probe::http("claimed bounties", HttpAction::get("/error/"));

    let (summary, output) = run(config_for(&target), &[plan(vec![Entry::Probe(probe)])]).await;

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.error_kind, Some(ErrorKind::UnexpectedStatus));
    assert_eq!(outcome.detail, "Expected 200, got 500. Response: database is locked");
    assert!(output.contains("database is locked"));
}

#[tokio::test]
async fn bundled_bounties_plan_runs() {
    let target = spawn_target().await;
    let mut config = config_for(&target);
    config.base_url = format!("{}/api", target.http);

    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("plans/bounties.yaml");
    let plans = PlanParser::load(Some(&path)).unwrap();

    let (summary, output) = run(config, &plans).await;

    assert!(summary.all_passed(), "{}", output);
    assert_eq!(summary.get("GET bounties with auth").unwrap().detail, "Found 1 bounties");
    assert_eq!(summary.get("GET bounties without auth").unwrap().detail, "Authentication required");
    assert!(output.contains("Next steps:"));
}

#[tokio::test]
async fn slow_http_response_times_out() {
    let target = spawn_target().await;
    let probe = Probe::http("slow endpoint", HttpAction::get("/slow/")).with_timeout(Duration::from_millis(200));

    let start = Instant::now();
    let (summary, _) = run(config_for(&target), &[plan(vec![Entry::Probe(probe)])]).await;

    assert!(start.elapsed() < Duration::from_secs(2));
    let outcome = &summary.outcomes[0];
    assert!(!outcome.succeeded);
    assert_eq!(outcome.error_kind, Some(ErrorKind::Timeout));
}

#[tokio::test]
async fn unreachable_target_is_connection_error() {
    let config = HarnessConfig {
        base_url: format!("http://127.0.0.1:{}", closed_port()),
        connect_timeout: Duration::from_secs(2),
        ..Default::default()
    };
    let probe = Probe::http("Django Server", HttpAction::get("/"));

    let (summary, output) = run(config, &[plan(vec![Entry::Probe(probe)])]).await;

    let outcome = &summary.outcomes[0];
    assert!(!outcome.succeeded);
    assert_eq!(outcome.error_kind, Some(ErrorKind::ConnectionError));
    assert!(output.contains("[connection-error]"));
    // The run still completes with a summary
    assert!(output.contains("Total:    1"));
}

// ============================================================================
// WEBSOCKET
// ============================================================================

fn session(name: &str, url: Option<String>, receive_timeout: Duration) -> ProbeGroup {
    ProbeGroup {
        name: name.to_string(),
        url,
        connect_timeout_seconds: None,
        probes: vec![
            Probe::websocket(&format!("{} connect", name), WsStep::Connect),
            Probe::websocket(
                &format!("{} send", name),
                WsStep::Send { message: json!({"type": "test", "message": "Hello from integration test"}) },
            ),
            Probe::websocket(&format!("{} receive", name), WsStep::Receive)
                .with_timeout(receive_timeout)
                .with_expectation(Expectation::JsonMessage { fields: vec!["type".to_string()] }),
        ],
    }
}

#[tokio::test]
async fn websocket_echo_session_passes() {
    let target = spawn_target().await;
    let group = session("echo", None, Duration::from_secs(2));

    let (summary, output) = run(config_for(&target), &[plan(vec![Entry::Group(group)])]).await;

    assert!(summary.all_passed(), "{}", output);
    assert_eq!(summary.get("echo connect").unwrap().detail, "Connected successfully");
    assert_eq!(summary.get("echo send").unwrap().detail, "Message sent successfully");
    assert!(summary.get("echo receive").unwrap().detail.contains("Hello from integration test"));
}

#[tokio::test]
async fn websocket_silence_is_timeout() {
    let target = spawn_target().await;
    let url = Some(format!("{}/ws/silent/", target.ws));
    let group = session("silent", url, Duration::from_millis(300));

    let start = Instant::now();
    let (summary, _) = run(config_for(&target), &[plan(vec![Entry::Group(group)])]).await;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(summary.get("silent connect").unwrap().succeeded);
    assert!(summary.get("silent send").unwrap().succeeded);
    let receive = summary.get("silent receive").unwrap();
    assert!(!receive.succeeded);
    assert_eq!(receive.error_kind, Some(ErrorKind::Timeout));
    assert_eq!(receive.detail, "no response received");
}

#[tokio::test]
async fn websocket_closed_port_fails_every_step() {
    let target = spawn_target().await;
    let url = Some(format!("ws://127.0.0.1:{}/ws/", closed_port()));
    let group = session("closed", url, Duration::from_millis(300));

    let (summary, _) = run(config_for(&target), &[plan(vec![Entry::Group(group)])]).await;

    assert_eq!(summary.total(), 3);
    for outcome in &summary.outcomes {
        assert!(!outcome.succeeded);
        assert_eq!(outcome.error_kind, Some(ErrorKind::ConnectionError));
    }
}

#[tokio::test]
async fn secure_websocket_target_reaches_the_network() {
    let target = spawn_target().await;
    let probe = Probe {
        kind: ProbeKind::Websocket(WsAction {
            url: Some(format!("wss://127.0.0.1:{}/ws/", closed_port())),
            step: WsStep::Connect,
        }),
        ..Probe::websocket("secure connect", WsStep::Connect)
    };

    let (summary, _) = run(config_for(&target), &[plan(vec![Entry::Probe(probe)])]).await;

    // Refused at the TCP layer, not rejected for lack of TLS support
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.error_kind, Some(ErrorKind::ConnectionError));
    assert!(!outcome.detail.contains("TLS support not compiled in"), "{}", outcome.detail);
}

#[tokio::test]
async fn websocket_readiness_probe() {
    let target = spawn_target().await;
    let up = Probe::websocket("Daphne Server", WsStep::Connect).with_note("WebSocket server is running");
    let down = Probe {
        kind: ProbeKind::Websocket(WsAction {
            url: Some(format!("ws://127.0.0.1:{}/", closed_port())),
            step: WsStep::Connect,
        }),
        ..Probe::websocket("Daphne Server (closed)", WsStep::Connect)
    };

    let (summary, _) = run(config_for(&target), &[plan(vec![Entry::Probe(up), Entry::Probe(down)])]).await;

    assert_eq!(summary.get("Daphne Server").unwrap().detail, "WebSocket server is running");
    let down = summary.get("Daphne Server (closed)").unwrap();
    assert_eq!(down.error_kind, Some(ErrorKind::ConnectionError));
}

// ============================================================================
// SEQUENCING
// ============================================================================

fn mixed_plan(target: &Target) -> ProbePlan {
    let yaml = format!(
        r#"
name: "Mixed"
sections:
  - title: "TESTING WEBSOCKET CONNECTION"
    entries:
      - group:
          name: session
          probes:
            - name: "WebSocket Connection"
              websocket: {{ action: connect }}
            - name: "WebSocket Send"
              websocket:
                action: send
                message: {{ type: test }}
            - name: "WebSocket Receive"
              websocket: {{ action: receive }}
              expect: {{ type: json_message }}
  - title: "TESTING API ENDPOINTS"
    entries:
      - probe:
          name: "GET /bounties/auctions/"
          http: {{ path: /bounties/auctions/ }}
          expect: {{ type: json, count_field: count, noun: auctions }}
      - probe:
          name: "POST /bounties/auctions/create/"
          http:
            method: POST
            path: /bounties/auctions/create/
            json: {{ title: "Test {{{{timestamp}}}}" }}
          expect: {{ type: status_in, codes: [401, 403] }}
      - probe:
          name: "missing"
          http: {{ path: /nope/ }}
      - probe:
          name: "silent receive"
          timeout_seconds: 0.3
          websocket:
            url: "{ws}/ws/silent/"
            action: receive
"#,
        ws = target.ws
    );
    PlanParser::parse_yaml(&yaml).unwrap()
}

#[tokio::test]
async fn outcomes_follow_plan_order_and_failures_do_not_abort() {
    let target = spawn_target().await;
    let plan = mixed_plan(&target);
    let expected: Vec<String> = plan.probes().map(|p| p.name.clone()).collect();

    let (summary, output) = run(config_for(&target), &[plan]).await;

    let names: Vec<String> = summary.outcomes.iter().map(|o| o.probe_name.clone()).collect();
    assert_eq!(names, expected);
    assert_eq!(summary.passed, 5);
    assert_eq!(summary.failed, 2);

    let ws_banner = output.find("TESTING WEBSOCKET CONNECTION").unwrap();
    let api_banner = output.find("TESTING API ENDPOINTS").unwrap();
    let first_api = output.find("PASS GET /bounties/auctions/").unwrap();
    assert!(ws_banner < api_banner && api_banner < first_api);
    assert!(!output.contains("Next steps:"));
}

#[tokio::test]
async fn repeated_runs_agree() {
    let target = spawn_target().await;

    let (first, _) = run(config_for(&target), &[mixed_plan(&target)]).await;
    let (second, _) = run(config_for(&target), &[mixed_plan(&target)]).await;

    let verdicts = |s: &RunSummary| s.outcomes.iter().map(|o| (o.probe_name.clone(), o.succeeded)).collect::<Vec<_>>();
    assert_eq!(verdicts(&first), verdicts(&second));
}

#[tokio::test]
async fn parallel_dispatch_keeps_order() {
    let target = spawn_target().await;
    let mut config = config_for(&target);
    config.parallel = true;
    config.max_parallel = 4;

    // The slow probe is first; its outcome must still be reported first
    let entries = vec![
        Entry::Probe(Probe::http("slow first", HttpAction::get("/slow/")).with_timeout(Duration::from_millis(500))),
        Entry::Probe(Probe::http("fast second", HttpAction::get("/"))),
        Entry::Probe(Probe::http("fast third", HttpAction::get("/bounties/auctions/"))),
    ];

    let (summary, output) = run(config, &[plan(entries)]).await;

    let names: Vec<_> = summary.outcomes.iter().map(|o| o.probe_name.as_str()).collect();
    assert_eq!(names, vec!["slow first", "fast second", "fast third"]);
    assert_eq!(summary.get("slow first").unwrap().error_kind, Some(ErrorKind::Timeout));
    assert!(output.find("FAIL slow first").unwrap() < output.find("PASS fast second").unwrap());
    assert!(output.contains("Next steps:"));
}
