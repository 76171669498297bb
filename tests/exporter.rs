//! End-to-end tests against a mock VoipMonitor GUI server.
//!
//! The mock serves the real wire protocol (bypass login with query
//! parameters, multipart stats queries with a `PHPSESSID` cookie) so these
//! tests exercise the exporter from the HTTP client all the way to the
//! Prometheus text output.

use axum::{
    extract::{
        FromRequest as _,
        Multipart,
        Query,
        Request,
        State,
    },
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
    routing::post,
    Json,
    Router,
};
use pretty_assertions::assert_eq;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
        Mutex,
    },
    time::Duration,
};
use tokio::net::TcpListener;
use voipmonitor_calls_exporter::{
    collectors::CallStatsCollector,
    server::create_router,
    upstream::Observation,
    Config,
    Roster,
};

const SID: &str = "sid123";

enum AuthBehavior {
    Ok,
    Status(u16),
    Garbage,
}

enum SensorBehavior {
    /// `(lastSIPresponse, lastSIPresponseNum, cnt_all)` rows.
    Rows(Vec<(&'static str, i64, f64)>),
    Status(u16),
}

struct MockUpstream {
    auth: AuthBehavior,
    sensors: HashMap<String, SensorBehavior>,
    logins: AtomicUsize,
    fetches: AtomicUsize,
    cookies: Mutex<Vec<String>>,
    fdatefroms: Mutex<Vec<String>>,
}

impl MockUpstream {
    fn new(auth: AuthBehavior, sensors: impl IntoIterator<Item = (&'static str, SensorBehavior)>) -> Arc<Self> {
        Arc::new(Self {
            auth,
            sensors: sensors
                .into_iter()
                .map(|(sensor_id, behavior)| (sensor_id.to_string(), behavior))
                .collect(),
            logins: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            cookies: Mutex::new(Vec::new()),
            fdatefroms: Mutex::new(Vec::new()),
        })
    }

    fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

async fn sql_php(
    State(upstream): State<Arc<MockUpstream>>,
    Query(params): Query<HashMap<String, String>>,
    request: Request,
) -> Response {
    if params.get("module").map(String::as_str) == Some("bypass_login") {
        upstream.logins.fetch_add(1, Ordering::SeqCst);
        // Slow login so that overlapping scrapes actually overlap.
        tokio::time::sleep(Duration::from_millis(100)).await;
        return match upstream.auth {
            AuthBehavior::Ok => Json(serde_json::json!({ "SID": SID })).into_response(),
            AuthBehavior::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
            AuthBehavior::Garbage => (StatusCode::OK, "this is not json").into_response(),
        };
    }

    upstream.fetches.fetch_add(1, Ordering::SeqCst);

    if let Some(cookie) = request.headers().get("cookie") {
        upstream
            .cookies
            .lock()
            .unwrap()
            .push(cookie.to_str().unwrap().to_string());
    }

    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let mut fields = HashMap::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        fields.insert(name, field.text().await.unwrap());
    }

    assert_eq!(fields.get("task").map(String::as_str), Some("LISTING"));
    assert_eq!(fields.get("module").map(String::as_str), Some("CDR_stats"));

    if let Some(fdatefrom) = fields.get("fdatefrom") {
        upstream.fdatefroms.lock().unwrap().push(fdatefrom.clone());
    }

    let sensor_id = fields.get("fsensor_id").cloned().unwrap_or_default();
    match upstream.sensors.get(&sensor_id) {
        Some(SensorBehavior::Rows(rows)) => {
            let results: Vec<_> = rows
                .iter()
                .map(|(response, code, count)| {
                    serde_json::json!({
                        "lastSIPresponse": response,
                        "lastSIPresponseNum": code,
                        "cnt_all": count,
                    })
                })
                .collect();
            Json(serde_json::json!({ "total": results.len(), "results": results })).into_response()
        }
        Some(SensorBehavior::Status(code)) => StatusCode::from_u16(*code).unwrap().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_upstream(upstream: Arc<MockUpstream>) -> SocketAddr {
    let router = Router::new()
        .route("/php/model/sql.php", post(sql_php))
        .with_state(upstream);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });
    addr
}

fn exporter_config(addr: SocketAddr, interval: Option<&str>) -> Config {
    Config::new(
        format!("http://{addr}"),
        "user".to_string(),
        "secret".to_string(),
        interval.map(str::to_string),
        5,
        None,
        "127.0.0.1:0".parse().unwrap(),
        "/metrics".to_string(),
    )
    .unwrap()
}

fn collector(addr: SocketAddr, roster: Roster) -> CallStatsCollector {
    let config = exporter_config(addr, None);
    CallStatsCollector::new(&config, reqwest::Client::new(), roster)
}

fn sorted(mut observations: Vec<Observation>) -> Vec<Observation> {
    observations.sort_by(|a, b| {
        (&a.component, a.sip_response_code).cmp(&(&b.component, b.sip_response_code))
    });
    observations
}

fn observation(component: &str, response: &str, code: i64, count: f64) -> Observation {
    Observation {
        component: component.to_string(),
        last_sip_response: response.to_string(),
        sip_response_code: code,
        count,
    }
}

#[tokio::test]
async fn successful_cycle_collects_all_components() {
    let upstream = MockUpstream::new(
        AuthBehavior::Ok,
        [
            ("4", SensorBehavior::Rows(vec![("200 OK", 200, 12.0)])),
            ("8", SensorBehavior::Rows(vec![("200 OK", 200, 5.0), ("486 Busy Here", 486, 1.0)])),
        ],
    );
    let addr = spawn_upstream(Arc::clone(&upstream)).await;
    let collector = collector(addr, Roster::new([("A", "4"), ("B", "8")]));

    let outcome = collector.collect().await;

    assert!(outcome.up);
    assert_eq!(upstream.logins(), 1);
    assert_eq!(upstream.fetches(), 2);
    assert_eq!(
        sorted(outcome.observations),
        vec![
            observation("A", "200 OK", 200, 12.0),
            observation("B", "200 OK", 200, 5.0),
            observation("B", "486 Busy Here", 486, 1.0),
        ]
    );

    // Every stats query carried the session token as a cookie.
    let cookies = upstream.cookies.lock().unwrap().clone();
    assert_eq!(cookies, vec![format!("PHPSESSID={SID}"); 2]);
}

#[tokio::test]
async fn auth_failure_reports_down_and_skips_fetches() {
    let upstream = MockUpstream::new(
        AuthBehavior::Status(500),
        [("4", SensorBehavior::Rows(vec![("200 OK", 200, 12.0)]))],
    );
    let addr = spawn_upstream(Arc::clone(&upstream)).await;
    let collector = collector(addr, Roster::new([("A", "4")]));

    let outcome = collector.collect().await;

    assert!(!outcome.up);
    assert!(outcome.observations.is_empty());
    assert_eq!(upstream.logins(), 1);
    assert_eq!(upstream.fetches(), 0);
}

#[tokio::test]
async fn malformed_login_body_reports_down() {
    let upstream = MockUpstream::new(AuthBehavior::Garbage, []);
    let addr = spawn_upstream(Arc::clone(&upstream)).await;
    let collector = collector(addr, Roster::new([("A", "4")]));

    let outcome = collector.collect().await;

    assert!(!outcome.up);
    assert!(outcome.observations.is_empty());
    assert_eq!(upstream.fetches(), 0);
}

#[tokio::test]
async fn failing_component_leaves_partial_results() {
    let upstream = MockUpstream::new(
        AuthBehavior::Ok,
        [
            ("4", SensorBehavior::Rows(vec![("200 OK", 200, 12.0)])),
            ("8", SensorBehavior::Status(500)),
        ],
    );
    let addr = spawn_upstream(Arc::clone(&upstream)).await;
    let collector = collector(addr, Roster::new([("A", "4"), ("B", "8")]));

    let outcome = collector.collect().await;

    assert!(outcome.up);
    assert_eq!(upstream.fetches(), 2);
    assert_eq!(outcome.observations, vec![observation("A", "200 OK", 200, 12.0)]);
}

#[tokio::test]
async fn sequential_scrapes_run_independent_cycles() {
    let upstream = MockUpstream::new(
        AuthBehavior::Ok,
        [("4", SensorBehavior::Rows(vec![("200 OK", 200, 12.0)]))],
    );
    let addr = spawn_upstream(Arc::clone(&upstream)).await;
    let collector = collector(addr, Roster::new([("A", "4")]));

    let first = collector.collect().await;
    let second = collector.collect().await;

    // Each cycle authenticated from scratch and nothing leaked across.
    assert_eq!(upstream.logins(), 2);
    assert_eq!(upstream.fetches(), 2);
    assert_eq!(first.up, second.up);
    assert_eq!(sorted(first.observations), sorted(second.observations));
}

#[tokio::test]
async fn concurrent_scrapes_share_one_cycle() {
    let upstream = MockUpstream::new(
        AuthBehavior::Ok,
        [("4", SensorBehavior::Rows(vec![("200 OK", 200, 12.0)]))],
    );
    let addr = spawn_upstream(Arc::clone(&upstream)).await;
    let collector = collector(addr, Roster::new([("A", "4")]));

    let (first, second) = tokio::join!(collector.collect(), collector.collect());

    assert_eq!(upstream.logins(), 1);
    assert_eq!(upstream.fetches(), 1);
    assert!(first.up);
    assert_eq!(sorted(first.observations), sorted(second.observations));
}

#[tokio::test]
async fn invalid_interval_falls_back_to_five_minutes() {
    let upstream = MockUpstream::new(
        AuthBehavior::Ok,
        [("4", SensorBehavior::Rows(vec![("200 OK", 200, 12.0)]))],
    );
    let addr = spawn_upstream(Arc::clone(&upstream)).await;

    let config = exporter_config(addr, Some("not-a-number"));
    let collector = CallStatsCollector::new(&config, reqwest::Client::new(), Roster::new([("A", "4")]));
    collector.collect().await;

    let fdatefroms = upstream.fdatefroms.lock().unwrap().clone();
    assert_eq!(fdatefroms.len(), 1);

    let from = chrono::DateTime::parse_from_rfc3339(&fdatefroms[0]).unwrap();
    let age = chrono::Utc::now().signed_duration_since(from).num_seconds();
    assert!((298..=302).contains(&age), "fdatefrom was {age}s ago, expected ~300s");
}

#[tokio::test]
async fn metrics_endpoint_serves_a_fresh_snapshot() {
    let upstream = MockUpstream::new(
        AuthBehavior::Ok,
        [("14", SensorBehavior::Rows(vec![("200 OK", 200, 7.0)]))],
    );
    let addr = spawn_upstream(Arc::clone(&upstream)).await;

    let config = exporter_config(addr, None);
    let collector = Arc::new(CallStatsCollector::new(
        &config,
        reqwest::Client::new(),
        Roster::new([("opensips1", "14")]),
    ));
    let app = create_router(collector, "/metrics");

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let exporter_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    let body = reqwest::get(format!("http://{exporter_addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("voipmonitor_up 1"), "missing up gauge in:\n{body}");
    assert!(
        body.contains(
            r#"voipmonitor_call_stats_total{component="opensips1",last_sip_response="200 OK",sip_response_code="200"} 7"#
        ),
        "missing call stats series in:\n{body}"
    );

    let landing = reqwest::get(format!("http://{exporter_addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(landing.contains("<a href='/metrics'>Metrics</a>"));
}
