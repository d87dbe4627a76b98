//! Probes and client factory against a local mock control-plane API.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use apiwatch_cf::probes::{fetch_app_details, list_apps_in_space};
use apiwatch_cf::{CfClient, CfClientFactory, register_standard_probes};
use apiwatch_core::{ApiConfig, ProbeSettings};
use apiwatch_monitor::{
    Classifier, ClientFactory, MemorySink, Monitor, Outcome, PatternClassifier,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const WARNING_PATTERNS: [&str; 2] = [
    "cannot fetch token: 503 Service Unavailable",
    r"CF-StatsUnavailable\|200002",
];

type Routes = HashMap<String, (u16, String)>;

struct MockApi {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<String>>>,
}

impl MockApi {
    /// Serve `overrides` on top of a healthy control plane.
    async fn start(overrides: &[(&str, u16, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut routes = healthy_routes(addr);
        for (path, status, body) in overrides {
            routes.insert(path.to_string(), (*status, body.to_string()));
        }
        let routes = Arc::new(routes);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_by_server = seen.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let routes = routes.clone();
                let seen = seen_by_server.clone();
                tokio::spawn(async move {
                    let _ = handle(stream, &routes, &seen).await;
                });
            }
        });

        Self { addr, seen }
    }

    fn config(&self) -> ApiConfig {
        ApiConfig {
            address: format!("http://{}", self.addr),
            username: "admin".to_string(),
            password: "secret".to_string(),
            skip_ssl_validation: true,
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

fn healthy_routes(addr: SocketAddr) -> Routes {
    let resource = |guid: &str, name: &str| {
        format!(r#"{{"resources":[{{"metadata":{{"guid":"{guid}"}},"entity":{{"name":"{name}"}}}}]}}"#)
    };
    let mut routes = Routes::new();
    routes.insert(
        "/v2/info".to_string(),
        (200, format!(r#"{{"token_endpoint":"http://{addr}"}}"#)),
    );
    routes.insert(
        "/oauth/token".to_string(),
        (200, r#"{"access_token":"t0k3n","token_type":"bearer"}"#.to_string()),
    );
    routes.insert("/v2/organizations".to_string(), (200, resource("org-guid", "admin")));
    routes.insert(
        "/v2/organizations/org-guid/spaces".to_string(),
        (200, resource("space-guid", "healthchecks")),
    );
    routes.insert("/v2/apps".to_string(), (200, resource("app-guid", "healthcheck")));
    routes.insert(
        "/v2/apps/app-guid/stats".to_string(),
        (200, r#"{"0":{"state":"RUNNING"}}"#.to_string()),
    );
    routes.insert(
        "/v2/apps/app-guid/instances".to_string(),
        (200, r#"{"0":{"state":"RUNNING"}}"#.to_string()),
    );
    routes.insert(
        "/v2/apps/app-guid/routes".to_string(),
        (200, r#"{"resources":[]}"#.to_string()),
    );
    routes
}

async fn handle(
    mut stream: TcpStream,
    routes: &Routes,
    seen: &Mutex<Vec<String>>,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|l| {
            let (name, value) = l.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let target = head
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let path = target.split('?').next().unwrap_or("/").to_string();
    seen.lock().unwrap().push(target);

    let (status, body) = routes
        .get(&path)
        .cloned()
        .unwrap_or((404, r#"{"error":"not found"}"#.to_string()));
    let response = format!(
        "HTTP/1.1 {status} MOCK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

#[tokio::test]
async fn connect_fetches_token_then_probes_succeed() {
    let api = MockApi::start(&[]).await;
    let client: CfClient = CfClientFactory::new(api.config()).connect().await.unwrap();
    let settings = ProbeSettings::default();

    list_apps_in_space(&client, &settings).await.unwrap();
    fetch_app_details(&client, &settings).await.unwrap();

    let seen = api.seen();
    assert_eq!(seen[0], "/v2/info");
    assert_eq!(seen[1], "/oauth/token");
    assert!(seen.iter().any(|p| p.starts_with("/v2/apps?q=")));
    assert!(seen.contains(&"/v2/apps/app-guid/routes".to_string()));
}

#[tokio::test]
async fn token_outage_is_classified_as_warning() {
    let api = MockApi::start(&[("/oauth/token", 503, "unavailable")]).await;
    let err = CfClientFactory::new(api.config())
        .connect()
        .await
        .unwrap_err();
    assert_eq!(
        format!("{err:#}"),
        "Failed to connect to Cloud Foundry API: cannot fetch token: 503 Service Unavailable"
    );

    let classifier = PatternClassifier::new(WARNING_PATTERNS).unwrap();
    assert_eq!(classifier.classify(&Err(err)), Outcome::Warning);
}

#[tokio::test]
async fn stats_unavailable_is_classified_as_warning() {
    let api = MockApi::start(&[(
        "/v2/apps/app-guid/stats",
        503,
        r#"{"description":"Stats server temporarily unavailable.","error_code":"CF-StatsUnavailable","code":200002}"#,
    )])
    .await;
    let client = CfClientFactory::new(api.config()).connect().await.unwrap();

    let err = fetch_app_details(&client, &ProbeSettings::default())
        .await
        .unwrap_err();
    assert_eq!(
        format!("{err:#}"),
        "Failed to fetch app stats: cfclient error (CF-StatsUnavailable|200002): Stats server temporarily unavailable."
    );

    let classifier = PatternClassifier::new(WARNING_PATTERNS).unwrap();
    assert_eq!(classifier.classify(&Err(err)), Outcome::Warning);
}

#[tokio::test]
async fn missing_org_is_a_failure() {
    let api = MockApi::start(&[("/v2/organizations", 200, r#"{"resources":[]}"#)]).await;
    let client = CfClientFactory::new(api.config()).connect().await.unwrap();

    let err = list_apps_in_space(&client, &ProbeSettings::default())
        .await
        .unwrap_err();
    assert_eq!(
        format!("{err:#}"),
        "Failed to fetch 'admin' org: organization named \"admin\" not found"
    );

    let classifier = PatternClassifier::new(WARNING_PATTERNS).unwrap();
    assert_eq!(classifier.classify(&Err(err)), Outcome::Failure);
}

#[tokio::test]
async fn empty_space_fails_list_probe() {
    let api = MockApi::start(&[("/v2/apps", 200, r#"{"resources":[]}"#)]).await;
    let client = CfClientFactory::new(api.config()).connect().await.unwrap();

    let err = list_apps_in_space(&client, &ProbeSettings::default())
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Failed to find any apps in the 'healthchecks' space"));
}

#[tokio::test]
async fn monitor_runs_standard_probes_against_api() {
    let api = MockApi::start(&[]).await;
    let mut monitor = Monitor::new(
        CfClientFactory::new(api.config()),
        Arc::new(MemorySink::new()),
        2,
        WARNING_PATTERNS,
        10,
        99.95,
    )
    .unwrap();
    register_standard_probes(&mut monitor, &ProbeSettings::default()).unwrap();

    let stop = monitor.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1000)).await;
        stop.stop();
    });

    let report = monitor.run().await.unwrap();
    assert!(report.success_count() >= 2, "{report}");
    assert_eq!(report.failure_count(), 0, "{report}");
    assert!(monitor.have_tests_passed(&report));

    // One token fetch per execution: no client is reused.
    let token_fetches = api.seen().iter().filter(|p| *p == "/oauth/token").count() as u64;
    assert_eq!(token_fetches, report.counts().total());
}
