mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use common::fixtures::{load_fixture, load_json_fixture};
use common::wiremock_helpers::{mock_crtsh_page, mock_error_server, provider_for, request_count, test_client};
use std::path::PathBuf;
use std::time::Duration;
use subsweep::discovery::{
    CollectorError, CrtShCollector, SecurityTrailsCollector, ShodanCollector, SubdomainSet, ZoomEyeCollector,
};
use subsweep::target::Target;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn names(list: &[&str]) -> SubdomainSet {
    list.iter().map(|s| s.to_string()).collect()
}

fn example() -> Target {
    Target::Domain("example.com".to_string())
}

// ---- SecurityTrails ----

#[tokio::test]
async fn test_securitytrails_joins_labels() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/domain/example.com/subdomains"))
        .and(header("APIKEY", "st-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "endpoint": "/v1/domain/example.com/subdomains",
            "subdomains": ["www", "api", "bad_label", "mail.eu"],
            "subdomain_count": 4
        })))
        .expect(1)
        .mount(&server)
        .await;

    let collector = SecurityTrailsCollector::new(
        test_client(4),
        provider_for("securitytrails", &[&server]),
        Some("st-key".to_string()),
    );
    let found = collector.collect(&example()).await.unwrap();
    assert_eq!(found, names(&["api.example.com", "mail.eu.example.com", "www.example.com"]));
}

#[tokio::test]
async fn test_missing_key_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let securitytrails =
        SecurityTrailsCollector::new(test_client(4), provider_for("securitytrails", &[&server]), None);
    let zoomeye = ZoomEyeCollector::new(test_client(4), provider_for("zoomeye", &[&server]), Some("  ".into()), 100);
    let shodan = ShodanCollector::new(test_client(4), provider_for("shodan", &[&server]), None);

    assert!(matches!(securitytrails.collect(&example()).await, Err(CollectorError::Config(_))));
    assert!(matches!(zoomeye.collect(&example()).await, Err(CollectorError::Config(_))));
    assert!(matches!(shodan.collect(&example()).await, Err(CollectorError::Config(_))));
}

#[tokio::test]
async fn test_rejected_key_maps_to_auth_error() {
    let server = mock_error_server(401).await;
    let collector = SecurityTrailsCollector::new(
        test_client(4),
        provider_for("securitytrails", &[&server]),
        Some("revoked".to_string()),
    );
    let err = collector.collect(&example()).await.unwrap_err();
    assert!(matches!(err, CollectorError::Auth(ref provider) if provider == "securitytrails"));
    // 401 is retried like any other non-200 status
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_malformed_json_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let collector = SecurityTrailsCollector::new(
        test_client(4),
        provider_for("securitytrails", &[&server]),
        Some("k".to_string()),
    );
    assert!(matches!(collector.collect(&example()).await, Err(CollectorError::Parse(_))));
}

// ---- ZoomEye ----

fn zoomeye_page(total: u64, hosts: &[&str]) -> serde_json::Value {
    let data: Vec<serde_json::Value> = hosts
        .iter()
        .map(|host| {
            if host.starts_with("http") {
                serde_json::json!({ "url": host, "ip": "192.0.2.1" })
            } else {
                serde_json::json!({ "domain": host, "ip": "192.0.2.1" })
            }
        })
        .collect();
    serde_json::json!({ "code": 60000, "total": total, "data": data })
}

async fn mount_zoomeye_page(server: &MockServer, page: u64, response: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/v2/search"))
        .and(header("API-KEY", "zk"))
        .and(body_partial_json(serde_json::json!({
            "qbase64": STANDARD.encode("domain:example.com"),
            "page": page,
            "pagesize": 100
        })))
        .respond_with(response)
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_zoomeye_requests_every_page() {
    let server = MockServer::start().await;
    mount_zoomeye_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(zoomeye_page(250, &["a.example.com", "https://b.example.com/login"])),
        1,
    )
    .await;
    mount_zoomeye_page(
        &server,
        2,
        ResponseTemplate::new(200).set_body_json(zoomeye_page(250, &["c.example.com", "cdn.other.net"])),
        1,
    )
    .await;
    mount_zoomeye_page(
        &server,
        3,
        ResponseTemplate::new(200).set_body_json(zoomeye_page(250, &["http://d.example.com:8080/"])),
        1,
    )
    .await;

    let collector = ZoomEyeCollector::new(test_client(4), provider_for("zoomeye", &[&server]), Some("zk".into()), 100);
    let found = collector.collect(&example()).await.unwrap();
    assert_eq!(
        found,
        names(&["a.example.com", "b.example.com", "c.example.com", "d.example.com"])
    );
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_zoomeye_page_failure_keeps_gathered_results() {
    let server = MockServer::start().await;
    mount_zoomeye_page(
        &server,
        1,
        ResponseTemplate::new(200).set_body_json(zoomeye_page(250, &["a.example.com"])),
        1,
    )
    .await;
    // Page 2 fails on every attempt; page 3 is never requested
    mount_zoomeye_page(&server, 2, ResponseTemplate::new(500), 3).await;
    mount_zoomeye_page(
        &server,
        3,
        ResponseTemplate::new(200).set_body_json(zoomeye_page(250, &["c.example.com"])),
        0,
    )
    .await;

    let collector = ZoomEyeCollector::new(test_client(4), provider_for("zoomeye", &[&server]), Some("zk".into()), 100);
    let found = collector.collect(&example()).await.unwrap();
    assert_eq!(found, names(&["a.example.com"]));
}

#[tokio::test]
async fn test_zoomeye_first_page_failure_fails_collector() {
    let server = mock_error_server(402).await;
    let collector = ZoomEyeCollector::new(test_client(4), provider_for("zoomeye", &[&server]), Some("zk".into()), 100);
    let err = collector.collect(&example()).await.unwrap_err();
    assert!(matches!(err, CollectorError::Quota { status: 402, .. }));
}

// ---- Shodan ----

#[tokio::test]
async fn test_shodan_reads_subdomains_and_records() {
    let server = MockServer::start().await;
    let body: serde_json::Value = load_json_fixture("shodan_dns_example.json");
    Mock::given(method("GET"))
        .and(path("/dns/domain/example.com"))
        .and(query_param("key", "sh-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let collector = ShodanCollector::new(test_client(4), provider_for("shodan", &[&server]), Some("sh-key".into()));
    let found = collector.collect(&example()).await.unwrap();
    assert_eq!(
        found,
        names(&["api.example.com", "mail.example.com", "vpn.example.com", "www.example.com"])
    );
}

#[tokio::test]
async fn test_file_target_keeps_results_when_one_domain_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/dns/domain/example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"subdomains": ["www"]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/dns/domain/example.org"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let target = Target::File {
        path: PathBuf::from("scope.txt"),
        domains: vec!["example.org".to_string(), "example.com".to_string()],
    };
    let collector = ShodanCollector::new(test_client(4), provider_for("shodan", &[&server]), Some("k".into()));
    let found = collector.collect(&target).await.unwrap();
    assert_eq!(found, names(&["www.example.com"]));
}

#[tokio::test]
async fn test_file_target_reports_first_error_when_nothing_found() {
    let server = mock_error_server(404).await;
    let target = Target::File {
        path: PathBuf::from("scope.txt"),
        domains: vec!["example.org".to_string(), "example.com".to_string()],
    };
    let collector = ShodanCollector::new(test_client(4), provider_for("shodan", &[&server]), Some("k".into()));
    let err = collector.collect(&target).await.unwrap_err();
    assert!(matches!(err, CollectorError::Provider { status: 404, .. }));
}

// ---- crt.sh ----

#[tokio::test]
async fn test_crtsh_extracts_in_scope_names() {
    let server = mock_crtsh_page("example.com", &load_fixture("crtsh_example.html")).await;
    let collector = CrtShCollector::new(&server.uri(), "subsweep-test", Duration::from_secs(5)).unwrap();

    let found = collector.collect(&example()).await.unwrap();
    assert_eq!(found, names(&["b.example.com", "c.example.com"]));
}

#[tokio::test]
async fn test_crtsh_error_status_is_request_error() {
    let server = mock_error_server(502).await;
    let collector = CrtShCollector::new(&server.uri(), "subsweep-test", Duration::from_secs(5)).unwrap();

    let err = collector.collect(&example()).await.unwrap_err();
    assert!(matches!(err, CollectorError::Request(ref msg) if msg.contains("502")));
    // crt.sh is not retried
    assert_eq!(request_count(&server).await, 1);
}
