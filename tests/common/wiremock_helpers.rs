use std::time::Duration;
use subsweep::api_client::{ApiClient, Provider};
use subsweep::rate_limit::RetryPolicy;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Retry delay used by test clients; keeps exhaustion tests fast.
pub const TEST_RETRY_DELAY: Duration = Duration::from_millis(10);

/// API client with the production attempt budget and a short retry delay.
pub fn test_client(max_concurrent: usize) -> ApiClient {
    ApiClient::new("subsweep-test", max_concurrent, RetryPolicy::new(3, TEST_RETRY_DELAY))
        .expect("client builds")
}

/// Provider rotating over the given mock servers, unpaced, 5 s timeout.
pub fn provider_for(name: &str, servers: &[&MockServer]) -> Provider {
    paced_provider_for(name, servers, Duration::ZERO)
}

pub fn paced_provider_for(name: &str, servers: &[&MockServer], min_interval: Duration) -> Provider {
    let endpoints = servers.iter().map(|server| server.uri()).collect();
    Provider::new(name, endpoints, min_interval, Duration::from_secs(5)).expect("at least one endpoint")
}

/// Creates a mock crt.sh server answering the wildcard query for `domain`.
pub async fn mock_crtsh_page(domain: &str, html: &str) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("q", format!("%.{}", domain)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that answers every request with `status_code`.
pub async fn mock_error_server(status_code: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(status_code))
        .mount(&server)
        .await;

    server
}

/// Creates a mock HTTP server that delays every response by `delay_ms`.
pub async fn mock_slow_server(delay_ms: u64) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(wiremock::matchers::any())
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html></html>")
                .set_delay(Duration::from_millis(delay_ms)),
        )
        .mount(&server)
        .await;

    server
}

/// Number of requests a mock server has seen
pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map_or(0, |requests| requests.len())
}
