use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;

use crate::error::LookupError;
use crate::geo::constants::{GEO_API_BASE, PAYLOAD_PREVIEW_CHARS, SELF_IP_URL, USER_AGENT};
use crate::geo::types::{ErrorInfo, GeoInfo, LookupOutcome};
use crate::geo::utils::{is_self_sentinel, payload_preview, truncate_string};
use crate::{log_debug, log_info, log_warn};

/// Remote side of a check: self-IP discovery and IP geolocation
pub trait GeoLookup {
    /// Ask the echo service for our public address
    fn resolve_self(&self) -> Result<String, LookupError>;

    /// Geolocate `address`.
    ///
    /// `Some("my")` and `Some("")` resolve the public address first.
    /// `None` lets the provider geolocate the caller directly.
    fn lookup(&self, address: Option<&str>) -> LookupOutcome;
}

/// Service URLs used by [`GeoClient`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Geolocation API base, queried as `<base>/<ip>/json/`
    pub geo_api: String,
    /// Plain text "what is my IP" endpoint
    pub self_ip: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            geo_api: GEO_API_BASE.to_string(),
            self_ip: SELF_IP_URL.to_string(),
        }
    }
}

/// Blocking HTTP implementation of [`GeoLookup`]. One attempt per call.
pub struct GeoClient {
    client: Client,
    endpoints: Endpoints,
}

impl GeoClient {
    pub fn new(endpoints: Endpoints, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_client(client, endpoints))
    }

    /// Use a preconfigured reqwest client
    pub fn with_client(client: Client, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    fn geo_url(&self, address: Option<&str>) -> String {
        let base = self.endpoints.geo_api.trim_end_matches('/');
        match address {
            Some(address) if address.parse::<IpAddr>().is_ok() => {
                format!("{}/{}/json/", base, address)
            }
            Some(address) => format!("{}/{}/json/", base, urlencoding::encode(address)),
            None => format!("{}/json/", base),
        }
    }

    fn fetch_geo(&self, address: Option<&str>) -> LookupOutcome {
        match address {
            Some(address) => log_info!("requesting {} info", address),
            None => log_info!("requesting my external ip info"),
        }

        let url = self.geo_url(address);
        log_debug!("Geo API URL: {}", url);

        let response = match self.client.get(&url).send() {
            Ok(response) => response,
            Err(e) => {
                log_warn!("Geo API request failed: {}", e);
                return LookupError::Transport(e.to_string()).into();
            }
        };

        let status = response.status();
        if !status.is_success() {
            log_warn!("Geo API returned non-success status: {}", status);
            return LookupError::Transport(format!("HTTP {}", status)).into();
        }

        match response.bytes() {
            Ok(body) => {
                log_debug!("Geo API response body: {}", String::from_utf8_lossy(&body));
                classify_geo_body(&body)
            }
            Err(e) => LookupError::Transport(e.to_string()).into(),
        }
    }
}

impl GeoLookup for GeoClient {
    fn resolve_self(&self) -> Result<String, LookupError> {
        log_debug!("try to get external ip from {}", self.endpoints.self_ip);

        let response = self
            .client
            .get(&self.endpoints.self_ip)
            .send()
            .map_err(|e| LookupError::SelfResolution(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::SelfResolution(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .map_err(|e| LookupError::SelfResolution(e.to_string()))?;
        let text = std::str::from_utf8(&body).map_err(|e| {
            LookupError::SelfResolution(format!("response is not valid text: {}", e))
        })?;

        let address = text.trim();
        if address.parse::<IpAddr>().is_err() {
            return Err(LookupError::SelfResolution(format!(
                "unexpected response {:?}",
                truncate_string(address, PAYLOAD_PREVIEW_CHARS)
            )));
        }

        log_info!("external ip: {}", address);
        Ok(address.to_string())
    }

    fn lookup(&self, address: Option<&str>) -> LookupOutcome {
        match address {
            Some(address) if is_self_sentinel(address) => match self.resolve_self() {
                Ok(resolved) => self.fetch_geo(Some(&resolved)),
                Err(e) => e.into(),
            },
            other => self.fetch_geo(other),
        }
    }
}

/// Decide what a successful geolocation response body means
pub fn classify_geo_body(body: &[u8]) -> LookupOutcome {
    let malformed = |detail: String| -> LookupOutcome {
        LookupError::MalformedResponse(format!(
            "{}: {}",
            detail,
            payload_preview(body, PAYLOAD_PREVIEW_CHARS)
        ))
        .into()
    };

    let value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => return malformed(format!("JSON decode error: {}", e)),
    };

    let map = match value {
        Value::Object(map) => map,
        _ => return malformed("expected a JSON object".to_string()),
    };

    if map.get("error").and_then(Value::as_bool) == Some(true) {
        let reason = map
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or("unknown provider error");
        let reason = match map.get("message").and_then(Value::as_str) {
            Some(message) => format!("{}: {}", reason, message),
            None => reason.to_string(),
        };
        log_warn!("Geo API reported error: {}", reason);
        return LookupOutcome::Failed(ErrorInfo::from(LookupError::Provider(reason)));
    }

    if map.is_empty() {
        return LookupOutcome::Empty;
    }

    match serde_json::from_value::<GeoInfo>(Value::Object(map)) {
        Ok(info) => {
            log_info!("get info request successful");
            LookupOutcome::Found(info)
        }
        Err(e) => malformed(format!("unexpected field type: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;
    use tokio::runtime::Runtime;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE: &str = r#"{
        "ip": "8.8.8.8",
        "network": "8.8.8.0/24",
        "version": "IPv4",
        "city": "Mountain View",
        "region": "California",
        "region_code": "CA",
        "country": "US",
        "country_name": "United States",
        "country_code": "US",
        "country_code_iso3": "USA",
        "in_eu": false,
        "latitude": 37.42301,
        "asn": "AS15169",
        "org": "GOOGLE"
    }"#;

    /// wiremock server plus the runtime it lives on; the blocking client
    /// under test is always called from outside the runtime
    struct MockApi {
        server: MockServer,
        rt: Runtime,
    }

    impl MockApi {
        fn start() -> Self {
            let rt = Runtime::new().unwrap();
            let server = rt.block_on(MockServer::start());
            Self { server, rt }
        }

        fn mount(&self, mock: Mock) {
            self.rt.block_on(mock.mount(&self.server));
        }

        fn url(&self, suffix: &str) -> String {
            format!("{}{}", self.server.uri(), suffix)
        }

        fn request_paths(&self) -> Vec<String> {
            self.rt
                .block_on(self.server.received_requests())
                .unwrap_or_default()
                .iter()
                .map(|request| request.url.path().to_string())
                .collect()
        }
    }

    fn get(route: &str, status: u16, body: impl AsRef<[u8]>) -> Mock {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(body.as_ref().to_vec()))
            .expect(1)
    }

    fn test_client(geo_api: &str, self_ip: &str) -> GeoClient {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        GeoClient::with_client(
            client,
            Endpoints {
                geo_api: geo_api.to_string(),
                self_ip: self_ip.to_string(),
            },
        )
    }

    fn unused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[test]
    fn test_classify_well_formed() {
        match classify_geo_body(SAMPLE.as_bytes()) {
            LookupOutcome::Found(info) => {
                assert_eq!(info.ip.as_deref(), Some("8.8.8.8"));
                assert_eq!(info.country_code.as_deref(), Some("US"));
                assert_eq!(info.org.as_deref(), Some("GOOGLE"));
                assert_eq!(info.extra.get("in_eu"), Some(&Value::Bool(false)));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_classify_malformed_quotes_payload() {
        match classify_geo_body(b"<html>Too Many Requests</html>") {
            LookupOutcome::Failed(err) => {
                assert!(err.error);
                assert!(err.reason.starts_with("malformed response: JSON decode error"));
                assert!(err.reason.contains("<html>Too Many Requests</html>"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_classify_non_object() {
        match classify_geo_body(b"[1, 2, 3]") {
            LookupOutcome::Failed(err) => {
                assert!(err.reason.contains("expected a JSON object"));
                assert!(err.reason.contains("[1, 2, 3]"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_classify_provider_error() {
        let body = br#"{"error": true, "reason": "RateLimited", "message": "Visit https://ipapi.co/ratelimited/ for details"}"#;
        assert_eq!(
            classify_geo_body(body),
            LookupOutcome::Failed(ErrorInfo::new(
                "RateLimited: Visit https://ipapi.co/ratelimited/ for details"
            ))
        );

        let body = br#"{"ip": "10.0.0.1", "error": true, "reason": "Reserved IP Address"}"#;
        assert_eq!(
            classify_geo_body(body),
            LookupOutcome::Failed(ErrorInfo::new("Reserved IP Address"))
        );
    }

    #[test]
    fn test_classify_empty_object() {
        assert_eq!(classify_geo_body(b"{}"), LookupOutcome::Empty);
    }

    #[test]
    fn test_classify_wrong_field_type() {
        match classify_geo_body(br#"{"ip": ["8.8.8.8"]}"#) {
            LookupOutcome::Failed(err) => assert!(err.reason.starts_with("malformed response")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_geo_url() {
        let client = test_client("https://ipapi.co/", SELF_IP_URL);
        assert_eq!(client.geo_url(Some("8.8.8.8")), "https://ipapi.co/8.8.8.8/json/");
        assert_eq!(
            client.geo_url(Some("2001:4860:4860::8888")),
            "https://ipapi.co/2001:4860:4860::8888/json/"
        );
        assert_eq!(client.geo_url(Some("a b")), "https://ipapi.co/a%20b/json/");
        assert_eq!(client.geo_url(None), "https://ipapi.co/json/");
    }

    #[test]
    fn test_lookup_success_over_http() {
        let api = MockApi::start();
        api.mount(get("/8.8.8.8/json/", 200, SAMPLE));
        let client = test_client(&api.url(""), &unused_url());

        match client.lookup(Some("8.8.8.8")) {
            LookupOutcome::Found(info) => assert_eq!(info.city.as_deref(), Some("Mountain View")),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(api.request_paths(), vec!["/8.8.8.8/json/"]);
    }

    #[test]
    fn test_lookup_without_address_asks_provider() {
        let api = MockApi::start();
        api.mount(get("/json/", 200, SAMPLE));
        let client = test_client(&api.url(""), &unused_url());

        assert!(matches!(client.lookup(None), LookupOutcome::Found(_)));
        assert_eq!(api.request_paths(), vec!["/json/"]);
    }

    #[test]
    fn test_lookup_http_error_status() {
        let api = MockApi::start();
        api.mount(get("/1.1.1.1/json/", 429, "slow down"));
        let client = test_client(&api.url(""), &unused_url());

        assert_eq!(
            client.lookup(Some("1.1.1.1")),
            LookupOutcome::Failed(ErrorInfo::new("HTTP 429 Too Many Requests"))
        );
    }

    #[test]
    fn test_lookup_connection_refused() {
        let client = test_client(&unused_url(), &unused_url());

        match client.lookup(Some("1.1.1.1")) {
            LookupOutcome::Failed(err) => assert!(!err.reason.is_empty()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_lookup_times_out() {
        let api = MockApi::start();
        api.mount(
            Mock::given(method("GET"))
                .and(path("/8.8.8.8/json/"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(SAMPLE)
                        .set_delay(Duration::from_secs(5)),
                ),
        );
        let endpoints = Endpoints {
            geo_api: api.url(""),
            self_ip: unused_url(),
        };
        let client = GeoClient::new(endpoints, Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let outcome = client.lookup(Some("8.8.8.8"));

        assert!(matches!(outcome, LookupOutcome::Failed(_)));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_resolve_self_trims_body() {
        let api = MockApi::start();
        api.mount(get("/ip", 200, "203.0.113.7\n"));
        let client = test_client(&unused_url(), &api.url("/ip"));

        assert_eq!(client.resolve_self(), Ok("203.0.113.7".to_string()));
    }

    #[test]
    fn test_resolve_self_rejects_garbage() {
        let api = MockApi::start();
        api.mount(get("/ip", 200, "<html>captcha</html>"));
        let client = test_client(&unused_url(), &api.url("/ip"));

        match client.resolve_self() {
            Err(LookupError::SelfResolution(message)) => assert!(message.contains("captcha")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_self_rejects_non_utf8() {
        let api = MockApi::start();
        api.mount(get("/ip", 200, [0xffu8, 0xfe, 0x31]));
        let client = test_client(&unused_url(), &api.url("/ip"));

        assert!(matches!(
            client.resolve_self(),
            Err(LookupError::SelfResolution(_))
        ));
    }

    #[test]
    fn test_lookup_my_resolves_first() {
        let api = MockApi::start();
        api.mount(get("/ip", 200, "8.8.8.8"));
        api.mount(get("/8.8.8.8/json/", 200, SAMPLE));
        let client = test_client(&api.url(""), &api.url("/ip"));

        assert!(matches!(client.lookup(Some("my")), LookupOutcome::Found(_)));
        assert_eq!(api.request_paths(), vec!["/ip", "/8.8.8.8/json/"]);
    }

    #[test]
    fn test_lookup_my_reports_resolution_failure() {
        let client = test_client(&unused_url(), &unused_url());

        match client.lookup(Some("my")) {
            LookupOutcome::Failed(err) => {
                assert!(err.reason.starts_with("failed to resolve external IP"))
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
