use async_trait::async_trait;
use reqwest::redirect::Policy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::{Check, HttpMethod, Protocol};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Invalid target '{target}': {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Target '{0}' has no host")]
    MissingHost(String),

    #[error("No transport registered for {0}")]
    NoTransport(Protocol),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Everything a transport needs to issue one probe request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    pub protocol: Protocol,
    /// Host, with port if one was given
    pub host: String,
    /// Path and query, always starting with `/`
    pub path: String,
    pub method: HttpMethod,
    pub timeout: Duration,
}

impl ProbeRequest {
    /// Split a check's target into host and path
    pub fn from_check(check: &Check) -> Result<Self, ProbeError> {
        let target = check.target();
        let parsed = Url::parse(&target)
            .map_err(|source| ProbeError::InvalidTarget { target: target.clone(), source })?;

        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(ProbeError::MissingHost(target)),
        };

        let path = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };

        Ok(Self {
            protocol: check.protocol,
            host,
            path,
            method: check.method,
            timeout: Duration::from_secs(check.timeout_seconds),
        })
    }

    pub fn url(&self) -> String {
        format!("{}://{}{}", self.protocol, self.host, self.path)
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Issues a single request and reports the response status code
#[async_trait]
pub trait Transport: Send + Sync {
    async fn issue_request(&self, request: &ProbeRequest) -> Result<u16, ProbeError>;
}

/// Send `request` and hand back whatever status came back; redirects are
/// reported as-is rather than followed
async fn send_request(client: &reqwest::Client, request: &ProbeRequest) -> Result<u16, ProbeError> {
    let response = client
        .request(request.method.into(), request.url())
        .timeout(request.timeout)
        .send()
        .await?;

    Ok(response.status().as_u16())
}

fn client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .redirect(Policy::none())
        .user_agent(concat!("upcheck/", env!("CARGO_PKG_VERSION")))
}

/// Plain HTTP transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, ProbeError> {
        Ok(Self { client: client_builder().build()? })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue_request(&self, request: &ProbeRequest) -> Result<u16, ProbeError> {
        send_request(&self.client, request).await
    }
}

/// TLS transport; refuses to talk plain HTTP
pub struct HttpsTransport {
    client: reqwest::Client,
}

impl HttpsTransport {
    pub fn new() -> Result<Self, ProbeError> {
        Ok(Self { client: client_builder().https_only(true).build()? })
    }
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn issue_request(&self, request: &ProbeRequest) -> Result<u16, ProbeError> {
        send_request(&self.client, request).await
    }
}

/// Transports keyed by protocol, built once at startup
#[derive(Clone, Default)]
pub struct TransportSet {
    transports: HashMap<Protocol, Arc<dyn Transport>>,
}

impl TransportSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The reqwest-backed HTTP and HTTPS transports
    pub fn standard() -> Result<Self, ProbeError> {
        Ok(Self::new()
            .with(Protocol::Http, Arc::new(HttpTransport::new()?))
            .with(Protocol::Https, Arc::new(HttpsTransport::new()?)))
    }

    pub fn with(mut self, protocol: Protocol, transport: Arc<dyn Transport>) -> Self {
        self.transports.insert(protocol, transport);
        self
    }

    pub fn for_protocol(&self, protocol: Protocol) -> Result<Arc<dyn Transport>, ProbeError> {
        self.transports.get(&protocol).cloned().ok_or(ProbeError::NoTransport(protocol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_with_url(protocol: Protocol, url: &str) -> Check {
        Check::new("5551234567", protocol, url, HttpMethod::Post, vec![200], 3)
    }

    #[test]
    fn test_probe_request_from_check() {
        let request =
            ProbeRequest::from_check(&check_with_url(Protocol::Https, "example.com/api/health?full=1")).unwrap();
        assert_eq!(request.host, "example.com");
        assert_eq!(request.path, "/api/health?full=1");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.timeout, Duration::from_secs(3));
        assert_eq!(request.url(), "https://example.com/api/health?full=1");
    }

    #[test]
    fn test_probe_request_keeps_port_and_defaults_path() {
        let request = ProbeRequest::from_check(&check_with_url(Protocol::Http, "localhost:8080")).unwrap();
        assert_eq!(request.host, "localhost:8080");
        assert_eq!(request.path, "/");
    }

    #[test]
    fn test_probe_request_rejects_garbage() {
        let result = ProbeRequest::from_check(&check_with_url(Protocol::Http, "exa mple.com"));
        assert!(matches!(result, Err(ProbeError::InvalidTarget { .. })));
    }

    #[test]
    fn test_transport_set_lookup() {
        let transports = TransportSet::standard().unwrap();
        assert!(transports.for_protocol(Protocol::Http).is_ok());
        assert!(transports.for_protocol(Protocol::Https).is_ok());
        assert!(matches!(
            TransportSet::new().for_protocol(Protocol::Https),
            Err(ProbeError::NoTransport(Protocol::Https))
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_an_error() {
        let transport = HttpTransport::new().unwrap();
        let request = ProbeRequest {
            protocol: Protocol::Http,
            host: "127.0.0.1:9".to_string(),
            path: "/".to_string(),
            method: HttpMethod::Get,
            timeout: Duration::from_secs(2),
        };

        assert!(transport.issue_request(&request).await.is_err());
    }
}
