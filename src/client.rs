//! Admin REST API transport.
//!
//! All HTTP traffic goes through the [`Transport`] trait so the API wrappers
//! and stores never see `reqwest` directly. [`HttpTransport`] is the real
//! implementation; tests script their own.

use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DashboardConfig;
use crate::error::ApiError;

/// Default timeout for API requests (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the admin API base URL:
/// - ensure a scheme is present (https, or http for localhost)
/// - strip trailing slashes
pub fn normalize_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return url;
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }
    url
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for Method {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// A single admin API call, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present.
    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A binary response (report export).
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a JSON call. Empty bodies come back as `Value::Null`.
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;

    /// Perform a call whose body is a file.
    async fn download(&self, request: ApiRequest) -> Result<Download, ApiError>;
}

/// Send a request and decode its JSON body into `T`.
pub async fn call<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: ApiRequest,
) -> Result<T, ApiError> {
    let path = request.path.clone();
    let value = transport.send(request).await?;
    serde_json::from_value(value).map_err(|e| {
        warn!(path = %path, error = %e, "unexpected response shape");
        ApiError::Decode(e.to_string())
    })
}

// ---------------------------------------------------------------------------
// reqwest transport
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into an operator-facing error.
fn friendly_error(url: &str, err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(url.to_string());
    }
    if err.is_connect() {
        return ApiError::Connect(url.to_string());
    }
    if err.is_builder() {
        return ApiError::Transport(format!("Invalid admin API URL: {url}"));
    }
    if err.is_decode() {
        return ApiError::Decode(err.to_string());
    }
    ApiError::Transport(format!("communicating with {url}: {err}"))
}

/// Pull `filename` out of a `Content-Disposition` header.
pub fn filename_from_disposition(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| {
            part.strip_prefix("filename*=UTF-8''")
                .or_else(|| part.strip_prefix("filename="))
        })
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

pub struct HttpTransport {
    base_url: String,
    api_key: String,
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &DashboardConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: normalize_base_url(&config.base_url),
            api_key: config.api_key.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let request_id = Uuid::new_v4();
        debug!(
            %request_id,
            method = request.method.as_str(),
            path = %request.path,
            "admin api request"
        );

        let mut req = self
            .client
            .request(request.method.into(), &url)
            .bearer_auth(&self.api_key)
            .header("x-request-id", request_id.to_string());
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = ApiError::from_response(status, &body);
            warn!(
                %request_id,
                status = status.as_u16(),
                path = %request.path,
                error = %err,
                "admin api call failed"
            );
            return Err(err);
        }
        Ok(resp)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let resp = self.execute(&request).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn download(&self, request: ApiRequest) -> Result<Download, ApiError> {
        let resp = self.execute(&request).await?;
        let headers = resp.headers();
        let filename = headers
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition);
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        Ok(Download {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted transport for tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(normalize_base_url("admin.example.com/"), "https://admin.example.com");
        assert_eq!(normalize_base_url("localhost:8000//"), "http://localhost:8000");
        assert_eq!(
            normalize_base_url(" https://api.example.com/v1/ "),
            "https://api.example.com/v1"
        );
        assert_eq!(normalize_base_url(""), "");
    }

    #[test]
    fn request_builder_skips_missing_query_values() {
        let req = ApiRequest::get("/notifications/admin/all")
            .query("skip", 0)
            .query_opt("type", None::<&str>)
            .query_opt("is_read", Some(false));
        assert_eq!(req.query_value("skip"), Some("0"));
        assert_eq!(req.query_value("type"), None);
        assert_eq!(req.query_value("is_read"), Some("false"));
    }

    #[test]
    fn disposition_filename_variants() {
        assert_eq!(
            filename_from_disposition(r#"attachment; filename="sales_2026-01.csv""#).as_deref(),
            Some("sales_2026-01.csv")
        );
        assert_eq!(
            filename_from_disposition("attachment; filename*=UTF-8''report.pdf").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(filename_from_disposition("inline"), None);
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_connect_or_timeout() {
        let config = DashboardConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_millis(500),
            ..DashboardConfig::default()
        };
        let transport = HttpTransport::new(&config).expect("client");
        let err = transport
            .send(ApiRequest::get("/notifications/admin/stats"))
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(
            err,
            ApiError::Connect(_) | ApiError::Timeout(_) | ApiError::Transport(_)
        ));
    }
}
