use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("timeout")]
    Timeout,
    #[error("connect/dns/tls error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("http error: {0}")]
    Other(String),
}

/// A fully substituted request, ready for dispatch.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<JsonValue>,
    pub basic_auth: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .and_then(|ct| ct.get(.."application/json".len()))
            .map(|prefix| prefix.eq_ignore_ascii_case("application/json"))
            .unwrap_or(false)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, req: HttpRequest, timeout: Duration) -> Result<HttpResponse, HttpError>;
}

/// The production client: reqwest with a cookie jar shared across the whole
/// run.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self, HttpError> {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .user_agent(concat!("hdt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HttpError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, req: HttpRequest, timeout: Duration) -> Result<HttpResponse, HttpError> {
        let method: reqwest::Method = req
            .method
            .parse()
            .map_err(|_| HttpError::BadRequest(format!("invalid method {:?}", req.method)))?;
        let url =
            url::Url::parse(&req.url).map_err(|e| HttpError::BadRequest(e.to_string()))?;

        let mut rb = self.client.request(method, url).timeout(timeout);
        for (k, v) in req.headers {
            rb = rb.header(k, v);
        }
        if let Some((user, pass)) = req.basic_auth {
            rb = rb.basic_auth(user, Some(pass));
        }
        if let Some(body) = req.body {
            rb = rb.json(&body);
        }

        let resp = rb.send().await.map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();

        let mut headers = BTreeMap::new();
        for (k, v) in resp.headers().iter() {
            if let Ok(s) = v.to_str() {
                headers.insert(k.to_string(), s.to_string());
            }
        }

        let body = resp.bytes().await.map_err(map_reqwest_error)?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        return HttpError::Timeout;
    }
    if e.is_connect() || e.is_request() {
        return HttpError::Network(e.to_string());
    }
    HttpError::Other(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp_with_content_type(ct: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: [("Content-Type".to_string(), ct.to_string())].into(),
            body: Vec::new(),
        }
    }

    #[test]
    fn json_detection_is_a_case_insensitive_prefix_match() {
        assert!(resp_with_content_type("application/json").is_json());
        assert!(resp_with_content_type("Application/JSON; charset=utf-8").is_json());
        assert!(!resp_with_content_type("text/html").is_json());
        assert!(!HttpResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
        .is_json());
    }
}
