use anyhow::{Context, Result};
use http_body_util::{BodyExt, Full};
use hyper::{body::Bytes, header::HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde_json::Value;

/// Thin HTTP/1 client bound to one test server
#[derive(Clone)]
pub struct TestClient {
    base_url: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl TestClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::GET, path, None, &[]).await
    }

    pub async fn get_with_headers(
        &self,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<ApiResponse> {
        self.send(Method::GET, path, None, headers).await
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<ApiResponse> {
        self.send(Method::POST, path, Some(serde_json::to_vec(body)?), &[])
            .await
    }

    pub async fn post_empty(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::POST, path, None, &[]).await
    }

    /// POST a body verbatim, for payloads that are not valid JSON
    pub async fn post_raw(&self, path: &str, body: &str) -> Result<ApiResponse> {
        self.send(Method::POST, path, Some(body.as_bytes().to_vec()), &[])
            .await
    }

    pub async fn put<T: Serialize>(&self, path: &str, body: &T) -> Result<ApiResponse> {
        self.send(Method::PUT, path, Some(serde_json::to_vec(body)?), &[])
            .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        json: Option<Vec<u8>>,
        headers: &[(&str, &str)],
    ) -> Result<ApiResponse> {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{}{}", self.base_url, path));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = match json {
            Some(bytes) => {
                builder = builder.header("content-type", "application/json");
                Full::new(Bytes::from(bytes))
            }
            None => Full::new(Bytes::new()),
        };

        let response = self
            .client
            .request(builder.body(body)?)
            .await
            .with_context(|| format!("request to {} failed", path))?;

        ApiResponse::read(response).await
    }
}

pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body_bytes: Vec<u8>,
    /// Parsed body when it is JSON
    pub body: Option<Value>,
}

impl ApiResponse {
    async fn read(response: Response<hyper::body::Incoming>) -> Result<Self> {
        let (parts, body) = response.into_parts();
        let body_bytes = body.collect().await?.to_bytes().to_vec();
        let body = serde_json::from_slice(&body_bytes).ok();

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body_bytes,
            body,
        })
    }

    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {} but got {}. Body: {:?}",
            expected, self.status, self.body
        );
        self
    }

    /// Assert the JSON error body carries `code` and a message containing `fragment`
    pub fn assert_error(&self, code: &str, fragment: &str) -> &Self {
        let body = self.body.as_ref().expect("Error response is not JSON");
        assert_eq!(body.get("code").and_then(|v| v.as_str()), Some(code));
        self.assert_error_message(fragment)
    }

    pub fn assert_error_message(&self, fragment: &str) -> &Self {
        let message = self
            .body
            .as_ref()
            .and_then(|b| b.get("message"))
            .and_then(|m| m.as_str())
            .expect("Missing message field in error response");

        assert!(
            message.contains(fragment),
            "Expected error message to contain '{}', but got '{}'",
            fragment,
            message
        );
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Numeric header value, panicking when absent or malformed
    pub fn header_usize(&self, name: &str) -> usize {
        self.header(name)
            .unwrap_or_else(|| panic!("Header '{}' not found", name))
            .parse()
            .unwrap_or_else(|_| panic!("Header '{}' is not a number", name))
    }

    pub fn assert_header(&self, name: &str, expected: &str) -> &Self {
        let actual = self
            .header(name)
            .unwrap_or_else(|| panic!("Header '{}' not found", name));
        assert_eq!(actual, expected, "Header '{}' value mismatch", name);
        self
    }

    pub fn assert_header_exists(&self, name: &str) -> &Self {
        assert!(self.headers.contains_key(name), "Header '{}' not found", name);
        self
    }
}
