// src/target/http.rs
//! reqwest-backed target transport
//!
//! One instance per agent: it carries that agent's session cookie, so agents
//! never share authentication state.

use crate::target::{Method, TargetError, TargetRequest, TargetResponse, TargetService};
use crate::utils::config::RunConfig;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

/// HTTP transport for one agent
pub struct HttpTarget {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    session_cookie: Mutex<Option<String>>,
}

impl HttpTarget {
    /// Build a transport honouring the run's timeout and credential
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            session_cookie: Mutex::new(None),
        })
    }

    /// Session cookie captured from the last `set-cookie` header
    pub fn session_cookie(&self) -> Option<String> {
        self.session_cookie.lock().clone()
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl TargetService for HttpTarget {
    async fn send(&self, request: TargetRequest) -> std::result::Result<TargetResponse, TargetError> {
        let url = self.url(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self.client.request(Self::method(request.method), &url);
        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", key));
        }
        if let Some(cookie) = self.session_cookie() {
            builder = builder.header(COOKIE, cookie);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| TargetError {
            status: e.status().map(|s| s.as_u16()),
            kind: None,
            message: e.to_string(),
            endpoint: Some(request.path.clone()),
        })?;

        let status = response.status();
        if let Some(cookie) = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            // Only the name=value pair is sent back
            let pair = cookie.split(';').next().unwrap_or(cookie).to_string();
            *self.session_cookie.lock() = Some(pair);
        }

        let bytes = response.bytes().await.map_err(|e| {
            TargetError::new(format!("Failed to read response body: {}", e))
                .with_status(status.as_u16())
                .with_endpoint(request.path.clone())
        })?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        if status.is_success() {
            return Ok(TargetResponse {
                status: status.as_u16(),
                body,
            });
        }

        let kind = body.get("error").and_then(Value::as_str).map(str::to_string);
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

        Err(TargetError {
            status: Some(status.as_u16()),
            kind,
            message,
            endpoint: Some(request.path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response
    async fn one_shot_server(status_line: &'static str, headers: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut read = 0;
            loop {
                let n = socket.read(&mut buf[read..]).await.unwrap();
                read += n;
                if n == 0 || buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                headers,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_success_captures_cookie() {
        let base = one_shot_server(
            "201 Created",
            "Set-Cookie: session=abc123; Path=/; HttpOnly\r\n",
            json!({"user": {"id": "u-1"}}).to_string(),
        )
        .await;
        let target = HttpTarget::new(&RunConfig::new("lumina", base)).unwrap();

        let resp = target
            .send(TargetRequest::post("/api/auth/signup", json!({"email": "a@b"})))
            .await
            .unwrap();

        assert_eq!(resp.status, 201);
        assert_eq!(resp.str_at("/user/id"), Some("u-1"));
        assert_eq!(target.session_cookie().as_deref(), Some("session=abc123"));
    }

    #[tokio::test]
    async fn test_error_status_is_classified() {
        let base = one_shot_server(
            "503 Service Unavailable",
            "",
            json!({"error": "UPSTREAM_DOWN", "message": "database offline"}).to_string(),
        )
        .await;
        let target = HttpTarget::new(&RunConfig::new("lumina", base)).unwrap();

        let err = target.send(TargetRequest::get("/api/agents/status")).await.unwrap_err();

        assert_eq!(err.status, Some(503));
        assert_eq!(err.kind.as_deref(), Some("UPSTREAM_DOWN"));
        assert_eq!(err.message, "database offline");
        assert_eq!(err.endpoint.as_deref(), Some("/api/agents/status"));
        assert_eq!(err.severity(), Severity::Critical);
    }

    #[tokio::test]
    async fn test_connection_failure_has_no_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = HttpTarget::new(&RunConfig::new("lumina", format!("http://{}", addr))).unwrap();
        let err = target.send(TargetRequest::get("/health")).await.unwrap_err();

        assert_eq!(err.status, None);
        assert_eq!(err.severity(), Severity::Medium);
    }
}
