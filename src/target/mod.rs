// src/target/mod.rs
//! Target-service transport
//!
//! The engine only needs one thing from a target service: a call either
//! returns a JSON payload or fails with an optional status code and a
//! message. [`TargetService`] is that seam; [`HttpTarget`] is the reqwest
//! implementation used against real platforms.

pub mod http;

pub use http::HttpTarget;

use crate::model::records::{Severity, UNKNOWN_ERROR_KIND};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// HTTP verb of a target request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// A single request against the target service
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRequest {
    pub method: Method,
    /// Path relative to the target base address
    pub path: String,
    pub body: Option<Value>,
}

impl TargetRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// A successful response
#[derive(Debug, Clone, PartialEq)]
pub struct TargetResponse {
    pub status: u16,
    pub body: Value,
}

impl TargetResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// String field at a JSON pointer (`/book/id`)
    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.body.pointer(pointer).and_then(Value::as_str)
    }
}

/// Failure of a target-service call
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct TargetError {
    /// HTTP status, absent for transport failures (timeouts, refused connections)
    pub status: Option<u16>,
    /// Error kind reported in the response body's `error` field
    pub kind: Option<String>,
    pub message: String,
    pub endpoint: Option<String>,
}

impl TargetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            kind: None,
            message: message.into(),
            endpoint: None,
        }
    }

    /// Failure with a status code, as returned by the service
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(message).with_status(status)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn severity(&self) -> Severity {
        Severity::from_status(self.status)
    }

    pub fn kind_or_unknown(&self) -> &str {
        self.kind.as_deref().unwrap_or(UNKNOWN_ERROR_KIND)
    }
}

/// Transport to a target service
#[async_trait]
pub trait TargetService: Send + Sync {
    async fn send(&self, request: TargetRequest) -> Result<TargetResponse, TargetError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_severity_and_kind() {
        let err = TargetError::http(503, "Service Unavailable").with_kind("UPSTREAM_DOWN");
        assert_eq!(err.severity(), Severity::Critical);
        assert_eq!(err.kind_or_unknown(), "UPSTREAM_DOWN");

        let timeout = TargetError::new("timeout of 30000ms exceeded");
        assert_eq!(timeout.severity(), Severity::Medium);
        assert_eq!(timeout.kind_or_unknown(), "UNKNOWN");
        assert_eq!(timeout.to_string(), "timeout of 30000ms exceeded");
    }

    #[test]
    fn test_response_pointer() {
        let resp = TargetResponse::ok(json!({"book": {"id": "b-1"}}));
        assert_eq!(resp.str_at("/book/id"), Some("b-1"));
        assert_eq!(resp.str_at("/book/title"), None);
    }
}
