//! Seams to the outside world: one request/response exchange, and the
//! "do we hold a bearer token" signal.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Repeating the request leaves the server in the same state.
    #[must_use]
    pub const fn is_idempotent(self) -> bool {
        !matches!(self, Self::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single API call, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            params: BTreeMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn with_body(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            params: BTreeMap::new(),
            body,
        }
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)?;
        let mut sep = '?';
        for (k, v) in &self.params {
            write!(f, "{sep}{k}={v}")?;
            sep = '&';
        }
        Ok(())
    }
}

/// Raw failure reported by a transport, before classification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("network: {0}")]
    Network(String),
    #[error("timeout")]
    Timeout,
    #[error("http status {status}")]
    Http { status: u16, body: Option<Value> },
}

/// Performs one request/response exchange.
///
/// Implementations attach the current bearer credentials and never retry on
/// their own; retrying is the mutation layer's decision.
pub trait Transport: Send + Sync {
    fn request(&self, request: ApiRequest) -> BoxFuture<'static, Result<Value, TransportError>>;
}

/// Read side of the session store.
pub trait AuthState: Send + Sync {
    fn has_token(&self) -> bool;

    /// Called when the server rejected the credentials (HTTP 401).
    fn session_rejected(&self) {}
}

/// A token that is present until the server rejects it.
#[derive(Debug)]
pub struct StaticToken {
    present: AtomicBool,
}

impl StaticToken {
    #[must_use]
    pub const fn new(present: bool) -> Self {
        Self {
            present: AtomicBool::new(present),
        }
    }

    /// Simulate a login (`true`) or logout (`false`).
    pub fn set(&self, present: bool) {
        self.present.store(present, Ordering::SeqCst);
    }
}

impl AuthState for StaticToken {
    fn has_token(&self) -> bool {
        self.present.load(Ordering::SeqCst)
    }

    fn session_rejected(&self) {
        self.present.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_display_lists_params_in_key_order() {
        let mut params = BTreeMap::new();
        params.insert("sort_by".to_string(), "name".to_string());
        params.insert("per_page".to_string(), "10".to_string());
        let req = ApiRequest::get("/tasks").with_params(params);
        assert_eq!(req.to_string(), "GET /tasks?per_page=10&sort_by=name");
    }

    #[test]
    fn only_post_is_non_idempotent() {
        assert!(!Method::Post.is_idempotent());
        assert!(Method::Put.is_idempotent());
        assert!(Method::Delete.is_idempotent());
    }

    #[test]
    fn static_token_drops_on_rejection() {
        let token = StaticToken::new(true);
        assert!(token.has_token());
        token.session_rejected();
        assert!(!token.has_token());
    }
}
