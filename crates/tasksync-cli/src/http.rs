//! Blocking HTTP transport (ureq) run on tokio's blocking pool.

use std::error::Error as _;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tasksync_core::config::ClientConfig;
use tasksync_core::transport::{ApiRequest, AuthState, Method, Transport, TransportError};
use tracing::{debug, warn};

/// Bearer token for this process. Dropped when the server answers 401.
#[derive(Debug, Default)]
pub struct SessionToken {
    token: Mutex<Option<String>>,
}

impl SessionToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: Mutex::new(token.filter(|t| !t.trim().is_empty())),
        }
    }

    fn get(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuthState for SessionToken {
    fn has_token(&self) -> bool {
        self.get().is_some()
    }

    fn session_rejected(&self) {
        warn!("server rejected the session token");
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    session: Arc<SessionToken>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, session: Arc<SessionToken>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout()).build();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
        }
    }
}

impl Transport for HttpTransport {
    fn request(&self, request: ApiRequest) -> BoxFuture<'static, Result<Value, TransportError>> {
        let agent = self.agent.clone();
        let url = format!("{}{}", self.base_url, request.path);
        let token = self.session.get();
        async move {
            tokio::task::spawn_blocking(move || exchange(&agent, &url, token.as_deref(), &request))
                .await
                .unwrap_or_else(|err| Err(TransportError::Network(err.to_string())))
        }
        .boxed()
    }
}

fn exchange(
    agent: &ureq::Agent,
    url: &str,
    token: Option<&str>,
    request: &ApiRequest,
) -> Result<Value, TransportError> {
    debug!(method = %request.method, url, "sending request");
    let mut call = agent
        .request(request.method.as_str(), url)
        .set("Accept", "application/json");
    if let Some(token) = token {
        call = call.set("Authorization", &format!("Bearer {token}"));
    }
    for (name, value) in &request.params {
        call = call.query(name, value);
    }

    let sent = match (&request.body, request.method) {
        (Some(body), _) => call.send_json(body.clone()),
        (None, Method::Get | Method::Delete) => call.call(),
        (None, _) => call.send_json(Value::Object(serde_json::Map::new())),
    };

    match sent {
        Ok(response) => read_body(response),
        Err(ureq::Error::Status(status, response)) => Err(TransportError::Http {
            status,
            body: read_body(response).ok().filter(|v| !v.is_null()),
        }),
        Err(ureq::Error::Transport(err)) => Err(transport_failure(&err)),
    }
}

/// Socket timeouts surface as I/O errors; `WouldBlock` is what a read
/// timeout looks like on some platforms.
fn transport_failure(err: &ureq::Transport) -> TransportError {
    let timed_out = matches!(err.kind(), ureq::ErrorKind::Io)
        && err
            .source()
            .and_then(|source| source.downcast_ref::<io::Error>())
            .is_some_and(|io| {
                matches!(io.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
            });
    if timed_out {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Parse a response body; non-JSON text is passed through as a string so
/// the decoder reports it as malformed.
fn read_body(response: ureq::Response) -> Result<Value, TransportError> {
    let text = response
        .into_string()
        .map_err(|err| TransportError::Network(err.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_server_is_a_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/api/tasks", listener.local_addr().expect("addr"));
        let holder = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            std::thread::sleep(std::time::Duration::from_millis(500));
            drop(stream);
        });
        let agent = ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_millis(100))
            .build();
        let result = exchange(&agent, &url, None, &ApiRequest::get("/tasks"));
        assert_eq!(result, Err(TransportError::Timeout));
        holder.join().expect("holder");
    }

    #[test]
    fn refused_connection_is_a_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let url = format!("http://{}/api/tasks", listener.local_addr().expect("addr"));
        drop(listener);
        let agent = ureq::AgentBuilder::new().build();
        let result = exchange(&agent, &url, None, &ApiRequest::get("/tasks"));
        assert!(matches!(result, Err(TransportError::Network(_))));
    }

    #[test]
    fn blank_token_counts_as_missing() {
        assert!(!SessionToken::new(Some("  ".into())).has_token());
        assert!(SessionToken::new(Some("abc".into())).has_token());
    }

    #[test]
    fn rejection_drops_the_token() {
        let session = SessionToken::new(Some("abc".into()));
        session.session_rejected();
        assert!(!session.has_token());
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let config = ClientConfig {
            base_url: "http://localhost:8000/api/".into(),
            ..ClientConfig::default()
        };
        let transport = HttpTransport::new(&config, Arc::new(SessionToken::default()));
        assert_eq!(transport.base_url, "http://localhost:8000/api");
    }
}
