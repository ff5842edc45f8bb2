//! Mock Appium server
//!
//! Minimal W3C WebDriver endpoint over plain HTTP/1.1 for testing without a
//! real Appium server. One request per connection.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Default)]
struct ServerState {
    ready: bool,
    create_failures: VecDeque<(u16, Value)>,
    sessions: HashSet<String>,
    requests: Vec<String>,
    last_create: Option<Value>,
}

/// Mock Appium server
pub struct MockAppiumServer {
    addr: String,
    state: Arc<Mutex<ServerState>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockAppiumServer {
    /// Start a new mock Appium server on an ephemeral port
    pub async fn start() -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = format!("http://{}", listener.local_addr()?);
        let state = Arc::new(Mutex::new(ServerState {
            ready: true,
            ..Default::default()
        }));

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        let accept_state = state.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                tokio::spawn(Self::handle_connection(stream, accept_state.clone()));
                            }
                            Err(e) => {
                                tracing::error!("Mock Appium: Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        tracing::info!("Mock Appium: Shutdown signal received");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Base URL of the server
    pub fn url(&self) -> &str {
        &self.addr
    }

    /// Answer the next `POST /session` calls with W3C errors, in order
    pub fn fail_next_creates(&self, failures: Vec<(u16, &str, &str)>) {
        let mut state = self.state.lock().unwrap();
        for (status, error, message) in failures {
            state.create_failures.push_back((
                status,
                json!({ "value": { "error": error, "message": message, "stacktrace": "" } }),
            ));
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    /// Forget a session as if the server had dropped it
    pub fn expire_session(&self, session_id: &str) {
        self.state.lock().unwrap().sessions.remove(session_id);
    }

    pub fn live_sessions(&self) -> usize {
        self.state.lock().unwrap().sessions.len()
    }

    /// `METHOD path` lines in arrival order
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn count(&self, method: &str, path_prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|line| {
                line.split_once(' ')
                    .map(|(m, p)| m == method && p.starts_with(path_prefix))
                    .unwrap_or(false)
            })
            .count()
    }

    /// Body of the last `POST /session`
    pub fn last_create(&self) -> Option<Value> {
        self.state.lock().unwrap().last_create.clone()
    }

    async fn handle_connection(mut stream: TcpStream, state: Arc<Mutex<ServerState>>) {
        let Some((method, path, body)) = Self::read_request(&mut stream).await else {
            return;
        };
        let (status, payload) = Self::respond(&state, &method, &path, body);
        let text = payload.to_string();
        let reason = match status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            _ => "Error",
        };
        let response = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            reason,
            text.len(),
            text
        );
        if let Err(e) = stream.write_all(response.as_bytes()).await {
            tracing::debug!("Mock Appium: write error: {}", e);
        }
        let _ = stream.shutdown().await;
    }

    async fn read_request(stream: &mut TcpStream) -> Option<(String, String, Value)> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let mut lines = head.lines();
        let mut request_line = lines.next()?.split_whitespace();
        let method = request_line.next()?.to_string();
        let path = request_line.next()?.to_string();

        let content_length = lines
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);
        Some((method, path, body))
    }

    fn invalid_session(id: &str) -> (u16, Value) {
        (
            404,
            json!({ "value": {
                "error": "invalid session id",
                "message": format!("A session is either terminated or not started: {}", id),
                "stacktrace": ""
            }}),
        )
    }

    /// Route a request
    fn respond(state: &Mutex<ServerState>, method: &str, path: &str, body: Value) -> (u16, Value) {
        let mut state = state.lock().unwrap();
        state.requests.push(format!("{} {}", method, path));

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        match (method, segments.as_slice()) {
            ("GET", ["status"]) => (
                200,
                json!({ "value": { "ready": state.ready, "message": "mock appium", "build": { "version": "2.5.0" } } }),
            ),
            ("POST", ["session"]) => {
                state.last_create = Some(body);
                if let Some(failure) = state.create_failures.pop_front() {
                    return failure;
                }
                let id = uuid::Uuid::new_v4().to_string();
                state.sessions.insert(id.clone());
                (
                    200,
                    json!({ "value": { "sessionId": id, "capabilities": { "platformName": "Android" } } }),
                )
            }
            ("DELETE", ["session", id]) => {
                if state.sessions.remove(*id) {
                    (200, json!({ "value": null }))
                } else {
                    Self::invalid_session(id)
                }
            }
            ("GET", ["session", id, "timeouts"]) => {
                if state.sessions.contains(*id) {
                    (
                        200,
                        json!({ "value": { "implicit": 0, "pageLoad": 300000, "script": 30000 } }),
                    )
                } else {
                    Self::invalid_session(id)
                }
            }
            ("POST", ["session", id, "appium", "device", "terminate_app" | "activate_app"]) => {
                if state.sessions.contains(*id) {
                    (200, json!({ "value": true }))
                } else {
                    Self::invalid_session(id)
                }
            }
            _ => (
                404,
                json!({ "value": {
                    "error": "unknown command",
                    "message": format!("The requested resource could not be found: {} {}", method, path),
                    "stacktrace": ""
                }}),
            ),
        }
    }
}

impl Drop for MockAppiumServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_appium_startup() {
        let server = MockAppiumServer::start().await.unwrap();
        assert!(server.url().starts_with("http://127.0.0.1:"));
        assert_eq!(server.live_sessions(), 0);
    }

    #[test]
    fn test_unknown_route() {
        let state = Mutex::new(ServerState::default());
        let (status, body) = MockAppiumServer::respond(&state, "GET", "/nope", Value::Null);
        assert_eq!(status, 404);
        assert_eq!(body["value"]["error"], "unknown command");
    }
}
