//! In-process stand-in for the local network-configuration service.
//!
//! **Note:** This module is only compiled for tests.
//!
//! Serves scripted answers per path with `tiny_http`, one thread per request,
//! and records every request it sees. It also tracks how many requests to
//! each path were being handled at the same time, which is how the tests
//! observe serialization.

use std::collections::HashMap;
use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

/// A request as seen by the fake service.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path without the leading `/`.
    pub path: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
struct Scripted {
    status: u16,
    body: String,
    delay: Duration,
}

#[derive(Debug, Default)]
struct FakeState {
    routes: HashMap<String, Scripted>,
    requests: Vec<RecordedRequest>,
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
}

/// Fake local service bound to an ephemeral loopback port.
pub struct FakeNetworkService {
    server: Arc<Server>,
    state: Arc<Mutex<FakeState>>,
    handle: Option<thread::JoinHandle<()>>,
    port: u16,
}

impl FakeNetworkService {
    /// Start serving. Unscripted paths answer 404.
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind fake service"));
        let port = server
            .server_addr()
            .to_ip()
            .expect("fake service listens on TCP")
            .port();
        let state = Arc::new(Mutex::new(FakeState::default()));

        let loop_server = server.clone();
        let loop_state = state.clone();
        let handle = thread::spawn(move || {
            for request in loop_server.incoming_requests() {
                let state = loop_state.clone();
                thread::spawn(move || Self::handle(request, state));
            }
        });

        Self {
            server,
            state,
            handle: Some(handle),
            port,
        }
    }

    /// Base URL with trailing slash, as `AgentConfig::api_base` expects.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }

    /// Answer `path` with `status` and `body` from now on.
    pub fn respond(&self, path: &str, status: u16, body: &str) {
        self.respond_after(path, status, body, Duration::ZERO);
    }

    /// Like [`respond`](Self::respond), but hold the answer for `delay`.
    pub fn respond_after(&self, path: &str, status: u16, body: &str, delay: Duration) {
        self.state.lock().unwrap().routes.insert(
            path.to_string(),
            Scripted {
                status,
                body: body.to_string(),
                delay,
            },
        );
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Requests received for `path`.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    /// Highest number of concurrently handled requests to `path`.
    pub fn max_in_flight(&self, path: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .max_in_flight
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    fn handle(mut request: tiny_http::Request, state: Arc<Mutex<FakeState>>) {
        let path = request.url().trim_start_matches('/').to_string();
        let content_type = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Content-Type"))
            .map(|h| h.value.as_str().to_string());
        let mut body = Vec::new();
        let _ = request.as_reader().read_to_end(&mut body);

        let scripted = {
            let mut state = state.lock().unwrap();
            state.requests.push(RecordedRequest {
                method: request.method().as_str().to_string(),
                path: path.clone(),
                body,
                content_type,
            });
            let in_flight = state.in_flight.entry(path.clone()).or_insert(0);
            *in_flight += 1;
            let current = *in_flight;
            let max = state.max_in_flight.entry(path.clone()).or_insert(0);
            *max = (*max).max(current);
            state.routes.get(&path).cloned()
        };

        let response = match scripted {
            Some(scripted) => {
                if !scripted.delay.is_zero() {
                    thread::sleep(scripted.delay);
                }
                let json =
                    Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
                Response::from_string(scripted.body)
                    .with_status_code(scripted.status)
                    .with_header(json)
            }
            None => Response::from_string("Not Found").with_status_code(404),
        };

        if let Some(n) = state.lock().unwrap().in_flight.get_mut(&path) {
            *n -= 1;
        }
        let _ = request.respond(response);
    }
}

impl Drop for FakeNetworkService {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
