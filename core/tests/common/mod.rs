//! Shared helpers for gridwatch-core integration tests:
//! - ScriptedFetcher: per-URL canned results with optional delay
//! - GatedFetcher: holds every fetch until released
//! - TestServer: throwaway HTTP responder on a local TCP port

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use gridwatch_core::{FetchError, Fetcher, ProbeResponse};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

pub fn ok(data: Value) -> Result<ProbeResponse, FetchError> {
    Ok(ProbeResponse {
        data,
        status: 200,
        elapsed: Duration::from_millis(1),
        bytes: 0,
        fetched_at: Utc::now(),
    })
}

struct Step {
    delay: Duration,
    result: Result<ProbeResponse, FetchError>,
}

/// Replies per URL from a queue of canned results; the last one repeats
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, url: &str, result: Result<ProbeResponse, FetchError>) -> Self {
        self.reply_after(url, Duration::ZERO, result)
    }

    pub fn reply_after(
        self,
        url: &str,
        delay: Duration,
        result: Result<ProbeResponse, FetchError>,
    ) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(Step { delay, result });
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<ProbeResponse, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let (delay, result) = {
            let mut routes = self.routes.lock().unwrap();
            match routes.get_mut(url) {
                Some(queue) if queue.len() > 1 => {
                    let step = queue.pop_front().unwrap();
                    (step.delay, step.result)
                }
                Some(queue) if !queue.is_empty() => {
                    let step = &queue[0];
                    (step.delay, step.result.clone())
                }
                _ => (
                    Duration::ZERO,
                    Err(FetchError::Network {
                        message: format!("no route for {}", url),
                    }),
                ),
            }
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

/// Blocks every fetch until `release` hands out a permit
pub struct GatedFetcher {
    gate: Semaphore,
    calls: AtomicUsize,
    data: Value,
}

impl GatedFetcher {
    pub fn new(data: Value) -> Self {
        Self {
            gate: Semaphore::new(0),
            calls: AtomicUsize::new(0),
            data,
        }
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` fetches have started
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Fetcher for GatedFetcher {
    async fn fetch(&self, _url: &str) -> Result<ProbeResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.map_err(|e| FetchError::Network {
            message: e.to_string(),
        })?;
        permit.forget();
        ok(self.data.clone())
    }
}

/// One canned HTTP reply
#[derive(Clone)]
pub struct Canned {
    pub delay: Duration,
    pub bytes: Vec<u8>,
}

impl Canned {
    pub fn json(status: u16, body: &str) -> Self {
        Self::raw(status, "application/json", body.as_bytes(), true)
    }

    pub fn raw(status: u16, content_type: &str, body: &[u8], content_length: bool) -> Self {
        let reason = match status {
            200 => "OK",
            404 => "Not Found",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Status",
        };
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nConnection: close\r\n",
            status, reason, content_type
        );
        if content_length {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body);
        Self {
            delay: Duration::ZERO,
            bytes,
        }
    }

    /// Declares `declared_len` bytes but sends only `body` before closing
    pub fn truncated(body: &str, declared_len: usize) -> Self {
        let head = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\nContent-Length: {}\r\n\r\n",
            declared_len
        );
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(body.as_bytes());
        Self {
            delay: Duration::ZERO,
            bytes,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// HTTP responder answering connections with canned replies in order;
/// the last reply repeats.
pub struct TestServer {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
}

impl TestServer {
    pub async fn start(replies: Vec<Canned>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let reply = replies
                    .get(index)
                    .or_else(|| replies.last())
                    .cloned()
                    .unwrap();

                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                request.extend_from_slice(&buf[..n]);
                                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                    break;
                                }
                            }
                        }
                    }
                    if !reply.delay.is_zero() {
                        tokio::time::sleep(reply.delay).await;
                    }
                    let _ = socket.write_all(&reply.bytes).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self {
            url: format!("http://{}/data", addr),
            hits,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// A local URL nothing is listening on
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/data", addr)
}
