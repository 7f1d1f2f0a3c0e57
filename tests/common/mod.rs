//! Shared utilities for integration tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use dependency_guard::resilience::Retryable;
use dependency_guard::CallPolicy;

/// Error returned by scripted operations.
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum ScriptedError {
    /// Connection refused, reset, 5xx and the like.
    Unavailable,
    /// Bad request; retrying cannot help.
    Rejected,
}

impl std::fmt::Display for ScriptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScriptedError::Unavailable => write!(f, "unavailable"),
            ScriptedError::Rejected => write!(f, "rejected"),
        }
    }
}

impl Retryable for ScriptedError {
    fn is_retryable(&self) -> bool {
        matches!(self, ScriptedError::Unavailable)
    }
}

/// Shared invocation counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicU32>);

#[allow(dead_code)]
impl Counter {
    pub fn bump(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Policy with explicit knobs; everything else kept small for tests.
#[allow(dead_code, clippy::too_many_arguments)]
pub fn policy(
    timeout_ms: u64,
    max_retries: u32,
    base_ms: u64,
    multiplier: f64,
    cap_ms: u64,
    jitter_ms: u64,
    reset_ms: u64,
    probes: u32,
) -> CallPolicy {
    CallPolicy::new(
        Duration::from_millis(timeout_ms),
        max_retries,
        Duration::from_millis(base_ms),
        multiplier,
        Duration::from_millis(cap_ms),
        Duration::from_millis(jitter_ms),
        0.5,
        Duration::from_millis(reset_ms),
        probes,
    )
    .unwrap()
}

/// Start a programmable mock dependency on an ephemeral port.
///
/// `f` returns the status code and body for each request.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head; probes carry no body.
                        let mut buf = [0u8; 1024];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            408 => "408 Request Timeout",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
