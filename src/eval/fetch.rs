use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::{Client, Method};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A request issued by `fetch(url, options)` inside a script.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Network capability of the sandbox. Requests are fire-and-forget; the
/// script never observes a response.
#[mockall::automock]
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: FetchRequest);
}

/// Sends requests with reqwest on the ambient tokio runtime.
///
/// Requests run as spawned tasks. A short-lived host such as the CLI calls
/// [`HttpFetcher::flush`] before exiting so they are not dropped with the
/// runtime. Clones share the set of requests in flight.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
            pending: Arc::default(),
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of requests still running.
    pub fn in_flight(&self) -> usize {
        self.lock_pending()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Waits for every request spawned so far. Each one is bounded by the
    /// fetch timeout.
    pub async fn flush(&self) {
        let pending = std::mem::take(&mut *self.lock_pending());
        debug!(requests = pending.len(), "flushing fetches");
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("fetch task failed: {}", e);
            }
        }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: FetchRequest) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(url = %request.url, "fetch skipped: no async runtime");
                return;
            }
        };
        let method = match Method::from_bytes(request.method.to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(e) => {
                warn!(url = %request.url, method = %request.method, "fetch skipped: {}", e);
                return;
            }
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let url = request.url;
        let task = handle.spawn(async move {
            match builder.send().await {
                Ok(response) => debug!(%url, status = %response.status(), "fetch completed"),
                Err(e) => warn!(%url, "fetch failed: {}", e),
            }
        });
        let mut pending = self.lock_pending();
        pending.retain(|handle| !handle.is_finished());
        pending.push(task);
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_fetch_without_runtime_is_a_no_op() {
        let fetcher = HttpFetcher::new(Duration::from_millis(10));
        fetcher.fetch(FetchRequest::get("http://127.0.0.1:9/unreachable"));
    }

    #[tokio::test]
    async fn test_fetch_on_runtime_does_not_block() {
        let fetcher = HttpFetcher::new(Duration::from_millis(50));
        let started = std::time::Instant::now();
        fetcher.fetch(FetchRequest::get("http://127.0.0.1:9/unreachable"));
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_invalid_method_is_skipped() {
        let fetcher = HttpFetcher::new(Duration::from_millis(10));
        let request = FetchRequest {
            method: "NOT A METHOD".to_string(),
            ..FetchRequest::get("http://127.0.0.1:9/")
        };
        fetcher.fetch(request);
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_flush_waits_for_requests() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = vec![0; 1024];
            let read = socket.read(&mut buffer).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 204 No Content\r\ncontent-length: 0\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&buffer[..read]).to_string()
        });

        let fetcher = HttpFetcher::new(Duration::from_secs(5));
        fetcher.clone().fetch(FetchRequest::get(url));
        assert_eq!(fetcher.in_flight(), 1);
        fetcher.flush().await;
        assert_eq!(fetcher.in_flight(), 0);
        assert!(server.await.unwrap().starts_with("GET /hook"));
    }
}
