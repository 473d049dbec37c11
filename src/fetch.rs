//! # Bounded Fetcher
//!
//! Admission-controlled upstream HTTP gateway. At most `concurrency`
//! downloads are in flight at once; further callers wait (without spinning)
//! for a slot and are admitted in FIFO order as slots free up.
//!
//! ```text
//! caller ─┐
//! caller ─┼─► [ semaphore: N slots ] ─► reqwest (timeout) ─► bytes | FetchError
//! caller ─┘        ▲
//!                  └── slot released on every exit path (drop of the permit)
//! ```
//!
//! A slot is held by an RAII permit, so success, error, timeout and a caller
//! abandoning the future all return it.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default slot count: twice the available processing units.
pub fn default_concurrency() -> usize {
    2 * std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Client-facing classification of a fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Upstream answered 404.
    NotFound,
    /// Anything else: other statuses, transport failures, timeouts.
    Unavailable,
}

/// Errors returned by [`Fetcher::fetch`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a status ≥ 300.
    #[error("Upstream returned HTTP {status}")]
    Status { status: u16, body: Vec<u8> },

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Fetcher is shut down")]
    Closed,
}

impl FetchError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(e)
        }
    }

    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Status { status: 404, .. } => FetchErrorKind::NotFound,
            _ => FetchErrorKind::Unavailable,
        }
    }

    /// Upstream HTTP status, when the failure was a status response.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == FetchErrorKind::NotFound
    }
}

/// Fetcher settings.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Maximum simultaneous downloads.
    pub concurrency: usize,
    /// Whole-request timeout (connect + headers + body).
    pub timeout: Duration,
    pub user_agent: String,
    /// Honour HTTP(S)_PROXY environment variables.
    pub use_system_proxy: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("vitrine/", env!("CARGO_PKG_VERSION")).to_string(),
            use_system_proxy: true,
        }
    }
}

/// Concurrency-bounded HTTP downloader shared by every render.
pub struct Fetcher {
    client: reqwest::Client,
    slots: Semaphore,
    max: usize,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let max = config.concurrency.max(1);
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            slots: Semaphore::new(max),
            max,
        })
    }

    /// Configured slot count.
    pub fn max_concurrency(&self) -> usize {
        self.max
    }

    /// Downloads currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max - self.slots.available_permits()
    }

    /// Download `uri`, waiting for a free slot first. `tag` labels the caller
    /// in logs.
    pub async fn fetch(&self, uri: &str, tag: &str) -> Result<Vec<u8>, FetchError> {
        let start = Instant::now();
        let _permit = self.slots.acquire().await.map_err(|_| FetchError::Closed)?;
        let wait = start.elapsed();

        let dl_start = Instant::now();
        let result = self.download(uri).await;
        let dur = dl_start.elapsed();

        match &result {
            Ok(body) => info!(
                tag,
                uri,
                wait_ms = wait.as_millis() as u64,
                dur_ms = dur.as_millis() as u64,
                bytes = body.len(),
                "downloaded"
            ),
            Err(e) => warn!(
                tag,
                uri,
                wait_ms = wait.as_millis() as u64,
                dur_ms = dur.as_millis() as u64,
                status = e.status().unwrap_or(0),
                error = %e,
                "download failed"
            ),
        }

        result
    }

    async fn download(&self, uri: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status().as_u16();
        if status >= 300 {
            let body = match response.bytes().await {
                Ok(b) => b.to_vec(),
                Err(e) => {
                    debug!(uri, status, error = %e, "error body unreadable");
                    Vec::new()
                }
            };
            return Err(FetchError::Status { status, body });
        }

        let body = response.bytes().await.map_err(FetchError::from_reqwest)?;
        Ok(body.to_vec())
    }
}
