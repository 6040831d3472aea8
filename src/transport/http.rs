//! HTTP transport backed by `reqwest`.
//!
//! Each opened connection is a task on a tokio runtime. The task pushes
//! body chunks into a bounded channel and the connection drains it with
//! `try_recv`, so the polling side never waits on the network.
//!
//! # Architecture
//!
//! ```text
//! Transfer task 1 ─► mpsc ─┐
//! Transfer task 2 ─► mpsc ─┼─► RequestMultiplexer::poll (try_recv)
//! Transfer task N ─► mpsc ─┘
//! ```
//!
//! A full channel suspends the task that feeds it, which stops reading
//! from the socket until the host polls again.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use super::{Connection, TransferEvent, TransferRequest, Transport};
use crate::error::{Completion, FeedwireError, Result, TransportFailure};

/// Default request timeout for `Timeout::Default`.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-connection channel capacity (in chunks).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Default number of runtime worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 1;

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = concat!("feedwire/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Timeout applied to `Timeout::Default` requests; 0 disables it.
    pub default_timeout_secs: u64,
    /// Connect timeout; 0 disables it.
    pub connect_timeout_secs: u64,
    /// Chunks buffered per connection before its task waits.
    pub channel_capacity: usize,
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Worker threads of the owned runtime.
    pub worker_threads: usize,
}

impl HttpConfig {
    /// Default request timeout, if any.
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_secs > 0).then(|| Duration::from_secs(self.default_timeout_secs))
    }

    /// Connect timeout, if any.
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout_secs > 0).then(|| Duration::from_secs(self.connect_timeout_secs))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

/// Runtime the transfer tasks run on.
enum RuntimeSlot {
    Owned(tokio::runtime::Runtime),
    Shared(tokio::runtime::Handle),
}

impl RuntimeSlot {
    fn handle(&self) -> &tokio::runtime::Handle {
        match self {
            RuntimeSlot::Owned(runtime) => runtime.handle(),
            RuntimeSlot::Shared(handle) => handle,
        }
    }
}

/// Transport performing real HTTP GETs.
pub struct HttpTransport {
    client: reqwest::Client,
    runtime: RuntimeSlot,
    config: HttpConfig,
}

impl HttpTransport {
    /// Create a transport with its own multi-threaded runtime.
    ///
    /// Must not be called from inside an async context; use
    /// [`with_handle`](Self::with_handle) there.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("feedwire-http")
            .enable_all()
            .build()?;

        Self::build(config, RuntimeSlot::Owned(runtime))
    }

    /// Create a transport that spawns onto an existing runtime.
    pub fn with_handle(handle: tokio::runtime::Handle, config: HttpConfig) -> Result<Self> {
        Self::build(config, RuntimeSlot::Shared(handle))
    }

    fn build(config: HttpConfig, runtime: RuntimeSlot) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(connect_timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            runtime,
            config,
        })
    }

    /// Transport configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

impl Transport for HttpTransport {
    fn open(&mut self, request: &TransferRequest) -> Result<Box<dyn Connection>> {
        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in request.headers.pairs()? {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FeedwireError::InvalidHeader(name.to_string()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| FeedwireError::InvalidHeader(name.to_string()))?;
            headers.append(header_name, header_value);
        }

        let mut builder = self.client.get(&request.url).headers(headers);
        if let Some(timeout) = request.timeout.resolve(self.config.default_timeout()) {
            builder = builder.timeout(timeout);
        }

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let id = request.id;

        let task = self.runtime.handle().spawn(async move {
            let outcome = run_transfer(builder, &tx).await;
            if let Err(failure) = &outcome {
                tracing::debug!("Transfer {} failed: {}", id, failure);
            }
            let _ = tx.send(TransferEvent::Finished(outcome)).await;
        });

        Ok(Box::new(HttpConnection { rx, task }))
    }
}

/// Run one GET to completion, forwarding body chunks as they arrive.
async fn run_transfer(request: RequestBuilder, tx: &mpsc::Sender<TransferEvent>) -> Completion {
    let mut response = request.send().await?.error_for_status()?;

    while let Some(chunk) = response.chunk().await? {
        if tx.send(TransferEvent::Data(chunk)).await.is_err() {
            // Connection dropped, nobody is listening anymore
            return Ok(());
        }
    }

    Ok(())
}

/// Polling side of one transfer task.
struct HttpConnection {
    rx: mpsc::Receiver<TransferEvent>,
    task: JoinHandle<()>,
}

impl Connection for HttpConnection {
    fn next_event(&mut self) -> Option<TransferEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(TransferEvent::Finished(Err(
                TransportFailure::aborted("transfer task exited without a result"),
            ))),
        }
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}
