//! Concurrent fan-out of one operation across many devices.
//!
//! This module provides the dispatch core:
//! - One spawned task per host, bounded by a worker-pool size
//! - Per-host failure isolation: connection errors, device rejections and
//!   even panics become a failed [`DeviceResult`] for that host only
//! - Completion-order streaming, so fast hosts are routed before slow ones
//! - A full drain before [`Dispatcher::dispatch`] returns
//!
//! Results are consumed by a single loop, which makes that loop the only
//! writer to the output destination.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, Stream, StreamExt};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::operation::Operation;
use crate::router::ResultRouter;
use crate::session::SessionProvider;

/// Why a host's operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The session could not be opened (auth, timeout, unreachable).
    Connection,
    /// The device rejected or did not finish the operation.
    Operation,
    /// The host task itself died.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure { kind: FailureKind, message: String },
}

/// The single result produced for one host.
///
/// # Examples
///
/// ```
/// use netdispatch::dispatch::{DeviceResult, FailureKind, Outcome};
///
/// let ok = DeviceResult::success("10.0.0.1", "Hostname: r1\n", 120);
/// assert!(ok.is_success());
/// assert!(ok.payload.contains("Results from device: 10.0.0.1"));
///
/// let failed = DeviceResult::failure("10.0.0.2", FailureKind::Connection, "refused", 5);
/// assert!(matches!(failed.outcome, Outcome::Failure { kind: FailureKind::Connection, .. }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceResult {
    /// The host this result belongs to. Routing relies on this field only.
    pub host: String,
    /// Text to emit: a banner naming the host followed by the device output
    /// or the error message.
    pub payload: String,
    pub outcome: Outcome,
    /// Time from task start to completion in milliseconds
    pub elapsed_ms: u64,
}

impl DeviceResult {
    pub fn success(host: impl Into<String>, output: &str, elapsed_ms: u64) -> Self {
        let host = host.into();
        let payload = format!("{}{}", banner(&host), with_newline(output));
        Self {
            host,
            payload,
            outcome: Outcome::Success,
            elapsed_ms,
        }
    }

    pub fn failure(
        host: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        let host = host.into();
        let message = message.into();
        let payload = format!("{}{}", banner(&host), with_newline(&message));
        Self {
            host,
            payload,
            outcome: Outcome::Failure { kind, message },
            elapsed_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success)
    }
}

/// Header placed in front of every host's output.
pub fn banner(host: &str) -> String {
    format!("{}\nResults from device: {}\n", "=".repeat(50), host)
}

fn with_newline(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{text}\n")
    }
}

/// Tally of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DispatchSummary {
    fn record(&mut self, result: &DeviceResult) {
        self.total += 1;
        if result.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Runs an operation against every host through a [`SessionProvider`].
pub struct Dispatcher<P> {
    provider: Arc<P>,
    max_parallel: usize,
}

impl<P: SessionProvider> Dispatcher<P> {
    /// Creates a dispatcher with the default pool size.
    pub fn new(provider: P) -> Self {
        Self {
            provider: Arc::new(provider),
            max_parallel: default_pool_size(),
        }
    }

    /// Overrides the number of hosts worked on at once. Zero is raised to one.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Streams one result per host in completion order.
    ///
    /// At most `max_parallel` host tasks exist at any moment; the next host is
    /// spawned only when a running one finishes. Every task runs on the
    /// runtime's worker threads, so a slow session never stalls the others.
    pub fn results<'a>(
        &'a self,
        hosts: &'a [String],
        config: Arc<ConnectionConfig>,
        operation: Arc<Operation>,
    ) -> impl Stream<Item = DeviceResult> + 'a {
        stream::iter(hosts)
            .map(move |host| {
                let provider = Arc::clone(&self.provider);
                let config = Arc::clone(&config);
                let operation = Arc::clone(&operation);
                let host = host.clone();

                async move {
                    let start = Instant::now();
                    let task = tokio::spawn(run_on_host(
                        provider,
                        host.clone(),
                        config,
                        operation,
                    ));

                    match task.await {
                        Ok(result) => result,
                        Err(e) => {
                            warn!("Task for {} did not complete: {}", host, e);
                            DeviceResult::failure(
                                host,
                                FailureKind::Internal,
                                format!("Task for this device did not complete: {e}"),
                                start.elapsed().as_millis() as u64,
                            )
                        }
                    }
                }
            })
            .buffer_unordered(self.max_parallel)
    }

    /// Runs `operation` on every host and routes each result as it arrives.
    ///
    /// Returns only after every host has produced a result and that result
    /// has been routed. Per-host failures are routed like any other result
    /// and never end the dispatch early.
    pub async fn dispatch<W>(
        &self,
        hosts: &[String],
        config: Arc<ConnectionConfig>,
        operation: Arc<Operation>,
        router: &mut ResultRouter<W>,
    ) -> DispatchSummary
    where
        W: AsyncWrite + Unpin + Send,
    {
        info!(
            "Dispatching {} ({}) to {} host(s), {} at a time, output to {:?}",
            operation.name(),
            if operation.is_read_only() { "read-only" } else { "changes devices" },
            hosts.len(),
            self.max_parallel,
            router.destination()
        );

        let mut summary = DispatchSummary::default();
        let results = self.results(hosts, config, operation);
        futures::pin_mut!(results);

        while let Some(result) = results.next().await {
            debug!(
                "{} finished in {}ms ({})",
                result.host,
                result.elapsed_ms,
                if result.is_success() { "ok" } else { "failed" }
            );
            summary.record(&result);
            router.route(&result).await;
        }

        info!(
            "Dispatch finished: {} succeeded, {} failed, {} total",
            summary.succeeded, summary.failed, summary.total
        );
        summary
    }
}

/// Default worker-pool size: twice the available parallelism.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        * 2
}

async fn run_on_host<P>(
    provider: Arc<P>,
    host: String,
    config: Arc<ConnectionConfig>,
    operation: Arc<Operation>,
) -> DeviceResult
where
    P: SessionProvider + ?Sized,
{
    let start = Instant::now();
    debug!("Opening session to {} for {}", host, operation.name());

    let mut session = match provider.open(&host, &config).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Connection to {} failed: {}", host, e);
            return DeviceResult::failure(host, e.kind(), e.to_string(), elapsed_ms(start));
        }
    };

    let output = session.execute(&operation).await;
    session.close().await;

    match output {
        Ok(output) => DeviceResult::success(host, &output, elapsed_ms(start)),
        Err(e) => {
            warn!("{} failed on {}: {}", operation.name(), host, e);
            DeviceResult::failure(host, e.kind(), e.to_string(), elapsed_ms(start))
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
