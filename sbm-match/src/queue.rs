//! Rate-limited request queue
//!
//! One queue per external service. Requests are dispatched strictly in
//! submission order by a single driver task. Each dispatch waits for the
//! previous one to complete and for its slot, `1 / requests_per_second`
//! seconds after the previous dispatch started. At most one request is ever in
//! flight and dispatch starts are never closer together than the interval.
//!
//! The queue is a thin transport: a non-2xx response is still a response.
//! Only network-level failures are reported as errors.
//!
//! # Lifecycle
//! - [`RequestQueue::start`] spawns the driver (requires a tokio runtime)
//! - handles are cheap to clone and may be shared between concurrent matchers
//! - [`RequestQueue::shutdown`] stops the driver; dropping every handle does too
//! - requests still pending when the driver stops fail with `QueueClosed`
//!
//! Dropping a [`Ticket`] before it resolves cancels the request: the driver
//! discards it without sending it.

use crate::error::{MatchError, Result};
use reqwest::{Client, Request, Response};
use sbm_common::config::dispatch_interval;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Caller-side retry policy for transport failures
///
/// Retries re-submit the request to the back of the queue after an
/// exponential backoff. Upstream (non-2xx) responses are never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first (0 = surface failures immediately)
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::from_millis(100),
        }
    }
}

/// Request waiting for its dispatch slot
struct QueuedRequest {
    request: Request,
    respond_to: oneshot::Sender<Dispatched>,
    enqueued_at: Instant,
}

/// What the driver reports back for a sent request
struct Dispatched {
    at: Instant,
    outcome: reqwest::Result<Response>,
}

struct QueueInner {
    name: String,
    client: Client,
    interval: Duration,
    tx: mpsc::UnboundedSender<QueuedRequest>,
    pending: Arc<AtomicUsize>,
    driver: AbortHandle,
}

/// Handle to a rate-limited queue for one external service
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("name", &self.inner.name)
            .field("interval", &self.inner.interval)
            .field("pending", &self.pending())
            .finish()
    }
}

impl RequestQueue {
    /// Create the queue and spawn its driver
    ///
    /// # Errors
    /// Configuration error when `requests_per_second` is not a positive finite
    /// number or gives no usable interval (zero or overflowing).
    pub fn start(
        name: impl Into<String>,
        client: Client,
        requests_per_second: f64,
    ) -> Result<Self> {
        let name = name.into();
        let interval = dispatch_interval(&format!("{} queue rate", name), requests_per_second)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let driver = tokio::spawn(drive(
            name.clone(),
            client.clone(),
            interval,
            rx,
            Arc::clone(&pending),
        ))
        .abort_handle();

        info!(
            queue = %name,
            interval_ms = interval.as_millis() as u64,
            "Started request queue"
        );

        Ok(Self {
            inner: Arc::new(QueueInner {
                name,
                client,
                interval,
                tx,
                pending,
                driver,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Minimum spacing between two dispatches
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// HTTP client used by the driver; build requests with it
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Number of submitted requests not yet dispatched or discarded
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Append a request and return its completion handle
    ///
    /// The request is placed in the queue immediately, so submission order is
    /// the order of `submit` calls, not of awaiting the tickets.
    pub fn submit(&self, request: Request) -> Result<Ticket> {
        let (respond_to, rx) = oneshot::channel();
        let item = QueuedRequest {
            request,
            respond_to,
            enqueued_at: Instant::now(),
        };

        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        if self.inner.tx.send(item).is_err() {
            self.inner.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(MatchError::QueueClosed(self.inner.name.clone()));
        }

        Ok(Ticket {
            queue: self.inner.name.clone(),
            rx,
        })
    }

    /// Submit a request and wait for its response
    pub async fn enqueue(&self, request: Request) -> Result<Response> {
        self.submit(request)?.await
    }

    /// Submit a request, retrying transport failures per `policy`
    pub async fn enqueue_with_retry(
        &self,
        request: Request,
        policy: &RetryPolicy,
    ) -> Result<Response> {
        if policy.max_retries == 0 {
            return self.enqueue(request).await;
        }

        let mut attempt = 0;
        let mut backoff = policy.initial_backoff;

        loop {
            let attempt_request = request.try_clone().ok_or_else(|| {
                MatchError::InvalidRequest(format!(
                    "request to {} has a streaming body and cannot be retried",
                    request.url()
                ))
            })?;

            match self.enqueue(attempt_request).await {
                Err(e) if attempt < policy.max_retries && matches!(e, MatchError::Transport { .. }) => {
                    attempt += 1;
                    warn!(
                        queue = %self.inner.name,
                        url = %request.url(),
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }

    /// Stop the driver
    ///
    /// Requests not yet dispatched resolve with `QueueClosed`; later
    /// submissions are rejected.
    pub fn shutdown(&self) {
        info!(queue = %self.inner.name, "Shutting down request queue");
        self.inner.driver.abort();
    }
}

/// Completion handle of a submitted request
///
/// Resolves with the response, the transport error, or `QueueClosed` when the
/// driver stopped first. Dropping it cancels the request if still queued.
#[must_use = "dropping a ticket cancels the request"]
pub struct Ticket {
    queue: String,
    rx: oneshot::Receiver<Dispatched>,
}

impl Ticket {
    /// Wait for the response along with the instant the driver sent the request
    pub async fn timed(self) -> Result<(Instant, Response)> {
        let queue = self.queue;
        settle(queue, self.rx.await)
    }
}

fn settle(
    queue: String,
    received: std::result::Result<Dispatched, oneshot::error::RecvError>,
) -> Result<(Instant, Response)> {
    match received {
        Ok(Dispatched {
            at,
            outcome: Ok(response),
        }) => Ok((at, response)),
        Ok(Dispatched {
            outcome: Err(source),
            ..
        }) => Err(MatchError::Transport { queue, source }),
        Err(_) => Err(MatchError::QueueClosed(queue)),
    }
}

impl Future for Ticket {
    type Output = Result<Response>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Ready(received) => {
                Poll::Ready(settle(this.queue.clone(), received).map(|(_, response)| response))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Next slot when `interval` overflows the clock
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Single consumer: one dispatch per slot, awaited before the next slot opens
async fn drive(
    name: String,
    client: Client,
    interval: Duration,
    mut rx: mpsc::UnboundedReceiver<QueuedRequest>,
    pending: Arc<AtomicUsize>,
) {
    let mut next_slot = Instant::now();

    while let Some(item) = rx.recv().await {
        if !item.respond_to.is_closed() {
            tokio::time::sleep_until(next_slot).await;
        }
        pending.fetch_sub(1, Ordering::SeqCst);

        // The ticket may also have been dropped while waiting for the slot
        if item.respond_to.is_closed() {
            debug!(queue = %name, url = %item.request.url(), "Discarding cancelled request");
            continue;
        }

        let dispatched_at = Instant::now();
        next_slot = dispatched_at
            .checked_add(interval)
            .unwrap_or_else(|| dispatched_at + FAR_FUTURE);

        debug!(
            queue = %name,
            method = %item.request.method(),
            url = %item.request.url(),
            waited_ms = item.enqueued_at.elapsed().as_millis() as u64,
            "Dispatching request"
        );

        let outcome = client.execute(item.request).await;
        let reply = Dispatched {
            at: dispatched_at,
            outcome,
        };
        if item.respond_to.send(reply).is_err() {
            debug!(queue = %name, "Requester dropped its ticket before the response arrived");
        }
    }

    debug!(queue = %name, "All queue handles dropped, driver stopping");
}
