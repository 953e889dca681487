//! Single-flight token refresh
//!
//! When several requests fail with 401/403 at once, only the first one starts
//! a refresh. Everyone, the first included, parks a oneshot waiter in the
//! pending queue and is released together when that refresh finishes: `Retry`
//! on success, `DoNotRetry` on failure.
//!
//! `is_refreshing` and the queue live behind one mutex. Enqueueing a waiter and
//! electing the leader happen in the same critical section, and the flag reset
//! and queue drain happen in another, so a waiter is either drained by the
//! round in flight or starts a new round itself. None can be stranded.

use std::sync::Arc;
use std::time::Duration;

use dispatch_auth::TokenRefresher;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::error::NetworkError;
use crate::metrics;

/// Maximum replays per original request.
pub const RETRY_LIMIT: u32 = 3;

/// Called once per failed refresh round so the host can end the session.
pub type AuthFailureHook = Arc<dyn Fn() + Send + Sync>;

/// Verdict handed back to the transport for one failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Tokens were refreshed; replay the request.
    Retry,
    /// The refresh round failed; surface the request's own error.
    DoNotRetry,
    /// Not eligible for refresh; surface the carried error.
    DoNotRetryWithError(NetworkError),
}

impl RetryDecision {
    /// Metric label for this decision.
    pub fn label(&self) -> &'static str {
        match self {
            RetryDecision::Retry => "retry",
            RetryDecision::DoNotRetry => "do_not_retry",
            RetryDecision::DoNotRetryWithError(_) => "do_not_retry_with_error",
        }
    }
}

#[derive(Default)]
struct RefreshState {
    is_refreshing: bool,
    pending: Vec<oneshot::Sender<RetryDecision>>,
}

struct Shared {
    state: Mutex<RefreshState>,
    refresher: Arc<dyn TokenRefresher>,
    on_auth_failure: AuthFailureHook,
    refresh_timeout: Option<Duration>,
}

/// Serializes token refreshes across concurrently failing requests.
///
/// Cheap to clone; clones share the same refresh state.
#[derive(Clone)]
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    /// `refresh_timeout` bounds each refresh round; an expired round counts
    /// as a failed refresh. `None` lets a refresh run for as long as the
    /// transport allows.
    pub fn new(
        refresher: Arc<dyn TokenRefresher>,
        on_auth_failure: AuthFailureHook,
        refresh_timeout: Option<Duration>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RefreshState::default()),
                refresher,
                on_auth_failure,
                refresh_timeout,
            }),
        }
    }

    /// Decide whether a failed request should be replayed.
    ///
    /// Requests whose status is not 401/403, or that already used
    /// `RETRY_LIMIT` replays, get `DoNotRetryWithError(error)` immediately
    /// without touching the refresh state. Eligible requests wait for the
    /// current (or a newly started) refresh round.
    pub async fn request_retry(
        &self,
        retry_count: u32,
        status: Option<u16>,
        error: NetworkError,
    ) -> RetryDecision {
        let auth_failure = matches!(status, Some(401 | 403));
        if !auth_failure || retry_count >= RETRY_LIMIT {
            debug!(?status, retry_count, "request not eligible for token refresh");
            let decision = RetryDecision::DoNotRetryWithError(error);
            metrics::record_retry_decision(&decision);
            return decision;
        }

        info!(?status, retry_count, "authentication failed, waiting on token refresh");

        let (tx, rx) = oneshot::channel();
        let lead = {
            let mut state = self.shared.state.lock().await;
            state.pending.push(tx);
            if state.is_refreshing {
                false
            } else {
                state.is_refreshing = true;
                true
            }
        };

        if lead {
            let shared = self.shared.clone();
            tokio::spawn(async move { shared.run_refresh().await });
        }

        // The sender is only dropped undelivered when the runtime tears the
        // round down; treat as failure.
        let decision = rx.await.unwrap_or(RetryDecision::DoNotRetry);
        metrics::record_retry_decision(&decision);
        decision
    }

    /// Whether a refresh round is in flight.
    pub async fn is_refreshing(&self) -> bool {
        self.shared.state.lock().await.is_refreshing
    }

    /// Number of callers waiting on the current round.
    pub async fn pending_len(&self) -> usize {
        self.shared.state.lock().await.pending.len()
    }
}

impl Shared {
    async fn run_refresh(&self) {
        // The refresher runs in its own task so a panic surfaces as a
        // JoinError here instead of unwinding past the drain below.
        let refresher = self.refresher.clone();
        let mut task = tokio::spawn(async move { refresher.refresh().await });

        let joined = match self.refresh_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    Ok(Err(dispatch_auth::Error::Timeout(limit)))
                }
            },
            None => task.await,
        };

        let outcome = joined.unwrap_or_else(|e| {
            Err(dispatch_auth::Error::TokenRefresh(format!(
                "refresh task aborted: {e}"
            )))
        });

        let success = outcome.is_ok();
        match &outcome {
            Ok(()) => metrics::record_refresh("success"),
            Err(dispatch_auth::Error::Timeout(_)) => metrics::record_refresh("timeout"),
            Err(_) => metrics::record_refresh("failure"),
        }

        let waiters = {
            let mut state = self.state.lock().await;
            state.is_refreshing = false;
            std::mem::take(&mut state.pending)
        };

        let verdict = if success {
            RetryDecision::Retry
        } else {
            RetryDecision::DoNotRetry
        };

        match outcome {
            Ok(()) => info!(waiters = waiters.len(), "token refresh succeeded, replaying requests"),
            Err(e) => warn!(waiters = waiters.len(), error = %e, "token refresh failed, ending session"),
        }

        for waiter in waiters {
            // Receiver gone means the caller was cancelled; nothing to do.
            let _ = waiter.send(verdict.clone());
        }

        if !success {
            (self.on_auth_failure)();
        }
    }
}
