//! Control loop feeding node events into serialized reconciliation passes

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::metrics::ControllerMetrics;
use crate::queue::{Throttle, WorkQueue, WorkQueueSender};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::store::RouteStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// States of the control loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Waiting for the node cache to sync
    Syncing,
    /// Waiting for a node event
    Idle,
    /// Sleeping to honor the minimum reconcile interval
    Throttling,
    Reconciling,
    /// Sleeping after a failed pass
    ErrorBackoff,
    Stopped,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Syncing => "syncing",
            ControllerState::Idle => "idle",
            ControllerState::Throttling => "throttling",
            ControllerState::Reconciling => "reconciling",
            ControllerState::ErrorBackoff => "error-backoff",
            ControllerState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Single consumer of the work queue. At most one reconciliation is in
/// flight because only this loop runs them.
pub struct RouteTableController {
    reconciler: Reconciler,
    queue: WorkQueue,
    throttle: Throttle,
    error_backoff: Duration,
    shutdown: CancellationToken,
    state: watch::Sender<ControllerState>,
    metrics: ControllerMetrics,
}

impl RouteTableController {
    /// Create the controller and the sender event sources enqueue into
    pub fn new(
        config: ControllerConfig,
        store: Arc<dyn RouteStore>,
        metrics: ControllerMetrics,
        shutdown: CancellationToken,
    ) -> (Self, WorkQueueSender) {
        let (sender, queue) = WorkQueue::new(config.queue_capacity);
        let (state, _) = watch::channel(ControllerState::Syncing);
        let controller = Self {
            reconciler: Reconciler::new(store, &config),
            queue,
            throttle: Throttle::new(config.min_reconcile_interval),
            error_backoff: config.error_backoff,
            shutdown,
            state,
            metrics,
        };
        (controller, sender)
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    /// Run until shutdown.
    ///
    /// `synced` fires once the node event source finished its initial list.
    /// If it is dropped first, the loop stops with [`ControllerError::CacheSync`].
    pub async fn run(mut self, synced: oneshot::Receiver<()>) -> Result<(), ControllerError> {
        self.transition(ControllerState::Syncing);
        let synced = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => None,
            res = synced => Some(res.is_ok()),
        };
        match synced {
            None => {
                self.transition(ControllerState::Stopped);
                return Ok(());
            }
            Some(false) => {
                error!("Node informer failed to sync");
                self.transition(ControllerState::Stopped);
                return Err(ControllerError::CacheSync);
            }
            Some(true) => {}
        }

        // The first pass starts no earlier than one interval after sync.
        // Every queued event still gets its own pass.
        self.throttle.mark(Instant::now());
        info!("Syncer started");

        loop {
            self.transition(ControllerState::Idle);
            let Some(event) = self.queue.dequeue(&self.shutdown).await else {
                break;
            };
            info!(node = %event.node, kind = %event.kind, "Processing node");
            self.metrics.observe_event(event.kind.as_str());

            if let Some(wait) = self.throttle.remaining(Instant::now()) {
                debug!(
                    wait_ms = wait.as_millis() as u64,
                    "Last update too recent, sleeping before next update"
                );
                self.transition(ControllerState::Throttling);
                if !self.sleep(wait).await {
                    break;
                }
            }

            self.transition(ControllerState::Reconciling);
            let started = Instant::now();
            let result = self.reconciler.reconcile().await;
            let elapsed = started.elapsed().as_secs_f64();

            match result {
                Ok(outcome) => {
                    self.metrics.observe_pass(outcome.label(), elapsed);
                    if let ReconcileOutcome::Updated { status, .. } = &outcome {
                        self.metrics.observe_update(status.as_str());
                    }
                    self.metrics.mark_success();
                    info!(node = %event.node, outcome = outcome.label(), "Processed node");
                }
                Err(e) => {
                    self.metrics.observe_pass(e.kind(), elapsed);
                    error!(node = %event.node, error = %e, "Error processing node");
                    self.transition(ControllerState::ErrorBackoff);
                    if !self.sleep(self.error_backoff).await {
                        break;
                    }
                }
            }

            self.throttle.mark(Instant::now());
        }

        info!(pending = self.queue.len(), "Syncer stopped");
        self.transition(ControllerState::Stopped);
        Ok(())
    }

    /// Sleep unless shutdown is requested first. Returns false on shutdown.
    async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }

    fn transition(&self, next: ControllerState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "Controller state change");
        }
    }
}
