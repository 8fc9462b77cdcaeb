//! Cluster-wide node watch feeding the work queue

use crate::error::WatchError;
use crate::tracker::NodeTracker;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Node;
use kube::{Api, Client};
use kube_runtime::watcher::Event;
use kube_runtime::{watcher, WatchStreamExt};
use rtsync_core::{NodeEvent, WorkQueueSender};
use std::fmt;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct NodeWatcher {
    queue: WorkQueueSender,
    resync_interval: Duration,
    shutdown: CancellationToken,
    tracker: NodeTracker,
}

impl NodeWatcher {
    pub fn new(queue: WorkQueueSender, resync_interval: Duration, shutdown: CancellationToken) -> Self {
        Self {
            queue,
            resync_interval,
            shutdown,
            tracker: NodeTracker::new(),
        }
    }

    /// Watch all nodes of the cluster until shutdown.
    ///
    /// `synced` fires once the initial node list has been received.
    pub async fn run(self, client: Client, synced: oneshot::Sender<()>) -> Result<(), WatchError> {
        let nodes: Api<Node> = Api::all(client);
        let stream = watcher(nodes, watcher::Config::default()).default_backoff();
        self.run_stream(stream, synced).await
    }

    /// Drive the watcher from an arbitrary stream of watch events
    pub async fn run_stream<S, E>(
        mut self,
        stream: S,
        synced: oneshot::Sender<()>,
    ) -> Result<(), WatchError>
    where
        S: Stream<Item = Result<Event<Node>, E>>,
        E: fmt::Display,
    {
        let mut stream = std::pin::pin!(stream);
        let mut synced = Some(synced);
        let mut resync = tokio::time::interval_at(
            Instant::now() + self.resync_interval,
            self.resync_interval,
        );
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(resync_interval = ?self.resync_interval, "Watching nodes");
        loop {
            let events: Vec<NodeEvent> = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                item = stream.next() => match item {
                    Some(Ok(event)) => {
                        let observed = self.tracker.observe(event);
                        if observed.synced {
                            info!(nodes = observed.events.len(), "Node cache synced");
                            if let Some(tx) = synced.take() {
                                let _ = tx.send(());
                            }
                        }
                        observed.events
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Node watch failed, retrying");
                        continue;
                    }
                    None => return Err(WatchError::StreamEnded),
                },
                _ = resync.tick() => {
                    if !self.tracker.is_synced() {
                        continue;
                    }
                    debug!("Resyncing known nodes");
                    self.tracker.resync()
                }
            };

            for event in events {
                if !self.enqueue(event).await? {
                    break;
                }
            }
        }

        info!("Node watcher stopped");
        Ok(())
    }

    /// Returns false when shutdown interrupted a blocked enqueue
    async fn enqueue(&self, event: NodeEvent) -> Result<bool, WatchError> {
        debug!(node = %event.node, kind = %event.kind, "Enqueueing node event");
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Ok(false),
            res = self.queue.enqueue(event) => {
                res?;
                Ok(true)
            }
        }
    }
}
