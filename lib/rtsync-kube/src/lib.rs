//! Kubernetes node event source for the route table syncer
//!
//! Watches `v1/Node` objects cluster-wide, classifies watch events into
//! added/updated/deleted node events and feeds them to the work queue.
//! Signals once the initial node list has been seen and periodically
//! re-enqueues every known node.

pub mod error;
pub mod tracker;
pub mod watcher;

pub use error::WatchError;
pub use tracker::{NodeTracker, Observation};
pub use watcher::{NodeWatcher, DEFAULT_RESYNC_INTERVAL};
