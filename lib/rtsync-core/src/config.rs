//! Controller configuration

use crate::route::{TableRef, DEFAULT_MANAGED_PREFIX};
use std::time::Duration;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_MIN_RECONCILE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Static configuration built once at startup and handed to the controller
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Table maintained by the cluster for the node subnet
    pub source: TableRef,
    /// Table that mirrors the managed routes of `source`
    pub destination: TableRef,
    /// Routes whose name starts with this are mirrored
    pub managed_prefix: String,
    /// Pending node events before producers are blocked
    pub queue_capacity: usize,
    /// Minimum spacing between two reconciliation passes
    pub min_reconcile_interval: Duration,
    /// Sleep after a failed pass
    pub error_backoff: Duration,
}

impl ControllerConfig {
    pub fn new(source: TableRef, destination: TableRef) -> Self {
        Self {
            source,
            destination,
            managed_prefix: DEFAULT_MANAGED_PREFIX.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            min_reconcile_interval: DEFAULT_MIN_RECONCILE_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
        }
    }
}
