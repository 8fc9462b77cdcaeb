//! Core of the route table syncer
//!
//! This library provides:
//! - Route table model and the route store abstraction
//! - Fingerprinting and divergence detection of managed routes
//! - The reconciler that mirrors managed routes into the destination table
//! - A bounded work queue and the throttled control loop that drives it

pub mod config;
pub mod controller;
pub mod diff;
pub mod error;
pub mod event;
pub mod metrics;
pub mod queue;
pub mod reconciler;
pub mod route;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::ControllerConfig;
pub use controller::{ControllerState, RouteTableController};
pub use error::{ControllerError, ReconcileError, Result, StoreError};
pub use event::{NodeEvent, NodeEventKind, NodeRef};
pub use metrics::ControllerMetrics;
pub use queue::{QueueClosed, Throttle, WorkQueue, WorkQueueSender};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use route::{NextHopType, Route, RouteTable, TableRef};
pub use store::{CompletedUpdate, PendingUpdate, RouteStore, TerminalStatus};
