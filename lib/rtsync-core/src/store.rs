//! Route store abstraction implemented by cloud backends

use crate::error::StoreError;
use crate::route::{RouteTable, TableRef};
use async_trait::async_trait;
use std::fmt;

/// Final state of an update operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalStatus {
    Succeeded,
    Failed,
    Canceled,
    Other(String),
}

impl TerminalStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, TerminalStatus::Succeeded)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TerminalStatus::Succeeded => "Succeeded",
            TerminalStatus::Failed => "Failed",
            TerminalStatus::Canceled => "Canceled",
            TerminalStatus::Other(status) => status,
        }
    }
}

impl From<&str> for TerminalStatus {
    fn from(value: &str) -> Self {
        match value {
            s if s.eq_ignore_ascii_case("Succeeded") => TerminalStatus::Succeeded,
            s if s.eq_ignore_ascii_case("Failed") => TerminalStatus::Failed,
            s if s.eq_ignore_ascii_case("Canceled") => TerminalStatus::Canceled,
            other => TerminalStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TerminalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to a submitted update that completes asynchronously
#[async_trait]
pub trait PendingUpdate: Send {
    /// Wait until the operation reaches a terminal status
    async fn wait(self: Box<Self>) -> Result<TerminalStatus, StoreError>;
}

/// Remote authority for route tables. Never cached locally.
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn get(&self, table: &TableRef) -> Result<RouteTable, StoreError>;

    async fn create_or_update(
        &self,
        table: &RouteTable,
    ) -> Result<Box<dyn PendingUpdate>, StoreError>;
}

/// Update that already finished when it was submitted
pub struct CompletedUpdate(pub TerminalStatus);

#[async_trait]
impl PendingUpdate for CompletedUpdate {
    async fn wait(self: Box<Self>) -> Result<TerminalStatus, StoreError> {
        Ok(self.0)
    }
}
