//! Route store backed by the Azure Resource Manager REST API

use crate::credential::{TokenCredential, ARM_RESOURCE};
use crate::wire::{is_terminal_state, ArmErrorResponse, ArmRouteTable, OperationStatus};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::StatusCode;
use rtsync_core::{PendingUpdate, RouteStore, RouteTable, StoreError, TableRef, TerminalStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";
pub const API_VERSION: &str = "2023-09-01";

const ASYNC_OPERATION: &str = "azure-asyncoperation";

/// Poll delay when the service does not send `Retry-After`
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Give up waiting for an update after this long
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Route tables of one subscription
#[derive(Clone)]
pub struct ArmRouteStore {
    http: reqwest::Client,
    endpoint: String,
    subscription_id: String,
    credential: Arc<dyn TokenCredential>,
    poll_interval: Duration,
    operation_timeout: Duration,
}

impl ArmRouteStore {
    pub fn new(subscription_id: impl Into<String>, credential: Arc<dyn TokenCredential>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_id: subscription_id.into(),
            credential,
            poll_interval: DEFAULT_POLL_INTERVAL,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Use another ARM endpoint, e.g. a sovereign cloud
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Poll delay used when the service sends no `Retry-After`
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn table_url(&self, table: &TableRef) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/routeTables/{}?api-version={}",
            self.endpoint, self.subscription_id, table.resource_group, table.name, API_VERSION
        )
    }

    async fn token(&self) -> Result<String, StoreError> {
        Ok(self.credential.get_token(ARM_RESOURCE).await?.token)
    }
}

#[async_trait]
impl RouteStore for ArmRouteStore {
    async fn get(&self, table: &TableRef) -> Result<RouteTable, StoreError> {
        let resp = self
            .http
            .get(self.table_url(table))
            .bearer_auth(self.token().await?)
            .send()
            .await
            .map_err(http_error)?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(table.clone()));
        }
        let resp = check_status(resp).await?;
        let arm: ArmRouteTable = resp.json().await.map_err(decode_error)?;
        Ok(arm.into_model(table.clone()))
    }

    async fn create_or_update(
        &self,
        table: &RouteTable,
    ) -> Result<Box<dyn PendingUpdate>, StoreError> {
        let body = ArmRouteTable::from_model(table);
        let resp = self
            .http
            .put(self.table_url(&table.table_ref))
            .bearer_auth(self.token().await?)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        let resp = check_status(resp).await?;
        let target = poll_target(resp.headers());
        let delay = retry_after(resp.headers()).unwrap_or(self.poll_interval);

        let accepted: ArmRouteTable = resp.json().await.unwrap_or_default();
        let initial_state = accepted.properties.provisioning_state;
        // Without a poll header a non-terminal state is followed on the table itself
        let target = match (target, initial_state.as_deref()) {
            (Some(target), _) => Some(target),
            (None, Some(state)) if !is_terminal_state(state) => {
                Some(PollTarget::Resource(self.table_url(&table.table_ref)))
            }
            (None, _) => None,
        };
        debug!(
            table = %table.table_ref,
            poll = ?target,
            state = initial_state.as_deref().unwrap_or("-"),
            "Route table update accepted"
        );

        Ok(Box::new(ArmPendingUpdate {
            store: self.clone(),
            target,
            initial_state,
            delay,
        }))
    }
}

/// Where the outcome of an accepted PUT is read from
#[derive(Clone, Debug, PartialEq, Eq)]
enum PollTarget {
    /// `Azure-AsyncOperation` status resource
    Operation(String),
    /// `Location` answers 202 until the resource is ready
    Location(String),
    /// The route table, until its provisioning state settles
    Resource(String),
}

impl PollTarget {
    fn url(&self) -> &str {
        match self {
            PollTarget::Operation(url) | PollTarget::Location(url) | PollTarget::Resource(url) => url,
        }
    }

    /// Provisioning or operation state reported by a poll response body
    fn state(&self, body: &str) -> Option<String> {
        match self {
            PollTarget::Operation(_) => {
                let op = serde_json::from_str::<OperationStatus>(body).ok()?;
                if let Some(err) = op.error.as_ref() {
                    debug!(code = %err.code, message = %err.message, "Route table update reported an error");
                }
                op.status
            }
            PollTarget::Location(_) | PollTarget::Resource(_) => serde_json::from_str::<ArmRouteTable>(body)
                .ok()?
                .properties
                .provisioning_state,
        }
    }
}

/// An accepted PUT that is polled until it reaches a terminal state
pub struct ArmPendingUpdate {
    store: ArmRouteStore,
    target: Option<PollTarget>,
    initial_state: Option<String>,
    delay: Duration,
}

#[async_trait]
impl PendingUpdate for ArmPendingUpdate {
    async fn wait(self: Box<Self>) -> Result<TerminalStatus, StoreError> {
        let Some(target) = self.target else {
            let state = self.initial_state.as_deref().unwrap_or("Succeeded");
            return Ok(TerminalStatus::from(state));
        };

        let deadline = Instant::now() + self.store.operation_timeout;
        let mut delay = self.delay;
        loop {
            if Instant::now() + delay > deadline {
                return Err(StoreError::Operation(format!(
                    "operation did not finish within {:?}",
                    self.store.operation_timeout
                )));
            }
            tokio::time::sleep(delay).await;

            let resp = self
                .store
                .http
                .get(target.url())
                .bearer_auth(self.store.token().await?)
                .send()
                .await
                .map_err(http_error)?;
            let resp = check_status(resp).await?;
            delay = retry_after(resp.headers()).unwrap_or(self.store.poll_interval);

            if resp.status() == StatusCode::ACCEPTED {
                continue;
            }

            let body = resp.text().await.map_err(http_error)?;
            match target.state(&body) {
                Some(state) if is_terminal_state(&state) => {
                    return Ok(TerminalStatus::from(state.as_str()))
                }
                Some(state) => debug!(state = %state, "Route table update in progress"),
                // A finished Location poll may carry no body
                None => return Ok(TerminalStatus::Succeeded),
            }
        }
    }
}

fn poll_target(headers: &HeaderMap) -> Option<PollTarget> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    header(ASYNC_OPERATION)
        .map(PollTarget::Operation)
        .or_else(|| header(LOCATION.as_str()).map(PollTarget::Location))
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

fn api_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: ArmErrorResponse = serde_json::from_str(body).unwrap_or_default();
    let code = if parsed.error.code.is_empty() {
        status.canonical_reason().unwrap_or("Unknown").to_string()
    } else {
        parsed.error.code
    };
    let message = if parsed.error.message.is_empty() {
        body.to_string()
    } else {
        parsed.error.message
    };
    StoreError::Api { status: status.as_u16(), code, message }
}

fn http_error(err: reqwest::Error) -> StoreError {
    StoreError::Http(err.to_string())
}

fn decode_error(err: reqwest::Error) -> StoreError {
    StoreError::Decode(err.to_string())
}
