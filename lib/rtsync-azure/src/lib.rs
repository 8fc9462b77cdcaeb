//! Azure Resource Manager backend for the route table syncer
//!
//! Provides the ARM route store with long-running operation polling,
//! the credentials used to authenticate against ARM, and loading of the
//! cloud provider config found on cluster nodes.

pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod wire;

#[cfg(test)]
mod testing;

pub use client::{ArmPendingUpdate, ArmRouteStore, API_VERSION, DEFAULT_ENDPOINT};
pub use config::{CloudProviderConfig, DEFAULT_AZURE_JSON_PATH};
pub use credential::{
    AccessToken, AzureCliCredential, CachedCredential, ManagedIdentityCredential, TokenCredential,
    ARM_RESOURCE,
};
pub use error::{ConfigError, CredentialError};
