use rtsync_core::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to run Azure CLI: {0}")]
    CliUnavailable(#[from] std::io::Error),

    #[error("Azure CLI exited with {status}: {stderr}")]
    CliFailed { status: String, stderr: String },

    #[error("Token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Token endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    Malformed(String),
}

impl From<CredentialError> for StoreError {
    fn from(err: CredentialError) -> Self {
        StoreError::Credential(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid cloud provider config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Cloud provider config is missing {0}")]
    Missing(&'static str),
}
