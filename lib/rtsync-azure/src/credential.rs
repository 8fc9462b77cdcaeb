//! Bearer token sources for Azure Resource Manager

use crate::error::CredentialError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;

/// Audience of ARM tokens
pub const ARM_RESOURCE: &str = "https://management.azure.com/";

const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";

/// Tokens this close to expiry are refreshed
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - ChronoDuration::minutes(REFRESH_MARGIN_MINUTES) > now
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, CredentialError>;
}

/// Tokens from the signed-in Azure CLI, for running outside the cluster
#[derive(Clone, Debug, Default)]
pub struct AzureCliCredential;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

impl AzureCliCredential {
    fn parse(output: &[u8]) -> Result<AccessToken, CredentialError> {
        let parsed: CliToken = serde_json::from_slice(output)
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;

        let expires_on = match (parsed.expires_on_epoch, parsed.expires_on.as_deref()) {
            (Some(epoch), _) => Utc
                .timestamp_opt(epoch, 0)
                .single()
                .ok_or_else(|| CredentialError::Malformed(format!("bad expiry {}", epoch)))?,
            // Older CLI versions only report local time
            (None, Some(local)) => NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .and_then(|naive| Local.from_local_datetime(&naive).single())
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| CredentialError::Malformed(format!("bad expiry {}", local)))?,
            (None, None) => return Err(CredentialError::Malformed("missing expiry".to_string())),
        };

        Ok(AccessToken { token: parsed.access_token, expires_on })
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, CredentialError> {
        let output = Command::new("az")
            .args(["account", "get-access-token", "--resource", resource, "--output", "json"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(CredentialError::CliFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Self::parse(&output.stdout)
    }
}

/// Tokens from the instance metadata service of the node's managed identity
#[derive(Clone, Debug)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct ImdsToken {
    access_token: String,
    expires_on: String,
}

impl ManagedIdentityCredential {
    /// `client_id` selects a user-assigned identity
    pub fn new(client_id: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
        }
    }

    fn parse(body: &[u8]) -> Result<AccessToken, CredentialError> {
        let parsed: ImdsToken = serde_json::from_slice(body)
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        let epoch: i64 = parsed
            .expires_on
            .parse()
            .map_err(|_| CredentialError::Malformed(format!("bad expiry {}", parsed.expires_on)))?;
        let expires_on = Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| CredentialError::Malformed(format!("bad expiry {}", epoch)))?;
        Ok(AccessToken { token: parsed.access_token, expires_on })
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, CredentialError> {
        let mut query = vec![("api-version", IMDS_API_VERSION), ("resource", resource)];
        if let Some(client_id) = self.client_id.as_deref() {
            query.push(("client_id", client_id));
        }

        let resp = self
            .http
            .get(IMDS_TOKEN_ENDPOINT)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(CredentialError::Endpoint {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Self::parse(&body)
    }
}

/// Reuses a token until it is close to expiry
pub struct CachedCredential {
    inner: Arc<dyn TokenCredential>,
    cached: Mutex<Option<AccessToken>>,
}

impl CachedCredential {
    pub fn new(inner: Arc<dyn TokenCredential>) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenCredential for CachedCredential {
    async fn get_token(&self, resource: &str) -> Result<AccessToken, CredentialError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.clone());
        }

        let token = self.inner.get_token(resource).await?;
        debug!(expires_on = %token.expires_on, "Acquired access token");
        *cached = Some(token.clone());
        Ok(token)
    }
}
