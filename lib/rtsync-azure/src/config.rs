//! Cloud provider config written to the cluster nodes (`azure.json`)

use crate::error::ConfigError;
use rtsync_core::TableRef;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_AZURE_JSON_PATH: &str = "/etc/kubernetes/azure.json";

/// Subset of `azure.json` the syncer needs
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProviderConfig {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub subscription_id: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub route_table_name: String,
    #[serde(default)]
    pub route_table_resource_group: String,
    #[serde(default)]
    pub vnet_resource_group: String,
    #[serde(default, rename = "userAssignedIdentityID")]
    pub user_assigned_identity_id: String,
}

impl CloudProviderConfig {
    /// Read and normalize the config file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let mut config: CloudProviderConfig = serde_json::from_str(raw)?;
        config.apply_defaults();
        Ok(config)
    }

    /// Empty resource groups inherit the cluster resource group
    pub fn apply_defaults(&mut self) {
        if self.route_table_resource_group.is_empty() {
            self.route_table_resource_group = self.resource_group.clone();
        }
        if self.vnet_resource_group.is_empty() {
            self.vnet_resource_group = self.resource_group.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscription_id.is_empty() {
            return Err(ConfigError::Missing("subscriptionId"));
        }
        if self.route_table_name.is_empty() {
            return Err(ConfigError::Missing("routeTableName"));
        }
        if self.route_table_resource_group.is_empty() {
            return Err(ConfigError::Missing("routeTableResourceGroup"));
        }
        Ok(())
    }

    /// Route table maintained by the cloud provider for the node subnet
    pub fn source_table(&self) -> TableRef {
        TableRef::new(&self.route_table_resource_group, &self.route_table_name)
    }

    /// Resource group of the destination table unless overridden
    pub fn destination_resource_group(&self) -> &str {
        &self.vnet_resource_group
    }

    pub fn user_assigned_identity(&self) -> Option<&str> {
        Some(self.user_assigned_identity_id.as_str()).filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = CloudProviderConfig::from_json(
            r#"{
                "cloud": "AzurePublicCloud",
                "tenantId": "tenant",
                "subscriptionId": "sub",
                "resourceGroup": "MC_rg_aks_westus2",
                "location": "westus2",
                "vnetName": "vnet",
                "vnetResourceGroup": "rg-network",
                "routeTableName": "aks-agentpool-37780615-routetable",
                "routeTableResourceGroup": "MC_rg_aks_westus2",
                "useManagedIdentityExtension": true,
                "userAssignedIdentityID": "client-id"
            }"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(
            config.source_table(),
            TableRef::new("MC_rg_aks_westus2", "aks-agentpool-37780615-routetable")
        );
        assert_eq!(config.destination_resource_group(), "rg-network");
        assert_eq!(config.user_assigned_identity(), Some("client-id"));
    }

    #[test]
    fn test_resource_groups_fall_back_to_cluster_group() {
        let config = CloudProviderConfig::from_json(
            r#"{"subscriptionId": "sub", "resourceGroup": "MC_rg", "routeTableName": "rt"}"#,
        )
        .unwrap();
        assert_eq!(config.route_table_resource_group, "MC_rg");
        assert_eq!(config.destination_resource_group(), "MC_rg");
        assert_eq!(config.user_assigned_identity(), None);
    }

    #[test]
    fn test_missing_fields_fail_validation() {
        let config = CloudProviderConfig::from_json(r#"{"resourceGroup": "MC_rg"}"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("subscriptionId"))
        ));

        let config =
            CloudProviderConfig::from_json(r#"{"subscriptionId": "sub", "resourceGroup": "MC_rg"}"#)
                .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("routeTableName"))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CloudProviderConfig::load("/nonexistent/azure.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            CloudProviderConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
