//! Azure Resource Manager JSON representations of route tables

use rtsync_core::{NextHopType, Route, RouteTable, TableRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmRouteTable {
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub properties: ArmRouteTableProperties,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmRouteTableProperties {
    #[serde(default)]
    pub routes: Option<Vec<ArmRoute>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_bgp_route_propagation: Option<bool>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmRoute {
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    pub name: String,
    pub properties: ArmRouteProperties,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmRouteProperties {
    pub address_prefix: String,
    pub next_hop_type: NextHopType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_hop_ip_address: Option<String>,
}

impl ArmRouteTable {
    /// Convert into the model, dropping read-only fields
    pub fn into_model(self, table_ref: TableRef) -> RouteTable {
        let routes = self
            .properties
            .routes
            .unwrap_or_default()
            .into_iter()
            .map(|r| Route {
                name: r.name,
                address_prefix: r.properties.address_prefix,
                next_hop_type: r.properties.next_hop_type,
                next_hop_ip_address: r.properties.next_hop_ip_address,
            })
            .collect();

        RouteTable {
            table_ref,
            id: self.id,
            location: self.location,
            tags: self.tags.unwrap_or_default(),
            disable_bgp_route_propagation: self.properties.disable_bgp_route_propagation,
            routes,
        }
    }

    /// Body of a PUT request for `table`
    pub fn from_model(table: &RouteTable) -> Self {
        let routes = table
            .routes
            .iter()
            .map(|r| ArmRoute {
                id: None,
                name: r.name.clone(),
                properties: ArmRouteProperties {
                    address_prefix: r.address_prefix.clone(),
                    next_hop_type: r.next_hop_type.clone(),
                    next_hop_ip_address: r.next_hop_ip_address.clone(),
                },
            })
            .collect();

        Self {
            id: None,
            name: Some(table.table_ref.name.clone()),
            location: table.location.clone(),
            tags: (!table.tags.is_empty()).then(|| table.tags.clone()),
            properties: ArmRouteTableProperties {
                routes: Some(routes),
                disable_bgp_route_propagation: table.disable_bgp_route_propagation,
                provisioning_state: None,
            },
        }
    }
}

/// ARM error envelope: `{"error": {"code": ..., "message": ...}}`
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArmErrorResponse {
    #[serde(default)]
    pub error: ArmErrorDetail,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArmErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Body returned by an `Azure-AsyncOperation` status URL
#[derive(Clone, Debug, Deserialize)]
pub struct OperationStatus {
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<ArmErrorDetail>,
}

/// Whether an operation or provisioning state will not change anymore
pub fn is_terminal_state(state: &str) -> bool {
    ["Succeeded", "Failed", "Canceled"]
        .iter()
        .any(|s| s.eq_ignore_ascii_case(state))
}
