//! Route table model shared by the reconciler and store backends

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name prefix of routes written by the cluster's route controller
pub const DEFAULT_MANAGED_PREFIX: &str = "aks-";

/// Identifies a route table by resource group and name
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub resource_group: String,
    pub name: String,
}

impl TableRef {
    pub fn new(resource_group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_group: resource_group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.name)
    }
}

/// Next hop kind of a route
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextHopType {
    VirtualNetworkGateway,
    VnetLocal,
    Internet,
    VirtualAppliance,
    None,
    /// Value not known to this version, kept verbatim
    Other(String),
}

impl NextHopType {
    pub fn as_str(&self) -> &str {
        match self {
            NextHopType::VirtualNetworkGateway => "VirtualNetworkGateway",
            NextHopType::VnetLocal => "VnetLocal",
            NextHopType::Internet => "Internet",
            NextHopType::VirtualAppliance => "VirtualAppliance",
            NextHopType::None => "None",
            NextHopType::Other(other) => other,
        }
    }
}

impl From<&str> for NextHopType {
    fn from(value: &str) -> Self {
        match value {
            "VirtualNetworkGateway" => NextHopType::VirtualNetworkGateway,
            "VnetLocal" => NextHopType::VnetLocal,
            "Internet" => NextHopType::Internet,
            "VirtualAppliance" => NextHopType::VirtualAppliance,
            "None" => NextHopType::None,
            other => NextHopType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for NextHopType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NextHopType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NextHopType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(NextHopType::from(value.as_str()))
    }
}

/// A single route entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    /// Unique within the table
    pub name: String,
    /// CIDR, the natural key of a route
    pub address_prefix: String,
    pub next_hop_type: NextHopType,
    pub next_hop_ip_address: Option<String>,
}

impl Route {
    /// Whether the route is owned by the cluster route automation
    pub fn is_managed(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix)
    }
}

/// A route table as read from, and written back to, the route store
#[derive(Clone, Debug, PartialEq)]
pub struct RouteTable {
    pub table_ref: TableRef,
    /// Resource identifier assigned by the store
    pub id: Option<String>,
    pub location: String,
    pub tags: BTreeMap<String, String>,
    pub disable_bgp_route_propagation: Option<bool>,
    pub routes: Vec<Route>,
}

impl RouteTable {
    /// Empty table, mostly useful for fakes and tests
    pub fn new(table_ref: TableRef, location: impl Into<String>) -> Self {
        Self {
            table_ref,
            id: None,
            location: location.into(),
            tags: BTreeMap::new(),
            disable_bgp_route_propagation: None,
            routes: Vec::new(),
        }
    }

    /// Identifier for logs, falls back to resource group and name
    pub fn display_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.table_ref.to_string())
    }
}
