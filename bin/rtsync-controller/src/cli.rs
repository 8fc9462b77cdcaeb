use clap::{Parser, ValueEnum};
use rtsync_azure::{CloudProviderConfig, DEFAULT_AZURE_JSON_PATH};
use rtsync_core::TableRef;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Mirror the cluster-managed routes of the node route table into another route table
#[derive(Parser, Debug)]
#[command(name = "rtsync-controller", version)]
pub struct Args {
    /// Run outside the cluster with Azure CLI credentials and the local kubeconfig
    #[arg(long)]
    pub local: bool,

    /// Cloud provider config of the cluster
    #[arg(long, default_value = DEFAULT_AZURE_JSON_PATH)]
    pub azure_json: PathBuf,

    /// Route table receiving the managed routes
    #[arg(long, default_value = "rt-agw")]
    pub destination: String,

    /// Resource group of the destination table [default: vnetResourceGroup]
    #[arg(long)]
    pub destination_resource_group: Option<String>,

    #[arg(long)]
    pub subscription_id: Option<String>,

    /// Resource group of the source table [default: routeTableResourceGroup]
    #[arg(long)]
    pub source_resource_group: Option<String>,

    /// Source route table [default: routeTableName]
    #[arg(long)]
    pub source_table: Option<String>,

    /// Kubeconfig context used with --local
    #[arg(long)]
    pub context: Option<String>,

    /// Re-enqueue every known node this often
    #[arg(long, default_value_t = 86400)]
    pub resync_interval_secs: u64,

    /// Address serving /metrics, /healthz and /readyz
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub metrics_addr: SocketAddr,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    /// Overlay the command line overrides on the cloud provider config
    pub fn apply_overrides(&self, config: &mut CloudProviderConfig) {
        if let Some(subscription_id) = &self.subscription_id {
            config.subscription_id = subscription_id.clone();
        }
        if let Some(rg) = &self.source_resource_group {
            config.route_table_resource_group = rg.clone();
        }
        if let Some(table) = &self.source_table {
            config.route_table_name = table.clone();
        }
    }

    pub fn destination_table(&self, config: &CloudProviderConfig) -> TableRef {
        let rg = self
            .destination_resource_group
            .as_deref()
            .unwrap_or_else(|| config.destination_resource_group());
        TableRef::new(rg, &self.destination)
    }
}
