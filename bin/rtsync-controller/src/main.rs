use anyhow::{Context, Result};
use clap::Parser;
use kube::config::KubeConfigOptions;
use kube::Client;
use rtsync_azure::{
    ArmRouteStore, AzureCliCredential, CachedCredential, CloudProviderConfig,
    ManagedIdentityCredential, TokenCredential,
};
use rtsync_core::{ControllerConfig, ControllerMetrics, RouteTableController};
use rtsync_kube::NodeWatcher;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod server;

use cli::{Args, LogFormat};
use server::StatusService;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    info!("Starting rtsync-controller...");

    let cloud = load_cloud_config(&args)?;
    let source = cloud.source_table();
    let destination = args.destination_table(&cloud);
    info!(source = %source, destination = %destination, "Mirroring managed routes");

    let credential = credential(&args, &cloud);
    let store = Arc::new(ArmRouteStore::new(&cloud.subscription_id, credential));
    let client = kube_client(&args).await?;

    let metrics = ControllerMetrics::new().context("Failed to create metrics registry")?;
    let shutdown = CancellationToken::new();

    let (controller, queue) = RouteTableController::new(
        ControllerConfig::new(source, destination),
        store,
        metrics.clone(),
        shutdown.clone(),
    );
    let state = controller.subscribe();
    let (synced_tx, synced_rx) = oneshot::channel();

    let watcher = NodeWatcher::new(
        queue,
        Duration::from_secs(args.resync_interval_secs),
        shutdown.clone(),
    );
    let watcher_shutdown = shutdown.clone();
    let watcher_task = tokio::spawn(async move {
        if let Err(e) = watcher.run(client, synced_tx).await {
            error!("Node watcher error: {}", e);
            watcher_shutdown.cancel();
        }
    });

    let server_task = tokio::spawn(server::serve(
        args.metrics_addr,
        StatusService::new(metrics, state),
        shutdown.clone(),
    ));

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let result = controller.run(synced_rx).await;
    shutdown.cancel();

    if let Err(e) = watcher_task.await {
        warn!("Node watcher task failed: {}", e);
    }
    match server_task.await {
        Ok(Err(e)) => warn!("Status server error: {}", e),
        Err(e) => warn!("Status server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    result?;
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_cloud_config(args: &Args) -> Result<CloudProviderConfig> {
    let mut cloud = match CloudProviderConfig::load(&args.azure_json) {
        Ok(cloud) => cloud,
        // Outside the cluster the flags can stand in for azure.json
        Err(e) if args.local => {
            warn!("Using command line settings only: {}", e);
            CloudProviderConfig::default()
        }
        Err(e) => return Err(e).context("Failed to load cloud provider config"),
    };
    args.apply_overrides(&mut cloud);
    cloud.apply_defaults();
    cloud.validate()?;
    Ok(cloud)
}

fn credential(args: &Args, cloud: &CloudProviderConfig) -> Arc<dyn TokenCredential> {
    let inner: Arc<dyn TokenCredential> = if args.local {
        info!("Using Azure CLI credentials");
        Arc::new(AzureCliCredential)
    } else {
        let client_id = cloud.user_assigned_identity().map(str::to_string);
        info!(client_id = client_id.as_deref().unwrap_or("system"), "Using managed identity");
        Arc::new(ManagedIdentityCredential::new(client_id))
    };
    Arc::new(CachedCredential::new(inner))
}

async fn kube_client(args: &Args) -> Result<Client> {
    if !args.local {
        return Client::try_default()
            .await
            .context("Failed to create in-cluster Kubernetes client");
    }

    let options = KubeConfigOptions {
        context: args.context.clone(),
        ..Default::default()
    };
    let config = kube::Config::from_kubeconfig(&options)
        .await
        .context("Failed to load kubeconfig")?;
    Ok(Client::try_from(config)?)
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
    info!("Shutdown signal received, exiting...");
    shutdown.cancel();
}
