//! Reconciles the destination route table against the source table

use crate::config::ControllerConfig;
use crate::diff::{diverged, managed_routes, route_map};
use crate::error::{ReconcileError, Result, StoreError};
use crate::route::{RouteTable, TableRef};
use crate::store::{RouteStore, TerminalStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a reconciliation pass that did not fail
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Managed routes already match, nothing was written
    InSync,
    /// The destination route list was replaced
    Updated { status: TerminalStatus, routes: usize },
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::InSync => "in_sync",
            ReconcileOutcome::Updated { .. } => "updated",
        }
    }
}

/// Fetches both tables and overwrites the destination's routes when the
/// managed subsets diverge
pub struct Reconciler {
    store: Arc<dyn RouteStore>,
    source: TableRef,
    destination: TableRef,
    managed_prefix: String,
}

impl Reconciler {
    pub fn new(store: Arc<dyn RouteStore>, config: &ControllerConfig) -> Self {
        Self {
            store,
            source: config.source.clone(),
            destination: config.destination.clone(),
            managed_prefix: config.managed_prefix.clone(),
        }
    }

    /// Run one fetch-diff-apply pass
    pub async fn reconcile(&self) -> Result<ReconcileOutcome> {
        let src = self.fetch(&self.source).await?;
        let src_map = route_map(&src.routes, &self.managed_prefix);

        let mut dest = self.fetch(&self.destination).await?;
        let dest_map = route_map(&dest.routes, &self.managed_prefix);

        let found_diff = diverged(&src_map, &dest_map);
        info!(
            source = %self.source,
            destination = %self.destination,
            found_diff,
            "Compared managed routes"
        );
        if !found_diff {
            return Ok(ReconcileOutcome::InSync);
        }

        // The whole destination list is replaced, unmanaged entries included.
        dest.routes = managed_routes(&src.routes, &self.managed_prefix);
        let routes = dest.routes.len();

        info!(table = %dest.display_id(), routes, "Updating route table");
        let status = self.apply(&dest).await?;

        if status.is_success() {
            info!(table = %dest.display_id(), "Route table update succeeded");
        } else {
            warn!(table = %dest.display_id(), status = %status, "Route table update did not succeed");
        }

        Ok(ReconcileOutcome::Updated { status, routes })
    }

    async fn fetch(&self, table: &TableRef) -> Result<RouteTable> {
        let fetched = self
            .store
            .get(table)
            .await
            .map_err(|source| ReconcileError::Fetch { table: table.clone(), source })?;
        debug!(table = %table, routes = fetched.routes.len(), "Fetched route table");
        Ok(fetched)
    }

    async fn apply(&self, table: &RouteTable) -> Result<TerminalStatus> {
        let apply_err = |source: StoreError| ReconcileError::Apply {
            table: table.table_ref.clone(),
            source,
        };
        let pending = self.store.create_or_update(table).await.map_err(apply_err)?;
        pending.wait().await.map_err(apply_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Route;
    use crate::testing::{route, FakeRouteStore};
    use pretty_assertions::assert_eq;

    fn config() -> ControllerConfig {
        ControllerConfig::new(
            TableRef::new("MC_rg_aks_westus2", "aks-agentpool-routetable"),
            TableRef::new("rg", "rt-agw"),
        )
    }

    fn setup(src: Vec<Route>, dest: Vec<Route>) -> (Arc<FakeRouteStore>, Reconciler) {
        let config = config();
        let store = Arc::new(FakeRouteStore::new());
        store.insert(&config.source, src);
        store.insert(&config.destination, dest);
        let reconciler = Reconciler::new(store.clone(), &config);
        (store, reconciler)
    }

    #[tokio::test]
    async fn test_empty_destination_gets_managed_routes() {
        let (store, reconciler) = setup(vec![route("aks-0", "10.0.1.0/24", "10.0.1.4")], vec![]);

        let outcome = reconciler.reconcile().await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Updated { status: TerminalStatus::Succeeded, routes: 1 }
        );

        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].table_ref, config().destination);
        assert_eq!(updates[0].routes, vec![route("aks-0", "10.0.1.0/24", "10.0.1.4")]);
    }

    #[tokio::test]
    async fn test_equal_managed_routes_skip_update() {
        let (store, reconciler) = setup(
            vec![
                route("aks-0", "10.0.1.0/24", "10.0.1.4"),
                route("aks-1", "10.0.2.0/24", "10.0.2.4"),
            ],
            vec![
                route("aks-1", "10.0.2.0/24", "10.0.2.4"),
                route("aks-0", "10.0.1.0/24", "10.0.1.4"),
                route("to-firewall", "0.0.0.0/0", "10.1.0.4"),
            ],
        );

        for _ in 0..3 {
            assert_eq!(reconciler.reconcile().await.unwrap(), ReconcileOutcome::InSync);
        }
        assert!(store.updates().is_empty());
        assert_eq!(store.get_calls(), 6);
    }

    #[tokio::test]
    async fn test_update_replaces_whole_destination_list() {
        let (store, reconciler) = setup(
            vec![
                route("aks-0", "10.0.1.0/24", "10.0.1.4"),
                route("custom-src", "10.5.0.0/16", "10.0.0.9"),
            ],
            vec![
                route("aks-0", "10.0.1.0/24", "10.0.1.99"),
                route("aks-stale", "10.0.9.0/24", "10.0.9.4"),
                route("to-firewall", "0.0.0.0/0", "10.1.0.4"),
            ],
        );

        reconciler.reconcile().await.unwrap();
        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].routes, vec![route("aks-0", "10.0.1.0/24", "10.0.1.4")]);
    }

    #[tokio::test]
    async fn test_second_pass_after_update_is_in_sync() {
        let (store, reconciler) = setup(vec![route("aks-0", "10.0.1.0/24", "10.0.1.4")], vec![]);
        assert!(matches!(reconciler.reconcile().await.unwrap(), ReconcileOutcome::Updated { .. }));
        assert_eq!(reconciler.reconcile().await.unwrap(), ReconcileOutcome::InSync);
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_source_fetch_failure_is_fetch_error() {
        let (store, reconciler) = setup(vec![], vec![]);
        store.fail_get(&config().source);

        let err = reconciler.reconcile().await.unwrap_err();
        assert!(matches!(err, ReconcileError::Fetch { ref table, .. } if *table == config().source));
        assert_eq!(err.kind(), "fetch_error");
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_destination_fetch_failure_is_fetch_error() {
        let (store, reconciler) = setup(vec![route("aks-0", "10.0.1.0/24", "10.0.1.4")], vec![]);
        store.fail_get(&config().destination);

        let err = reconciler.reconcile().await.unwrap_err();
        assert!(matches!(err, ReconcileError::Fetch { ref table, .. } if *table == config().destination));
        assert!(store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_submit_failure_is_apply_error() {
        let (store, reconciler) = setup(vec![route("aks-0", "10.0.1.0/24", "10.0.1.4")], vec![]);
        store.fail_updates();

        let err = reconciler.reconcile().await.unwrap_err();
        assert!(matches!(err, ReconcileError::Apply { .. }));
        assert_eq!(err.kind(), "apply_error");
    }

    #[tokio::test]
    async fn test_wait_failure_is_apply_error() {
        let (store, reconciler) = setup(vec![route("aks-0", "10.0.1.0/24", "10.0.1.4")], vec![]);
        store.fail_waits();

        let err = reconciler.reconcile().await.unwrap_err();
        assert!(matches!(err, ReconcileError::Apply { .. }));
    }

    #[tokio::test]
    async fn test_failed_terminal_status_is_not_an_error() {
        let (store, reconciler) = setup(vec![route("aks-0", "10.0.1.0/24", "10.0.1.4")], vec![]);
        store.set_status(TerminalStatus::Failed);

        let outcome = reconciler.reconcile().await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Updated { status: TerminalStatus::Failed, routes: 1 }
        );
    }
}
