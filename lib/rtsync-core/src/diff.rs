//! Route fingerprinting and divergence detection

use crate::route::Route;
use std::collections::HashMap;

/// Address prefix mapped to the route's fingerprint
pub type RouteMap = HashMap<String, String>;

/// Fingerprint of a route: its name followed by its next hop address
pub fn fingerprint(route: &Route) -> String {
    let next_hop = route.next_hop_ip_address.as_deref().unwrap_or_default();
    let mut fp = String::with_capacity(route.name.len() + next_hop.len());
    fp.push_str(&route.name);
    fp.push_str(next_hop);
    fp
}

/// Build the fingerprint map of the managed routes in `routes`
pub fn route_map(routes: &[Route], prefix: &str) -> RouteMap {
    routes
        .iter()
        .filter(|r| r.is_managed(prefix))
        .map(|r| (r.address_prefix.clone(), fingerprint(r)))
        .collect()
}

/// Managed routes of `routes`, in their original order
pub fn managed_routes(routes: &[Route], prefix: &str) -> Vec<Route> {
    routes
        .iter()
        .filter(|r| r.is_managed(prefix))
        .cloned()
        .collect()
}

/// Returns true if any key of `left` is missing from `right` or maps to a
/// different value there.
pub fn diff(left: &RouteMap, right: &RouteMap) -> bool {
    left.iter()
        .any(|(prefix, value)| right.get(prefix) != Some(value))
}

/// Two-way divergence check used by the reconciler
pub fn diverged(source: &RouteMap, destination: &RouteMap) -> bool {
    diff(source, destination) || diff(destination, source)
}
