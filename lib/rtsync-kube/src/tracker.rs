//! Translation of raw watch events into node events

use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use kube_runtime::watcher::Event;
use rtsync_core::NodeEvent;
use std::collections::BTreeSet;

/// What a single watch event produced
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Observation {
    pub events: Vec<NodeEvent>,
    /// Set on the first completed initial list only
    pub synced: bool,
}

/// Remembers which nodes exist so watch events can be classified
#[derive(Debug, Default)]
pub struct NodeTracker {
    known: BTreeSet<String>,
    listing: Option<BTreeSet<String>>,
    synced: bool,
}

impl NodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn known(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(String::as_str)
    }

    pub fn observe(&mut self, event: Event<Node>) -> Observation {
        match event {
            Event::Init => {
                self.listing = Some(BTreeSet::new());
                Observation::default()
            }
            Event::InitApply(node) => {
                self.listing.get_or_insert_with(BTreeSet::new).insert(node.name_any());
                Observation::default()
            }
            Event::InitDone => self.finish_listing(),
            Event::Apply(node) => {
                let name = node.name_any();
                let event = if self.known.insert(name.clone()) {
                    NodeEvent::added(name)
                } else {
                    NodeEvent::updated(name)
                };
                Observation { events: vec![event], synced: false }
            }
            Event::Delete(node) => {
                let name = node.name_any();
                self.known.remove(&name);
                Observation { events: vec![NodeEvent::deleted(name)], synced: false }
            }
        }
    }

    /// Updated events for every known node, used by the periodic resync
    pub fn resync(&self) -> Vec<NodeEvent> {
        self.known.iter().map(NodeEvent::updated).collect()
    }

    fn finish_listing(&mut self) -> Observation {
        let listed = self.listing.take().unwrap_or_default();

        let mut events: Vec<NodeEvent> = self
            .known
            .difference(&listed)
            .map(NodeEvent::deleted)
            .collect();
        events.extend(listed.iter().map(|name| {
            if self.known.contains(name) {
                NodeEvent::updated(name)
            } else {
                NodeEvent::added(name)
            }
        }));

        self.known = listed;
        let synced = !self.synced;
        self.synced = true;
        Observation { events, synced }
    }
}
