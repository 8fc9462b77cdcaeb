//! In-memory route store used by unit tests

use crate::error::StoreError;
use crate::route::{NextHopType, Route, RouteTable, TableRef};
use crate::store::{PendingUpdate, RouteStore, TerminalStatus};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

pub fn route(name: &str, prefix: &str, next_hop: &str) -> Route {
    Route {
        name: name.to_string(),
        address_prefix: prefix.to_string(),
        next_hop_type: NextHopType::VirtualAppliance,
        next_hop_ip_address: Some(next_hop.to_string()),
    }
}

pub struct FakeRouteStore {
    tables: Mutex<HashMap<TableRef, RouteTable>>,
    updates: Mutex<Vec<RouteTable>>,
    failing_gets: Mutex<HashSet<TableRef>>,
    status: Mutex<TerminalStatus>,
    fail_updates: AtomicBool,
    fail_waits: AtomicBool,
    get_calls: AtomicUsize,
    fetches: Mutex<Vec<(TableRef, Instant)>>,
}

impl FakeRouteStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
            failing_gets: Mutex::new(HashSet::new()),
            status: Mutex::new(TerminalStatus::Succeeded),
            fail_updates: AtomicBool::new(false),
            fail_waits: AtomicBool::new(false),
            get_calls: AtomicUsize::new(0),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn insert(&self, table_ref: &TableRef, routes: Vec<Route>) {
        let mut table = RouteTable::new(table_ref.clone(), "westus2");
        table.routes = routes;
        self.tables.lock().unwrap().insert(table_ref.clone(), table);
    }

    pub fn fail_get(&self, table_ref: &TableRef) {
        self.failing_gets.lock().unwrap().insert(table_ref.clone());
    }

    pub fn heal_gets(&self) {
        self.failing_gets.lock().unwrap().clear();
    }

    pub fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub fn fail_waits(&self) {
        self.fail_waits.store(true, Ordering::SeqCst);
    }

    pub fn set_status(&self, status: TerminalStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn updates(&self) -> Vec<RouteTable> {
        self.updates.lock().unwrap().clone()
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Instants at which `table` was fetched
    pub fn fetch_times(&self, table: &TableRef) -> Vec<Instant> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, at)| *at)
            .collect()
    }
}

struct FakePending {
    result: Result<TerminalStatus, StoreError>,
}

#[async_trait]
impl PendingUpdate for FakePending {
    async fn wait(self: Box<Self>) -> Result<TerminalStatus, StoreError> {
        self.result
    }
}

#[async_trait]
impl RouteStore for FakeRouteStore {
    async fn get(&self, table: &TableRef) -> Result<RouteTable, StoreError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.fetches.lock().unwrap().push((table.clone(), Instant::now()));
        if self.failing_gets.lock().unwrap().contains(table) {
            return Err(StoreError::Http("connection reset".to_string()));
        }
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(table.clone()))
    }

    async fn create_or_update(
        &self,
        table: &RouteTable,
    ) -> Result<Box<dyn PendingUpdate>, StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 409,
                code: "AnotherOperationInProgress".to_string(),
                message: "conflict".to_string(),
            });
        }
        self.updates.lock().unwrap().push(table.clone());

        if self.fail_waits.load(Ordering::SeqCst) {
            return Ok(Box::new(FakePending {
                result: Err(StoreError::Operation("polling timed out".to_string())),
            }));
        }

        let status = self.status.lock().unwrap().clone();
        if status.is_success() {
            self.tables
                .lock()
                .unwrap()
                .insert(table.table_ref.clone(), table.clone());
        }
        Ok(Box::new(FakePending { result: Ok(status) }))
    }
}
