//! Engines and the wiring that assembles them.
//!
//! `Governance` is the assembled application: one store, one clock, and the
//! four engines sharing them. `GovernanceBuilder` swaps either collaborator
//! for tests or alternative adapters.

pub mod monthly;
pub mod permission;
pub mod phases;
pub mod recurrence;
pub mod requests;

use std::sync::Arc;

use crate::ports::{Clock, GovernanceStore, SystemClock};
use crate::store::InMemoryStore;

pub use monthly::MonthlyProgressAggregator;
pub use permission::{PermissionDecision, PermissionGate};
pub use phases::{GroupProgress, PhaseGroupManager};
pub use recurrence::{RecurrenceEngine, DEFAULT_INSTANCE_LIMIT};
pub use requests::ChangeRequestManager;

pub struct Governance {
    store: Arc<dyn GovernanceStore>,
    permissions: PermissionGate,
    requests: ChangeRequestManager,
    recurrence: RecurrenceEngine,
    monthly: MonthlyProgressAggregator,
    phases: PhaseGroupManager,
}

impl Governance {
    pub fn builder() -> GovernanceBuilder {
        GovernanceBuilder::default()
    }

    /// The shared store, for seeding and read access.
    pub fn store(&self) -> &Arc<dyn GovernanceStore> {
        &self.store
    }

    pub fn permissions(&self) -> &PermissionGate {
        &self.permissions
    }

    pub fn requests(&self) -> &ChangeRequestManager {
        &self.requests
    }

    pub fn recurrence(&self) -> &RecurrenceEngine {
        &self.recurrence
    }

    pub fn monthly(&self) -> &MonthlyProgressAggregator {
        &self.monthly
    }

    pub fn phases(&self) -> &PhaseGroupManager {
        &self.phases
    }
}

/// Wires the engines to a store and clock.
///
/// Defaults: in-memory store, system clock.
pub struct GovernanceBuilder {
    store: Option<Arc<dyn GovernanceStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl GovernanceBuilder {
    pub fn store(mut self, store: Arc<dyn GovernanceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Governance {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Governance {
            permissions: PermissionGate::new(Arc::clone(&store)),
            requests: ChangeRequestManager::new(Arc::clone(&store), Arc::clone(&clock)),
            recurrence: RecurrenceEngine::new(Arc::clone(&store), Arc::clone(&clock)),
            monthly: MonthlyProgressAggregator::new(Arc::clone(&store), Arc::clone(&clock)),
            phases: PhaseGroupManager::new(Arc::clone(&store), Arc::clone(&clock)),
            store,
        }
    }
}

impl Default for GovernanceBuilder {
    fn default() -> Self {
        Self {
            store: None,
            clock: None,
        }
    }
}
