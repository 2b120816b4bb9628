//! Contract book - arena of contract records
//!
//! Contracts are addressed by id. Each slot carries its own transition lock,
//! so settlement of one contract never waits on another; providers keep ids
//! only and look slots up here.

use std::sync::Arc;

use dashmap::DashMap;
use parasure_oracle::OracleGateway;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::contract::InsuranceContract;

/// One contract plus the oracle it settles against
pub struct ContractSlot {
    provider_id: Uuid,
    /// Transition lock; the only path that mutates the record
    pub(crate) state: Mutex<InsuranceContract>,
    pub(crate) oracle: Arc<OracleGateway>,
}

impl ContractSlot {
    pub fn provider_id(&self) -> Uuid {
        self.provider_id
    }
}

/// Concurrent index of contract slots
#[derive(Default)]
pub struct ContractBook {
    slots: DashMap<Uuid, Arc<ContractSlot>>,
}

impl ContractBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, contract: InsuranceContract, oracle: Arc<OracleGateway>) {
        let id = contract.id;
        let slot = ContractSlot {
            provider_id: contract.provider_id,
            state: Mutex::new(contract),
            oracle,
        };
        self.slots.insert(id, Arc::new(slot));
    }

    /// Slot for `id`
    pub fn slot(&self, id: &Uuid) -> Option<Arc<ContractSlot>> {
        self.slots.get(id).map(|slot| Arc::clone(slot.value()))
    }

    /// Copy of the current record for `id`
    pub async fn get(&self, id: &Uuid) -> Option<InsuranceContract> {
        let slot = self.slot(id)?;
        let contract = slot.state.lock().await;
        Some(contract.clone())
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
