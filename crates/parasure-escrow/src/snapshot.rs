//! Ledger snapshot
//!
//! Persisted layout: one provider ledger entry plus one record per contract,
//! keyed by contract id.

use std::collections::BTreeMap;

use parasure_common::{Amount, ContractStatus, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contract::InsuranceContract;
use crate::provider::ProviderLedger;

/// Point-in-time copy of a provider and its contracts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub provider: ProviderLedger,
    pub contracts: BTreeMap<Uuid, InsuranceContract>,
    /// Unix seconds the snapshot was taken
    pub taken_at: i64,
}

impl LedgerSnapshot {
    /// Sum of escrow held by open contracts
    pub fn open_escrow(&self) -> Amount {
        self.contracts
            .values()
            .filter(|c| c.status == ContractStatus::Active)
            .map(|c| c.escrow)
            .sum()
    }

    /// `free + escrow == funded - withdrawn - paid out`, and the provider's committed
    /// figure matches the escrow its contracts actually hold
    pub fn is_conserved(&self) -> bool {
        self.provider.is_balanced() && self.provider.committed == self.open_escrow()
    }

    pub fn count(&self, status: ContractStatus) -> usize {
        self.contracts.values().filter(|c| c.status == status).count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
