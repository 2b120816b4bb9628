//! Insurance contract - per-policy escrow
//!
//! Holds one client's premium record and the provider's committed payout,
//! and resolves to exactly one terminal outcome:
//!
//! ```text
//! PENDING ──activate──► ACTIVE ──trigger observed──► PAID_OUT
//!                          │
//!                          └────window elapsed─────► EXPIRED
//! ```
//!
//! Terminal transitions drain the escrow and the unused oracle-fee balance
//! into a [`Settlement`], which the provider applies to its ledger.

use parasure_common::{AccountId, Amount, ContractStatus, LedgerError, SettlementError};
use parasure_oracle::OracleReading;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payout condition over the raw oracle answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Pays out once the answer reaches or exceeds the threshold
    AtOrAbove(i128),
    /// Pays out once the answer falls to or below the threshold
    AtOrBelow(i128),
}

impl Trigger {
    pub fn is_met(&self, answer: i128) -> bool {
        match *self {
            Trigger::AtOrAbove(threshold) => answer >= threshold,
            Trigger::AtOrBelow(threshold) => answer <= threshold,
        }
    }
}

/// Terms requested by `new_contract`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub client: AccountId,
    pub duration_secs: u64,
    pub premium: Amount,
    pub payout: Amount,
    pub location: String,
    pub trigger: Trigger,
}

impl ContractTerms {
    /// Reject terms no contract may be created with
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.premium == 0 || self.payout == 0 {
            return Err(LedgerError::InvalidTerms(
                "premium and payout must be positive".to_string(),
            ));
        }
        if self.payout < self.premium {
            return Err(LedgerError::InvalidTerms(format!(
                "payout {} is below premium {}",
                self.payout, self.premium
            )));
        }
        if self.duration_secs == 0 || i64::try_from(self.duration_secs).is_err() {
            return Err(LedgerError::InvalidTerms(format!(
                "duration {}s out of range",
                self.duration_secs
            )));
        }
        Ok(())
    }
}

/// How a contract settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementKind {
    /// Escrow returns to the provider's free balance
    Expired,
    /// Escrow goes to the client
    PaidOut { client: AccountId },
}

/// Funds released by a terminal transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub contract_id: Uuid,
    pub kind: SettlementKind,
    /// Escrowed payout leaving the contract
    pub escrow_released: Amount,
    /// Unspent oracle-fee balance returned to the provider
    pub fee_refund: Amount,
}

/// Persisted record of one insurance contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceContract {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub client: AccountId,

    pub premium: Amount,
    pub payout: Amount,
    pub trigger: Trigger,

    /// Unix seconds the window opens
    pub start_date: i64,
    pub duration_secs: u64,
    pub location: String,
    /// Reader the contract settles against
    pub oracle: String,

    pub status: ContractStatus,
    /// Payout currently held by the contract
    pub escrow: Amount,
    pub premium_received: Amount,
    /// Prepaid balance for oracle reads
    pub oracle_fee_balance: Amount,
    /// Last reading fetched, kept for audit
    pub oracle_reading: Option<OracleReading>,

    pub settled_at: Option<i64>,
    /// Incremented on every mutation
    pub version: u64,
}

impl InsuranceContract {
    /// New, unfunded contract in `PENDING`
    pub fn new(
        id: Uuid,
        provider_id: Uuid,
        terms: ContractTerms,
        oracle: String,
        start_date: i64,
    ) -> Self {
        Self {
            id,
            provider_id,
            client: terms.client,
            premium: terms.premium,
            payout: terms.payout,
            trigger: terms.trigger,
            start_date,
            duration_secs: terms.duration_secs,
            location: terms.location,
            oracle,
            status: ContractStatus::Pending,
            escrow: 0,
            premium_received: 0,
            oracle_fee_balance: 0,
            oracle_reading: None,
            settled_at: None,
            version: 0,
        }
    }

    /// Last second of the active window (inclusive)
    pub fn expires_at(&self) -> i64 {
        self.start_date
            .saturating_add(i64::try_from(self.duration_secs).unwrap_or(i64::MAX))
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        now > self.expires_at()
    }

    /// Payout-to-premium ratio fixed at creation, in basis points
    pub fn payout_ratio_bps(&self) -> u128 {
        self.payout.saturating_mul(10_000) / self.premium.max(1)
    }

    pub(crate) fn fund_escrow(&mut self, amount: Amount) {
        self.escrow = self.escrow.saturating_add(amount);
        self.version += 1;
    }

    pub(crate) fn receive_premium(&mut self, amount: Amount) {
        self.premium_received = self.premium_received.saturating_add(amount);
        self.version += 1;
    }

    pub(crate) fn fund_oracle_fees(&mut self, amount: Amount) {
        self.oracle_fee_balance = self.oracle_fee_balance.saturating_add(amount);
        self.version += 1;
    }

    /// `PENDING -> ACTIVE` once premium and full payout escrow are in place
    pub fn activate(&mut self) -> Result<(), SettlementError> {
        self.check_transition(ContractStatus::Active)?;

        if self.escrow < self.payout {
            return Err(SettlementError::UnderfundedEscrow {
                required: self.payout,
                escrowed: self.escrow,
            });
        }
        if self.premium_received < self.premium {
            return Err(SettlementError::PremiumNotReceived {
                required: self.premium,
                received: self.premium_received,
            });
        }

        self.status = ContractStatus::Active;
        self.version += 1;
        Ok(())
    }

    /// Fail unless the contract is `ACTIVE`
    pub fn ensure_active(&self) -> Result<(), SettlementError> {
        self.check_transition(ContractStatus::PaidOut)
    }

    /// `ACTIVE -> EXPIRED`; escrow returns to the provider
    pub fn expire(&mut self, now: i64) -> Result<Settlement, SettlementError> {
        self.check_transition(ContractStatus::Expired)?;
        Ok(self.settle(ContractStatus::Expired, SettlementKind::Expired, now))
    }

    /// Record a reading; `ACTIVE -> PAID_OUT` when it meets the trigger
    pub fn observe(
        &mut self,
        reading: OracleReading,
        now: i64,
    ) -> Result<Option<Settlement>, SettlementError> {
        self.ensure_active()?;

        let triggered = self.trigger.is_met(reading.answer);
        self.oracle_reading = Some(reading);
        self.version += 1;

        if !triggered {
            return Ok(None);
        }
        let kind = SettlementKind::PaidOut {
            client: self.client.clone(),
        };
        Ok(Some(self.settle(ContractStatus::PaidOut, kind, now)))
    }

    fn settle(&mut self, status: ContractStatus, kind: SettlementKind, now: i64) -> Settlement {
        let settlement = Settlement {
            contract_id: self.id,
            kind,
            escrow_released: self.escrow,
            fee_refund: self.oracle_fee_balance,
        };

        self.status = status;
        self.escrow = 0;
        self.oracle_fee_balance = 0;
        self.settled_at = Some(now);
        self.version += 1;
        settlement
    }

    fn check_transition(&self, next: ContractStatus) -> Result<(), SettlementError> {
        if self.status.is_terminal() {
            return Err(SettlementError::AlreadySettled {
                contract_id: self.id,
                status: self.status,
            });
        }
        if !self.status.can_transition_to(next) {
            return Err(SettlementError::InvalidState {
                contract_id: self.id,
                status: self.status,
                next,
            });
        }
        Ok(())
    }
}
