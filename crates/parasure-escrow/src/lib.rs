//! # Parasure Escrow
//!
//! Insurance escrow and oracle-settlement state machine.
//!
//! ## Components
//!
//! - [`InsuranceContract`]: per-policy escrow, `PENDING -> ACTIVE -> {PAID_OUT | EXPIRED}`
//! - [`InsuranceProvider`]: capital pool; issues contracts, applies settlements,
//!   pays out surplus to its owner
//! - [`ContractBook`]: arena of contract records addressed by id
//! - [`PremiumSchedule`]: payout/premium ratio as configuration
//! - [`LedgerSnapshot`]: persisted provider entry plus contract records
//!
//! ## Conservation
//!
//! For every provider, at every observation point:
//!
//! ```text
//! free_balance + Σ escrow(open contracts) = total_funded - total_withdrawn - total_paid_out
//! ```
//!
//! Premiums are booked as revenue outside this identity.

pub mod book;
pub mod contract;
pub mod pricing;
pub mod provider;
pub mod snapshot;

pub use book::{ContractBook, ContractSlot};
pub use contract::{ContractTerms, InsuranceContract, Settlement, SettlementKind, Trigger};
pub use pricing::{PremiumSchedule, DEFAULT_PAYOUT_MULTIPLIER};
pub use provider::{InsuranceProvider, ProviderLedger, ProviderSettings, UpdateOutcome};
pub use snapshot::LedgerSnapshot;

use parasure_common::{Amount, POINT_ONE};

/// Oracle-fee token moved into each new contract (0.1 token)
pub const DEFAULT_ORACLE_FEE_PER_CONTRACT: Amount = POINT_ONE;

/// Contract window used by the deploy flow: five simulated days of 60s
pub const DEFAULT_CONTRACT_DURATION_SECS: u64 = 300;
