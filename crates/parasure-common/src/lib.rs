//! # Parasure Common
//!
//! Shared types, errors, and balance books for the Parasure insurance ledger.
//!
//! ## Core Types
//!
//! - [`AccountId`]: opaque account identity (client, owner, deployer)
//! - [`Amount`]: integer currency amount in the smallest unit
//! - [`TokenLedger`]: concurrent balance book for one asset
//! - [`ContractStatus`]: lifecycle state of an insurance contract
//! - [`Clock`]: unix-seconds time source, real or manual

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{LedgerError, OracleError, ParasureError, Result, SettlementError};
pub use types::{
    account::AccountId,
    amount::{format_units, to_units, Amount, CENT, ONE, POINT_ONE, TEN, UNIT_DECIMALS, WEI_PER_UNIT},
    clock::{Clock, ManualClock, SystemClock},
    status::ContractStatus,
    token_ledger::{TokenError, TokenLedger},
};

/// Parasure version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Symbol used for the native currency ledger
pub const NATIVE_SYMBOL: &str = "ETH";

/// Symbol used for the oracle-fee token ledger
pub const FEE_TOKEN_SYMBOL: &str = "LINK";
