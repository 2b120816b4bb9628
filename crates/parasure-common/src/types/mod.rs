//! Core data types for Parasure

pub mod account;
pub mod amount;
pub mod clock;
pub mod status;
pub mod token_ledger;
