//! Error types for Parasure
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;
use uuid::Uuid;

use crate::types::amount::Amount;
use crate::types::status::ContractStatus;

/// Result type alias using ParasureError
pub type Result<T> = std::result::Result<T, ParasureError>;

/// Unified error type for Parasure operations
#[derive(Debug, Error)]
pub enum ParasureError {
    // Provider capital ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Contract lifecycle errors
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    // Oracle read errors
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    // Account balance errors
    #[error("Token error: {0}")]
    Token(#[from] crate::types::token_ledger::TokenError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ParasureError {
    /// Oracle outage on an open contract; the caller may retry later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ParasureError::Settlement(SettlementError::OracleUnavailable { .. })
                | ParasureError::Oracle(_)
        )
    }

    /// Operation hit a contract that already reached a terminal state.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            ParasureError::Settlement(SettlementError::AlreadySettled { .. })
        )
    }
}

/// Provider capital ledger errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Insufficient collateral: payout {required} exceeds free balance {available}")]
    InsufficientCollateral { required: Amount, available: Amount },

    #[error("Insufficient oracle funding: required {required}, available {available}")]
    InsufficientOracleFunding { required: Amount, available: Amount },

    #[error("Insufficient payment: premium {required}, caller balance {available}")]
    InsufficientPayment { required: Amount, available: Amount },

    #[error("Account {caller} is not authorized for this operation")]
    Unauthorized { caller: String },

    #[error("Invalid contract terms: {0}")]
    InvalidTerms(String),

    #[error("Amount must be positive and within range")]
    InvalidAmount,

    #[error("Ledger invariant violated: {0}")]
    Invariant(String),
}

/// Contract lifecycle errors
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("Underfunded escrow: payout {required}, escrowed {escrowed}")]
    UnderfundedEscrow { required: Amount, escrowed: Amount },

    #[error("Premium not received: required {required}, received {received}")]
    PremiumNotReceived { required: Amount, received: Amount },

    #[error("Contract {contract_id} already settled as {status}")]
    AlreadySettled {
        contract_id: Uuid,
        status: ContractStatus,
    },

    #[error("Contract {contract_id} is {status}, cannot move to {next}")]
    InvalidState {
        contract_id: Uuid,
        status: ContractStatus,
        next: ContractStatus,
    },

    #[error("Oracle unavailable for contract {contract_id}: {source}")]
    OracleUnavailable {
        contract_id: Uuid,
        #[source]
        source: OracleError,
    },

    #[error("Contract not found: {0}")]
    NotFound(Uuid),
}

/// Oracle read errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OracleError {
    #[error("No reading for location '{location}': {reason}")]
    Unavailable { location: String, reason: String },

    #[error("Oracle read timed out after {elapsed_ms}ms (limit: {limit_ms}ms)")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },

    #[error("Oracle fee balance exhausted: required {required}, available {available}")]
    FeeExhausted { required: Amount, available: Amount },
}

impl OracleError {
    /// Whether another attempt inside the same deadline may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, OracleError::Unavailable { .. })
    }
}

impl From<serde_json::Error> for ParasureError {
    fn from(err: serde_json::Error) -> Self {
        ParasureError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ParasureError {
    fn from(err: std::io::Error) -> Self {
        ParasureError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for ParasureError {
    fn from(err: anyhow::Error) -> Self {
        ParasureError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ParasureError::Ledger(LedgerError::InsufficientCollateral {
            required: 100,
            available: 40,
        });
        assert!(err.to_string().contains("payout 100"));
        assert!(err.to_string().contains("free balance 40"));
    }

    #[test]
    fn test_transient_and_settled() {
        let id = Uuid::now_v7();
        let outage = ParasureError::from(SettlementError::OracleUnavailable {
            contract_id: id,
            source: OracleError::Timeout {
                elapsed_ms: 2000,
                limit_ms: 2000,
            },
        });
        assert!(outage.is_transient());
        assert!(!outage.is_settled());

        let settled = ParasureError::from(SettlementError::AlreadySettled {
            contract_id: id,
            status: ContractStatus::PaidOut,
        });
        assert!(settled.is_settled());
        assert!(settled.to_string().contains("PAID_OUT"));
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        let unavailable = OracleError::Unavailable {
            location: "ams".into(),
            reason: "no data".into(),
        };
        assert!(unavailable.is_retryable());
        assert!(!OracleError::FeeExhausted {
            required: 1,
            available: 0
        }
        .is_retryable());
    }
}
