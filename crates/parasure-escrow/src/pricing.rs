//! Premium schedule
//!
//! Derives a payout from a premium with a configurable ratio, so contract
//! economics are a parameter instead of a constant.

use parasure_common::{AccountId, Amount, LedgerError};

use crate::contract::{ContractTerms, Trigger};

/// Default payout multiple of the premium
pub const DEFAULT_PAYOUT_MULTIPLIER: u32 = 2;

/// Fixed-ratio premium schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremiumSchedule {
    /// Payout as a multiple of the premium (at least 1)
    pub payout_multiplier: u32,
}

impl Default for PremiumSchedule {
    fn default() -> Self {
        Self {
            payout_multiplier: DEFAULT_PAYOUT_MULTIPLIER,
        }
    }
}

impl PremiumSchedule {
    pub fn new(payout_multiplier: u32) -> Result<Self, LedgerError> {
        if payout_multiplier == 0 {
            return Err(LedgerError::InvalidTerms(
                "payout multiplier must be at least 1".to_string(),
            ));
        }
        Ok(Self { payout_multiplier })
    }

    /// Payout covered by `premium`
    pub fn payout_for(&self, premium: Amount) -> Result<Amount, LedgerError> {
        premium
            .checked_mul(self.payout_multiplier as Amount)
            .ok_or(LedgerError::InvalidAmount)
    }

    /// Build terms from a premium
    pub fn terms(
        &self,
        client: AccountId,
        premium: Amount,
        duration_secs: u64,
        location: impl Into<String>,
        trigger: Trigger,
    ) -> Result<ContractTerms, LedgerError> {
        let terms = ContractTerms {
            client,
            duration_secs,
            premium,
            payout: self.payout_for(premium)?,
            location: location.into(),
            trigger,
        };
        terms.validate()?;
        Ok(terms)
    }
}
