//! Contract lifecycle status

use serde::{Deserialize, Serialize};

/// Lifecycle state of an insurance contract
///
/// `Pending -> Active -> {PaidOut | Expired}`. The two settled states are
/// terminal; nothing moves a contract out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    /// Created, waiting for premium and escrow confirmation
    Pending,
    /// Funded and open for oracle-driven settlement
    Active,
    /// Trigger observed, payout released to the client
    PaidOut,
    /// Window elapsed without a trigger, payout returned to the provider
    Expired,
}

impl ContractStatus {
    /// Whether this is a settled, terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ContractStatus::PaidOut | ContractStatus::Expired)
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: ContractStatus) -> bool {
        matches!(
            (self, next),
            (ContractStatus::Pending, ContractStatus::Active)
                | (ContractStatus::Active, ContractStatus::PaidOut)
                | (ContractStatus::Active, ContractStatus::Expired)
        )
    }
}

impl std::fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractStatus::Pending => write!(f, "PENDING"),
            ContractStatus::Active => write!(f, "ACTIVE"),
            ContractStatus::PaidOut => write!(f, "PAID_OUT"),
            ContractStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_one_directional() {
        use ContractStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(PaidOut));
        assert!(Active.can_transition_to(Expired));

        for terminal in [PaidOut, Expired] {
            assert!(terminal.is_terminal());
            for next in [Pending, Active, PaidOut, Expired] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Active.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(PaidOut));
    }

    #[test]
    fn test_serde_uses_screaming_case() {
        let json = serde_json::to_string(&ContractStatus::PaidOut).unwrap();
        assert_eq!(json, "\"PAID_OUT\"");
        let back: ContractStatus = serde_json::from_str("\"EXPIRED\"").unwrap();
        assert_eq!(back, ContractStatus::Expired);
    }
}
