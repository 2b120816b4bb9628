//! Account identities
//!
//! An account is an opaque, comparable identity. Deployments on a local
//! network use deterministic development accounts; live networks derive the
//! identity from a configured key.

use serde::{Deserialize, Serialize};

/// Opaque account identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Wrap an existing identity string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Deterministic development account at `index`
    ///
    /// The same index always yields the same account, which stands in for a
    /// local node's pre-funded account list.
    pub fn dev(index: u32) -> Self {
        Self::derive(format!("parasure:dev-account:{}", index).as_bytes())
    }

    /// Account identity for a secret key
    pub fn from_key(secret: &str) -> Self {
        Self::derive(secret.trim().as_bytes())
    }

    fn derive(seed: &[u8]) -> Self {
        let hash = blake3::hash(seed);
        Self(format!("0x{}", hex::encode(&hash.as_bytes()[..20])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_accounts_are_stable_and_distinct() {
        assert_eq!(AccountId::dev(0), AccountId::dev(0));
        assert_ne!(AccountId::dev(0), AccountId::dev(1));
        assert_eq!(AccountId::dev(0).as_str().len(), 42);
        assert!(AccountId::dev(3).as_str().starts_with("0x"));
    }

    #[test]
    fn test_from_key_ignores_surrounding_whitespace() {
        assert_eq!(AccountId::from_key(" abc\n"), AccountId::from_key("abc"));
    }
}
