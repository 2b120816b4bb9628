//! Active network selection
//!
//! The active network is a value threaded through the deploy step. Its class
//! decides where accounts come from and whether stand-in contracts are
//! deployed.

use crate::config::{DeployConfig, NetworkSettings};

/// Networks run by a local development node
pub const LOCAL_BLOCKCHAIN_ENVIRONMENTS: [&str; 3] = ["development", "ganache-local", "hardhat"];

/// Local forks of a live network
pub const FORKED_LOCAL_ENVIRONMENTS: [&str; 2] = ["mainnet-fork", "mainnet-fork2"];

/// Network class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkKind {
    /// Local node: dev accounts, mocks deployed on demand
    Local,
    /// Forked live network: dev accounts, real addresses
    Forked,
    /// Live network: configured keys and addresses
    Live,
}

impl NetworkKind {
    pub fn classify(name: &str) -> Self {
        if LOCAL_BLOCKCHAIN_ENVIRONMENTS.contains(&name) {
            NetworkKind::Local
        } else if FORKED_LOCAL_ENVIRONMENTS.contains(&name) {
            NetworkKind::Forked
        } else {
            NetworkKind::Live
        }
    }

    pub fn uses_dev_accounts(&self) -> bool {
        matches!(self, NetworkKind::Local | NetworkKind::Forked)
    }

    pub fn deploys_mocks(&self) -> bool {
        matches!(self, NetworkKind::Local)
    }
}

/// The network a deploy runs against
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveNetwork {
    pub name: String,
    pub kind: NetworkKind,
    pub settings: NetworkSettings,
}

impl ActiveNetwork {
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            name: config.network.clone(),
            kind: NetworkKind::classify(&config.network),
            settings: config.network_settings(),
        }
    }

    /// Whether deployed sources should be verified on this network
    pub fn verify(&self) -> bool {
        self.settings.verify
    }
}

impl std::fmt::Display for ActiveNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
