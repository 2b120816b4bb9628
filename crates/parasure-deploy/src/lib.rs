//! # Parasure Deploy
//!
//! Deployment flow for a Parasure provider: configuration, network and
//! account selection, mock-vs-configured collaborator resolution, and the
//! scripted scenario behind the `parasure-deploy` binary.

pub mod accounts;
pub mod config;
pub mod network;
pub mod resolve;
pub mod scenario;

pub use accounts::{get_account, AccountSelector};
pub use config::{DeployConfig, NetworkSettings, OracleConfig, ScenarioSettings, WalletSettings};
pub use network::{ActiveNetwork, NetworkKind};
pub use resolve::{ContractRef, Resolver};
pub use scenario::{BalanceReport, DeployReport, DeployScenario, UpdateStatus};
