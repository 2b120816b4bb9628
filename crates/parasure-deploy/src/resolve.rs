//! Contract resolution
//!
//! Either:
//! - deploys an in-process stand-in (mock) on a local network and returns
//!   the most recently deployed one, or
//! - returns the address configured for the active network.
//!
//! Only stand-ins have an in-process backend; a configured address is a
//! reference the deploy flow cannot drive.

use std::sync::Arc;

use parasure_common::{AccountId, Amount, Clock, ParasureError, Result, TokenLedger, FEE_TOKEN_SYMBOL};
use parasure_oracle::MockAggregator;
use tracing::{info, warn};

use crate::config::{DeployConfig, OracleConfig};
use crate::network::ActiveNetwork;

/// Config key of the price feed address
pub const PRICE_FEED: &str = "eth_usd_price_feed";

/// Config key of the oracle-fee token address
pub const FEE_TOKEN: &str = "link_token";

/// A resolved collaborator contract
#[derive(Clone)]
pub enum ContractRef<T> {
    /// Stand-in deployed in-process
    Mock(Arc<T>),
    /// Address from the network configuration
    Configured { name: String, address: String },
}

impl<T> ContractRef<T> {
    pub fn is_mock(&self) -> bool {
        matches!(self, ContractRef::Mock(_))
    }

    /// The in-process backend, or a configuration error naming the address
    pub fn require_mock(&self, network: &ActiveNetwork) -> Result<Arc<T>> {
        match self {
            ContractRef::Mock(inner) => Ok(Arc::clone(inner)),
            ContractRef::Configured { name, address } => Err(ParasureError::Config(format!(
                "{} at {} on network {} has no in-process backend",
                name, address, network
            ))),
        }
    }
}

/// Stand-ins deployed so far, oldest first
#[derive(Default)]
pub struct MockDeployments {
    pub price_feeds: Vec<Arc<MockAggregator>>,
    pub fee_tokens: Vec<Arc<TokenLedger>>,
}

/// Resolves collaborators for one deploy run
pub struct Resolver {
    network: ActiveNetwork,
    oracle: OracleConfig,
    mock_token_supply: Amount,
    deployer: AccountId,
    clock: Arc<dyn Clock>,
    mocks: MockDeployments,
}

impl Resolver {
    pub fn new(
        network: ActiveNetwork,
        config: &DeployConfig,
        deployer: AccountId,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            network,
            oracle: config.oracle.clone(),
            mock_token_supply: config.scenario.mock_token_supply,
            deployer,
            clock,
            mocks: MockDeployments::default(),
        }
    }

    pub fn mocks(&self) -> &MockDeployments {
        &self.mocks
    }

    /// Price feed the contracts settle against
    pub fn price_feed(&mut self) -> Result<ContractRef<MockAggregator>> {
        if self.network.kind.deploys_mocks() {
            if self.mocks.price_feeds.is_empty() {
                self.deploy_mocks()?;
            }
            return self.latest(|m| m.price_feeds.last().cloned());
        }
        self.configured(PRICE_FEED, self.network.settings.eth_usd_price_feed.clone())
    }

    /// Token used to pay for oracle reads
    pub fn fee_token(&mut self) -> Result<ContractRef<TokenLedger>> {
        if self.network.kind.deploys_mocks() {
            if self.mocks.fee_tokens.is_empty() {
                self.deploy_mocks()?;
            }
            return self.latest(|m| m.fee_tokens.last().cloned());
        }
        self.configured(FEE_TOKEN, self.network.settings.link_token.clone())
    }

    /// Deploy one of each stand-in
    pub fn deploy_mocks(&mut self) -> Result<()> {
        info!("### The active network is {}", self.network);
        info!("### Deploying Mocks...");

        let feed = Arc::new(MockAggregator::with_clock(
            self.oracle.mock_decimals,
            self.oracle.mock_initial_answer,
            self.clock.clone(),
        ));
        self.mocks.price_feeds.push(feed);
        info!(
            decimals = self.oracle.mock_decimals,
            answer = self.oracle.mock_initial_answer,
            "Mock price feed deployed"
        );

        let token = Arc::new(TokenLedger::new(FEE_TOKEN_SYMBOL));
        if self.mock_token_supply > 0 {
            token.mint(&self.deployer, self.mock_token_supply)?;
        }
        self.mocks.fee_tokens.push(token);
        info!(supply = self.mock_token_supply, holder = %self.deployer, "Mock {} deployed", FEE_TOKEN_SYMBOL);

        Ok(())
    }

    fn latest<T>(&self, pick: impl Fn(&MockDeployments) -> Option<Arc<T>>) -> Result<ContractRef<T>> {
        pick(&self.mocks)
            .map(ContractRef::Mock)
            .ok_or_else(|| ParasureError::Internal("mock deployment missing".to_string()))
    }

    fn configured<T>(&self, name: &str, address: Option<String>) -> Result<ContractRef<T>> {
        match address {
            Some(address) => Ok(ContractRef::Configured {
                name: name.to_string(),
                address,
            }),
            None => {
                warn!(
                    "{} address not found, perhaps you should add it to the config or deploy mocks?",
                    self.network
                );
                Err(ParasureError::Config(format!(
                    "{} address not configured for network {}",
                    name, self.network
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parasure_common::ManualClock;

    fn resolver(network: &str) -> Resolver {
        let mut config = DeployConfig::default();
        config.network = network.to_string();
        Resolver::new(
            ActiveNetwork::from_config(&config),
            &config,
            AccountId::dev(0),
            Arc::new(ManualClock::new(0)),
        )
    }

    #[test]
    fn test_local_deploys_mocks_once() {
        let mut resolver = resolver("development");

        let feed = resolver.price_feed().unwrap();
        let token = resolver.fee_token().unwrap();
        assert!(feed.is_mock() && token.is_mock());
        assert_eq!(resolver.mocks().price_feeds.len(), 1);
        assert_eq!(resolver.mocks().fee_tokens.len(), 1);

        let token = token.require_mock(&resolver.network).unwrap();
        assert_eq!(token.balance_of(&AccountId::dev(0)), 5 * parasure_common::ONE);

        // Later lookups reuse the latest deployment
        resolver.price_feed().unwrap();
        assert_eq!(resolver.mocks().price_feeds.len(), 1);
    }

    #[test]
    fn test_live_uses_configured_addresses() {
        let mut resolver = resolver("sepolia");
        let feed = resolver.price_feed().unwrap();

        match &feed {
            ContractRef::Configured { name, address } => {
                assert_eq!(name, PRICE_FEED);
                assert!(address.starts_with("0x"));
            }
            ContractRef::Mock(_) => panic!("live network must not deploy mocks"),
        }
        let err = feed.require_mock(&resolver.network).err().unwrap();
        assert!(err.to_string().contains("no in-process backend"));
        assert!(resolver.mocks().price_feeds.is_empty());
    }

    #[test]
    fn test_missing_address_names_network() {
        let mut resolver = resolver("mainnet-fork");
        let err = resolver.fee_token().err().unwrap();
        assert!(matches!(err, ParasureError::Config(ref msg) if msg.contains("mainnet-fork")));
    }
}
