//! Scripted deploy flow
//!
//! Select account, resolve collaborators, construct and fund a provider,
//! issue one contract, drive one update, withdraw the surplus.

use std::sync::Arc;

use parasure_common::{
    format_units, AccountId, Amount, Clock, ParasureError, Result, SystemClock, TokenLedger,
    NATIVE_SYMBOL,
};
use parasure_escrow::{
    InsuranceProvider, LedgerSnapshot, PremiumSchedule, ProviderSettings, UpdateOutcome,
};
use parasure_oracle::{OracleGateway, OracleReader};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::accounts::{get_account, AccountSelector};
use crate::config::DeployConfig;
use crate::network::ActiveNetwork;
use crate::resolve::Resolver;

/// Native and fee-token balances of the provider and the issued contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceReport {
    /// Free balance plus uncollected premiums
    pub provider_native: Amount,
    pub provider_fee: Amount,
    /// Escrow held by the contract
    pub contract_native: Amount,
    pub contract_fee: Amount,
}

/// How the update step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Completed(UpdateOutcome),
    /// Oracle outage or already settled; logged, not fatal
    Deferred(String),
}

/// Result of one deploy run
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub network: String,
    pub account: AccountId,
    /// Whether the network asks for deployed sources to be published
    pub publish_source: bool,
    pub mocks_deployed: bool,
    pub provider_id: Uuid,
    pub contract_id: Uuid,
    /// Balances right after the contract was issued
    pub issued: BalanceReport,
    pub update: UpdateStatus,
    pub withdrawn: Amount,
    /// Balances after the withdrawal
    pub settled: BalanceReport,
    pub snapshot: LedgerSnapshot,
}

/// Deploy flow over one configuration
pub struct DeployScenario {
    config: DeployConfig,
    account: AccountSelector,
    clock: Arc<dyn Clock>,
}

impl DeployScenario {
    pub fn new(config: DeployConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: DeployConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            account: AccountSelector::Default,
            clock,
        }
    }

    /// Act as `account` instead of the network's default account
    pub fn with_account(mut self, account: AccountSelector) -> Self {
        self.account = account;
        self
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    #[instrument(skip(self), fields(network = %self.config.network))]
    pub async fn run(&self) -> Result<DeployReport> {
        let scenario = &self.config.scenario;
        let network = ActiveNetwork::from_config(&self.config);
        let account = get_account(&network, &self.config.wallets, &self.account)?;
        let publish_source = network.verify();
        info!(account = %account, publish_source, "Deploying from account");

        let mut resolver = Resolver::new(
            network.clone(),
            &self.config,
            account.clone(),
            self.clock.clone(),
        );
        let price_feed = resolver.price_feed()?.require_mock(&network)?;
        let fee_token = resolver.fee_token()?.require_mock(&network)?;
        let mocks_deployed = !resolver.mocks().price_feeds.is_empty();

        let native = Arc::new(TokenLedger::new(NATIVE_SYMBOL));
        if network.kind.uses_dev_accounts() && scenario.dev_account_balance > 0 {
            native.mint(&account, scenario.dev_account_balance)?;
        }

        let provider = InsuranceProvider::new(
            account.clone(),
            native,
            fee_token.clone(),
            self.clock.clone(),
        )
        .with_settings(ProviderSettings {
            oracle_fee_per_contract: scenario.oracle_fee_per_contract,
        });
        provider.fund(&account, scenario.provider_funding)?;
        info!(
            provider = %provider.id(),
            funding = %format_units(provider.free_balance()),
            "InsuranceProvider deployed"
        );

        provider.fund_oracle(&account, scenario.oracle_token_funding)?;
        info!(
            amount = %format_units(provider.aux_balance()),
            symbol = %fee_token.symbol(),
            "Funded provider with oracle token"
        );

        let schedule = PremiumSchedule::new(scenario.payout_multiplier)?;
        let terms = schedule.terms(
            account.clone(),
            scenario.premium,
            scenario.duration_secs,
            scenario.location.clone(),
            scenario.trigger(),
        )?;
        let reader: Arc<dyn OracleReader> = price_feed;
        let gateway = Arc::new(OracleGateway::new(reader, self.config.oracle.settings()));
        let contract_id = provider.new_contract(&account, terms, gateway)?;
        info!(contract_id = %contract_id, "Created new InsuranceContract");

        let issued = balances(&provider, contract_id).await?;
        log_balances(&issued, fee_token.symbol());

        let update = match provider.update_contract(contract_id).await {
            Ok(outcome) => {
                info!(?outcome, "Contract updated");
                UpdateStatus::Completed(outcome)
            }
            Err(err) if err.is_transient() || err.is_settled() => {
                warn!(error = %err, "Contract update deferred");
                UpdateStatus::Deferred(err.to_string())
            }
            Err(err) => return Err(err),
        };

        let withdrawn = provider.withdraw(&account, None)?;
        info!(amount = %format_units(withdrawn), "Withdrawn free balance");

        let settled = balances(&provider, contract_id).await?;
        log_balances(&settled, fee_token.symbol());

        let snapshot = provider.snapshot().await;
        if !snapshot.is_conserved() {
            return Err(ParasureError::Internal(format!(
                "provider {} ledger does not balance",
                provider.id()
            )));
        }

        Ok(DeployReport {
            network: network.name,
            account,
            publish_source,
            mocks_deployed,
            provider_id: provider.id(),
            contract_id,
            issued,
            update,
            withdrawn,
            settled,
            snapshot,
        })
    }
}

async fn balances(provider: &InsuranceProvider, contract_id: Uuid) -> Result<BalanceReport> {
    let contract = provider
        .contract(&contract_id)
        .await
        .ok_or(parasure_common::SettlementError::NotFound(contract_id))?;

    Ok(BalanceReport {
        provider_native: provider.free_balance() + provider.premium_revenue(),
        provider_fee: provider.aux_balance(),
        contract_native: contract.escrow,
        contract_fee: contract.oracle_fee_balance,
    })
}

fn log_balances(report: &BalanceReport, fee_symbol: &str) {
    info!(
        "Provider balance: {} {}, {} {}",
        format_units(report.provider_native),
        NATIVE_SYMBOL,
        format_units(report.provider_fee),
        fee_symbol
    );
    info!(
        "Contract balance: {} {}, {} {}",
        format_units(report.contract_native),
        NATIVE_SYMBOL,
        format_units(report.contract_fee),
        fee_symbol
    );
}
