//! Insurance provider - capital pool and settlement ledger
//!
//! The provider's balances live in one [`ProviderLedger`] behind one lock;
//! every debit and credit is serialized through it. Contract state lives in
//! the [`ContractBook`] behind per-contract transition locks.
//!
//! Lock order is contract, then ledger, then token ledger. No lock is held
//! across an oracle read except the contract's own transition lock.
//!
//! ## Capital flows
//!
//! - `fund`: owner native balance -> `free_balance`
//! - `new_contract`: `free_balance` -> contract escrow (`committed`),
//!   caller premium -> `premium_revenue`, `aux_balance` -> contract fee balance
//! - settlement `EXPIRED`: escrow -> `free_balance`
//! - settlement `PAID_OUT`: escrow -> client native balance (`total_paid_out`)
//! - `withdraw`: `free_balance` -> owner native balance

use std::collections::BTreeMap;
use std::sync::Arc;

use parasure_common::{
    AccountId, Amount, Clock, ContractStatus, LedgerError, ParasureError, Result,
    SettlementError, TokenError, TokenLedger,
};
use parasure_oracle::{OracleGateway, OracleReading, ReadRequest};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::book::{ContractBook, ContractSlot};
use crate::contract::{ContractTerms, InsuranceContract, Settlement, SettlementKind};
use crate::snapshot::LedgerSnapshot;
use crate::DEFAULT_ORACLE_FEE_PER_CONTRACT;

/// Persisted ledger entry of one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLedger {
    pub id: Uuid,
    /// Only account allowed to withdraw
    pub owner: AccountId,

    /// Capital not committed to any open contract
    pub free_balance: Amount,
    /// Capital held in escrow by open contracts
    pub committed: Amount,
    /// Oracle-fee token held to fund reads
    pub aux_balance: Amount,
    /// Premiums collected, kept apart from collateral
    pub premium_revenue: Amount,

    pub total_funded: Amount,
    pub total_withdrawn: Amount,
    /// Escrow released to clients by `PAID_OUT` settlements
    pub total_paid_out: Amount,

    /// Contracts created by this provider, in creation order
    pub contracts: Vec<Uuid>,

    pub created_at: i64,
    pub updated_at: i64,
    /// Version for optimistic readers
    pub version: u64,
}

impl ProviderLedger {
    pub fn new(id: Uuid, owner: AccountId, now: i64) -> Self {
        Self {
            id,
            owner,
            free_balance: 0,
            committed: 0,
            aux_balance: 0,
            premium_revenue: 0,
            total_funded: 0,
            total_withdrawn: 0,
            total_paid_out: 0,
            contracts: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Conservation: `free + committed == funded - withdrawn - paid out`
    pub fn is_balanced(&self) -> bool {
        let net = self
            .total_funded
            .checked_sub(self.total_withdrawn)
            .and_then(|n| n.checked_sub(self.total_paid_out));
        match (self.free_balance.checked_add(self.committed), net) {
            (Some(held), Some(net)) => held == net,
            _ => false,
        }
    }

    fn touch(&mut self, now: i64) {
        self.version += 1;
        self.updated_at = now;
    }
}

impl std::fmt::Display for ProviderLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ProviderLedger(free={}, committed={}, aux={}, premiums={}, contracts={})",
            self.free_balance,
            self.committed,
            self.aux_balance,
            self.premium_revenue,
            self.contracts.len()
        )
    }
}

/// Result of a successful `update_contract`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Reading recorded, contract still active
    Observed { reading: OracleReading },
    /// Trigger met, escrow paid to the client
    PaidOut { client: AccountId, amount: Amount },
    /// Window elapsed, escrow returned to free balance
    Expired { refund: Amount },
}

/// Provider settings
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Oracle-fee token moved into each new contract
    pub oracle_fee_per_contract: Amount,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            oracle_fee_per_contract: DEFAULT_ORACLE_FEE_PER_CONTRACT,
        }
    }
}

/// Capital pool issuing and settling insurance contracts
pub struct InsuranceProvider {
    id: Uuid,
    ledger: Mutex<ProviderLedger>,
    book: Arc<ContractBook>,
    /// Native currency balances of clients and owner
    native: Arc<TokenLedger>,
    /// Oracle-fee token balances
    fee_token: Arc<TokenLedger>,
    clock: Arc<dyn Clock>,
    settings: ProviderSettings,
}

impl InsuranceProvider {
    /// Create an unfunded provider owned by `owner`
    pub fn new(
        owner: AccountId,
        native: Arc<TokenLedger>,
        fee_token: Arc<TokenLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let id = Uuid::now_v7();
        let ledger = ProviderLedger::new(id, owner, clock.now());
        Self {
            id,
            ledger: Mutex::new(ledger),
            book: Arc::new(ContractBook::new()),
            native,
            fee_token,
            clock,
            settings: ProviderSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ProviderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share a contract book with other providers
    pub fn with_book(mut self, book: Arc<ContractBook>) -> Self {
        self.book = book;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn owner(&self) -> AccountId {
        self.ledger.lock().owner.clone()
    }

    pub fn book(&self) -> &Arc<ContractBook> {
        &self.book
    }

    /// Copy of the current ledger entry
    pub fn ledger(&self) -> ProviderLedger {
        self.ledger.lock().clone()
    }

    pub fn free_balance(&self) -> Amount {
        self.ledger.lock().free_balance
    }

    pub fn committed(&self) -> Amount {
        self.ledger.lock().committed
    }

    pub fn aux_balance(&self) -> Amount {
        self.ledger.lock().aux_balance
    }

    pub fn premium_revenue(&self) -> Amount {
        self.ledger.lock().premium_revenue
    }

    pub fn contract_ids(&self) -> Vec<Uuid> {
        self.ledger.lock().contracts.clone()
    }

    /// Copy of a contract record created by this provider
    pub async fn contract(&self, id: &Uuid) -> Option<InsuranceContract> {
        let slot = self.slot(id).ok()?;
        let contract = slot.state.lock().await;
        Some(contract.clone())
    }

    /// Add collateral from the owner's native balance
    #[instrument(skip(self), fields(provider = %self.id))]
    pub fn fund(&self, from: &AccountId, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount.into());
        }

        let mut ledger = self.ledger.lock();
        Self::authorize(&ledger, from)?;
        let free = ledger
            .free_balance
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount)?;
        let funded = ledger
            .total_funded
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount)?;

        self.native.debit(from, amount)?;

        ledger.free_balance = free;
        ledger.total_funded = funded;
        ledger.touch(self.clock.now());

        info!(amount, free_balance = free, "Provider funded");
        Ok(())
    }

    /// Add oracle-fee token from `from`'s balance
    #[instrument(skip(self), fields(provider = %self.id))]
    pub fn fund_oracle(&self, from: &AccountId, amount: Amount) -> Result<()> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount.into());
        }

        let mut ledger = self.ledger.lock();
        let aux = ledger
            .aux_balance
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount)?;

        self.fee_token.debit(from, amount)?;

        ledger.aux_balance = aux;
        ledger.touch(self.clock.now());

        info!(amount, aux_balance = aux, symbol = %self.fee_token.symbol(), "Oracle funding received");
        Ok(())
    }

    /// Issue a contract for `terms`, paid for by `caller`
    ///
    /// Every check runs before the first mutation: on error, no balance,
    /// ledger entry, or contract record has changed.
    #[instrument(skip(self, terms, oracle), fields(provider = %self.id, client = %terms.client))]
    pub fn new_contract(
        &self,
        caller: &AccountId,
        terms: ContractTerms,
        oracle: Arc<OracleGateway>,
    ) -> Result<Uuid> {
        terms.validate()?;

        let premium = terms.premium;
        let payout = terms.payout;
        let fee = self.settings.oracle_fee_per_contract;
        let now = self.clock.now();

        let mut ledger = self.ledger.lock();

        if ledger.free_balance < payout {
            return Err(LedgerError::InsufficientCollateral {
                required: payout,
                available: ledger.free_balance,
            }
            .into());
        }
        if ledger.aux_balance < fee {
            return Err(LedgerError::InsufficientOracleFunding {
                required: fee,
                available: ledger.aux_balance,
            }
            .into());
        }
        let paid = self.native.balance_of(caller);
        if paid < premium {
            return Err(LedgerError::InsufficientPayment {
                required: premium,
                available: paid,
            }
            .into());
        }
        let committed = ledger
            .committed
            .checked_add(payout)
            .ok_or(LedgerError::InvalidAmount)?;
        let revenue = ledger
            .premium_revenue
            .checked_add(premium)
            .ok_or(LedgerError::InvalidAmount)?;

        let id = Uuid::now_v7();
        let mut contract = InsuranceContract::new(id, self.id, terms, oracle.describe(), now);
        contract.fund_escrow(payout);
        contract.receive_premium(premium);
        if fee > 0 {
            contract.fund_oracle_fees(fee);
        }
        contract.activate()?;

        self.native
            .debit(caller, premium)
            .map_err(|err| match err {
                TokenError::InsufficientBalance {
                    required,
                    available,
                    ..
                } => ParasureError::from(LedgerError::InsufficientPayment {
                    required,
                    available,
                }),
                other => other.into(),
            })?;

        ledger.free_balance -= payout;
        ledger.committed = committed;
        ledger.aux_balance -= fee;
        ledger.premium_revenue = revenue;
        ledger.contracts.push(id);
        ledger.touch(now);

        self.book.insert(contract, oracle);

        info!(
            contract_id = %id,
            premium,
            payout,
            free_balance = ledger.free_balance,
            "Contract issued"
        );
        Ok(id)
    }

    /// Drive one settlement attempt for contract `id`
    ///
    /// Exactly one concurrent caller can settle a contract; the others see
    /// `AlreadySettled`. An oracle outage leaves the contract `ACTIVE` and is
    /// reported as `OracleUnavailable`.
    #[instrument(skip(self), fields(provider = %self.id))]
    pub async fn update_contract(&self, id: Uuid) -> Result<UpdateOutcome> {
        let slot = self.slot(&id)?;
        let mut contract = slot.state.lock().await;
        contract.ensure_active()?;

        let now = self.clock.now();
        if contract.is_expired_at(now) {
            let mut next = contract.clone();
            let settlement = next.expire(now)?;
            self.apply(&settlement)?;
            *contract = next;

            info!(contract_id = %id, refund = settlement.escrow_released, "Contract expired");
            return Ok(UpdateOutcome::Expired {
                refund: settlement.escrow_released,
            });
        }

        let request = ReadRequest::new(contract.location.clone(), now);
        let mut fee_balance = contract.oracle_fee_balance;
        let mut session = slot.oracle.session();
        let read = session.read(&request, &mut fee_balance).await;
        if session.charged() > 0 {
            debug!(contract_id = %id, fee = session.charged(), "Oracle fee charged");
            contract.oracle_fee_balance = fee_balance;
            contract.version += 1;
        }

        let reading = read.map_err(|source| {
            warn!(contract_id = %id, error = %source, "Oracle unavailable, contract stays active");
            SettlementError::OracleUnavailable {
                contract_id: id,
                source,
            }
        })?;

        let mut next = contract.clone();
        match next.observe(reading.clone(), now)? {
            Some(settlement) => {
                self.apply(&settlement)?;
                *contract = next;

                info!(contract_id = %id, answer = reading.answer, amount = settlement.escrow_released, "Contract paid out");
                Ok(UpdateOutcome::PaidOut {
                    client: contract.client.clone(),
                    amount: settlement.escrow_released,
                })
            }
            None => {
                *contract = next;
                debug!(contract_id = %id, answer = reading.answer, "Reading below trigger");
                Ok(UpdateOutcome::Observed { reading })
            }
        }
    }

    /// Expire every active contract whose window has passed
    ///
    /// Does not consult the oracle.
    #[instrument(skip(self), fields(provider = %self.id))]
    pub async fn sweep_expired(&self) -> Result<Vec<Settlement>> {
        let ids = self.contract_ids();
        let mut settled = Vec::new();

        for id in ids {
            let Ok(slot) = self.slot(&id) else {
                continue;
            };
            let mut contract = slot.state.lock().await;
            let now = self.clock.now();
            if contract.status != ContractStatus::Active || !contract.is_expired_at(now) {
                continue;
            }

            let mut next = contract.clone();
            let settlement = next.expire(now)?;
            self.apply(&settlement)?;
            *contract = next;
            settled.push(settlement);
        }

        if !settled.is_empty() {
            info!(count = settled.len(), "Expired contracts swept");
        }
        Ok(settled)
    }

    /// Move up to `amount` (all when `None`) of the free balance to the owner
    ///
    /// Returns the amount withdrawn. Committed capital is never touched.
    #[instrument(skip(self), fields(provider = %self.id))]
    pub fn withdraw(&self, caller: &AccountId, amount: Option<Amount>) -> Result<Amount> {
        let mut ledger = self.ledger.lock();
        Self::authorize(&ledger, caller)?;

        let amount = amount.map_or(ledger.free_balance, |a| a.min(ledger.free_balance));
        if amount == 0 {
            debug!("Nothing to withdraw");
            return Ok(0);
        }
        let withdrawn = ledger
            .total_withdrawn
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount)?;

        self.native.credit(&ledger.owner, amount)?;

        ledger.free_balance -= amount;
        ledger.total_withdrawn = withdrawn;
        ledger.touch(self.clock.now());

        info!(amount, free_balance = ledger.free_balance, "Withdrawn to owner");
        Ok(amount)
    }

    /// Move all collected premiums to the owner
    #[instrument(skip(self), fields(provider = %self.id))]
    pub fn collect_premiums(&self, caller: &AccountId) -> Result<Amount> {
        let mut ledger = self.ledger.lock();
        Self::authorize(&ledger, caller)?;

        let amount = ledger.premium_revenue;
        if amount == 0 {
            return Ok(0);
        }

        self.native.credit(&ledger.owner, amount)?;

        ledger.premium_revenue = 0;
        ledger.touch(self.clock.now());

        info!(amount, "Premiums collected");
        Ok(amount)
    }

    /// Provider ledger entry plus every contract record it created
    pub async fn snapshot(&self) -> LedgerSnapshot {
        let provider = self.ledger();
        let mut contracts = BTreeMap::new();
        for id in &provider.contracts {
            if let Some(contract) = self.book.get(id).await {
                contracts.insert(*id, contract);
            }
        }
        LedgerSnapshot {
            provider,
            contracts,
            taken_at: self.clock.now(),
        }
    }

    fn slot(&self, id: &Uuid) -> Result<Arc<ContractSlot>> {
        self.book
            .slot(id)
            .filter(|slot| slot.provider_id() == self.id)
            .ok_or_else(|| SettlementError::NotFound(*id).into())
    }

    fn authorize(ledger: &ProviderLedger, caller: &AccountId) -> Result<()> {
        if &ledger.owner != caller {
            warn!(caller = %caller, "Rejected non-owner request");
            return Err(LedgerError::Unauthorized {
                caller: caller.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Book a terminal transition; all checks before any mutation
    fn apply(&self, settlement: &Settlement) -> Result<()> {
        let mut ledger = self.ledger.lock();

        let released = settlement.escrow_released;
        let committed = ledger.committed.checked_sub(released).ok_or_else(|| {
            LedgerError::Invariant(format!(
                "contract {} releases {} but only {} is committed",
                settlement.contract_id, released, ledger.committed
            ))
        })?;
        let aux = ledger
            .aux_balance
            .checked_add(settlement.fee_refund)
            .ok_or(LedgerError::InvalidAmount)?;

        match &settlement.kind {
            SettlementKind::Expired => {
                ledger.free_balance = ledger
                    .free_balance
                    .checked_add(released)
                    .ok_or(LedgerError::InvalidAmount)?;
            }
            SettlementKind::PaidOut { client } => {
                let paid_out = ledger
                    .total_paid_out
                    .checked_add(released)
                    .ok_or(LedgerError::InvalidAmount)?;
                if released > 0 {
                    self.native.credit(client, released)?;
                }
                ledger.total_paid_out = paid_out;
            }
        }

        ledger.committed = committed;
        ledger.aux_balance = aux;
        ledger.touch(self.clock.now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Trigger;
    use parasure_common::ManualClock;
    use parasure_oracle::{MockAggregator, OracleSettings, ScheduledFeed};

    struct Fixture {
        provider: Arc<InsuranceProvider>,
        native: Arc<TokenLedger>,
        clock: Arc<ManualClock>,
        feed: Arc<MockAggregator>,
        gateway: Arc<OracleGateway>,
        owner: AccountId,
        client: AccountId,
    }

    fn fixture(funding: Amount) -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000));
        let native = Arc::new(TokenLedger::new("ETH"));
        let fees = Arc::new(TokenLedger::new("LINK"));
        let owner = AccountId::dev(0);
        let client = AccountId::dev(1);

        native.mint(&owner, 1_000_000).unwrap();
        native.mint(&client, 1_000).unwrap();
        fees.mint(&owner, 100).unwrap();

        let provider = InsuranceProvider::new(owner.clone(), native.clone(), fees, clock.clone())
            .with_settings(ProviderSettings {
                oracle_fee_per_contract: 10,
            });
        provider.fund(&owner, funding).unwrap();
        provider.fund_oracle(&owner, 50).unwrap();

        let feed = Arc::new(MockAggregator::with_clock(0, 50, clock.clone()));
        let gateway = Arc::new(OracleGateway::new(
            feed.clone(),
            OracleSettings {
                fee_per_read: 1,
                ..Default::default()
            },
        ));

        Fixture {
            provider: Arc::new(provider),
            native,
            clock,
            feed,
            gateway,
            owner,
            client,
        }
    }

    fn terms(client: &AccountId, premium: Amount, payout: Amount) -> ContractTerms {
        ContractTerms {
            client: client.clone(),
            duration_secs: 300,
            premium,
            payout,
            location: "ams".to_string(),
            trigger: Trigger::AtOrBelow(20),
        }
    }

    fn issue(f: &Fixture, premium: Amount, payout: Amount) -> Uuid {
        f.provider
            .new_contract(&f.client, terms(&f.client, premium, payout), f.gateway.clone())
            .unwrap()
    }

    #[tokio::test]
    async fn test_new_contract_commits_exactly_payout() {
        let f = fixture(1_000);
        let id = issue(&f, 10, 100);

        assert_eq!(f.provider.free_balance(), 900);
        assert_eq!(f.provider.committed(), 100);
        assert_eq!(f.provider.premium_revenue(), 10);
        assert_eq!(f.provider.aux_balance(), 40);
        assert_eq!(f.native.balance_of(&f.client), 990);
        assert_eq!(f.provider.contract_ids(), vec![id]);

        let contract = f.provider.contract(&id).await.unwrap();
        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.escrow, 100);
        assert_eq!(contract.start_date, 1_000);
        assert_eq!(contract.oracle_fee_balance, 10);
        assert!(f.provider.ledger().is_balanced());
    }

    #[tokio::test]
    async fn test_expiry_returns_payout_to_free_balance() {
        let f = fixture(1_000);
        let id = issue(&f, 10, 100);

        f.clock.advance(301);
        let outcome = f.provider.update_contract(id).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::Expired { refund: 100 });
        assert_eq!(f.provider.free_balance(), 1_000);
        assert_eq!(f.provider.committed(), 0);
        assert_eq!(f.provider.aux_balance(), 50);
        assert_eq!(f.native.balance_of(&f.client), 990);

        let contract = f.provider.contract(&id).await.unwrap();
        assert_eq!(contract.status, ContractStatus::Expired);
        assert_eq!(contract.settled_at, Some(1_301));
        assert!(f.provider.snapshot().await.is_conserved());
    }

    #[tokio::test]
    async fn test_trigger_pays_client() {
        let f = fixture(1_000);
        let id = issue(&f, 10, 100);

        f.feed.update_answer(5);
        let outcome = f.provider.update_contract(id).await.unwrap();

        assert_eq!(
            outcome,
            UpdateOutcome::PaidOut {
                client: f.client.clone(),
                amount: 100
            }
        );
        assert_eq!(f.native.balance_of(&f.client), 1_090);
        assert_eq!(f.provider.free_balance(), 900);
        assert_eq!(f.provider.committed(), 0);
        // 50 funded, 10 into the contract, 1 spent on the read, 9 refunded
        assert_eq!(f.provider.aux_balance(), 49);

        let ledger = f.provider.ledger();
        assert_eq!(ledger.total_paid_out, 100);
        assert!(ledger.is_balanced());
    }

    #[tokio::test]
    async fn test_reading_below_trigger_is_recorded() {
        let f = fixture(1_000);
        let id = issue(&f, 10, 100);

        let outcome = f.provider.update_contract(id).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::Observed { ref reading } if reading.answer == 50));

        let contract = f.provider.contract(&id).await.unwrap();
        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.oracle_reading.map(|r| r.answer), Some(50));
        assert_eq!(contract.oracle_fee_balance, 9);
        assert_eq!(f.provider.free_balance(), 900);
    }

    #[tokio::test]
    async fn test_settled_contract_is_not_paid_twice() {
        let f = fixture(1_000);
        let id = issue(&f, 10, 100);
        f.feed.update_answer(0);
        f.provider.update_contract(id).await.unwrap();

        let err = f.provider.update_contract(id).await.unwrap_err();
        assert!(err.is_settled());

        f.clock.advance(10_000);
        assert!(f.provider.update_contract(id).await.unwrap_err().is_settled());
        assert_eq!(f.native.balance_of(&f.client), 1_090);
        assert_eq!(f.provider.free_balance(), 900);
    }

    #[tokio::test]
    async fn test_insufficient_collateral_rejected_before_mutation() {
        let f = fixture(50);
        let before = f.provider.ledger();

        let err = f
            .provider
            .new_contract(&f.client, terms(&f.client, 10, 100), f.gateway.clone())
            .unwrap_err();

        assert!(matches!(
            err,
            ParasureError::Ledger(LedgerError::InsufficientCollateral {
                required: 100,
                available: 50
            })
        ));
        assert_eq!(f.provider.ledger(), before);
        assert_eq!(f.native.balance_of(&f.client), 1_000);
        assert!(f.provider.book().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_payment_rejected_before_mutation() {
        let f = fixture(1_000);
        let poor = AccountId::dev(7);
        f.native.mint(&poor, 5).unwrap();
        let before = f.provider.ledger();

        let err = f
            .provider
            .new_contract(&poor, terms(&poor, 10, 100), f.gateway.clone())
            .unwrap_err();

        assert!(matches!(
            err,
            ParasureError::Ledger(LedgerError::InsufficientPayment {
                required: 10,
                available: 5
            })
        ));
        assert_eq!(f.provider.ledger(), before);
        assert_eq!(f.native.balance_of(&poor), 5);
    }

    #[tokio::test]
    async fn test_insufficient_oracle_funding() {
        let f = fixture(1_000);
        for _ in 0..5 {
            issue(&f, 1, 10);
        }
        assert_eq!(f.provider.aux_balance(), 0);

        let err = f
            .provider
            .new_contract(&f.client, terms(&f.client, 1, 10), f.gateway.clone())
            .unwrap_err();
        assert!(matches!(
            err,
            ParasureError::Ledger(LedgerError::InsufficientOracleFunding { .. })
        ));
        assert_eq!(f.provider.contract_ids().len(), 5);
    }

    #[tokio::test]
    async fn test_invalid_terms_rejected() {
        let f = fixture(1_000);
        let err = f
            .provider
            .new_contract(&f.client, terms(&f.client, 100, 10), f.gateway.clone())
            .unwrap_err();
        assert!(matches!(err, ParasureError::Ledger(LedgerError::InvalidTerms(_))));
        assert_eq!(f.provider.free_balance(), 1_000);
    }

    #[tokio::test]
    async fn test_non_owner_withdraw_unauthorized() {
        let f = fixture(1_000);
        issue(&f, 10, 100);
        let before = f.provider.ledger();

        let err = f.provider.withdraw(&f.client, None).unwrap_err();
        assert!(matches!(
            err,
            ParasureError::Ledger(LedgerError::Unauthorized { .. })
        ));
        assert_eq!(f.provider.ledger(), before);
        assert_eq!(f.native.balance_of(&f.client), 990);
    }

    #[test]
    fn test_non_owner_fund_unauthorized() {
        let f = fixture(1_000);
        let stranger = AccountId::dev(9);
        f.native.mint(&stranger, 500).unwrap();
        let before = f.provider.ledger();

        let err = f.provider.fund(&stranger, 500).unwrap_err();
        assert!(matches!(
            err,
            ParasureError::Ledger(LedgerError::Unauthorized { .. })
        ));
        assert_eq!(f.provider.ledger(), before);
        assert_eq!(f.provider.free_balance(), 1_000);
        assert_eq!(f.native.balance_of(&stranger), 500);
    }

    #[tokio::test]
    async fn test_withdraw_never_touches_committed_capital() {
        let f = fixture(1_000);
        issue(&f, 10, 100);
        let owner_before = f.native.balance_of(&f.owner);

        assert_eq!(f.provider.withdraw(&f.owner, Some(200)).unwrap(), 200);
        assert_eq!(f.provider.free_balance(), 700);

        // Requests above the free balance are capped
        assert_eq!(f.provider.withdraw(&f.owner, Some(5_000)).unwrap(), 700);
        assert_eq!(f.provider.withdraw(&f.owner, None).unwrap(), 0);

        assert_eq!(f.provider.free_balance(), 0);
        assert_eq!(f.provider.committed(), 100);
        assert_eq!(f.native.balance_of(&f.owner), owner_before + 900);
        assert!(f.provider.ledger().is_balanced());

        // Expiry frees the escrow for a later withdrawal
        f.clock.advance(301);
        f.provider.update_contract(f.provider.contract_ids()[0]).await.unwrap();
        assert_eq!(f.provider.withdraw(&f.owner, None).unwrap(), 100);
    }

    #[tokio::test]
    async fn test_collect_premiums() {
        let f = fixture(1_000);
        issue(&f, 10, 100);
        issue(&f, 15, 30);

        assert!(f.provider.collect_premiums(&f.client).is_err());
        let owner_before = f.native.balance_of(&f.owner);
        assert_eq!(f.provider.collect_premiums(&f.owner).unwrap(), 25);
        assert_eq!(f.native.balance_of(&f.owner), owner_before + 25);
        assert_eq!(f.provider.premium_revenue(), 0);
        assert_eq!(f.provider.free_balance(), 870);
    }

    #[tokio::test]
    async fn test_oracle_outage_keeps_contract_active() {
        let f = fixture(1_000);
        let feed = Arc::new(ScheduledFeed::new(0));
        let gateway = Arc::new(OracleGateway::new(
            feed.clone(),
            OracleSettings {
                deadline_ms: 500,
                max_attempts: 2,
                backoff_base_ms: 1,
                fee_per_read: 1,
            },
        ));
        let id = f
            .provider
            .new_contract(&f.client, terms(&f.client, 10, 100), gateway)
            .unwrap();

        let err = f.provider.update_contract(id).await.unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(
            err,
            ParasureError::Settlement(SettlementError::OracleUnavailable { .. })
        ));

        let contract = f.provider.contract(&id).await.unwrap();
        assert_eq!(contract.status, ContractStatus::Active);
        assert_eq!(contract.oracle_fee_balance, 10);
        assert_eq!(f.provider.free_balance(), 900);

        // Data arrives; a later attempt settles
        feed.record("ams", 900, 3);
        let outcome = f.provider.update_contract(id).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::PaidOut { amount: 100, .. }));
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let f = fixture(1_000);
        let first = issue(&f, 10, 100);
        let second = issue(&f, 10, 200);

        f.clock.advance(200);
        let late = issue(&f, 10, 300);
        f.clock.advance(150);

        let settled = f.provider.sweep_expired().await.unwrap();
        let ids: Vec<Uuid> = settled.iter().map(|s| s.contract_id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(f.provider.free_balance(), 700);
        assert_eq!(f.provider.committed(), 300);

        let late = f.provider.contract(&late).await.unwrap();
        assert_eq!(late.status, ContractStatus::Active);
        assert!(f.provider.sweep_expired().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_or_foreign_contract_not_found() {
        let f = fixture(1_000);
        let err = f.provider.update_contract(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(
            err,
            ParasureError::Settlement(SettlementError::NotFound(_))
        ));

        // A second provider sharing the book cannot settle the first one's contracts
        let id = issue(&f, 10, 100);
        let other = InsuranceProvider::new(
            f.owner.clone(),
            f.native.clone(),
            Arc::new(TokenLedger::new("LINK")),
            f.clock.clone(),
        )
        .with_book(f.provider.book().clone());
        assert!(other.update_contract(id).await.is_err());
        assert!(other.contract(&id).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_pay_once() {
        let f = fixture(1_000);
        let id = issue(&f, 10, 100);
        f.feed.update_answer(1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = f.provider.clone();
                tokio::spawn(async move { provider.update_contract(id).await })
            })
            .collect();

        let mut paid = 0;
        let mut settled = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(UpdateOutcome::PaidOut { amount, .. }) => {
                    assert_eq!(amount, 100);
                    paid += 1;
                }
                Err(err) if err.is_settled() => settled += 1,
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        assert_eq!(paid, 1);
        assert_eq!(settled, 7);
        assert_eq!(f.native.balance_of(&f.client), 1_090);
        assert_eq!(f.provider.ledger().total_paid_out, 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_issue_sweep_withdraw_stay_balanced() {
        let f = fixture(1_000);
        let total = f.native.circulating() + f.provider.free_balance();

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let provider = f.provider.clone();
                let clock = f.clock.clone();
                let gateway = f.gateway.clone();
                let owner = f.owner.clone();
                let client = f.client.clone();
                tokio::spawn(async move {
                    match i % 3 {
                        0 => {
                            // collateral or oracle funding may run out; rejections are fine
                            let _ = provider.new_contract(&client, terms(&client, 1, 40), gateway);
                        }
                        1 => {
                            clock.advance(120);
                            provider.sweep_expired().await.unwrap();
                        }
                        _ => {
                            provider.withdraw(&owner, Some(25)).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = f.provider.snapshot().await;
        assert!(snapshot.provider.is_balanced(), "{}", snapshot.provider);
        assert!(snapshot.is_conserved());

        let held = f.native.circulating()
            + snapshot.provider.free_balance
            + snapshot.provider.committed
            + snapshot.provider.premium_revenue;
        assert_eq!(held, total);
    }

    #[tokio::test]
    async fn test_snapshot_layout() {
        let f = fixture(1_000);
        let paid = issue(&f, 10, 100);
        let open = issue(&f, 10, 50);
        f.feed.update_answer(0);
        f.provider.update_contract(paid).await.unwrap();

        let snapshot = f.provider.snapshot().await;
        assert_eq!(snapshot.contracts.len(), 2);
        assert_eq!(snapshot.count(ContractStatus::PaidOut), 1);
        assert_eq!(snapshot.count(ContractStatus::Active), 1);
        assert_eq!(snapshot.open_escrow(), 50);
        assert_eq!(snapshot.contracts[&open].payout, 50);
        assert!(snapshot.is_conserved());

        let restored = LedgerSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(restored, snapshot);
    }
}
