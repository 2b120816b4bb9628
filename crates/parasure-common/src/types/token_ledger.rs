//! Token ledger - balance book for one asset
//!
//! Holds the balances of externally owned accounts for a single asset (the
//! native currency, or the token used to pay for oracle reads). Funds that
//! move into provider custody or contract escrow are debited here and
//! credited back on release, so the sum of account balances plus custody is
//! constant outside of `mint`.
//!
//! All mutations happen under one write lock; a failed check leaves every
//! balance untouched.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::debug;

use super::account::AccountId;
use super::amount::Amount;

/// Token ledger operation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    #[error("Insufficient {symbol} balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        symbol: String,
        account: String,
        required: Amount,
        available: Amount,
    },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Balance overflow for {account}")]
    Overflow { account: String },
}

#[derive(Debug, Default)]
struct Books {
    balances: HashMap<AccountId, Amount>,
    minted: Amount,
    version: u64,
}

/// Balance book for one asset
#[derive(Debug)]
pub struct TokenLedger {
    symbol: String,
    books: RwLock<Books>,
}

impl TokenLedger {
    /// Create an empty ledger for `symbol`
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            books: RwLock::new(Books::default()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Balance of `account` (zero if unknown)
    pub fn balance_of(&self, account: &AccountId) -> Amount {
        self.books
            .read()
            .balances
            .get(account)
            .copied()
            .unwrap_or(0)
    }

    /// Total ever minted
    pub fn minted(&self) -> Amount {
        self.books.read().minted
    }

    /// Sum of all account balances
    pub fn circulating(&self) -> Amount {
        self.books.read().balances.values().sum()
    }

    /// Monotonic mutation counter
    pub fn version(&self) -> u64 {
        self.books.read().version
    }

    /// Create new units in `to`'s balance
    pub fn mint(&self, to: &AccountId, amount: Amount) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }

        let mut books = self.books.write();
        let minted = books
            .minted
            .checked_add(amount)
            .ok_or_else(|| TokenError::Overflow {
                account: to.to_string(),
            })?;
        Self::add(&mut books, to, amount)?;
        books.minted = minted;
        books.version += 1;

        debug!(symbol = %self.symbol, account = %to, amount, "Minted");
        Ok(())
    }

    /// Credit `to` with units released from custody
    pub fn credit(&self, to: &AccountId, amount: Amount) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }

        let mut books = self.books.write();
        Self::add(&mut books, to, amount)?;
        books.version += 1;

        debug!(symbol = %self.symbol, account = %to, amount, "Credited");
        Ok(())
    }

    /// Debit `from` into custody
    pub fn debit(&self, from: &AccountId, amount: Amount) -> Result<(), TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount);
        }

        let mut books = self.books.write();
        self.subtract(&mut books, from, amount)?;
        books.version += 1;

        debug!(symbol = %self.symbol, account = %from, amount, "Debited");
        Ok(())
    }

    fn add(books: &mut Books, account: &AccountId, amount: Amount) -> Result<(), TokenError> {
        let balance = books.balances.entry(account.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TokenError::Overflow {
                account: account.to_string(),
            })?;
        Ok(())
    }

    fn subtract(
        &self,
        books: &mut Books,
        account: &AccountId,
        amount: Amount,
    ) -> Result<(), TokenError> {
        let available = books.balances.get(account).copied().unwrap_or(0);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                symbol: self.symbol.clone(),
                account: account.to_string(),
                required: amount,
                available,
            });
        }
        books.balances.insert(account.clone(), available - amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> AccountId {
        AccountId::new("alice")
    }

    #[test]
    fn test_new_ledger() {
        let ledger = TokenLedger::new("LINK");
        assert_eq!(ledger.symbol(), "LINK");
        assert_eq!(ledger.balance_of(&alice()), 0);
        assert_eq!(ledger.circulating(), 0);
    }

    #[test]
    fn test_mint_credit_debit() {
        let ledger = TokenLedger::new("ETH");
        ledger.mint(&alice(), 100).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 100);
        assert_eq!(ledger.minted(), 100);

        ledger.debit(&alice(), 30).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 70);

        ledger.credit(&alice(), 5).unwrap();
        assert_eq!(ledger.balance_of(&alice()), 75);
        assert_eq!(ledger.minted(), 100);
    }

    #[test]
    fn test_insufficient_balance_leaves_books_untouched() {
        let ledger = TokenLedger::new("ETH");
        ledger.mint(&alice(), 50).unwrap();
        let version = ledger.version();

        let result = ledger.debit(&alice(), 100);
        assert!(matches!(
            result,
            Err(TokenError::InsufficientBalance {
                required: 100,
                available: 50,
                ..
            })
        ));
        assert_eq!(ledger.balance_of(&alice()), 50);
        assert_eq!(ledger.version(), version);
    }

    #[test]
    fn test_zero_amount_rejected() {
        let ledger = TokenLedger::new("ETH");
        assert_eq!(ledger.mint(&alice(), 0), Err(TokenError::InvalidAmount));
        assert_eq!(ledger.credit(&alice(), 0), Err(TokenError::InvalidAmount));
        assert_eq!(ledger.debit(&alice(), 0), Err(TokenError::InvalidAmount));
    }

    #[test]
    fn test_overflow_detected() {
        let ledger = TokenLedger::new("ETH");
        ledger.mint(&alice(), u128::MAX).unwrap();
        assert!(matches!(
            ledger.credit(&alice(), 1),
            Err(TokenError::Overflow { .. })
        ));
        assert_eq!(ledger.balance_of(&alice()), u128::MAX);
    }
}
