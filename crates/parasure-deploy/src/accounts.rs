//! Account selection

use std::str::FromStr;

use parasure_common::{AccountId, ParasureError, Result};

use crate::config::WalletSettings;
use crate::network::ActiveNetwork;

/// Which account a deploy step acts as
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AccountSelector {
    /// Dev account 0 on local and forked networks, `from_key` elsewhere
    #[default]
    Default,
    /// Development account by index
    Index(u32),
    /// Account for an explicit secret key
    Key(String),
    /// The secondary configured user (`from_key_user`)
    User,
}

impl FromStr for AccountSelector {
    type Err = ParasureError;

    /// `default`, `user`, a dev account index, or `key:<secret>`
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        match value {
            "" => Err(ParasureError::Config("empty account selector".to_string())),
            "default" => Ok(AccountSelector::Default),
            "user" => Ok(AccountSelector::User),
            _ => {
                if let Some(secret) = value.strip_prefix("key:") {
                    return Ok(AccountSelector::Key(secret.to_string()));
                }
                value.parse().map(AccountSelector::Index).map_err(|_| {
                    ParasureError::Config(format!("invalid account selector: {}", value))
                })
            }
        }
    }
}

/// Resolve the acting account for `selector` on `network`
pub fn get_account(
    network: &ActiveNetwork,
    wallets: &WalletSettings,
    selector: &AccountSelector,
) -> Result<AccountId> {
    match selector {
        AccountSelector::Index(index) => Ok(AccountId::dev(*index)),
        AccountSelector::Key(key) => Ok(AccountId::from_key(key)),
        AccountSelector::User => wallets
            .from_key_user
            .as_deref()
            .map(AccountId::from_key)
            .ok_or_else(|| ParasureError::Config("wallets.from_key_user is not set".to_string())),
        AccountSelector::Default if network.kind.uses_dev_accounts() => Ok(AccountId::dev(0)),
        AccountSelector::Default => wallets
            .from_key
            .as_deref()
            .map(AccountId::from_key)
            .ok_or_else(|| {
                ParasureError::Config(format!(
                    "wallets.from_key is not set; required on network {}",
                    network
                ))
            }),
    }
}
