//! Deploy configuration
//!
//! Layered, lowest precedence first:
//! 1. Built-in defaults (local `development` network, scripted amounts)
//! 2. `parasure.toml` in the working directory, or the file given on the CLI
//! 3. `PARASURE__*` environment variables (`.env` is loaded first), with `__`
//!    separating nested keys: `PARASURE__SCENARIO__PREMIUM=1000`
//!
//! Amounts are in the smallest unit. Values beyond the signed 64-bit range
//! are written as decimal strings (`premium = "100000000000000000000"`, or
//! `PARASURE__SCENARIO__PREMIUM=100_000_000_000_000_000_000` in the
//! environment, where underscores keep the value from being read as a float).

use std::collections::HashMap;
use std::path::Path;

use config::{Config, Environment, File};
use parasure_common::{Amount, ParasureError, Result, ONE, POINT_ONE};
use parasure_escrow::{Trigger, DEFAULT_CONTRACT_DURATION_SECS, DEFAULT_ORACLE_FEE_PER_CONTRACT};
use parasure_oracle::{
    OracleSettings, DEFAULT_MAX_ATTEMPTS, DEFAULT_READ_DEADLINE_MS, MOCK_FEED_DECIMALS,
    MOCK_FEED_INITIAL_ANSWER,
};
use serde::{Deserialize, Serialize};

/// Config file looked up when none is given
pub const DEFAULT_CONFIG_FILE: &str = "parasure";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "PARASURE";

/// Root deploy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Active network name
    pub network: String,
    /// Per-network addresses and flags
    pub networks: HashMap<String, NetworkSettings>,
    pub wallets: WalletSettings,
    pub scenario: ScenarioSettings,
    pub oracle: OracleConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        let mut networks = HashMap::new();
        networks.insert(
            "sepolia".to_string(),
            NetworkSettings {
                eth_usd_price_feed: Some("0x694AA1769357215DE4FAC081bf1f309aDC325306".to_string()),
                link_token: Some("0x779877A7B0D9E8603169DdbD7836e478b4624789".to_string()),
                verify: true,
            },
        );

        Self {
            network: "development".to_string(),
            networks,
            wallets: WalletSettings::default(),
            scenario: ScenarioSettings::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl DeployConfig {
    /// Load configuration from defaults, file, and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let defaults = Config::try_from(&Self::default()).map_err(config_error)?;
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)
    }

    /// Settings of the active network (empty if unlisted)
    pub fn network_settings(&self) -> NetworkSettings {
        self.networks.get(&self.network).cloned().unwrap_or_default()
    }
}

fn config_error(err: config::ConfigError) -> ParasureError {
    ParasureError::Config(err.to_string())
}

/// Addresses and flags of one network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Address of the price feed the contracts settle against
    pub eth_usd_price_feed: Option<String>,
    /// Address of the oracle-fee token
    pub link_token: Option<String>,
    /// Whether deployed sources should be verified
    pub verify: bool,
}

/// Keys for live-network accounts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSettings {
    pub from_key: Option<String>,
    pub from_key_user: Option<String>,
}

/// Trigger direction in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDirection {
    AtOrAbove,
    AtOrBelow,
}

/// Amounts and terms of the scripted deploy flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioSettings {
    /// Collateral sent with provider construction
    #[serde(with = "wide")]
    pub provider_funding: Amount,
    /// Oracle-fee token moved to the provider after construction
    #[serde(with = "wide")]
    pub oracle_token_funding: Amount,
    #[serde(with = "wide")]
    pub premium: Amount,
    /// Payout as a multiple of the premium
    pub payout_multiplier: u32,
    pub duration_secs: u64,
    pub location: String,
    pub trigger_direction: TriggerDirection,
    /// Raw answer threshold, in the feed's decimals
    #[serde(with = "wide")]
    pub trigger_threshold: i128,
    /// Oracle-fee token moved into each new contract
    #[serde(with = "wide")]
    pub oracle_fee_per_contract: Amount,
    /// Native balance of each local development account
    #[serde(with = "wide")]
    pub dev_account_balance: Amount,
    /// Oracle-fee token minted to the deployer by the mock token
    #[serde(with = "wide")]
    pub mock_token_supply: Amount,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            provider_funding: POINT_ONE / 10,
            oracle_token_funding: ONE,
            premium: POINT_ONE / 100,
            payout_multiplier: parasure_escrow::DEFAULT_PAYOUT_MULTIPLIER,
            duration_secs: DEFAULT_CONTRACT_DURATION_SECS,
            location: String::new(),
            trigger_direction: TriggerDirection::AtOrBelow,
            trigger_threshold: MOCK_FEED_INITIAL_ANSWER / 2,
            oracle_fee_per_contract: DEFAULT_ORACLE_FEE_PER_CONTRACT,
            dev_account_balance: 5 * ONE,
            mock_token_supply: 5 * ONE,
        }
    }
}

impl ScenarioSettings {
    pub fn trigger(&self) -> Trigger {
        match self.trigger_direction {
            TriggerDirection::AtOrAbove => Trigger::AtOrAbove(self.trigger_threshold),
            TriggerDirection::AtOrBelow => Trigger::AtOrBelow(self.trigger_threshold),
        }
    }
}

/// Oracle gateway and stand-in feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub deadline_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    #[serde(with = "wide")]
    pub fee_per_read: Amount,
    /// Decimals of the mock price feed
    pub mock_decimals: u8,
    /// Initial answer of the mock price feed
    #[serde(with = "wide")]
    pub mock_initial_answer: i128,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_READ_DEADLINE_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: 100,
            fee_per_read: POINT_ONE / 10,
            mock_decimals: MOCK_FEED_DECIMALS,
            mock_initial_answer: MOCK_FEED_INITIAL_ANSWER,
        }
    }
}

impl OracleConfig {
    pub fn settings(&self) -> OracleSettings {
        OracleSettings {
            deadline_ms: self.deadline_ms,
            max_attempts: self.max_attempts,
            backoff_base_ms: self.backoff_base_ms,
            fee_per_read: self.fee_per_read,
        }
    }
}

/// Serde adapter for 128-bit amounts
///
/// Written as decimal strings; read from strings or 64-bit integers.
mod wide {
    use std::fmt;
    use std::marker::PhantomData;
    use std::str::FromStr;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: fmt::Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr + TryFrom<i64> + TryFrom<u64>,
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(WideVisitor(PhantomData))
    }

    struct WideVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for WideVisitor<T>
    where
        T: FromStr + TryFrom<i64> + TryFrom<u64>,
    {
        type Value = T;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("an integer or a decimal integer string")
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<T, E> {
            T::try_from(value).map_err(|_| E::custom(format!("{} is out of range", value)))
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<T, E> {
            T::try_from(value).map_err(|_| E::custom(format!("{} is out of range", value)))
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<T, E> {
            Err(E::custom(format!(
                "{} is not an exact integer; write large amounts as strings",
                value
            )))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<T, E> {
            value
                .trim()
                .replace('_', "")
                .parse()
                .map_err(|_| E::custom(format!("invalid integer amount: {:?}", value)))
        }
    }
}
