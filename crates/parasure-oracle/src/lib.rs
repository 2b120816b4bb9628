//! # Parasure Oracle
//!
//! Read side of the external data source that decides payout eligibility.
//!
//! ## Components
//!
//! - [`OracleReader`]: `read(location, as_of) -> reading` capability
//! - [`OracleGateway`]: deadline, capped retry, and per-read fee accounting
//! - [`ReadSession`]: one settlement attempt; memoizes by exact `(location, as_of)`
//! - [`MockAggregator`]: price-feed stand-in with round data
//! - [`ScheduledFeed`]: per-location time series (index readings)
//!
//! ```text
//! InsuranceContract ──► ReadSession ──► OracleGateway ──► dyn OracleReader
//!                        (memo, fee)     (deadline, retry)
//! ```

pub mod feeds;
pub mod gateway;
pub mod reader;

pub use feeds::{aggregator::MockAggregator, scheduled::ScheduledFeed};
pub use gateway::{OracleGateway, OracleSettings, ReadSession};
pub use reader::{OracleReader, OracleReading, ReadRequest};

/// Decimals of the stand-in price feed
pub const MOCK_FEED_DECIMALS: u8 = 18;

/// Initial answer of the stand-in price feed (1.0 at 18 decimals)
pub const MOCK_FEED_INITIAL_ANSWER: i128 = 1_000_000_000_000_000_000;

/// Default read deadline in milliseconds
pub const DEFAULT_READ_DEADLINE_MS: u64 = 2000;

/// Default cap on read attempts within one deadline
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
