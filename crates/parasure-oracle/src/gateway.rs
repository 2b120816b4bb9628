//! Oracle gateway
//!
//! Wraps a reader with the rules every settlement attempt relies on:
//! 1. A hard deadline per read; the reader is abandoned once it passes
//! 2. A capped number of attempts with exponential backoff, for transient
//!    unavailability only
//! 3. A per-read fee debited from the caller's prepaid balance, charged once
//!    per `(location, as_of)` key within a [`ReadSession`]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parasure_common::{Amount, OracleError};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::reader::{OracleReader, OracleReading, ReadRequest};
use crate::{DEFAULT_MAX_ATTEMPTS, DEFAULT_READ_DEADLINE_MS};

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct OracleSettings {
    /// Overall deadline for one read, retries included
    pub deadline_ms: u64,
    /// Maximum read attempts within the deadline
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt
    pub backoff_base_ms: u64,
    /// Fee debited per successful, non-memoized read
    pub fee_per_read: Amount,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_READ_DEADLINE_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: 100,
            fee_per_read: 0,
        }
    }
}

/// Deadline- and fee-enforcing front of an oracle reader
pub struct OracleGateway {
    reader: Arc<dyn OracleReader>,
    settings: OracleSettings,
}

impl OracleGateway {
    pub fn new(reader: Arc<dyn OracleReader>, settings: OracleSettings) -> Self {
        Self { reader, settings }
    }

    pub fn settings(&self) -> &OracleSettings {
        &self.settings
    }

    pub fn describe(&self) -> String {
        self.reader.describe()
    }

    /// Open a session for one settlement attempt
    pub fn session(&self) -> ReadSession<'_> {
        ReadSession {
            gateway: self,
            memo: HashMap::new(),
            charged: 0,
        }
    }

    #[instrument(skip(self), fields(oracle = %self.reader.describe()))]
    async fn fetch(&self, request: &ReadRequest) -> Result<OracleReading, OracleError> {
        let limit = Duration::from_millis(self.settings.deadline_ms);
        let started = Instant::now();
        let deadline = started + limit;
        let max_attempts = self.settings.max_attempts.max(1);
        let timed_out = || OracleError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
            limit_ms: self.settings.deadline_ms,
        };

        let mut attempt = 1;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }

            match tokio::time::timeout(remaining, self.reader.read(request)).await {
                Ok(Ok(reading)) => {
                    debug!(attempt, answer = reading.answer, "Oracle read succeeded");
                    return Ok(reading);
                }
                Ok(Err(err)) if err.is_retryable() && attempt < max_attempts => {
                    let backoff = Duration::from_millis(
                        self.settings
                            .backoff_base_ms
                            .saturating_mul(1u64 << (attempt - 1).min(16)),
                    );
                    warn!(attempt, error = %err, ?backoff, "Oracle read failed, retrying");
                    tokio::time::sleep(backoff.min(remaining)).await;
                    attempt += 1;
                }
                Ok(Err(err)) => return Err(err),
                Err(_) => return Err(timed_out()),
            }
        }
    }
}

/// One settlement attempt's view of the oracle
///
/// Repeated reads of the same key return the first reading without another
/// fetch or fee. Distinct keys are always fetched.
pub struct ReadSession<'a> {
    gateway: &'a OracleGateway,
    memo: HashMap<ReadRequest, OracleReading>,
    charged: Amount,
}

impl ReadSession<'_> {
    /// Read `request`, paying the per-read fee out of `fee_balance`
    ///
    /// The balance is only debited once a reading has been obtained.
    pub async fn read(
        &mut self,
        request: &ReadRequest,
        fee_balance: &mut Amount,
    ) -> Result<OracleReading, OracleError> {
        if let Some(reading) = self.memo.get(request) {
            debug!(location = %request.location, as_of = request.as_of, "Oracle read served from session");
            return Ok(reading.clone());
        }

        let fee = self.gateway.settings.fee_per_read;
        if *fee_balance < fee {
            return Err(OracleError::FeeExhausted {
                required: fee,
                available: *fee_balance,
            });
        }

        let reading = self.gateway.fetch(request).await?;
        *fee_balance -= fee;
        self.charged += fee;
        self.memo.insert(request.clone(), reading.clone());
        Ok(reading)
    }

    /// Total fees charged by this session
    pub fn charged(&self) -> Amount {
        self.charged
    }
}
