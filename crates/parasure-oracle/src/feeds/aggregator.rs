//! Price-feed stand-in
//!
//! Behaves like an on-chain price aggregator: a fixed number of decimals and
//! a latest answer that advances in rounds. Location is ignored; every read
//! returns the latest round.

use std::sync::Arc;

use async_trait::async_trait;
use parasure_common::{Clock, OracleError, SystemClock};
use parking_lot::RwLock;
use tracing::debug;

use crate::reader::{OracleReader, OracleReading, ReadRequest};
use crate::{MOCK_FEED_DECIMALS, MOCK_FEED_INITIAL_ANSWER};

/// One aggregator round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: u64,
    pub answer: i128,
    pub updated_at: i64,
}

/// In-process price aggregator
pub struct MockAggregator {
    decimals: u8,
    rounds: RwLock<Vec<RoundData>>,
    clock: Arc<dyn Clock>,
}

impl MockAggregator {
    /// Create a feed with its first round set to `initial_answer`
    pub fn new(decimals: u8, initial_answer: i128) -> Self {
        Self::with_clock(decimals, initial_answer, Arc::new(SystemClock))
    }

    pub fn with_clock(decimals: u8, initial_answer: i128, clock: Arc<dyn Clock>) -> Self {
        let first = RoundData {
            round_id: 1,
            answer: initial_answer,
            updated_at: clock.now(),
        };
        Self {
            decimals,
            rounds: RwLock::new(vec![first]),
            clock,
        }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Publish a new answer as the next round
    pub fn update_answer(&self, answer: i128) -> u64 {
        let mut rounds = self.rounds.write();
        let round_id = rounds.last().map(|r| r.round_id + 1).unwrap_or(1);
        rounds.push(RoundData {
            round_id,
            answer,
            updated_at: self.clock.now(),
        });
        debug!(round_id, answer, "Aggregator answer updated");
        round_id
    }

    pub fn latest_round_data(&self) -> Option<RoundData> {
        self.rounds.read().last().cloned()
    }

    pub fn round_data(&self, round_id: u64) -> Option<RoundData> {
        self.rounds
            .read()
            .iter()
            .find(|r| r.round_id == round_id)
            .cloned()
    }
}

impl Default for MockAggregator {
    fn default() -> Self {
        Self::new(MOCK_FEED_DECIMALS, MOCK_FEED_INITIAL_ANSWER)
    }
}

#[async_trait]
impl OracleReader for MockAggregator {
    async fn read(&self, request: &ReadRequest) -> Result<OracleReading, OracleError> {
        let round = self
            .latest_round_data()
            .ok_or_else(|| OracleError::Unavailable {
                location: request.location.clone(),
                reason: "aggregator has no rounds".to_string(),
            })?;

        Ok(OracleReading {
            answer: round.answer,
            decimals: self.decimals,
            round_id: round.round_id,
            observed_at: round.updated_at,
        })
    }

    fn describe(&self) -> String {
        format!("mock-aggregator({} decimals)", self.decimals)
    }
}
