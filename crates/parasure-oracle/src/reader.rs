//! Oracle reader interface

use async_trait::async_trait;
use parasure_common::OracleError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A read keyed by location and observation time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadRequest {
    /// Opaque location key (station id, market symbol, ...)
    pub location: String,
    /// Unix seconds the reading should describe
    pub as_of: i64,
}

impl ReadRequest {
    pub fn new(location: impl Into<String>, as_of: i64) -> Self {
        Self {
            location: location.into(),
            as_of,
        }
    }
}

/// Value produced by an oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleReading {
    /// Raw answer, scaled by `decimals`
    pub answer: i128,
    /// Decimal places of `answer`
    pub decimals: u8,
    /// Feed round that produced the answer
    pub round_id: u64,
    /// Unix seconds the answer was observed
    pub observed_at: i64,
}

impl OracleReading {
    /// Answer as a decimal, for display
    pub fn value(&self) -> Option<Decimal> {
        Decimal::try_from_i128_with_scale(self.answer, self.decimals as u32).ok()
    }
}

/// Read-only oracle capability
///
/// Implementations must return the same reading for the same request while
/// their underlying data is unchanged. Deadlines and retries are enforced by
/// [`crate::OracleGateway`], not by the reader.
#[async_trait]
pub trait OracleReader: Send + Sync {
    async fn read(&self, request: &ReadRequest) -> Result<OracleReading, OracleError>;

    /// Short name for logs and persisted records
    fn describe(&self) -> String {
        "oracle".to_string()
    }
}
