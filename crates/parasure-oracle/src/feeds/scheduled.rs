//! Per-location time series feed
//!
//! Stores observations by location and time. A read for `(location, as_of)`
//! returns the latest observation at or before `as_of`; locations without a
//! prior observation are unavailable.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parasure_common::OracleError;
use parking_lot::RwLock;

use crate::reader::{OracleReader, OracleReading, ReadRequest};

/// Location-indexed series of readings
pub struct ScheduledFeed {
    decimals: u8,
    series: RwLock<HashMap<String, BTreeMap<i64, i128>>>,
}

impl ScheduledFeed {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals,
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Record `answer` for `location` observed at `at`
    pub fn record(&self, location: impl Into<String>, at: i64, answer: i128) {
        self.series
            .write()
            .entry(location.into())
            .or_default()
            .insert(at, answer);
    }

    /// Number of observations stored for `location`
    pub fn len(&self, location: &str) -> usize {
        self.series.read().get(location).map_or(0, |s| s.len())
    }
}

#[async_trait]
impl OracleReader for ScheduledFeed {
    async fn read(&self, request: &ReadRequest) -> Result<OracleReading, OracleError> {
        let series = self.series.read();
        let unavailable = |reason: &str| OracleError::Unavailable {
            location: request.location.clone(),
            reason: reason.to_string(),
        };

        let points = series
            .get(&request.location)
            .ok_or_else(|| unavailable("unknown location"))?;

        // Round ids count observations from the start of the series.
        let (round, (at, answer)) = points
            .range(..=request.as_of)
            .enumerate()
            .last()
            .ok_or_else(|| unavailable("no observation before requested time"))?;

        Ok(OracleReading {
            answer: *answer,
            decimals: self.decimals,
            round_id: round as u64 + 1,
            observed_at: *at,
        })
    }

    fn describe(&self) -> String {
        format!("scheduled-feed({} decimals)", self.decimals)
    }
}
