//! Built-in oracle readers

pub mod aggregator;
pub mod scheduled;
