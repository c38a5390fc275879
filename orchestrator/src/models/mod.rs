//! Wire data model shared with the hub

pub mod certificate;
pub mod config;
pub mod deployment;
pub mod principal;
pub mod template;

use serde::{Deserialize, Serialize};

/// Milliseconds since the UNIX epoch, UTC
pub type TimestampMillis = u64;

/// Compute cycles
pub type Cycles = u128;

/// Token amount in atomic units (1 token = 100_000_000 ulps)
pub type TokenUlps = u64;

/// A value paired with the moment the hub recorded it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub value: T,
    pub timestamp_millis: TimestampMillis,
}
