//! Randomized synthesis of data the agency extracts do not carry.
//!
//! Delays are drawn per stop visit from a time-of-day dependent normal
//! distribution with occasional incidents and a per-route bias. Stop
//! amenities are drawn from fixed rates.

pub mod accessibility;
pub mod config;
pub mod delay;
