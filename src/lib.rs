//! oiwatch Library
//!
//! Open-interest collection for BTC/ETH perps on Hyperliquid and Lighter,
//! CSV persistence, and the Lighter/Hyperliquid ratio with trend projection.

pub mod analytics;
pub mod collector;
pub mod config;
pub mod persistence;
pub mod sources;
pub mod types;

#[cfg(feature = "dashboard")]
pub mod dashboard;
