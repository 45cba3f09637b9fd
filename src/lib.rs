//! SLIPFORGE: daily value-pool, single-pick and parlay decision engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod data;
pub mod odds;
pub mod strategy;
pub mod engine;
pub mod storage;
