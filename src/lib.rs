//! Advisor scoring and dynamic consensus weighting.
//!
//! Tracks advisor predictions through their lifecycle, scores realized accuracy,
//! and periodically reallocates ai advisors' voting weight from a shared pool.

pub mod advisors;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod monitoring;
pub mod weights;
