//! Multi-league player statistics ingestion.
//!
//! Provider events and flat shot files are normalized, validated and
//! upserted into Postgres, one (league, season) unit at a time.

pub mod cancel;
pub mod config;
pub mod error;
pub mod health;
pub mod loader;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod paginate;
pub mod provider;
pub mod report;
pub mod retry;
pub mod store;
pub mod validation;
pub mod writer;
