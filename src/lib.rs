//! emolens - client and live sync engine for the video emotion-analysis
//! service.
//!
//! The heart of the crate is [`store::AnalysisCollectionStore`], an
//! in-memory, observable cache of the user's analyses that is kept current
//! by optimistic edits, server push events and a periodic reconciliation
//! poll.

pub mod analysis;
pub mod api;
pub mod cli;
pub mod config;
pub mod detail;
pub mod error;
pub mod models;
pub mod report;
pub mod session;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;
