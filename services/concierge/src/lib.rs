//! services/concierge/src/lib.rs

pub mod adapters;
pub mod config;
pub mod driver;
pub mod error;
