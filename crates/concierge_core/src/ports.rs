//! crates/concierge_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific storage or catalog implementations.

use async_trait::async_trait;

use crate::domain::{Offer, Persona, PriceRange, Session};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Offers in `category`, optionally capped at `max_budget`.
    async fn fetch_offers(&self, category: &str, max_budget: Option<f64>)
        -> PortResult<Vec<Offer>>;

    /// Price bounds for `category`. Categories without offers report
    /// `PriceRange::EMPTY_CATEGORY` instead of failing.
    async fn fetch_price_range(&self, category: &str) -> PortResult<PriceRange>;
}

#[async_trait]
pub trait PersonaStore: Send + Sync {
    /// The single persona stored for a unique relationship type.
    async fn find_persona_by_type(&self, relationship: &str) -> PortResult<Option<Persona>>;

    /// Every persona of a relationship type, in retrieval order.
    async fn find_personas_by_type(&self, relationship: &str) -> PortResult<Vec<Persona>>;

    /// Unique types replace the stored record; multi types match by name within type.
    async fn upsert_persona(&self, persona: Persona) -> PortResult<Persona>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn append_session(&self, session: Session) -> PortResult<()>;

    /// Sessions in creation order.
    async fn list_sessions(&self) -> PortResult<Vec<Session>>;
}
