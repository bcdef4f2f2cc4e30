//! crates/concierge_core/src/memory.rs
//!
//! In-process implementations of the storage and catalog ports. Used by the
//! tests and by the service when no database is configured.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::{Offer, Persona, PriceRange, Session};
use crate::persona::{classify, normalize_relationship, RelationshipKind};
use crate::ports::{CatalogService, PersonaStore, PortResult, SessionStore};

#[derive(Default)]
pub struct InMemoryPersonaStore {
    personas: RwLock<Vec<Persona>>,
}

impl InMemoryPersonaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.personas.read().await.len()
    }
}

#[async_trait]
impl PersonaStore for InMemoryPersonaStore {
    async fn find_persona_by_type(&self, relationship: &str) -> PortResult<Option<Persona>> {
        let relationship = normalize_relationship(relationship);
        let personas = self.personas.read().await;
        Ok(personas
            .iter()
            .find(|persona| persona.relationship == relationship)
            .cloned())
    }

    async fn find_personas_by_type(&self, relationship: &str) -> PortResult<Vec<Persona>> {
        let relationship = normalize_relationship(relationship);
        let personas = self.personas.read().await;
        Ok(personas
            .iter()
            .filter(|persona| persona.relationship == relationship)
            .cloned()
            .collect())
    }

    async fn upsert_persona(&self, mut persona: Persona) -> PortResult<Persona> {
        persona.relationship = normalize_relationship(&persona.relationship);
        let unique = classify(&persona.relationship) == RelationshipKind::Unique;
        let mut personas = self.personas.write().await;

        let existing = personas.iter().position(|stored| {
            stored.relationship == persona.relationship
                && (unique || stored.name.trim().eq_ignore_ascii_case(persona.name.trim()))
        });
        match existing {
            Some(index) => {
                persona.id = personas[index].id;
                persona.created_at = personas[index].created_at;
                personas[index] = persona.clone();
            }
            None => personas.push(persona.clone()),
        }
        Ok(persona)
    }
}

/// Append-only session log.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<Vec<Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append_session(&self, session: Session) -> PortResult<()> {
        self.sessions.write().await.push(session);
        Ok(())
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        Ok(self.sessions.read().await.clone())
    }
}

/// A fixed catalog keyed by category.
#[derive(Default)]
pub struct InMemoryCatalog {
    offers: BTreeMap<String, Vec<Offer>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offers(mut self, category: &str, offers: Vec<Offer>) -> Self {
        self.offers.entry(category.to_string()).or_default().extend(offers);
        self
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn fetch_offers(
        &self,
        category: &str,
        max_budget: Option<f64>,
    ) -> PortResult<Vec<Offer>> {
        let offers = self.offers.get(category).map(Vec::as_slice).unwrap_or_default();
        Ok(offers
            .iter()
            .filter(|offer| max_budget.map_or(true, |budget| offer.price <= budget))
            .cloned()
            .collect())
    }

    async fn fetch_price_range(&self, category: &str) -> PortResult<PriceRange> {
        let offers = self.offers.get(category).map(Vec::as_slice).unwrap_or_default();
        if offers.is_empty() {
            return Ok(PriceRange::EMPTY_CATEGORY);
        }
        let min = offers.iter().map(|o| o.price).fold(f64::INFINITY, f64::min);
        let max = offers.iter().map(|o| o.price).fold(f64::NEG_INFINITY, f64::max);
        Ok(PriceRange {
            min,
            max,
            count: offers.len() as u64,
        })
    }
}
