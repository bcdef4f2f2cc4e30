//! services/concierge/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `PersonaStore`, `SessionStore` and `CatalogService` ports from the
//! `core` crate. It handles all interactions with PostgreSQL using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use concierge_core::domain::{Gender, LastPurchase, Offer, Persona, PriceRange, ResultSet, Session};
use concierge_core::flow::FlowState;
use concierge_core::persona::{classify, normalize_relationship, RelationshipKind};
use concierge_core::ports::{
    CatalogService, PersonaStore, PortError, PortResult, SessionStore,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage and catalog ports.
#[derive(Clone)]
pub struct PgAdapter {
    pool: PgPool,
}

impl PgAdapter {
    /// Creates a new `PgAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Connection-level failures are reported as `Unavailable` so callers can degrade.
fn port_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const PERSONA_COLUMNS: &str =
    "id, relationship, name, age, gender, interests, last_purchase, created_at, updated_at";

#[derive(FromRow)]
struct PersonaRecord {
    id: Uuid,
    relationship: String,
    name: String,
    age: Option<i32>,
    gender: Option<String>,
    interests: Vec<String>,
    last_purchase: Option<Json<LastPurchase>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl PersonaRecord {
    fn to_domain(self) -> Persona {
        Persona {
            id: self.id,
            relationship: self.relationship,
            name: self.name,
            age: self.age.and_then(|age| u32::try_from(age).ok()),
            gender: self.gender.as_deref().and_then(gender_from_column),
            interests: self.interests,
            last_purchase: self.last_purchase.map(|Json(purchase)| purchase),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn gender_from_column(value: &str) -> Option<Gender> {
    match value {
        "female" => Some(Gender::Female),
        "male" => Some(Gender::Male),
        "neutral" => Some(Gender::Neutral),
        _ => None,
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    created_at: DateTime<Utc>,
    state: Json<FlowState>,
    results: Json<ResultSet>,
}
impl SessionRecord {
    fn to_domain(self) -> Session {
        Session {
            id: self.id,
            created_at: self.created_at,
            state: self.state.0,
            results: self.results.0,
        }
    }
}

#[derive(FromRow)]
struct OfferRecord {
    name: String,
    price: f64,
    currency: String,
    link: String,
    image: String,
}
impl OfferRecord {
    fn to_domain(self) -> Offer {
        Offer {
            name: self.name,
            price: self.price,
            currency: self.currency,
            link: self.link,
            image: self.image,
        }
    }
}

#[derive(FromRow)]
struct PriceRangeRecord {
    min: Option<f64>,
    max: Option<f64>,
    count: i64,
}

//=========================================================================================
// `PersonaStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl PersonaStore for PgAdapter {
    async fn find_persona_by_type(&self, relationship: &str) -> PortResult<Option<Persona>> {
        let record = sqlx::query_as::<_, PersonaRecord>(&format!(
            "SELECT {} FROM personas WHERE relationship = $1 ORDER BY created_at ASC LIMIT 1",
            PERSONA_COLUMNS
        ))
        .bind(normalize_relationship(relationship))
        .fetch_optional(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(record.map(PersonaRecord::to_domain))
    }

    async fn find_personas_by_type(&self, relationship: &str) -> PortResult<Vec<Persona>> {
        let records = sqlx::query_as::<_, PersonaRecord>(&format!(
            "SELECT {} FROM personas WHERE relationship = $1 ORDER BY created_at ASC",
            PERSONA_COLUMNS
        ))
        .bind(normalize_relationship(relationship))
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(PersonaRecord::to_domain).collect())
    }

    async fn upsert_persona(&self, persona: Persona) -> PortResult<Persona> {
        let relationship = normalize_relationship(&persona.relationship);
        let unique = classify(&relationship) == RelationshipKind::Unique;
        let mut tx = self.pool.begin().await.map_err(port_error)?;

        let existing: Option<(Uuid,)> = if unique {
            sqlx::query_as("SELECT id FROM personas WHERE relationship = $1 FOR UPDATE")
                .bind(&relationship)
                .fetch_optional(&mut *tx)
                .await
        } else {
            sqlx::query_as(
                "SELECT id FROM personas WHERE relationship = $1 AND lower(trim(name)) = lower(trim($2)) \
                 ORDER BY created_at ASC LIMIT 1 FOR UPDATE",
            )
            .bind(&relationship)
            .bind(&persona.name)
            .fetch_optional(&mut *tx)
            .await
        }
        .map_err(port_error)?;

        let age = persona.age.and_then(|age| i32::try_from(age).ok());
        let gender = persona.gender.map(|gender| gender.as_str());
        let last_purchase = persona.last_purchase.clone().map(Json);

        let record = match existing {
            Some((id,)) => {
                sqlx::query_as::<_, PersonaRecord>(&format!(
                    "UPDATE personas SET name = $2, age = $3, gender = $4, interests = $5, \
                     last_purchase = $6, updated_at = $7 WHERE id = $1 RETURNING {}",
                    PERSONA_COLUMNS
                ))
                .bind(id)
                .bind(&persona.name)
                .bind(age)
                .bind(gender)
                .bind(&persona.interests)
                .bind(last_purchase)
                .bind(persona.updated_at)
                .fetch_one(&mut *tx)
                .await
            }
            None => {
                sqlx::query_as::<_, PersonaRecord>(&format!(
                    "INSERT INTO personas ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
                    PERSONA_COLUMNS, PERSONA_COLUMNS
                ))
                .bind(persona.id)
                .bind(&relationship)
                .bind(&persona.name)
                .bind(age)
                .bind(gender)
                .bind(&persona.interests)
                .bind(last_purchase)
                .bind(persona.created_at)
                .bind(persona.updated_at)
                .fetch_one(&mut *tx)
                .await
            }
        }
        .map_err(port_error)?;

        tx.commit().await.map_err(port_error)?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for PgAdapter {
    async fn append_session(&self, session: Session) -> PortResult<()> {
        sqlx::query("INSERT INTO flow_sessions (id, created_at, state, results) VALUES ($1, $2, $3, $4)")
            .bind(session.id)
            .bind(session.created_at)
            .bind(Json(&session.state))
            .bind(Json(&session.results))
            .execute(&self.pool)
            .await
            .map_err(port_error)?;
        Ok(())
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, created_at, state, results FROM flow_sessions ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(SessionRecord::to_domain).collect())
    }
}

//=========================================================================================
// `CatalogService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CatalogService for PgAdapter {
    async fn fetch_offers(
        &self,
        category: &str,
        max_budget: Option<f64>,
    ) -> PortResult<Vec<Offer>> {
        let records = sqlx::query_as::<_, OfferRecord>(
            "SELECT name, price, currency, link, image FROM products \
             WHERE category = $1 AND ($2::DOUBLE PRECISION IS NULL OR price <= $2) \
             ORDER BY price ASC",
        )
        .bind(category)
        .bind(max_budget)
        .fetch_all(&self.pool)
        .await
        .map_err(port_error)?;
        Ok(records.into_iter().map(OfferRecord::to_domain).collect())
    }

    async fn fetch_price_range(&self, category: &str) -> PortResult<PriceRange> {
        let record = sqlx::query_as::<_, PriceRangeRecord>(
            "SELECT MIN(price) AS min, MAX(price) AS max, COUNT(*) AS count FROM products WHERE category = $1",
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await
        .map_err(port_error)?;

        match (record.min, record.max) {
            (Some(min), Some(max)) if record.count > 0 => Ok(PriceRange {
                min,
                max,
                count: record.count as u64,
            }),
            _ => Ok(PriceRange::EMPTY_CATEGORY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_map_to_unavailable() {
        assert!(matches!(port_error(sqlx::Error::PoolTimedOut), PortError::Unavailable(_)));
        assert!(matches!(port_error(sqlx::Error::RowNotFound), PortError::NotFound(_)));
        assert!(matches!(
            port_error(sqlx::Error::Protocol("bad frame".to_string())),
            PortError::Unexpected(_)
        ));
    }

    #[test]
    fn gender_column_round_trips_known_values() {
        for gender in [Gender::Female, Gender::Male, Gender::Neutral] {
            assert_eq!(gender_from_column(gender.as_str()), Some(gender));
        }
        assert_eq!(gender_from_column("unknown"), None);
    }
}
