//! crates/concierge_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database; they derive serde so the
//! flow definition and session snapshots can travel as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::flow::FlowState;

/// A recorded answer: either free text / a choice, or a number (age, budget).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
}

impl AnswerValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(text) => Some(text),
            AnswerValue::Number(_) => None,
        }
    }

    /// Numeric view of the answer; text answers like `"42"` are parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(n) => Some(*n),
            AnswerValue::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            AnswerValue::Number(n) => write!(f, "{}", n),
            AnswerValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        AnswerValue::Text(value.to_string())
    }
}

impl From<f64> for AnswerValue {
    fn from(value: f64) -> Self {
        AnswerValue::Number(value)
    }
}

/// Answers recorded so far, keyed by question key.
pub type Answers = BTreeMap<String, AnswerValue>;

/// A concrete product offer from one retailer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub name: String,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub image: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Offers grouped by source/retailer identifier.
pub type ResultSet = BTreeMap<String, Vec<Offer>>;

/// Price bounds for a catalog category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

impl PriceRange {
    /// Returned for a category that currently has no offers.
    pub const EMPTY_CATEGORY: PriceRange = PriceRange {
        min: 0.0,
        max: 1000.0,
        count: 0,
    };

    /// Returned when the catalog could not be reached at all.
    pub const UNAVAILABLE: PriceRange = PriceRange {
        min: 50.0,
        max: 1000.0,
        count: 0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Neutral,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Neutral => "neutral",
        }
    }
}

/// The last gift bought for a persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastPurchase {
    pub item: String,
    pub occasion: Option<String>,
    pub purchased_at: DateTime<Utc>,
}

/// Someone the user shops for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: Uuid,
    /// Normalised relationship-type label, e.g. `mother` or `friend`.
    pub relationship: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub interests: Vec<String>,
    pub last_purchase: Option<LastPurchase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A completed traversal. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: FlowState,
    pub results: ResultSet,
}
