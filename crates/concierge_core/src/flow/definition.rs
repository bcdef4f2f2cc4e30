//! crates/concierge_core/src/flow/definition.rs
//!
//! The static flow document: entry points, their questions, and the
//! category tree with preferences and result sets. Loaded once, never mutated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::ResultSet;

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Failed to read flow definition: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse flow definition: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub version: String,
    pub entries: BTreeMap<String, EntryNode>,
}

impl FlowDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// How the sequencer treats an entry point beyond its questions and tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    #[default]
    Standard,
    /// Open browsing: two curation loading screens before anything else.
    Browsing,
    /// Shopping for someone else: lookup checkpoints after recipient, age and occasion.
    Gifting,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryNode {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub mode: EntryMode,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub categories: Option<CategoryTree>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    Choice,
    Range,
    Text,
    Budget,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub key: String,
    pub prompt: String,
    #[serde(rename = "type")]
    pub kind: AnswerKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

pub type CategoryTree = BTreeMap<String, Category>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    #[serde(default)]
    pub subcategories: Subcategories,
}

/// Subcategories are either bare keys or full records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subcategories {
    Keys(Vec<String>),
    Records(BTreeMap<String, Subcategory>),
}

impl Default for Subcategories {
    fn default() -> Self {
        Subcategories::Keys(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub preference: Option<Preference>,
    #[serde(default)]
    pub results: ResultSet,
}

/// A single-choice refinement asked after the subcategory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub prompt: String,
    pub options: Vec<String>,
}
