//! crates/concierge_core/src/flow/access.rs
//!
//! Read-only queries over a `FlowDefinition`. Missing keys yield empty
//! results; nothing here fails.

use serde::Serialize;

use super::definition::{Category, EntryNode, FlowDefinition, Preference, Question, Subcategories};
use super::keys;
use crate::domain::{Answers, Gender, ResultSet};
use crate::persona::normalize_relationship;

/// A selectable option as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub key: String,
    pub label: String,
}

/// Gender implied by a relationship label, `Neutral` when it implies none.
pub fn relationship_gender(label: &str) -> Gender {
    match normalize_relationship(label).as_str() {
        "mother" | "mom" | "mum" | "grandmother" | "grandma" | "sister" | "daughter" | "aunt"
        | "niece" | "wife" | "girlfriend" => Gender::Female,
        "father" | "dad" | "grandfather" | "grandpa" | "brother" | "son" | "uncle" | "nephew"
        | "husband" | "boyfriend" => Gender::Male,
        _ => Gender::Neutral,
    }
}

impl FlowDefinition {
    pub fn entry(&self, entry_point: &str) -> Option<&EntryNode> {
        self.entries.get(entry_point)
    }

    /// Questions still relevant for `entry_point` given the answers so far.
    ///
    /// A gender question that comes after the recipient question is dropped
    /// once the recipient answer implies a gender. One asked earlier stays, so
    /// questions already shown never disappear. Always recomputed from `answers`.
    pub fn questions_for(&self, entry_point: &str, answers: &Answers) -> Vec<&Question> {
        let Some(entry) = self.entry(entry_point) else {
            return Vec::new();
        };
        let gender_implied = answers
            .get(keys::RECIPIENT)
            .and_then(|value| value.as_text())
            .map(|recipient| relationship_gender(recipient) != Gender::Neutral)
            .unwrap_or(false);
        let recipient_at = entry
            .questions
            .iter()
            .position(|question| question.key == keys::RECIPIENT);

        entry
            .questions
            .iter()
            .enumerate()
            .filter(|(position, question)| {
                let after_recipient = recipient_at.is_some_and(|at| at < *position);
                !(gender_implied && after_recipient && question.key == keys::GENDER)
            })
            .map(|(_, question)| question)
            .collect()
    }

    pub fn categories_for(&self, entry_point: &str) -> Vec<Choice> {
        self.entry(entry_point)
            .and_then(|entry| entry.categories.as_ref())
            .map(|tree| {
                tree.iter()
                    .map(|(key, category)| Choice {
                        key: key.clone(),
                        label: category.label.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn subcategories_for(&self, entry_point: &str, category: &str) -> Vec<Choice> {
        let Some(category) = self.category(entry_point, category) else {
            return Vec::new();
        };
        match &category.subcategories {
            Subcategories::Keys(keys) => keys
                .iter()
                .map(|key| Choice {
                    key: key.clone(),
                    label: key.clone(),
                })
                .collect(),
            Subcategories::Records(records) => records
                .iter()
                .map(|(key, record)| Choice {
                    key: key.clone(),
                    label: record.label.clone().unwrap_or_else(|| key.clone()),
                })
                .collect(),
        }
    }

    pub fn preference_for(
        &self,
        entry_point: &str,
        category: &str,
        subcategory: &str,
    ) -> Option<&Preference> {
        match &self.category(entry_point, category)?.subcategories {
            Subcategories::Records(records) => records.get(subcategory)?.preference.as_ref(),
            Subcategories::Keys(_) => None,
        }
    }

    pub fn results_for(&self, entry_point: &str, category: &str, subcategory: &str) -> ResultSet {
        match self.category(entry_point, category).map(|c| &c.subcategories) {
            Some(Subcategories::Records(records)) => records
                .get(subcategory)
                .map(|record| record.results.clone())
                .unwrap_or_default(),
            _ => ResultSet::new(),
        }
    }

    fn category(&self, entry_point: &str, category: &str) -> Option<&Category> {
        self.entry(entry_point)?.categories.as_ref()?.get(category)
    }
}
