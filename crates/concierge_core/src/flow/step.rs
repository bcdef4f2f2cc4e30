//! crates/concierge_core/src/flow/step.rs
//!
//! The closed set of steps a flow can be in. Loading screens are steps of
//! their own; while one is current the flow is waiting on its lookup.

use serde::{Deserialize, Serialize};

use super::keys;

/// A lookup pause after one of the gifting checkpoint questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// After the recipient is named: look up their persona.
    RecipientLookup,
    /// After the age is given: prepare suggestions.
    SuggestionLookup,
    /// After the occasion is given: recall known interests.
    InterestRecall,
}

impl Checkpoint {
    pub fn for_question(key: &str) -> Option<Self> {
        match key {
            keys::RECIPIENT => Some(Checkpoint::RecipientLookup),
            keys::AGE => Some(Checkpoint::SuggestionLookup),
            keys::OCCASION => Some(Checkpoint::InterestRecall),
            _ => None,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Checkpoint::RecipientLookup => "Checking what we know about them...",
            Checkpoint::SuggestionLookup => "Finding ideas for their age...",
            Checkpoint::InterestRecall => "Remembering what they love...",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Entry,
    BrowseIntro,
    BrowseCurate,
    Questions {
        index: usize,
    },
    Checkpoint {
        checkpoint: Checkpoint,
        /// Question index to continue at, `None` once the questions are done.
        resume: Option<usize>,
    },
    CategoriesLoading,
    Categories,
    SubcategoriesLoading,
    Subcategories,
    Preferences,
    ResultsLoading,
    Results,
}

impl Step {
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            Step::BrowseIntro
                | Step::BrowseCurate
                | Step::Checkpoint { .. }
                | Step::CategoriesLoading
                | Step::SubcategoriesLoading
                | Step::ResultsLoading
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::Entry => "entry",
            Step::BrowseIntro => "browse_intro",
            Step::BrowseCurate => "browse_curate",
            Step::Questions { .. } => "questions",
            Step::Checkpoint { checkpoint, .. } => match checkpoint {
                Checkpoint::RecipientLookup => "recipient_lookup",
                Checkpoint::SuggestionLookup => "suggestion_lookup",
                Checkpoint::InterestRecall => "interest_recall",
            },
            Step::CategoriesLoading => "categories_loading",
            Step::Categories => "categories",
            Step::SubcategoriesLoading => "subcategories_loading",
            Step::Subcategories => "subcategories",
            Step::Preferences => "preferences",
            Step::ResultsLoading => "results_loading",
            Step::Results => "results",
        }
    }

    /// Text shown on a loading screen.
    pub fn loading_message(&self) -> Option<&'static str> {
        match self {
            Step::BrowseIntro => Some("Warming up the shelves..."),
            Step::BrowseCurate => Some("Curating today's picks..."),
            Step::Checkpoint { checkpoint, .. } => Some(checkpoint.message()),
            Step::CategoriesLoading => Some("Gathering categories..."),
            Step::SubcategoriesLoading => Some("Narrowing it down..."),
            Step::ResultsLoading => Some("Finding the best gifts..."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoints_map_from_question_keys() {
        assert_eq!(Checkpoint::for_question("recipient"), Some(Checkpoint::RecipientLookup));
        assert_eq!(Checkpoint::for_question("age"), Some(Checkpoint::SuggestionLookup));
        assert_eq!(Checkpoint::for_question("occasion"), Some(Checkpoint::InterestRecall));
        assert_eq!(Checkpoint::for_question("budget"), None);
    }

    #[test]
    fn loading_steps_carry_messages() {
        let steps = [
            Step::BrowseIntro,
            Step::BrowseCurate,
            Step::Checkpoint {
                checkpoint: Checkpoint::InterestRecall,
                resume: None,
            },
            Step::CategoriesLoading,
            Step::SubcategoriesLoading,
            Step::ResultsLoading,
        ];
        for step in steps {
            assert!(step.is_loading(), "{} should be a loading step", step.name());
            assert!(step.loading_message().is_some());
        }
        assert!(!Step::Questions { index: 0 }.is_loading());
        assert!(Step::Results.loading_message().is_none());
    }

    #[test]
    fn steps_serialize_tagged() {
        let json = serde_json::to_value(Step::Questions { index: 2 }).unwrap();
        assert_eq!(json["step"], "questions");
        assert_eq!(json["index"], 2);

        let back: Step = serde_json::from_value(json).unwrap();
        assert_eq!(back, Step::Questions { index: 2 });
    }
}
