//! crates/concierge_core/src/flow/mod.rs
//!
//! The flow-navigation engine: the declarative flow definition, its typed
//! query layer, the closed set of steps, and the sequencer that drives a
//! `FlowState` through them.

pub mod access;
pub mod definition;
pub mod sequencer;
pub mod step;

pub use access::{relationship_gender, Choice};
pub use definition::{
    AnswerKind, Category, CategoryTree, DefinitionError, EntryMode, EntryNode, FlowDefinition,
    Preference, Question, Subcategories, Subcategory,
};
pub use sequencer::{FlowState, LookupTicket, Sequencer};
pub use step::{Checkpoint, Step};

/// Question keys the sequencer gives special meaning to.
pub mod keys {
    pub const RECIPIENT: &str = "recipient";
    pub const NAME: &str = "name";
    pub const AGE: &str = "age";
    pub const GENDER: &str = "gender";
    pub const INTERESTS: &str = "interests";
    pub const OCCASION: &str = "occasion";
    pub const BUDGET: &str = "budget";
}

/// Errors raised by sequencer actions. The state is left untouched when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("'{action}' is not available at step '{step}'")]
    UnexpectedAction {
        action: &'static str,
        step: &'static str,
    },
    #[error("Unknown entry point: {0}")]
    UnknownEntryPoint(String),
}
