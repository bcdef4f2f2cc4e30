//! crates/concierge_core/src/flow/sequencer.rs
//!
//! The step sequencer: a synchronous state machine over `FlowState`.
//!
//! Every user action is one atomic transition. Each transition advances the
//! state's epoch so that asynchronous lookups started for an earlier step
//! can be recognised as stale and dropped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::definition::{EntryMode, FlowDefinition};
use super::step::{Checkpoint, Step};
use super::{keys, relationship_gender, FlowError};
use crate::domain::{AnswerValue, Answers, Gender, ResultSet};
use crate::results::apply_preference;

//=========================================================================================
// FlowState
//=========================================================================================

/// Progress of one user through the flow.
///
/// `step_history` is never empty and always ends with `current_step`;
/// `current_step_number` never exceeds `total_steps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    current_step: Step,
    entry_point: Option<String>,
    answers: Answers,
    category: Option<String>,
    subcategory: Option<String>,
    preference: Option<String>,
    step_history: Vec<Step>,
    total_steps: usize,
    current_step_number: usize,
    #[serde(default)]
    epoch: u64,
}

impl Default for FlowState {
    fn default() -> Self {
        Self {
            current_step: Step::Entry,
            entry_point: None,
            answers: Answers::new(),
            category: None,
            subcategory: None,
            preference: None,
            step_history: vec![Step::Entry],
            total_steps: 1,
            current_step_number: 1,
            epoch: 0,
        }
    }
}

/// Identifies the state an asynchronous lookup was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupTicket {
    epoch: u64,
    step: Step,
}

impl LookupTicket {
    pub fn step(&self) -> Step {
        self.step
    }
}

impl FlowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_step(&self) -> Step {
        self.current_step
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn answer(&self, key: &str) -> Option<&AnswerValue> {
        self.answers.get(key)
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn subcategory(&self) -> Option<&str> {
        self.subcategory.as_deref()
    }

    pub fn preference(&self) -> Option<&str> {
        self.preference.as_deref()
    }

    pub fn step_history(&self) -> &[Step] {
        &self.step_history
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn current_step_number(&self) -> usize {
        self.current_step_number
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn current_question_index(&self) -> Option<usize> {
        match self.current_step {
            Step::Questions { index } => Some(index),
            _ => None,
        }
    }

    pub fn ticket(&self) -> LookupTicket {
        LookupTicket {
            epoch: self.epoch,
            step: self.current_step,
        }
    }

    /// Whether a lookup started under `ticket` may still be applied.
    pub fn accepts(&self, ticket: LookupTicket) -> bool {
        ticket.epoch == self.epoch && ticket.step == self.current_step
    }

    /// Back to the initial state. Only the epoch survives, so lookups
    /// started before the reset are rejected.
    pub fn reset(&mut self) {
        let epoch = self.epoch + 1;
        *self = FlowState {
            epoch,
            ..FlowState::default()
        };
    }

    /// Same as a fresh state, ignoring the epoch counter.
    pub fn is_initial(&self) -> bool {
        FlowState {
            epoch: self.epoch,
            ..FlowState::default()
        } == *self
    }

    fn advance(&mut self, step: Step) {
        self.step_history.push(step);
        self.current_step = step;
        self.current_step_number = (self.current_step_number + 1).min(self.total_steps);
        self.epoch += 1;
    }

    fn set_total_steps(&mut self, total: usize) {
        self.total_steps = total.max(1);
        self.current_step_number = self.current_step_number.min(self.total_steps);
    }
}

//=========================================================================================
// Sequencer
//=========================================================================================

/// Drives `FlowState`s through a shared, read-only `FlowDefinition`.
#[derive(Debug, Clone)]
pub struct Sequencer {
    definition: Arc<FlowDefinition>,
}

impl Sequencer {
    pub fn new(definition: Arc<FlowDefinition>) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    /// Picks (or re-picks, after going back) the entry point.
    pub fn choose_entry(&self, state: &mut FlowState, entry_point: &str) -> Result<Step, FlowError> {
        expect_step(state, "choose_entry", |step| step == Step::Entry)?;
        let entry = self
            .definition
            .entry(entry_point)
            .ok_or_else(|| FlowError::UnknownEntryPoint(entry_point.to_string()))?;

        state.entry_point = Some(entry_point.to_string());
        state.set_total_steps(self.total_steps(entry_point, &state.answers));

        let next = if entry.mode == EntryMode::Browsing {
            Step::BrowseIntro
        } else {
            self.first_step_after_entry(entry_point, &state.answers)
        };
        debug!(entry_point, step = next.name(), "entry point chosen");
        state.advance(next);
        Ok(next)
    }

    /// Records the answer to the current question and moves on.
    pub fn answer(&self, state: &mut FlowState, value: AnswerValue) -> Result<Step, FlowError> {
        let Step::Questions { index } = state.current_step else {
            return Err(unexpected(state, "answer"));
        };
        let entry_point = state.entry_point.clone().unwrap_or_default();

        let key = match self
            .definition
            .questions_for(&entry_point, &state.answers)
            .get(index)
        {
            Some(question) => question.key.clone(),
            None => {
                let next = self.step_after_questions(&entry_point);
                state.advance(next);
                return Ok(next);
            }
        };

        if key == keys::RECIPIENT {
            if let Some(recipient) = value.as_text() {
                let gender = relationship_gender(recipient);
                if gender != Gender::Neutral {
                    state
                        .answers
                        .insert(keys::GENDER.to_string(), AnswerValue::from(gender.as_str()));
                }
            }
        }
        state.answers.insert(key.clone(), value);

        let remaining = self.definition.questions_for(&entry_point, &state.answers);
        let position = remaining
            .iter()
            .position(|question| question.key == key)
            .unwrap_or(index);
        let next_index = position + 1;
        let has_more = next_index < remaining.len();
        state.set_total_steps(self.total_steps(&entry_point, &state.answers));

        let checkpoint = self
            .definition
            .entry(&entry_point)
            .filter(|entry| entry.mode == EntryMode::Gifting)
            .and_then(|_| Checkpoint::for_question(&key));

        let next = match (checkpoint, has_more) {
            (Some(checkpoint), true) => Step::Checkpoint {
                checkpoint,
                resume: Some(next_index),
            },
            (Some(checkpoint), false) => Step::Checkpoint {
                checkpoint,
                resume: None,
            },
            (None, true) => Step::Questions { index: next_index },
            (None, false) => self.step_after_questions(&entry_point),
        };
        debug!(question = %key, step = next.name(), "answer recorded");
        state.advance(next);
        Ok(next)
    }

    /// Finishes the current loading screen.
    pub fn complete_loading(&self, state: &mut FlowState) -> Result<Step, FlowError> {
        let entry_point = state.entry_point.clone().unwrap_or_default();
        let next = match state.current_step {
            Step::BrowseIntro => Step::BrowseCurate,
            Step::BrowseCurate => self.first_step_after_entry(&entry_point, &state.answers),
            Step::Checkpoint {
                resume: Some(index),
                ..
            } => Step::Questions { index },
            Step::Checkpoint { resume: None, .. } => self.step_after_questions(&entry_point),
            Step::CategoriesLoading => {
                if self.definition.categories_for(&entry_point).is_empty() {
                    Step::ResultsLoading
                } else {
                    Step::Categories
                }
            }
            Step::SubcategoriesLoading => {
                let category = state.category.as_deref().unwrap_or_default();
                if self
                    .definition
                    .subcategories_for(&entry_point, category)
                    .is_empty()
                {
                    Step::ResultsLoading
                } else {
                    Step::Subcategories
                }
            }
            Step::ResultsLoading => {
                if state.preference.is_none() && self.preference_prompt_applies(state) {
                    Step::Preferences
                } else {
                    Step::Results
                }
            }
            _ => return Err(unexpected(state, "complete_loading")),
        };
        state.advance(next);
        Ok(next)
    }

    pub fn select_category(&self, state: &mut FlowState, category: &str) -> Result<Step, FlowError> {
        expect_step(state, "select_category", |step| step == Step::Categories)?;
        state.category = Some(category.to_string());
        state.advance(Step::SubcategoriesLoading);
        Ok(Step::SubcategoriesLoading)
    }

    pub fn select_subcategory(
        &self,
        state: &mut FlowState,
        subcategory: &str,
    ) -> Result<Step, FlowError> {
        expect_step(state, "select_subcategory", |step| step == Step::Subcategories)?;
        state.subcategory = Some(subcategory.to_string());
        state.advance(Step::ResultsLoading);
        Ok(Step::ResultsLoading)
    }

    pub fn select_preference(
        &self,
        state: &mut FlowState,
        preference: &str,
    ) -> Result<Step, FlowError> {
        expect_step(state, "select_preference", |step| step == Step::Preferences)?;
        state.preference = Some(preference.to_string());
        state.advance(Step::Results);
        Ok(Step::Results)
    }

    /// Pops one step. A no-op at `Entry`.
    pub fn go_back(&self, state: &mut FlowState) -> Step {
        if state.step_history.len() <= 1 {
            return state.current_step;
        }
        if let Some(left) = state.step_history.pop() {
            match left {
                Step::Subcategories | Step::ResultsLoading => state.subcategory = None,
                Step::Categories => state.category = None,
                Step::Preferences | Step::Results => state.preference = None,
                _ => {}
            }
        }
        state.current_step = state.step_history.last().copied().unwrap_or(Step::Entry);
        state.current_step_number = state.current_step_number.saturating_sub(1).max(1);
        state.epoch += 1;
        debug!(step = state.current_step.name(), "went back");
        state.current_step
    }

    pub fn reset(&self, state: &mut FlowState) {
        state.reset();
    }

    /// Progress-bar total for `entry_point` given the answers so far.
    pub fn total_steps(&self, entry_point: &str, answers: &Answers) -> usize {
        let Some(entry) = self.definition.entry(entry_point) else {
            return 3;
        };
        let mut total = 1;
        if entry.mode == EntryMode::Browsing {
            total += 2;
        }
        let questions = self.definition.questions_for(entry_point, answers).len();
        if questions > 0 {
            total += questions;
            if entry.mode == EntryMode::Gifting {
                total += 3;
            }
        }
        if !self.definition.categories_for(entry_point).is_empty() {
            total += 4;
        }
        total + 2
    }

    /// The definition's result set for the current selection, preference applied.
    pub fn results(&self, state: &FlowState) -> ResultSet {
        let (Some(entry_point), Some(category), Some(subcategory)) =
            (state.entry_point(), state.category(), state.subcategory())
        else {
            return ResultSet::new();
        };
        let results = self
            .definition
            .results_for(entry_point, category, subcategory);
        apply_preference(&results, state.preference())
    }

    fn preference_prompt_applies(&self, state: &FlowState) -> bool {
        match (state.entry_point(), state.category(), state.subcategory()) {
            (Some(entry_point), Some(category), Some(subcategory)) => self
                .definition
                .preference_for(entry_point, category, subcategory)
                .is_some(),
            _ => false,
        }
    }

    fn first_step_after_entry(&self, entry_point: &str, answers: &Answers) -> Step {
        if !self.definition.questions_for(entry_point, answers).is_empty() {
            Step::Questions { index: 0 }
        } else {
            self.step_after_questions(entry_point)
        }
    }

    fn step_after_questions(&self, entry_point: &str) -> Step {
        if self.definition.categories_for(entry_point).is_empty() {
            Step::Results
        } else {
            Step::CategoriesLoading
        }
    }
}

fn unexpected(state: &FlowState, action: &'static str) -> FlowError {
    FlowError::UnexpectedAction {
        action,
        step: state.current_step.name(),
    }
}

fn expect_step(
    state: &FlowState,
    action: &'static str,
    allowed: impl Fn(Step) -> bool,
) -> Result<(), FlowError> {
    if allowed(state.current_step) {
        Ok(())
    } else {
        Err(unexpected(state, action))
    }
}
