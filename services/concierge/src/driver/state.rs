//! services/concierge/src/driver/state.rs
//!
//! Defines the driver's shared and per-connection states.

use concierge_core::domain::ResultSet;
use concierge_core::flow::{FlowDefinition, FlowState, LookupTicket, Sequencer};
use concierge_core::persona::{PersonaResolver, Resolution};
use concierge_core::ports::{CatalogService, PersonaStore, SessionStore};
use concierge_core::recorder::SessionRecorder;
use std::sync::Arc;
use tokio::task::JoinHandle;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to every connection.
#[derive(Clone)]
pub struct AppState {
    pub definition: Arc<FlowDefinition>,
    pub sequencer: Sequencer,
    pub personas: Arc<dyn PersonaStore>,
    pub catalog: Arc<dyn CatalogService>,
    pub resolver: PersonaResolver,
    pub recorder: SessionRecorder,
}

impl AppState {
    /// Wires the core services around the given ports.
    pub fn new(
        definition: Arc<FlowDefinition>,
        personas: Arc<dyn PersonaStore>,
        sessions: Arc<dyn SessionStore>,
        catalog: Arc<dyn CatalogService>,
    ) -> Self {
        Self {
            sequencer: Sequencer::new(definition.clone()),
            definition,
            resolver: PersonaResolver::new(personas.clone()),
            recorder: SessionRecorder::new(sessions),
            personas,
            catalog,
        }
    }
}

//=========================================================================================
// FlowSession (Specific to One Connection)
//=========================================================================================

/// What a background lookup produced.
#[derive(Debug)]
pub enum LookupOutcome {
    Persona(Resolution),
    Results(ResultSet),
}

/// A lookup started for a loading step. The ticket decides whether its
/// outcome may still be applied once it finishes.
pub struct PendingLookup {
    pub ticket: LookupTicket,
    pub handle: JoinHandle<LookupOutcome>,
}

/// The state for a single client connection.
#[derive(Default)]
pub struct FlowSession {
    pub state: FlowState,
    /// Latest persona resolution for the recipient, if one ran.
    pub persona: Option<Resolution>,
    /// Results resolved on the last results loading step, before the preference filter.
    pub results: ResultSet,
    pub pending: Option<PendingLookup>,
    /// Set when the traversal was recorded; stale once the flow moves.
    pub completed: Option<LookupTicket>,
}

impl FlowSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything collected so far. A pending lookup is detached,
    /// not aborted; the epoch bump makes its outcome inert.
    pub fn clear(&mut self) {
        self.state.reset();
        self.persona = None;
        self.results = ResultSet::new();
        self.pending = None;
        self.completed = None;
    }

    /// Whether the current results step was already recorded.
    pub fn is_completed(&self) -> bool {
        self.completed.is_some_and(|ticket| self.state.accepts(ticket))
    }
}
