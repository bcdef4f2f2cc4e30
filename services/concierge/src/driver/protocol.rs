//! services/concierge/src/driver/protocol.rs
//!
//! Defines the line protocol between a client and the concierge driver.
//! Every message is one JSON object on its own line.

use chrono::{DateTime, Utc};
use concierge_core::domain::{AnswerValue, PriceRange, ResultSet, Session};
use concierge_core::flow::{Choice, Preference, Question, Step};
use concierge_core::persona::Resolution;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client TO the Driver
//=========================================================================================

/// Represents the structured messages a client can send to the driver.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Asks for the current step without changing anything.
    Start,

    ChooseEntry { entry_point: String },

    /// Answers the question currently shown.
    Answer { value: AnswerValue },

    SelectCategory { category: String },

    SelectSubcategory { subcategory: String },

    SelectPreference { preference: String },

    /// The client finished showing a loading screen.
    LoadingComplete,

    Back,

    Reset,

    /// Records the finished traversal. `purchased` names the item bought, if any.
    Complete {
        #[serde(default)]
        purchased: Option<String>,
    },

    /// A direct persona lookup, outside of the flow.
    ResolvePersona {
        relationship: String,
        #[serde(default)]
        name: Option<String>,
    },

    /// Price bounds for the budget slider of a category.
    PriceRange { category: String },

    ListSessions,
}

//=========================================================================================
// Messages Sent FROM the Driver TO the Client
//=========================================================================================

/// Represents the structured messages the driver sends to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The step the flow is now in, with everything needed to render it.
    Step(StepView),

    /// Confirms that the traversal was stored.
    SessionRecorded {
        session_id: Uuid,
        created_at: DateTime<Utc>,
        persona_saved: bool,
    },

    Persona(Resolution),

    PriceRange { category: String, range: PriceRange },

    Sessions { sessions: Vec<Session> },

    /// Reports a rejected message. The connection stays open.
    Error { message: String },
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// A render-ready snapshot of the current step.
#[derive(Serialize, Debug, Clone)]
pub struct StepView {
    #[serde(flatten)]
    pub step: Step,
    pub progress: Progress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<Question>,
    /// Categories or subcategories to pick from.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preference: Option<Preference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultSet>,
    /// Set on the results step when every source came back empty.
    pub no_products: bool,
}
