pub mod domain;
pub mod flow;
pub mod memory;
pub mod persona;
pub mod ports;
pub mod recorder;
pub mod results;

#[cfg(test)]
pub(crate) mod fixtures;

pub use domain::{
    AnswerValue, Answers, Gender, LastPurchase, Offer, Persona, PriceRange, ResultSet, Session,
};
pub use flow::{FlowDefinition, FlowError, FlowState, LookupTicket, Sequencer, Step};
pub use persona::{PersonaField, PersonaResolver, Resolution};
pub use ports::{CatalogService, PersonaStore, PortError, PortResult, SessionStore};
pub use recorder::SessionRecorder;
