//! services/concierge/src/driver/mod.rs
//!
//! The presentation bridge: a JSON-lines conversation that walks one client
//! through the flow.

pub mod handler;
pub mod protocol;
pub mod state;

pub use handler::{handle_message, serve_lines};
pub use state::{AppState, FlowSession};
