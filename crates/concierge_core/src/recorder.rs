//! crates/concierge_core/src/recorder.rs
//!
//! Persists completed traversals. Sessions are only ever appended.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{ResultSet, Session};
use crate::flow::FlowState;
use crate::ports::{PortResult, SessionStore};

#[derive(Clone)]
pub struct SessionRecorder {
    store: Arc<dyn SessionStore>,
}

impl SessionRecorder {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Snapshots `state` with its resolved results and appends it.
    pub async fn record(&self, state: &FlowState, results: ResultSet) -> PortResult<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            state: state.clone(),
            results,
        };
        self.store.append_session(session.clone()).await?;
        info!(session_id = %session.id, entry_point = ?state.entry_point(), "session recorded");
        Ok(session)
    }

    pub async fn history(&self) -> PortResult<Vec<Session>> {
        self.store.list_sessions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, offer};
    use crate::flow::Sequencer;
    use crate::memory::InMemorySessionStore;

    #[tokio::test]
    async fn records_snapshot_and_lists_it() {
        let sequencer = Sequencer::new(Arc::new(fixtures::definition()));
        let mut state = FlowState::new();
        sequencer.choose_entry(&mut state, "gift_card").unwrap();
        let mut results = ResultSet::new();
        results.insert("amazon".to_string(), vec![offer("Gift Card", 50.0)]);

        let recorder = SessionRecorder::new(Arc::new(InMemorySessionStore::new()));
        let first = recorder.record(&state, results.clone()).await.unwrap();
        let second = recorder.record(&state, ResultSet::new()).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.state, state);
        assert_eq!(first.results, results);

        let history = recorder.history().await.unwrap();
        let ids: Vec<Uuid> = history.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_later_changes() {
        let sequencer = Sequencer::new(Arc::new(fixtures::definition()));
        let mut state = FlowState::new();
        sequencer.choose_entry(&mut state, "gift_card").unwrap();

        let recorder = SessionRecorder::new(Arc::new(InMemorySessionStore::new()));
        let session = recorder.record(&state, ResultSet::new()).await.unwrap();
        sequencer.reset(&mut state);

        let stored = &recorder.history().await.unwrap()[0];
        assert_eq!(stored.state.entry_point(), Some("gift_card"));
        assert_eq!(stored.id, session.id);
    }
}
