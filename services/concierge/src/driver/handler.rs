//! services/concierge/src/driver/handler.rs
//!
//! The main control loop for a client connection. It reads one client message
//! per line, drives the connection's `FlowSession`, and answers each message
//! with exactly one server message.
//!
//! Persona and result lookups run as background tasks started when their
//! loading step is entered. `loading_complete` waits for the task, and only
//! applies the outcome when the session still accepts the lookup's ticket.

use crate::driver::protocol::{ClientMessage, Progress, ServerMessage, StepView};
use crate::driver::state::{AppState, FlowSession, LookupOutcome, PendingLookup};
use crate::error::ServiceError;
use chrono::Utc;
use concierge_core::domain::ResultSet;
use concierge_core::flow::{keys, Checkpoint, Choice, EntryMode, FlowError, FlowState, Step};
use concierge_core::persona::{persona_from_answers, PersonaField, Resolution};
use concierge_core::results::{apply_preference, price_range_or_default, resolve_results};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// Serves one client over a line-oriented reader/writer pair until the reader is exhausted.
pub async fn serve_lines<R, W>(app: Arc<AppState>, reader: R, mut writer: W) -> Result<(), ServiceError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Client connected.");
    let mut session = FlowSession::new();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<ClientMessage>(line) {
            Ok(message) => handle_message(&app, &mut session, message)
                .await
                .unwrap_or_else(|e| {
                    warn!("Rejected client message: {}", e);
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }),
            Err(e) => {
                warn!("Malformed client message: {}", e);
                ServerMessage::Error {
                    message: ServiceError::Protocol(e).to_string(),
                }
            }
        };
        write_message(&mut writer, &reply).await?;
    }

    info!("Client disconnected.");
    Ok(())
}

async fn write_message<W>(writer: &mut W, message: &ServerMessage) -> Result<(), ServiceError>
where
    W: AsyncWrite + Unpin,
{
    let mut json = serde_json::to_string(message)?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Applies one client message to `session`. On error the session is unchanged.
pub async fn handle_message(
    app: &AppState,
    session: &mut FlowSession,
    message: ClientMessage,
) -> Result<ServerMessage, ServiceError> {
    let sequencer = &app.sequencer;
    match message {
        ClientMessage::Start => {}
        ClientMessage::ChooseEntry { entry_point } => {
            sequencer.choose_entry(&mut session.state, &entry_point)?;
            session.persona = None;
            session.results = ResultSet::new();
        }
        ClientMessage::Answer { value } => {
            sequencer.answer(&mut session.state, value)?;
        }
        ClientMessage::SelectCategory { category } => {
            sequencer.select_category(&mut session.state, &category)?;
        }
        ClientMessage::SelectSubcategory { subcategory } => {
            sequencer.select_subcategory(&mut session.state, &subcategory)?;
        }
        ClientMessage::SelectPreference { preference } => {
            sequencer.select_preference(&mut session.state, &preference)?;
        }
        ClientMessage::LoadingComplete => {
            if session.state.current_step().is_loading() {
                finish_lookup(session).await;
            }
            sequencer.complete_loading(&mut session.state)?;
        }
        ClientMessage::Back => {
            sequencer.go_back(&mut session.state);
        }
        ClientMessage::Reset => {
            session.clear();
            info!("Flow reset.");
        }
        ClientMessage::Complete { purchased } => {
            return complete(app, session, purchased.as_deref()).await;
        }
        ClientMessage::ResolvePersona { relationship, name } => {
            let resolution = app.resolver.resolve(&relationship, name.as_deref()).await;
            return Ok(ServerMessage::Persona(resolution));
        }
        ClientMessage::PriceRange { category } => {
            let range = price_range_or_default(app.catalog.as_ref(), &category).await;
            return Ok(ServerMessage::PriceRange { category, range });
        }
        ClientMessage::ListSessions => {
            let sessions = app.recorder.history().await?;
            return Ok(ServerMessage::Sessions { sessions });
        }
    }

    start_lookup(app, session);
    Ok(ServerMessage::Step(step_view(app, session)))
}

//=========================================================================================
// Background Lookups
//=========================================================================================

/// Starts the lookup the current step waits on, unless one is already running for it.
fn start_lookup(app: &AppState, session: &mut FlowSession) {
    if session
        .pending
        .as_ref()
        .is_some_and(|pending| session.state.accepts(pending.ticket))
    {
        return;
    }

    let ticket = session.state.ticket();
    let handle = match ticket.step() {
        Step::Checkpoint { checkpoint, .. } if persona_lookup_due(session, checkpoint) => {
            let resolver = app.resolver.clone();
            let (relationship, name) = recipient_query(&session.state);
            tokio::spawn(async move {
                LookupOutcome::Persona(resolver.resolve(&relationship, name.as_deref()).await)
            })
        }
        Step::ResultsLoading => {
            session.results = ResultSet::new();
            let definition = app.definition.clone();
            let catalog = app.catalog.clone();
            let state = session.state.clone();
            tokio::spawn(async move {
                LookupOutcome::Results(resolve_results(&definition, &state, catalog.as_ref()).await)
            })
        }
        _ => {
            session.pending = None;
            return;
        }
    };

    debug!(step = ticket.step().name(), epoch = session.state.epoch(), "lookup started");
    session.pending = Some(PendingLookup { ticket, handle });
}

/// The recipient checkpoint always looks the persona up. Later checkpoints
/// look it up again once a name can pick between stored personas of the type.
fn persona_lookup_due(session: &FlowSession, checkpoint: Checkpoint) -> bool {
    checkpoint == Checkpoint::RecipientLookup || needs_name_match(session)
}

fn needs_name_match(session: &FlowSession) -> bool {
    let named = recipient_query(&session.state).1.is_some();
    named
        && session.persona.as_ref().is_some_and(|resolution| {
            !resolution.found && resolution.missing_fields == [PersonaField::Name]
        })
}

fn recipient_query(state: &FlowState) -> (String, Option<String>) {
    let relationship = state
        .answer(keys::RECIPIENT)
        .map(|value| value.to_string())
        .unwrap_or_default();
    let name = state
        .answer(keys::NAME)
        .and_then(|value| value.as_text())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    (relationship, name)
}

/// Waits for the pending lookup and applies its outcome if it is still current.
async fn finish_lookup(session: &mut FlowSession) {
    let Some(pending) = session.pending.take() else {
        return;
    };
    if !session.state.accepts(pending.ticket) {
        debug!(step = pending.ticket.step().name(), "dropping stale lookup");
        return;
    }

    match pending.handle.await {
        Ok(LookupOutcome::Persona(resolution)) => {
            info!(found = resolution.found, "Recipient persona resolved.");
            session.persona = Some(resolution);
        }
        Ok(LookupOutcome::Results(results)) => {
            debug!(sources = results.len(), "results resolved");
            session.results = results;
        }
        Err(e) => error!("Lookup task failed: {}", e),
    }
}

//=========================================================================================
// Rendering and Completion
//=========================================================================================

fn step_view(app: &AppState, session: &FlowSession) -> StepView {
    let state = &session.state;
    let definition = app.sequencer.definition();
    let step = state.current_step();
    let entry_point = state.entry_point().unwrap_or_default();
    let category = state.category().unwrap_or_default();
    let subcategory = state.subcategory().unwrap_or_default();

    let question = match step {
        Step::Questions { index } => definition
            .questions_for(entry_point, state.answers())
            .get(index)
            .map(|question| (*question).clone()),
        _ => None,
    };
    let options = match step {
        Step::Entry => definition
            .entries
            .iter()
            .map(|(key, entry)| Choice {
                key: key.clone(),
                label: entry.label.clone(),
            })
            .collect(),
        Step::Categories => definition.categories_for(entry_point),
        Step::Subcategories => definition.subcategories_for(entry_point, category),
        _ => Vec::new(),
    };
    let preference = match step {
        Step::Preferences => definition
            .preference_for(entry_point, category, subcategory)
            .cloned(),
        _ => None,
    };
    let results = match step {
        Step::Results => Some(apply_preference(&session.results, state.preference())),
        _ => None,
    };
    let no_products = results
        .as_ref()
        .is_some_and(|results| results.values().all(Vec::is_empty));

    StepView {
        step,
        progress: Progress {
            current: state.current_step_number(),
            total: state.total_steps(),
        },
        loading_message: step.loading_message(),
        question,
        options,
        preference,
        persona: session.persona.clone(),
        results,
        no_products,
    }
}

/// Records the finished traversal once, then saves what was learnt about the recipient.
async fn complete(
    app: &AppState,
    session: &mut FlowSession,
    purchased: Option<&str>,
) -> Result<ServerMessage, ServiceError> {
    let step = session.state.current_step();
    if step != Step::Results || session.is_completed() {
        return Err(FlowError::UnexpectedAction {
            action: "complete",
            step: step.name(),
        }
        .into());
    }

    let results = apply_preference(&session.results, session.state.preference());
    let recorded = app.recorder.record(&session.state, results).await?;
    session.completed = Some(session.state.ticket());
    let persona_saved = save_persona(app, session, purchased).await;

    Ok(ServerMessage::SessionRecorded {
        session_id: recorded.id,
        created_at: recorded.created_at,
        persona_saved,
    })
}

async fn save_persona(app: &AppState, session: &FlowSession, purchased: Option<&str>) -> bool {
    let gifting = session
        .state
        .entry_point()
        .and_then(|entry_point| app.definition.entry(entry_point))
        .is_some_and(|entry| entry.mode == EntryMode::Gifting);
    if !gifting {
        return false;
    }

    // No checkpoint ran after the name was given; match it now.
    let resolution: Option<Resolution> = if needs_name_match(session) {
        let (relationship, name) = recipient_query(&session.state);
        Some(app.resolver.resolve(&relationship, name.as_deref()).await)
    } else {
        session.persona.clone()
    };
    let existing = resolution
        .as_ref()
        .and_then(|resolution| resolution.persona.as_ref());
    let Some(persona) =
        persona_from_answers(session.state.answers(), existing, purchased, Utc::now())
    else {
        debug!("not enough answers to save a persona");
        return false;
    };

    match app.personas.upsert_persona(persona).await {
        Ok(saved) => {
            info!(persona_id = %saved.id, relationship = %saved.relationship, "Persona saved.");
            true
        }
        Err(e) => {
            warn!("Failed to save persona: {}", e);
            false
        }
    }
}
