//! crates/concierge_core/src/persona.rs
//!
//! Persona resolution: deciding whether the person being shopped for is
//! already known, and what still has to be asked if not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Answers, Gender, LastPurchase, Persona};
use crate::flow::keys;
use crate::ports::{PersonaStore, PortResult};

/// Relationship types a user can have at most one persona for.
pub const UNIQUE_TYPES: &[&str] = &[
    "mother",
    "father",
    "spouse",
    "sibling",
    "boss",
    "grandparent",
    "cousin",
    "romantic partner",
];

/// Relationship types with any number of personas, told apart by name.
pub const MULTI_TYPES: &[&str] = &["friend", "coworker", "neighbor"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    Unique,
    Multi,
    Unknown,
}

/// Lower-cases and trims a label; `_` and `-` read as spaces.
pub fn normalize_relationship(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn classify(label: &str) -> RelationshipKind {
    let label = normalize_relationship(label);
    if UNIQUE_TYPES.contains(&label.as_str()) {
        RelationshipKind::Unique
    } else if MULTI_TYPES.contains(&label.as_str()) {
        RelationshipKind::Multi
    } else {
        RelationshipKind::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaField {
    Name,
    Age,
    Gender,
    Interests,
}

impl PersonaField {
    pub const ALL: [PersonaField; 4] = [
        PersonaField::Name,
        PersonaField::Age,
        PersonaField::Gender,
        PersonaField::Interests,
    ];
}

/// Outcome of a persona lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub found: bool,
    pub persona: Option<Persona>,
    pub missing_fields: Vec<PersonaField>,
    pub message: String,
}

impl Resolution {
    fn found(persona: Persona) -> Self {
        let message = welcome_back(&persona);
        Self {
            found: true,
            persona: Some(persona),
            missing_fields: Vec::new(),
            message,
        }
    }

    fn needs_everything(message: impl Into<String>) -> Self {
        Self {
            found: false,
            persona: None,
            missing_fields: PersonaField::ALL.to_vec(),
            message: message.into(),
        }
    }

    fn needs_name(relationship: &str) -> Self {
        Self {
            found: false,
            persona: None,
            missing_fields: vec![PersonaField::Name],
            message: format!("Which {} is this gift for?", relationship),
        }
    }
}

fn welcome_back(persona: &Persona) -> String {
    let who = match persona.age {
        Some(age) => format!("{} ({})", persona.name, age),
        None => persona.name.clone(),
    };
    let interests: Vec<&str> = persona.interests.iter().take(2).map(String::as_str).collect();
    if interests.is_empty() {
        format!("Shopping for {} again?", who)
    } else {
        format!(
            "Shopping for {} again? Last time they loved {}.",
            who,
            interests.join(" and ")
        )
    }
}

/// Picks the persona whose name best matches `query`.
///
/// An exact case-insensitive match wins; otherwise the first persona whose
/// name contains the query, or is contained by it.
pub fn match_by_name<'a>(personas: &'a [Persona], query: &str) -> Option<&'a Persona> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    personas
        .iter()
        .find(|persona| persona.name.trim().to_lowercase() == query)
        .or_else(|| {
            personas.iter().find(|persona| {
                let name = persona.name.trim().to_lowercase();
                !name.is_empty() && (name.contains(&query) || query.contains(&name))
            })
        })
}

/// Looks personas up through a `PersonaStore`. Never fails: storage
/// problems send the user down the new-persona path.
#[derive(Clone)]
pub struct PersonaResolver {
    store: Arc<dyn PersonaStore>,
}

impl PersonaResolver {
    pub fn new(store: Arc<dyn PersonaStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, relationship: &str, name: Option<&str>) -> Resolution {
        match self.try_resolve(relationship, name).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(relationship, error = %e, "persona lookup failed, treating as new persona");
                Resolution::needs_everything(
                    "We couldn't check your saved people right now. Tell us a bit about them.",
                )
            }
        }
    }

    async fn try_resolve(&self, relationship: &str, name: Option<&str>) -> PortResult<Resolution> {
        let relationship = normalize_relationship(relationship);
        let name = name.map(str::trim).filter(|name| !name.is_empty());
        debug!(relationship = %relationship, ?name, "resolving persona");

        let resolution = match classify(&relationship) {
            RelationshipKind::Unique => match self.store.find_persona_by_type(&relationship).await? {
                Some(persona) => Resolution::found(persona),
                None => Resolution::needs_everything(format!(
                    "Tell us about your {} so we can find something they'll love.",
                    relationship
                )),
            },
            RelationshipKind::Multi => {
                let personas = self.store.find_personas_by_type(&relationship).await?;
                match name.and_then(|name| match_by_name(&personas, name)) {
                    Some(persona) => Resolution::found(persona.clone()),
                    None if !personas.is_empty() => Resolution::needs_name(&relationship),
                    None => Resolution::needs_everything(format!(
                        "Tell us about your {} so we can find something they'll love.",
                        relationship
                    )),
                }
            }
            RelationshipKind::Unknown => {
                Resolution::needs_everything("Tell us a bit about who you're shopping for.")
            }
        };
        Ok(resolution)
    }
}

//=========================================================================================
// Building personas from collected answers
//=========================================================================================

/// Builds the persona to upsert after a gifting traversal.
///
/// Answers take precedence over what `existing` already knows; interests are
/// merged keeping the stored order. Returns `None` when the recipient is
/// missing or of an unknown type, or when a multi-type persona has no name.
pub fn persona_from_answers(
    answers: &Answers,
    existing: Option<&Persona>,
    purchased: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Persona> {
    let relationship = normalize_relationship(answers.get(keys::RECIPIENT)?.as_text()?);
    let kind = classify(&relationship);
    if kind == RelationshipKind::Unknown {
        return None;
    }

    let answered_name = answers
        .get(keys::NAME)
        .and_then(|value| value.as_text())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    // A matched multi-type persona keeps its stored name: upserts key on it.
    let name = match (existing, kind, answered_name) {
        (Some(persona), RelationshipKind::Multi, _) => persona.name.clone(),
        (_, _, Some(name)) => name,
        (Some(persona), _, None) => persona.name.clone(),
        (None, RelationshipKind::Unique, None) => capitalize(&relationship),
        (None, _, None) => return None,
    };

    let age = answers
        .get(keys::AGE)
        .and_then(|value| value.as_number())
        .filter(|age| *age >= 0.0)
        .map(|age| age.round() as u32)
        .or_else(|| existing.and_then(|p| p.age));

    let gender = answers
        .get(keys::GENDER)
        .and_then(|value| value.as_text())
        .and_then(parse_gender)
        .or_else(|| existing.and_then(|p| p.gender));

    let mut interests = existing.map(|p| p.interests.clone()).unwrap_or_default();
    if let Some(answered) = answers.get(keys::INTERESTS).and_then(|value| value.as_text()) {
        for interest in answered.split(',').map(str::trim).filter(|i| !i.is_empty()) {
            if !interests.iter().any(|known| known.eq_ignore_ascii_case(interest)) {
                interests.push(interest.to_string());
            }
        }
    }

    let last_purchase = match purchased.map(str::trim).filter(|item| !item.is_empty()) {
        Some(item) => Some(LastPurchase {
            item: item.to_string(),
            occasion: answers
                .get(keys::OCCASION)
                .map(|occasion| occasion.to_string()),
            purchased_at: now,
        }),
        None => existing.and_then(|p| p.last_purchase.clone()),
    };

    Some(Persona {
        id: existing.map(|p| p.id).unwrap_or_else(Uuid::new_v4),
        relationship,
        name,
        age,
        gender,
        interests,
        last_purchase,
        created_at: existing.map(|p| p.created_at).unwrap_or(now),
        updated_at: now,
    })
}

fn parse_gender(text: &str) -> Option<Gender> {
    match text.trim().to_lowercase().as_str() {
        "female" => Some(Gender::Female),
        "male" => Some(Gender::Male),
        "neutral" | "non-binary" | "nonbinary" | "other" => Some(Gender::Neutral),
        _ => None,
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnswerValue;
    use crate::fixtures::persona;
    use crate::memory::InMemoryPersonaStore;
    use crate::ports::PortError;
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl PersonaStore for BrokenStore {
        async fn find_persona_by_type(&self, _: &str) -> PortResult<Option<Persona>> {
            Err(PortError::Unavailable("database offline".to_string()))
        }

        async fn find_personas_by_type(&self, _: &str) -> PortResult<Vec<Persona>> {
            Err(PortError::Unavailable("database offline".to_string()))
        }

        async fn upsert_persona(&self, _: Persona) -> PortResult<Persona> {
            Err(PortError::Unavailable("database offline".to_string()))
        }
    }

    async fn resolver_with(personas: Vec<Persona>) -> PersonaResolver {
        let store = InMemoryPersonaStore::new();
        for persona in personas {
            store.upsert_persona(persona).await.unwrap();
        }
        PersonaResolver::new(Arc::new(store))
    }

    #[test]
    fn classifies_relationships() {
        assert_eq!(classify("Mother"), RelationshipKind::Unique);
        assert_eq!(classify("romantic_partner"), RelationshipKind::Unique);
        assert_eq!(classify(" friend "), RelationshipKind::Multi);
        assert_eq!(classify("coworker"), RelationshipKind::Multi);
        assert_eq!(classify("aunt"), RelationshipKind::Unknown);
    }

    #[test]
    fn name_matching_prefers_exact_then_substring() {
        let personas = vec![
            persona("friend", "James Carter", &[]),
            persona("friend", "Jamie Lee", &[]),
            persona("friend", "Jam", &[]),
        ];
        assert_eq!(match_by_name(&personas, "james").unwrap().name, "James Carter");
        assert_eq!(match_by_name(&personas, "JAM").unwrap().name, "Jam");
        assert_eq!(match_by_name(&personas, "Jamie Lee-Smith").unwrap().name, "Jamie Lee");
        assert!(match_by_name(&personas, "Olivia").is_none());
        assert!(match_by_name(&personas, "  ").is_none());
    }

    #[tokio::test]
    async fn unique_type_found_surfaces_two_interests() {
        let resolver = resolver_with(vec![persona(
            "mother",
            "Linda",
            &["gardening", "jazz", "baking"],
        )])
        .await;

        let resolution = resolver.resolve("Mother", None).await;

        assert!(resolution.found);
        assert!(resolution.missing_fields.is_empty());
        assert_eq!(resolution.persona.unwrap().name, "Linda");
        assert!(resolution.message.contains("Linda (58)"));
        assert!(resolution.message.contains("gardening and jazz"));
        assert!(!resolution.message.contains("baking"));
    }

    #[tokio::test]
    async fn unique_type_absent_needs_everything() {
        let resolver = resolver_with(vec![]).await;
        let resolution = resolver.resolve("father", None).await;
        assert!(!resolution.found);
        assert_eq!(resolution.missing_fields, PersonaField::ALL.to_vec());
    }

    #[tokio::test]
    async fn multi_type_matches_by_contained_name() {
        let resolver = resolver_with(vec![
            persona("friend", "James Carter", &["climbing"]),
            persona("friend", "Jamie Lee", &["chess"]),
        ])
        .await;

        let resolution = resolver.resolve("friend", Some("James")).await;

        assert!(resolution.found);
        assert_eq!(resolution.persona.unwrap().name, "James Carter");
    }

    #[tokio::test]
    async fn multi_type_without_match_needs_only_name() {
        let resolver = resolver_with(vec![persona("friend", "James Carter", &[])]).await;

        let resolution = resolver.resolve("friend", Some("Olivia")).await;
        assert!(!resolution.found);
        assert_eq!(resolution.missing_fields, vec![PersonaField::Name]);

        let resolution = resolver.resolve("friend", None).await;
        assert_eq!(resolution.missing_fields, vec![PersonaField::Name]);
    }

    #[tokio::test]
    async fn multi_type_with_none_stored_needs_everything() {
        let resolver = resolver_with(vec![persona("friend", "James Carter", &[])]).await;
        let resolution = resolver.resolve("neighbor", Some("Ann")).await;
        assert_eq!(resolution.missing_fields, PersonaField::ALL.to_vec());
    }

    #[tokio::test]
    async fn unknown_type_needs_everything() {
        let resolver = resolver_with(vec![persona("mother", "Linda", &[])]).await;
        let resolution = resolver.resolve("aunt", Some("Linda")).await;
        assert!(!resolution.found);
        assert_eq!(resolution.missing_fields, PersonaField::ALL.to_vec());
    }

    #[tokio::test]
    async fn storage_failure_falls_back_to_new_persona() {
        let resolver = PersonaResolver::new(Arc::new(BrokenStore));
        let resolution = resolver.resolve("mother", None).await;
        assert!(!resolution.found);
        assert!(resolution.persona.is_none());
        assert_eq!(resolution.missing_fields, PersonaField::ALL.to_vec());
    }

    fn answers(pairs: &[(&str, AnswerValue)]) -> Answers {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn builds_new_persona_from_answers() {
        let now = Utc::now();
        let answers = answers(&[
            ("recipient", AnswerValue::from("Mother")),
            ("gender", AnswerValue::from("female")),
            ("age", AnswerValue::from(61.0)),
            ("interests", AnswerValue::from("gardening, jazz ,")),
            ("occasion", AnswerValue::from("birthday")),
        ]);

        let persona = persona_from_answers(&answers, None, Some("Garden Kneeler"), now).unwrap();

        assert_eq!(persona.relationship, "mother");
        assert_eq!(persona.name, "Mother");
        assert_eq!(persona.age, Some(61));
        assert_eq!(persona.gender, Some(Gender::Female));
        assert_eq!(persona.interests, vec!["gardening", "jazz"]);
        let purchase = persona.last_purchase.unwrap();
        assert_eq!(purchase.item, "Garden Kneeler");
        assert_eq!(purchase.occasion.as_deref(), Some("birthday"));
    }

    #[test]
    fn merges_answers_into_existing_persona() {
        let existing = persona("friend", "James Carter", &["climbing"]);
        let answers = answers(&[
            ("recipient", AnswerValue::from("friend")),
            ("interests", AnswerValue::from("Climbing, coffee")),
        ]);

        let merged = persona_from_answers(&answers, Some(&existing), None, Utc::now()).unwrap();

        assert_eq!(merged.id, existing.id);
        assert_eq!(merged.name, "James Carter");
        assert_eq!(merged.age, existing.age);
        assert_eq!(merged.interests, vec!["climbing", "coffee"]);
        assert_eq!(merged.created_at, existing.created_at);
    }

    #[test]
    fn matched_friend_keeps_the_stored_name() {
        let existing = persona("friend", "James Carter", &["climbing"]);
        let answers = answers(&[
            ("recipient", AnswerValue::from("friend")),
            ("name", AnswerValue::from("James")),
            ("interests", AnswerValue::from("coffee")),
        ]);

        let merged = persona_from_answers(&answers, Some(&existing), None, Utc::now()).unwrap();
        assert_eq!(merged.name, "James Carter");
        assert_eq!(merged.interests, vec!["climbing", "coffee"]);

        let mother = persona("mother", "Linda", &[]);
        let renamed = answers_for_mother("Lin");
        let merged = persona_from_answers(&renamed, Some(&mother), None, Utc::now()).unwrap();
        assert_eq!(merged.name, "Lin");
    }

    fn answers_for_mother(name: &str) -> Answers {
        answers(&[
            ("recipient", AnswerValue::from("mother")),
            ("name", AnswerValue::from(name)),
        ])
    }

    #[test]
    fn unnamed_multi_or_unknown_recipient_builds_nothing() {
        let friend = answers(&[("recipient", AnswerValue::from("friend"))]);
        assert!(persona_from_answers(&friend, None, None, Utc::now()).is_none());

        let aunt = answers(&[
            ("recipient", AnswerValue::from("aunt")),
            ("name", AnswerValue::from("May")),
        ]);
        assert!(persona_from_answers(&aunt, None, None, Utc::now()).is_none());
        assert!(persona_from_answers(&Answers::new(), None, None, Utc::now()).is_none());
    }
}
