//! crates/concierge_core/src/fixtures.rs
//!
//! Shared test data: a flow definition exercising every entry mode.

use crate::domain::{Offer, Persona};
use crate::flow::FlowDefinition;
use chrono::Utc;
use uuid::Uuid;

pub(crate) const FLOW_JSON: &str = r#"{
    "version": "test",
    "entries": {
        "myself": {
            "label": "Shopping for myself",
            "categories": {
                "home": { "label": "Home", "subcategories": {
                    "kitchen": {
                        "label": "Kitchen",
                        "preference": { "prompt": "Pick a price", "options": ["$99", "$150", "Surprise me"] },
                        "results": { "amazon": [
                            { "name": "Dutch Oven", "price": 99 },
                            { "name": "Knife Set", "price": 150 }
                        ], "etsy": [
                            { "name": "Olive Board", "price": 150 },
                            { "name": "Copper Pan", "price": 220 }
                        ] }
                    }
                } },
                "tech": { "label": "Tech", "subcategories": ["audio", "gaming"] }
            }
        },
        "someone_else": {
            "label": "Shopping for someone else",
            "mode": "gifting",
            "questions": [
                { "key": "recipient", "prompt": "Who are you shopping for?", "type": "choice",
                  "options": ["mother", "father", "friend", "coworker", "boss"] },
                { "key": "name", "prompt": "What's their name?", "type": "text" },
                { "key": "gender", "prompt": "Their gender?", "type": "choice", "options": ["female", "male", "neutral"] },
                { "key": "age", "prompt": "How old are they?", "type": "range", "min": 1, "max": 110 },
                { "key": "occasion", "prompt": "What's the occasion?", "type": "choice",
                  "options": ["birthday", "anniversary", "holiday"] },
                { "key": "budget", "prompt": "Your budget?", "type": "budget", "min": 10, "max": 1000 }
            ],
            "categories": {
                "home": { "label": "Home", "subcategories": {
                    "kitchen": {
                        "label": "Kitchen",
                        "results": { "amazon": [ { "name": "Knife Set", "price": 150 } ] }
                    }
                } }
            }
        },
        "friend": {
            "label": "Shopping for a friend",
            "questions": [
                { "key": "name", "prompt": "Friend's name?", "type": "text" },
                { "key": "age", "prompt": "How old?", "type": "range", "min": 1, "max": 110 }
            ],
            "categories": {
                "tech": { "label": "Tech", "subcategories": ["audio"] }
            }
        },
        "browsing": {
            "label": "Just browsing",
            "mode": "browsing",
            "categories": {
                "tech": { "label": "Tech", "subcategories": [] }
            }
        },
        "gift_card": { "label": "Send a gift card" }
    }
}"#;

pub(crate) fn definition() -> FlowDefinition {
    FlowDefinition::from_json_str(FLOW_JSON).expect("fixture definition parses")
}

pub(crate) fn offer(name: &str, price: f64) -> Offer {
    Offer {
        name: name.to_string(),
        price,
        currency: "USD".to_string(),
        link: format!("https://shop.example/{}", name.to_lowercase().replace(' ', "-")),
        image: String::new(),
    }
}

pub(crate) fn persona(relationship: &str, name: &str, interests: &[&str]) -> Persona {
    let now = Utc::now();
    Persona {
        id: Uuid::new_v4(),
        relationship: relationship.to_string(),
        name: name.to_string(),
        age: Some(58),
        gender: None,
        interests: interests.iter().map(|i| i.to_string()).collect(),
        last_purchase: None,
        created_at: now,
        updated_at: now,
    }
}
