//! crates/concierge_core/src/results.rs
//!
//! Turning a finished selection into offers: price-point preferences,
//! catalog fallback, and the degraded answers used when the catalog is down.

use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use crate::domain::{Offer, PriceRange, ResultSet};
use crate::flow::{keys, FlowDefinition, FlowState};
use crate::ports::CatalogService;

/// Source key used for offers that came from the catalog rather than the definition.
pub const CATALOG_SOURCE: &str = "catalog";

fn price_point_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:[$€£]|USD|EUR|GBP)?\s*(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d{1,2}))?\s*$")
            .expect("price point pattern is valid")
    })
}

/// An exact price, kept in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint(i64);

impl PricePoint {
    /// Recognises `"$150"`, `"150"`, `"$1,250"` or `"£49.5"`. Anything else is not a price point.
    pub fn parse(text: &str) -> Option<Self> {
        let captures = price_point_pattern().captures(text)?;
        let whole: i64 = captures[1].replace(',', "").parse().ok()?;
        let cents = match captures.get(2).map(|m| m.as_str()) {
            Some(frac) if frac.len() == 1 => frac.parse::<i64>().ok()? * 10,
            Some(frac) => frac.parse::<i64>().ok()?,
            None => 0,
        };
        Some(PricePoint(whole * 100 + cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn matches(&self, price: f64) -> bool {
        (price * 100.0).round() as i64 == self.0
    }
}

/// Keeps only offers at the preferred price point.
///
/// Preferences that are not price points, and price points nothing is
/// offered at, leave the set unchanged.
pub fn apply_preference(results: &ResultSet, preference: Option<&str>) -> ResultSet {
    let Some(point) = preference.and_then(PricePoint::parse) else {
        return results.clone();
    };
    let filtered: ResultSet = results
        .iter()
        .filter_map(|(source, offers)| {
            let kept: Vec<Offer> = offers
                .iter()
                .filter(|offer| point.matches(offer.price))
                .cloned()
                .collect();
            (!kept.is_empty()).then(|| (source.clone(), kept))
        })
        .collect();

    if filtered.is_empty() {
        results.clone()
    } else {
        filtered
    }
}

/// Offers for `category`, or none when the catalog fails.
pub async fn offers_or_empty(
    catalog: &dyn CatalogService,
    category: &str,
    max_budget: Option<f64>,
) -> Vec<Offer> {
    match catalog.fetch_offers(category, max_budget).await {
        Ok(offers) => offers,
        Err(e) => {
            warn!(category, error = %e, "offer lookup failed, showing no products");
            Vec::new()
        }
    }
}

/// Price bounds for `category`, or `PriceRange::UNAVAILABLE` when the catalog fails.
pub async fn price_range_or_default(catalog: &dyn CatalogService, category: &str) -> PriceRange {
    match catalog.fetch_price_range(category).await {
        Ok(range) => range,
        Err(e) => {
            warn!(category, error = %e, "price range lookup failed, using default range");
            PriceRange::UNAVAILABLE
        }
    }
}

/// Resolves the offers for a finished selection.
///
/// The definition's result set wins; when it has none the catalog is asked
/// for the subcategory (or category), capped at the budget answer. The
/// preference filter is applied last.
pub async fn resolve_results(
    definition: &FlowDefinition,
    state: &FlowState,
    catalog: &dyn CatalogService,
) -> ResultSet {
    let entry_point = state.entry_point().unwrap_or_default();
    let mut results = match (state.category(), state.subcategory()) {
        (Some(category), Some(subcategory)) => {
            definition.results_for(entry_point, category, subcategory)
        }
        _ => ResultSet::new(),
    };

    if results.is_empty() {
        if let Some(lookup) = state.subcategory().or(state.category()) {
            let budget = state.answer(keys::BUDGET).and_then(|value| value.as_number());
            let offers = offers_or_empty(catalog, lookup, budget).await;
            if !offers.is_empty() {
                results.insert(CATALOG_SOURCE.to_string(), offers);
            }
        }
    }

    apply_preference(&results, state.preference())
}
