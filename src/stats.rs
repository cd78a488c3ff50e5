//! Summary statistics over stored businesses
//!
//! Pure functions over rows read from storage, plus the framed report text
//! printed by the interactive session.

use serde::Serialize;
use std::cmp::Ordering;

use crate::storage::StoredBusiness;

/// Label used for businesses with no price tier
pub const NO_PRICE_LABEL: &str = "no price information";

/// Count of businesses sharing one price tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceSlice {
    /// `level N` for an N-character tier, or [`NO_PRICE_LABEL`]
    pub label: String,
    pub count: usize,
}

/// Mean rating over rows that have one
///
/// Returns `None` when no row is rated.
pub fn average_rating(businesses: &[StoredBusiness]) -> Option<f64> {
    let ratings: Vec<f64> = businesses.iter().filter_map(|b| b.rating).collect();
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
}

/// Highest rated business, ties broken by review count
pub fn best_business(businesses: &[StoredBusiness]) -> Option<&StoredBusiness> {
    businesses.iter().max_by(|a, b| {
        let by_rating = a
            .rating
            .unwrap_or(f64::MIN)
            .partial_cmp(&b.rating.unwrap_or(f64::MIN))
            .unwrap_or(Ordering::Equal);
        // Earlier rows win full ties
        by_rating
            .then_with(|| a.review_count.cmp(&b.review_count))
            .then_with(|| b.id.cmp(&a.id))
    })
}

/// Counts businesses per price tier, in order of first appearance
pub fn price_breakdown(businesses: &[StoredBusiness]) -> Vec<PriceSlice> {
    let mut slices: Vec<PriceSlice> = Vec::new();
    for business in businesses {
        let label = price_label(&business.price);
        match slices.iter_mut().find(|s| s.label == label) {
            Some(slice) => slice.count += 1,
            None => slices.push(PriceSlice { label, count: 1 }),
        }
    }
    slices
}

/// Label for a price tier string such as `$$`
pub fn price_label(price: &str) -> String {
    let level = price.chars().count();
    if level == 0 {
        NO_PRICE_LABEL.to_string()
    } else {
        format!("level {}", level)
    }
}

/// Surrounds `text` with rows of `*` as wide as its longest line
pub fn framed(text: &str) -> String {
    let width = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let rule = "*".repeat(width);
    format!("{}\n{}\n{}", rule, text, rule)
}

/// Framed report of the average rating in `city`
pub fn average_report(city: &str, average: Option<f64>) -> String {
    match average {
        Some(avg) => framed(&format!("Average rating of {} city is {:.2}", city, avg)),
        None => framed(&format!("No rated cafes stored for {} yet.", city)),
    }
}

/// Framed recommendation for the best business
pub fn recommendation_report(best: &StoredBusiness) -> String {
    let rating = best.rating.map(|r| r.to_string()).unwrap_or_else(|| "n/a".to_string());
    let reviews = best
        .review_count
        .map(|r| r.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let rule = "*".repeat(40);
    format!(
        "{rule}\nThe best coffee we recommend: \n{}: {}, {}, \nrating: {}, review number: {}\n{rule}",
        best.name, best.city, best.address, rating, reviews
    )
}
