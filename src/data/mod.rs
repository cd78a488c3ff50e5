//! Core data models for cafescout
//!
//! This module contains the domain records extracted from fetched payloads:
//! city listings scraped from the state directory page and business records
//! extracted from business-search results.

pub mod cities;
pub mod search;

pub use cities::{parse_state_cities, state_page_url, CityDirectory, ScrapeError};
pub use search::{extract_businesses, BusinessSearch};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cities listed under one state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityListing {
    /// Lower-cased state name
    pub state: String,
    /// City names in page order
    pub cities: Vec<String>,
}

/// All scraped states with their cities, in page order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCities {
    listings: Vec<CityListing>,
}

impl StateCities {
    /// Builds the collection from listings, lower-casing state names
    ///
    /// A state that appears more than once keeps its first listing.
    pub fn new(listings: Vec<CityListing>) -> Self {
        let mut kept: Vec<CityListing> = Vec::with_capacity(listings.len());
        for mut listing in listings {
            listing.state = listing.state.to_lowercase();
            if !kept.iter().any(|l| l.state == listing.state) {
                kept.push(listing);
            }
        }
        Self { listings: kept }
    }

    /// Returns the cities of `state`, matched case-insensitively
    pub fn cities(&self, state: &str) -> Option<&[String]> {
        let state = state.trim().to_lowercase();
        self.listings
            .iter()
            .find(|l| l.state == state)
            .map(|l| l.cities.as_slice())
    }

    /// Returns true if `state` is present, matched case-insensitively
    pub fn contains_state(&self, state: &str) -> bool {
        self.cities(state).is_some()
    }

    /// Lower-cased state names in page order
    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.listings.iter().map(|l| l.state.as_str())
    }

    /// All listings in page order
    pub fn listings(&self) -> &[CityListing] {
        &self.listings
    }

    /// Number of states
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Returns true if no state was found
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}

/// A coffee business extracted from search results
///
/// Text fields hold an empty string and numeric fields hold `None` when the
/// source record lacks them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    pub name: String,
    pub city: String,
    /// Street address (first line)
    pub address: String,
    pub zip_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Price tier as a run of `$` characters, e.g. `$$`
    pub price: String,
    pub image_url: String,
    /// Rating from 0.0 to 5.0
    pub rating: Option<f64>,
    pub review_count: Option<u32>,
}

impl BusinessRecord {
    /// Street address joined with the zip code, as persisted in storage
    pub fn full_address(&self) -> String {
        format!("{}, {}", self.address, self.zip_code)
    }
}

impl fmt::Display for BusinessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rating = self.rating.map(|r| r.to_string()).unwrap_or_default();
        write!(
            f,
            "{}({},{}): {}, {}, {}",
            self.name, rating, self.price, self.address, self.city, self.zip_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(state: &str, cities: &[&str]) -> CityListing {
        CityListing {
            state: state.to_string(),
            cities: cities.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_state_lookup_is_case_insensitive() {
        let states = StateCities::new(vec![listing("Michigan", &["Ann Arbor", "Detroit"])]);

        assert_eq!(
            states.cities("michigan"),
            Some(&["Ann Arbor".to_string(), "Detroit".to_string()][..])
        );
        assert!(states.contains_state("MICHIGAN"));
        assert!(states.contains_state("  Michigan "));
        assert!(!states.contains_state("ohio"));
    }

    #[test]
    fn test_states_are_lower_cased_in_order() {
        let states = StateCities::new(vec![
            listing("Alabama", &["Birmingham"]),
            listing("Alaska", &["Anchorage"]),
        ]);

        let names: Vec<&str> = states.states().collect();
        assert_eq!(names, vec!["alabama", "alaska"]);
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn test_duplicate_state_keeps_first() {
        let states = StateCities::new(vec![
            listing("Texas", &["Austin"]),
            listing("texas", &["Dallas"]),
        ]);

        assert_eq!(states.len(), 1);
        assert_eq!(states.cities("texas"), Some(&["Austin".to_string()][..]));
    }

    #[test]
    fn test_business_display() {
        let business = BusinessRecord {
            name: "Comet Coffee".to_string(),
            city: "Ann Arbor".to_string(),
            address: "16 Nickels Arcade".to_string(),
            zip_code: "48104".to_string(),
            price: "$".to_string(),
            rating: Some(4.5),
            ..Default::default()
        };

        assert_eq!(
            business.to_string(),
            "Comet Coffee(4.5,$): 16 Nickels Arcade, Ann Arbor, 48104"
        );
    }

    #[test]
    fn test_business_display_without_rating() {
        let business = BusinessRecord {
            name: "Mystery Beans".to_string(),
            city: "Detroit".to_string(),
            ..Default::default()
        };

        assert_eq!(business.to_string(), "Mystery Beans(,): , Detroit, ");
    }

    #[test]
    fn test_full_address_joins_zip() {
        let business = BusinessRecord {
            address: "123 Main St".to_string(),
            zip_code: "48104".to_string(),
            ..Default::default()
        };
        assert_eq!(business.full_address(), "123 Main St, 48104");
    }
}
