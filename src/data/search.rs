//! Business-search API client
//!
//! Looks up coffee businesses in a city through the fetch mediator and turns
//! the raw search payload into [`BusinessRecord`]s. Extraction is permissive:
//! a missing or mistyped field becomes a placeholder instead of an error.

use serde_json::Value;
use tracing::debug;

use super::BusinessRecord;
use crate::cache::{FetchError, FetchMediator, RequestDescriptor, Transport};

/// Business-search endpoint
pub const DEFAULT_SEARCH_URL: &str = "https://api.yelp.com/v3/businesses/search";

/// Search term sent with every lookup
pub const DEFAULT_SEARCH_TERM: &str = "coffee";

/// Maximum number of results requested per lookup
pub const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// Builds business-search requests for a fixed endpoint and term
#[derive(Debug, Clone)]
pub struct BusinessSearch {
    base_url: String,
    term: String,
    limit: u32,
}

impl Default for BusinessSearch {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_URL)
    }
}

impl BusinessSearch {
    /// Creates a search client for `base_url` with the default term and limit
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            term: DEFAULT_SEARCH_TERM.to_string(),
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    /// Overrides the search term
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    /// Request descriptor for businesses in `city`
    pub fn request(&self, city: &str) -> RequestDescriptor {
        RequestDescriptor::new(&self.base_url)
            .param("location", city)
            .param("term", &self.term)
            .param("limit", self.limit)
    }

    /// Fetches the raw search payload for `city` through the mediator
    pub async fn search<T: Transport>(
        &self,
        mediator: &mut FetchMediator<T>,
        city: &str,
    ) -> Result<Value, FetchError> {
        mediator.fetch_with_cache(&self.request(city)).await
    }

    /// Fetches and extracts the businesses located in `city`
    pub async fn businesses_in<T: Transport>(
        &self,
        mediator: &mut FetchMediator<T>,
        city: &str,
    ) -> Result<Vec<BusinessRecord>, FetchError> {
        let payload = self.search(mediator, city).await?;
        Ok(extract_businesses(city, &payload))
    }
}

/// Extracts the businesses whose `location.city` matches `city`
///
/// The comparison ignores case. Entries outside the city are dropped;
/// every other entry produces a record even when fields are missing.
pub fn extract_businesses(city: &str, payload: &Value) -> Vec<BusinessRecord> {
    let Some(entries) = payload.get("businesses").and_then(Value::as_array) else {
        debug!("Search payload has no businesses array");
        return Vec::new();
    };

    let target = city.to_lowercase();
    entries
        .iter()
        .filter(|entry| text_at(entry, &["location", "city"]).to_lowercase() == target)
        .map(business_from_entry)
        .collect()
}

/// Maps one search entry to a record
fn business_from_entry(entry: &Value) -> BusinessRecord {
    BusinessRecord {
        name: text_at(entry, &["name"]),
        city: text_at(entry, &["location", "city"]),
        address: text_at(entry, &["location", "address1"]),
        zip_code: text_at(entry, &["location", "zip_code"]),
        latitude: number_at(entry, &["coordinates", "latitude"]),
        longitude: number_at(entry, &["coordinates", "longitude"]),
        price: text_at(entry, &["price"]),
        image_url: text_at(entry, &["image_url"]),
        rating: number_at(entry, &["rating"]),
        review_count: number_at(entry, &["review_count"])
            .filter(|n| *n >= 0.0)
            .map(|n| n as u32),
    }
}

/// Follows `path` through nested objects
fn value_at<'a>(entry: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(entry, |value, key| value.get(key))
}

/// String at `path`, or an empty string when absent or not text
fn text_at(entry: &Value, path: &[&str]) -> String {
    value_at(entry, path)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Number at `path`, or `None` when absent or not numeric
fn number_at(entry: &Value, path: &[&str]) -> Option<f64> {
    value_at(entry, path).and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mediator::tests::FakeTransport;
    use crate::cache::CacheStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn comet_coffee() -> Value {
        json!({
            "name": "Comet Coffee",
            "image_url": "https://img.example.com/comet.jpg",
            "review_count": 312,
            "rating": 4.5,
            "price": "$",
            "coordinates": {"latitude": 42.2793, "longitude": -83.7409},
            "location": {
                "address1": "16 Nickels Arcade",
                "city": "Ann Arbor",
                "zip_code": "48104"
            }
        })
    }

    #[test]
    fn test_extracts_full_record() {
        let payload = json!({"businesses": [comet_coffee()]});

        let records = extract_businesses("Ann Arbor", &payload);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "Comet Coffee");
        assert_eq!(record.city, "Ann Arbor");
        assert_eq!(record.address, "16 Nickels Arcade");
        assert_eq!(record.zip_code, "48104");
        assert_eq!(record.price, "$");
        assert_eq!(record.image_url, "https://img.example.com/comet.jpg");
        assert_eq!(record.rating, Some(4.5));
        assert_eq!(record.review_count, Some(312));
        assert!((record.latitude.unwrap() - 42.2793).abs() < 0.0001);
        assert!((record.longitude.unwrap() - (-83.7409)).abs() < 0.0001);
    }

    #[test]
    fn test_city_filter_ignores_case() {
        let mut other = comet_coffee();
        other["location"]["city"] = json!("Ypsilanti");
        let payload = json!({"businesses": [comet_coffee(), other]});

        let records = extract_businesses("ann arbor", &payload);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].city, "Ann Arbor");
    }

    #[test]
    fn test_missing_field_becomes_placeholder() {
        let mut entry = comet_coffee();
        entry.as_object_mut().unwrap().remove("price");
        entry.as_object_mut().unwrap().remove("coordinates");
        entry["location"].as_object_mut().unwrap().remove("zip_code");
        let payload = json!({"businesses": [entry]});

        let records = extract_businesses("Ann Arbor", &payload);

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.price, "");
        assert_eq!(record.zip_code, "");
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, None);
        // Untouched fields survive
        assert_eq!(record.name, "Comet Coffee");
        assert_eq!(record.address, "16 Nickels Arcade");
        assert_eq!(record.rating, Some(4.5));
    }

    #[test]
    fn test_mistyped_field_becomes_placeholder() {
        let mut entry = comet_coffee();
        entry["rating"] = json!("great");
        entry["name"] = json!(42);
        let payload = json!({"businesses": [entry]});

        let records = extract_businesses("Ann Arbor", &payload);

        assert_eq!(records[0].rating, None);
        assert_eq!(records[0].name, "");
    }

    #[test]
    fn test_entry_without_location_is_dropped() {
        let payload = json!({"businesses": [{"name": "Nowhere Cafe"}]});
        assert!(extract_businesses("Ann Arbor", &payload).is_empty());
    }

    #[test]
    fn test_payload_without_businesses_is_empty() {
        assert!(extract_businesses("Ann Arbor", &json!({"error": {"code": "LOCATION_NOT_FOUND"}})).is_empty());
        assert!(extract_businesses("Ann Arbor", &json!("not an object")).is_empty());
    }

    #[test]
    fn test_request_parameters() {
        let request = BusinessSearch::default().request("Ann Arbor");

        assert_eq!(request.base, DEFAULT_SEARCH_URL);
        assert_eq!(request.params["location"], "Ann Arbor");
        assert_eq!(request.params["term"], "coffee");
        assert_eq!(request.params["limit"], "50");
    }

    #[test]
    fn test_with_term() {
        let request = BusinessSearch::default().with_term("tea").request("Detroit");
        assert_eq!(request.params["term"], "tea");
    }

    #[tokio::test]
    async fn test_businesses_in_uses_cache() {
        let mut transport = FakeTransport::default();
        transport
            .json
            .insert("Ann Arbor".to_string(), json!({"businesses": [comet_coffee()]}));
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = CacheStore::load(temp_dir.path().join("cache.json"));
        let mut mediator = FetchMediator::new(store, transport.clone());
        let search = BusinessSearch::default();

        let first = search.businesses_in(&mut mediator, "Ann Arbor").await.unwrap();
        let second = search.businesses_in(&mut mediator, "Ann Arbor").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(transport.calls(), 1);
    }
}
