//! Chart specifications built from stored businesses
//!
//! Each builder turns query results into a serializable description of one
//! figure (series, labels, layout hints). Rendering is left to whatever
//! front end reads the JSON written by [`write_chart`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::stats::{price_breakdown, PriceSlice};
use crate::storage::StoredBusiness;

/// Zoom level for city maps
const MAP_ZOOM: u8 = 10;

/// Rating axis sample count for the density curve
const DENSITY_SAMPLES: usize = 101;

/// Bandwidth used when the ratings have no spread
const FALLBACK_BANDWIDTH: f64 = 0.2;

/// Highest possible rating
const MAX_RATING: f64 = 5.0;

/// Errors that can occur when writing a chart file
#[derive(Debug, Error)]
pub enum ChartError {
    /// The output directory or file could not be written
    #[error("Failed to write chart {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The chart could not be serialized
    #[error("Failed to serialize chart: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// One business pin on the map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub position: GeoPoint,
    pub label: String,
    /// Drives the marker color scale
    pub rating: Option<f64>,
}

/// Map of the businesses in one city
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessMap {
    pub title: String,
    /// Mean of the marker positions
    pub center: Option<GeoPoint>,
    pub zoom: u8,
    /// Token for the map tile provider, if configured
    pub access_token: Option<String>,
    pub markers: Vec<MapMarker>,
}

/// A point on the rating density curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityPoint {
    pub rating: f64,
    pub density: f64,
}

/// Kernel density estimate of ratings in one city
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingDensity {
    pub title: String,
    pub bandwidth: f64,
    pub samples: usize,
    pub points: Vec<DensityPoint>,
}

/// One business in the rating/review scatter plot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub rating: f64,
    pub reviews: u32,
    pub label: String,
}

/// Review count against rating for one city
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewScatter {
    pub title: String,
    pub points: Vec<ScatterPoint>,
}

/// Price tier shares among businesses with one rating
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePie {
    pub title: String,
    pub rating: f64,
    pub slices: Vec<PriceSlice>,
}

#[derive(Serialize)]
struct ChartFile<'a, C: Serialize> {
    generated_at: DateTime<Utc>,
    chart: &'a C,
}

/// Hover text shared by every chart
fn hover_label(business: &StoredBusiness) -> String {
    let rating = business.rating.map(|r| r.to_string()).unwrap_or_default();
    format!(
        "{} ({}): {}, rating: {}",
        business.name, business.city, business.address, rating
    )
}

/// Builds the map of businesses with known coordinates
pub fn business_map(
    city: &str,
    businesses: &[StoredBusiness],
    access_token: Option<&str>,
) -> BusinessMap {
    let markers: Vec<MapMarker> = businesses
        .iter()
        .filter_map(|b| {
            let (latitude, longitude) = (b.latitude?, b.longitude?);
            Some(MapMarker {
                position: GeoPoint { latitude, longitude },
                label: hover_label(b),
                rating: b.rating,
            })
        })
        .collect();

    let center = if markers.is_empty() {
        None
    } else {
        let n = markers.len() as f64;
        Some(GeoPoint {
            latitude: markers.iter().map(|m| m.position.latitude).sum::<f64>() / n,
            longitude: markers.iter().map(|m| m.position.longitude).sum::<f64>() / n,
        })
    };

    BusinessMap {
        title: format!("Cafes in {}", city),
        center,
        zoom: MAP_ZOOM,
        access_token: access_token.map(str::to_string),
        markers,
    }
}

/// Gaussian kernel density of the ratings over [0, 5]
///
/// Uses Silverman's rule for the bandwidth. Returns `None` when no business
/// is rated.
pub fn rating_density(city: &str, businesses: &[StoredBusiness]) -> Option<RatingDensity> {
    let ratings: Vec<f64> = businesses.iter().filter_map(|b| b.rating).collect();
    if ratings.is_empty() {
        return None;
    }

    let bandwidth = silverman_bandwidth(&ratings);
    let n = ratings.len() as f64;
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    let step = MAX_RATING / (DENSITY_SAMPLES - 1) as f64;

    let points = (0..DENSITY_SAMPLES)
        .map(|i| {
            let x = i as f64 * step;
            let density = ratings
                .iter()
                .map(|r| {
                    let u = (x - r) / bandwidth;
                    (-0.5 * u * u).exp()
                })
                .sum::<f64>()
                * norm;
            DensityPoint { rating: x, density }
        })
        .collect();

    Some(RatingDensity {
        title: format!("Rating distribution in {}", city),
        bandwidth,
        samples: ratings.len(),
        points,
    })
}

fn silverman_bandwidth(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 2 {
        return FALLBACK_BANDWIDTH;
    }
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sd = variance.sqrt();
    if sd <= f64::EPSILON {
        FALLBACK_BANDWIDTH
    } else {
        1.06 * sd * n.powf(-0.2)
    }
}

/// Rating against review count for businesses that have both
pub fn review_scatter(city: &str, businesses: &[StoredBusiness]) -> ReviewScatter {
    let points = businesses
        .iter()
        .filter_map(|b| {
            Some(ScatterPoint {
                rating: b.rating?,
                reviews: b.review_count?,
                label: hover_label(b),
            })
        })
        .collect();

    ReviewScatter {
        title: format!("Review number and rating in {}", city),
        points,
    }
}

/// Price tier pie for businesses already filtered to `rating`
///
/// Returns `None` when `businesses` is empty.
pub fn price_pie(city: &str, rating: f64, businesses: &[StoredBusiness]) -> Option<PricePie> {
    if businesses.is_empty() {
        return None;
    }
    Some(PricePie {
        title: format!("Price levels of {} rated cafes in {}", rating, city),
        rating,
        slices: price_breakdown(businesses),
    })
}

/// Writes `chart` to `<dir>/<name>.json` with a generation timestamp
///
/// # Returns
/// * `Ok(PathBuf)` - Path of the written file
/// * `Err(ChartError)` - If the directory or file could not be written
pub fn write_chart<C: Serialize>(dir: &Path, name: &str, chart: &C) -> Result<PathBuf, ChartError> {
    fs::create_dir_all(dir).map_err(|source| ChartError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let file = ChartFile {
        generated_at: Utc::now(),
        chart,
    };
    let json = serde_json::to_string_pretty(&file)?;

    let path = dir.join(format!("{}.json", name));
    fs::write(&path, json).map_err(|source| ChartError::Io {
        path: path.clone(),
        source,
    })?;

    info!(path = %path.display(), "Wrote chart");
    Ok(path)
}

/// File-name friendly form of a city name
pub fn chart_slug(city: &str) -> String {
    city.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}
