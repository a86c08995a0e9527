//! Maps provider integration and route geometry.
//!
//! [`MapsClient`] talks to the places, geocoding and routes endpoints of the
//! configured provider. The [`polyline`], [`geometry`] and [`matching`]
//! modules work purely on decoded coordinates and never touch the network.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod client;
pub mod geometry;
pub mod matching;
pub mod polyline;

pub use client::{ComputedRoute, GeocodeResult, MapsClient, PlaceSuggestion, RouteLeg};
pub use geometry::{haversine_meters, locate_on_path, path_length_meters, PathPosition};
pub use matching::{match_route, MatchCriteria, RouteMatch};

#[derive(Debug, Error)]
pub enum MapsError {
    #[error("maps api key is not configured")]
    MissingApiKey,
    #[error("{0}")]
    InvalidInput(String),
    #[error("maps request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid maps response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("maps provider error ({status}): {message}")]
    Provider { status: String, message: String },
    #[error("no route found between the requested stops")]
    NoRoute,
    #[error("invalid polyline: {0}")]
    InvalidPolyline(String),
}

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}
