use std::time::Duration;

use carpool_config::MapsConfig;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::{LatLng, MapsError};

const API_KEY_HEADER: &str = "X-Goog-Api-Key";
const FIELD_MASK_HEADER: &str = "X-Goog-FieldMask";
const ROUTE_FIELD_MASK: &str = "routes.distanceMeters,routes.duration,routes.polyline.encodedPolyline,\
routes.legs.distanceMeters,routes.legs.duration,routes.legs.polyline.encodedPolyline,\
routes.legs.startLocation,routes.legs.endLocation";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceSuggestion {
    pub place_id: String,
    pub description: String,
    pub main_text: Option<String>,
    pub secondary_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeResult {
    pub formatted_address: String,
    pub place_id: Option<String>,
    pub location: LatLng,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteLeg {
    pub start: LatLng,
    pub end: LatLng,
    pub polyline: String,
    pub distance_meters: i64,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedRoute {
    pub polyline: String,
    pub distance_meters: i64,
    pub duration_seconds: i64,
    pub legs: Vec<RouteLeg>,
}

#[derive(Clone)]
pub struct MapsClient {
    http: Client,
    api_key: String,
    places_base_url: String,
    geocode_base_url: String,
    routes_base_url: String,
    language: String,
    region: Option<String>,
}

impl std::fmt::Debug for MapsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapsClient")
            .field("places_base_url", &self.places_base_url)
            .field("geocode_base_url", &self.geocode_base_url)
            .field("routes_base_url", &self.routes_base_url)
            .finish_non_exhaustive()
    }
}

impl MapsClient {
    /// Build a client when the configuration carries an API key.
    pub fn from_config(config: &MapsConfig) -> Result<Option<Self>, MapsError> {
        if !config.is_configured() {
            return Ok(None);
        }
        Self::new(config).map(Some)
    }

    pub fn new(config: &MapsConfig) -> Result<Self, MapsError> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(MapsError::MissingApiKey)?
            .to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds.max(1)))
            .user_agent("carpool-backend")
            .build()?;

        Ok(Self {
            http,
            api_key,
            places_base_url: trim_base(&config.places_base_url),
            geocode_base_url: trim_base(&config.geocode_base_url),
            routes_base_url: trim_base(&config.routes_base_url),
            language: config.language.clone(),
            region: config.region.clone(),
        })
    }

    pub async fn autocomplete(
        &self,
        input: &str,
        session_token: Option<&str>,
    ) -> Result<Vec<PlaceSuggestion>, MapsError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(MapsError::InvalidInput("input must not be empty".into()));
        }

        let mut body = json!({
            "input": input,
            "languageCode": self.language,
        });
        if let Some(token) = session_token.filter(|token| !token.is_empty()) {
            body["sessionToken"] = json!(token);
        }
        if let Some(region) = &self.region {
            body["includedRegionCodes"] = json!([region]);
        }

        let url = format!("{}/v1/places:autocomplete", self.places_base_url);
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        let parsed: AutocompleteResponse = read_json(response).await?;
        let suggestions: Vec<PlaceSuggestion> = parsed
            .suggestions
            .into_iter()
            .filter_map(|suggestion| suggestion.place_prediction)
            .map(|prediction| {
                let (main_text, secondary_text) = match prediction.structured_format {
                    Some(format) => (
                        format.main_text.map(|t| t.text),
                        format.secondary_text.map(|t| t.text),
                    ),
                    None => (None, None),
                };
                PlaceSuggestion {
                    place_id: prediction.place_id,
                    description: prediction.text.map(|t| t.text).unwrap_or_default(),
                    main_text,
                    secondary_text,
                }
            })
            .collect();

        debug!(count = suggestions.len(), "autocomplete suggestions fetched");
        Ok(suggestions)
    }

    pub async fn geocode(&self, address: &str) -> Result<Vec<GeocodeResult>, MapsError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(MapsError::InvalidInput("address must not be empty".into()));
        }

        let url = format!("{}/maps/api/geocode/json", self.geocode_base_url);
        let mut query = vec![
            ("address", address.to_string()),
            ("key", self.api_key.clone()),
            ("language", self.language.clone()),
        ];
        if let Some(region) = &self.region {
            query.push(("region", region.clone()));
        }

        let response = self.http.get(url).query(&query).send().await?;
        let parsed: GeocodeResponse = read_json(response).await?;

        match parsed.status.as_str() {
            "OK" => {}
            "ZERO_RESULTS" => return Ok(Vec::new()),
            other => {
                warn!(status = other, "geocoding request rejected");
                return Err(MapsError::Provider {
                    status: other.to_string(),
                    message: parsed
                        .error_message
                        .unwrap_or_else(|| format!("geocoding failed with status {other}")),
                });
            }
        }

        Ok(parsed
            .results
            .into_iter()
            .map(|result| GeocodeResult {
                formatted_address: result.formatted_address,
                place_id: result.place_id,
                location: LatLng::new(result.geometry.location.lat, result.geometry.location.lng),
            })
            .collect())
    }

    /// Compute a driving route through `waypoints` in order.
    ///
    /// The returned route carries one leg per consecutive pair of stops.
    pub async fn compute_route(
        &self,
        origin: LatLng,
        destination: LatLng,
        waypoints: &[LatLng],
    ) -> Result<ComputedRoute, MapsError> {
        for stop in std::iter::once(&origin)
            .chain(waypoints)
            .chain(std::iter::once(&destination))
        {
            if !stop.is_valid() {
                return Err(MapsError::InvalidInput(format!(
                    "invalid coordinate ({}, {})",
                    stop.lat, stop.lng
                )));
            }
        }

        let body = json!({
            "origin": waypoint_json(origin),
            "destination": waypoint_json(destination),
            "intermediates": waypoints.iter().copied().map(waypoint_json).collect::<Vec<_>>(),
            "travelMode": "DRIVE",
            "polylineEncoding": "ENCODED_POLYLINE",
            "languageCode": self.language,
        });

        let url = format!("{}/directions/v2:computeRoutes", self.routes_base_url);
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .header(FIELD_MASK_HEADER, ROUTE_FIELD_MASK)
            .json(&body)
            .send()
            .await?;

        let parsed: RoutesResponse = read_json(response).await?;
        let route = parsed.routes.into_iter().next().ok_or(MapsError::NoRoute)?;

        let stops: Vec<LatLng> = std::iter::once(origin)
            .chain(waypoints.iter().copied())
            .chain(std::iter::once(destination))
            .collect();

        let legs = route
            .legs
            .into_iter()
            .enumerate()
            .map(|(index, leg)| RouteLeg {
                start: leg
                    .start_location
                    .map(Into::into)
                    .unwrap_or(stops[index.min(stops.len() - 1)]),
                end: leg
                    .end_location
                    .map(Into::into)
                    .unwrap_or(stops[(index + 1).min(stops.len() - 1)]),
                polyline: leg.polyline.map(|p| p.encoded_polyline).unwrap_or_default(),
                distance_meters: leg.distance_meters.unwrap_or(0),
                duration_seconds: parse_duration(leg.duration.as_deref()),
            })
            .collect();

        Ok(ComputedRoute {
            polyline: route
                .polyline
                .map(|p| p.encoded_polyline)
                .unwrap_or_default(),
            distance_meters: route.distance_meters.unwrap_or(0),
            duration_seconds: parse_duration(route.duration.as_deref()),
            legs,
        })
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

fn waypoint_json(point: LatLng) -> serde_json::Value {
    json!({
        "location": {
            "latLng": { "latitude": point.lat, "longitude": point.lng }
        }
    })
}

/// Durations arrive as protobuf JSON strings such as `"1234s"` or `"12.5s"`.
fn parse_duration(value: Option<&str>) -> i64 {
    value
        .and_then(|raw| raw.trim().strip_suffix('s'))
        .and_then(|seconds| seconds.parse::<f64>().ok())
        .map(|seconds| seconds.round() as i64)
        .unwrap_or(0)
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, MapsError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ProviderErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| body.trim().to_string());
        warn!(status = %status, %message, "maps provider returned an error");
        return Err(MapsError::Provider {
            status: status.as_u16().to_string(),
            message,
        });
    }

    Ok(serde_json::from_str(&body)?)
}

#[derive(Deserialize)]
struct ProviderErrorEnvelope {
    error: ProviderErrorBody,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    suggestions: Vec<AutocompleteSuggestion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutocompleteSuggestion {
    place_prediction: Option<PlacePrediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacePrediction {
    place_id: String,
    text: Option<FormattedText>,
    structured_format: Option<StructuredFormat>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StructuredFormat {
    main_text: Option<FormattedText>,
    secondary_text: Option<FormattedText>,
}

#[derive(Deserialize)]
struct FormattedText {
    text: String,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeEntry>,
    error_message: Option<String>,
}

#[derive(Deserialize)]
struct GeocodeEntry {
    formatted_address: String,
    place_id: Option<String>,
    geometry: GeocodeGeometry,
}

#[derive(Deserialize)]
struct GeocodeGeometry {
    location: LatLng,
}

#[derive(Deserialize)]
struct RoutesResponse {
    #[serde(default)]
    routes: Vec<RouteEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteEntry {
    distance_meters: Option<i64>,
    duration: Option<String>,
    polyline: Option<EncodedPolyline>,
    #[serde(default)]
    legs: Vec<LegEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegEntry {
    distance_meters: Option<i64>,
    duration: Option<String>,
    polyline: Option<EncodedPolyline>,
    start_location: Option<RouteLocation>,
    end_location: Option<RouteLocation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedPolyline {
    encoded_polyline: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteLocation {
    lat_lng: RouteLatLng,
}

#[derive(Deserialize)]
struct RouteLatLng {
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
}

impl From<RouteLocation> for LatLng {
    fn from(location: RouteLocation) -> Self {
        LatLng::new(location.lat_lng.latitude, location.lat_lng.longitude)
    }
}
