use serde::Serialize;

use crate::geometry::locate_on_path;
use crate::LatLng;

#[derive(Debug, Clone, Copy)]
pub struct MatchCriteria {
    pub max_pickup_distance_meters: f64,
    pub max_dropoff_distance_meters: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteMatch {
    pub pickup_distance_meters: f64,
    pub dropoff_distance_meters: f64,
    pub pickup_progress_meters: f64,
    pub dropoff_progress_meters: f64,
    /// Sum of pickup and dropoff distances; lower is better.
    pub score: f64,
}

/// Check whether a rider travelling `origin` → `destination` fits along `path`.
///
/// The pickup must come strictly before the dropoff along the path, so a
/// driver heading the opposite way never matches. A single-point path has no
/// direction and therefore never matches either.
pub fn match_route(
    origin: LatLng,
    destination: LatLng,
    path: &[LatLng],
    criteria: &MatchCriteria,
) -> Option<RouteMatch> {
    let pickup = locate_on_path(origin, path)?;
    if pickup.distance_meters > criteria.max_pickup_distance_meters {
        return None;
    }

    let dropoff = locate_on_path(destination, path)?;
    if dropoff.distance_meters > criteria.max_dropoff_distance_meters {
        return None;
    }

    if pickup.progress_meters >= dropoff.progress_meters {
        return None;
    }

    Some(RouteMatch {
        pickup_distance_meters: pickup.distance_meters,
        dropoff_distance_meters: dropoff.distance_meters,
        pickup_progress_meters: pickup.progress_meters,
        dropoff_progress_meters: dropoff.progress_meters,
        score: pickup.distance_meters + dropoff.distance_meters,
    })
}
