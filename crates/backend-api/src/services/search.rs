use std::collections::HashMap;

use carpool_config::MatchingConfig;
use carpool_maps::{match_route, LatLng, MatchCriteria};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::error::ServiceError;
use super::ride::{ride_path, RideRow, SegmentRow, RIDE_SELECT, SEGMENT_COLUMNS};
use crate::routes::models::{RideMatch, SearchRidesQuery};
use crate::util::{format_departure, parse_departure};

const CANDIDATE_FILTER: &str = r#"
WHERE r.status = 'active'
  AND r.departure_time > ?
  AND r.available_seats >= ?
  AND r.driver_id <> ?
  AND (? IS NULL OR r.departure_time >= ?)
  AND (? IS NULL OR r.departure_time <= ?)
"#;

/// Find active rides whose route passes near both the rider's origin and
/// destination, in that order.
pub async fn search_rides(
    pool: &SqlitePool,
    matching: &MatchingConfig,
    caller_id: i64,
    query: SearchRidesQuery,
) -> Result<Vec<RideMatch>, ServiceError> {
    let origin = LatLng::new(query.origin_lat, query.origin_lng);
    let destination = LatLng::new(query.destination_lat, query.destination_lng);
    if !origin.is_valid() || !destination.is_valid() {
        return Err(ServiceError::bad_request("search coordinates are out of range"));
    }

    let seats = query.seats.unwrap_or(1);
    if seats < 1 {
        return Err(ServiceError::bad_request("seats must be at least 1"));
    }

    let criteria = MatchCriteria {
        max_pickup_distance_meters: threshold(
            query.max_pickup_distance_meters,
            matching.max_pickup_distance_meters,
            "max_pickup_distance_meters",
        )?,
        max_dropoff_distance_meters: threshold(
            query.max_dropoff_distance_meters,
            matching.max_dropoff_distance_meters,
            "max_dropoff_distance_meters",
        )?,
    };

    let after = query
        .departure_after
        .as_deref()
        .map(|value| parse_departure(value, "departure_after").map(format_departure))
        .transpose()
        .map_err(ServiceError::BadRequest)?;
    let before = query
        .departure_before
        .as_deref()
        .map(|value| parse_departure(value, "departure_before").map(format_departure))
        .transpose()
        .map_err(ServiceError::BadRequest)?;
    let now = format_departure(Utc::now());

    let candidates = sqlx::query_as::<_, RideRow>(&format!(
        "{RIDE_SELECT} {CANDIDATE_FILTER} ORDER BY r.departure_time ASC, r.id ASC"
    ))
    .bind(&now)
    .bind(seats)
    .bind(caller_id)
    .bind(&after)
    .bind(&after)
    .bind(&before)
    .bind(&before)
    .fetch_all(pool)
    .await?;

    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let segment_rows = sqlx::query_as::<_, SegmentRow>(&format!(
        r#"
        SELECT {SEGMENT_COLUMNS} FROM route_segments
        WHERE ride_id IN (SELECT r.id FROM rides r {CANDIDATE_FILTER})
        ORDER BY ride_id, sequence
        "#
    ))
    .bind(&now)
    .bind(seats)
    .bind(caller_id)
    .bind(&after)
    .bind(&after)
    .bind(&before)
    .bind(&before)
    .fetch_all(pool)
    .await?;

    let mut segments: HashMap<i64, Vec<SegmentRow>> = HashMap::new();
    for row in segment_rows {
        segments.entry(row.ride_id).or_default().push(row);
    }

    let considered = candidates.len();
    let mut results: Vec<RideMatch> = candidates
        .into_iter()
        .filter_map(|ride| {
            let path = ride_path(&ride, segments.get(&ride.id).map_or(&[][..], Vec::as_slice));
            let found = match_route(origin, destination, &path, &criteria)?;
            Some(RideMatch {
                ride: ride.into_ride(),
                pickup_distance_meters: found.pickup_distance_meters,
                dropoff_distance_meters: found.dropoff_distance_meters,
                pickup_progress_meters: found.pickup_progress_meters,
                dropoff_progress_meters: found.dropoff_progress_meters,
                score: found.score,
            })
        })
        .collect();

    results.sort_by(|a, b| a.score.total_cmp(&b.score));
    results.truncate(matching.max_results as usize);

    debug!(considered, matched = results.len(), "ride search finished");
    Ok(results)
}

/// A caller may tighten the configured thresholds but never widen them.
fn threshold(requested: Option<f64>, configured: f64, field: &str) -> Result<f64, ServiceError> {
    match requested {
        None => Ok(configured),
        Some(value) if value.is_finite() && value > 0.0 => Ok(value.min(configured)),
        Some(_) => Err(ServiceError::bad_request(format!(
            "{field} must be a positive number"
        ))),
    }
}
