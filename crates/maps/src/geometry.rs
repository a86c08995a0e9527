use crate::LatLng;

pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance between two coordinates.
pub fn haversine_meters(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}

pub fn path_length_meters(path: &[LatLng]) -> f64 {
    path.windows(2)
        .map(|pair| haversine_meters(pair[0], pair[1]))
        .sum()
}

/// Where a point sits relative to a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPosition {
    /// Distance from the point to the closest point on the path.
    pub distance_meters: f64,
    /// Distance travelled along the path up to that closest point.
    pub progress_meters: f64,
}

/// Locate `point` on `path`, or `None` for an empty path.
///
/// Each segment is projected in an equirectangular frame centred on `point`,
/// which is accurate at the scale of pickup thresholds. When several segments
/// are equally close the earliest one wins.
pub fn locate_on_path(point: LatLng, path: &[LatLng]) -> Option<PathPosition> {
    match path {
        [] => None,
        [only] => Some(PathPosition {
            distance_meters: haversine_meters(point, *only),
            progress_meters: 0.0,
        }),
        _ => {
            let mut best: Option<PathPosition> = None;
            let mut travelled = 0.0;

            for pair in path.windows(2) {
                let (start, end) = (pair[0], pair[1]);
                let segment_length = haversine_meters(start, end);
                let (t, distance) = project_onto_segment(point, start, end);
                let candidate = PathPosition {
                    distance_meters: distance,
                    progress_meters: travelled + t * segment_length,
                };

                if best.map_or(true, |current| candidate.distance_meters < current.distance_meters) {
                    best = Some(candidate);
                }
                travelled += segment_length;
            }

            best
        }
    }
}

/// Returns the clamped segment parameter of the closest point and the
/// distance to it.
fn project_onto_segment(point: LatLng, start: LatLng, end: LatLng) -> (f64, f64) {
    let scale_x = point.lat.to_radians().cos() * EARTH_RADIUS_METERS;
    let to_local = |p: LatLng| {
        (
            (p.lng - point.lng).to_radians() * scale_x,
            (p.lat - point.lat).to_radians() * EARTH_RADIUS_METERS,
        )
    };

    let (ax, ay) = to_local(start);
    let (bx, by) = to_local(end);
    let (dx, dy) = (bx - ax, by - ay);
    let length_squared = dx * dx + dy * dy;

    let t = if length_squared == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / length_squared).clamp(0.0, 1.0)
    };

    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (t, (cx * cx + cy * cy).sqrt())
}
