//! Encoded polyline algorithm format at five decimal places of precision.

use crate::{LatLng, MapsError};

const PRECISION: f64 = 1e5;
const MAX_LAT_E5: i64 = 90 * 100_000;
const MAX_LNG_E5: i64 = 180 * 100_000;

pub fn decode(encoded: &str) -> Result<Vec<LatLng>, MapsError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat = 0i64;
    let mut lng = 0i64;

    while index < bytes.len() {
        lat = accumulate(lat, next_value(bytes, &mut index)?, MAX_LAT_E5, "latitude")?;
        if index >= bytes.len() {
            return Err(MapsError::InvalidPolyline(format!(
                "truncated after latitude at byte {index}"
            )));
        }
        lng = accumulate(lng, next_value(bytes, &mut index)?, MAX_LNG_E5, "longitude")?;

        points.push(LatLng::new(lat as f64 / PRECISION, lng as f64 / PRECISION));
    }

    Ok(points)
}

fn accumulate(total: i64, delta: i64, limit: i64, axis: &str) -> Result<i64, MapsError> {
    total
        .checked_add(delta)
        .filter(|value| (-limit..=limit).contains(value))
        .ok_or_else(|| MapsError::InvalidPolyline(format!("{axis} out of range")))
}

fn next_value(bytes: &[u8], index: &mut usize) -> Result<i64, MapsError> {
    let mut result = 0i64;
    let mut shift = 0u32;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(MapsError::InvalidPolyline(format!(
                "unterminated value at byte {index}"
            )));
        };
        *index += 1;

        if !(63..=126).contains(&byte) {
            return Err(MapsError::InvalidPolyline(format!(
                "unexpected character {:?} at byte {}",
                byte as char,
                *index - 1
            )));
        }
        if shift > 60 {
            return Err(MapsError::InvalidPolyline("value overflows 64 bits".into()));
        }

        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

pub fn encode(points: &[LatLng]) -> String {
    let mut encoded = String::with_capacity(points.len() * 8);
    let mut previous_lat = 0i64;
    let mut previous_lng = 0i64;

    for point in points {
        let lat = (point.lat * PRECISION).round() as i64;
        let lng = (point.lng * PRECISION).round() as i64;

        push_value(&mut encoded, lat - previous_lat);
        push_value(&mut encoded, lng - previous_lng);

        previous_lat = lat;
        previous_lng = lng;
    }

    encoded
}

fn push_value(out: &mut String, delta: i64) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };

    while value >= 0x20 {
        out.push(char::from((0x20 | (value & 0x1f)) as u8 + 63));
        value >>= 5;
    }
    out.push(char::from(value as u8 + 63));
}
