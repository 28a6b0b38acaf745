//! Spherical-earth geometry for GPS tracks.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`distance`] | Great-circle distance between two points |
//! | [`cross_track_distance`] | Distance from a point to a segment |
//! | [`bearing_delta`] | Signed turn between two headings |
//!
//! All points are `geo::Point<f64>` with x = longitude and y = latitude in
//! WGS84 decimal degrees. None of these functions fail: degenerate input
//! (identical points, missing headings) yields zero or the endpoint distance.

use std::f64::consts::FRAC_PI_2;

use geo::{Distance, Haversine, Point};

/// Great-circle distance in meters, using the haversine formula on a sphere
/// with the mean earth radius.
#[inline]
pub fn distance(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine::distance(a, b)
}

/// Distance in meters from `point` to the segment `start`→`end`.
///
/// Works on the triangle formed by the three haversine legs. If the foot of
/// the perpendicular lies beyond either endpoint, the distance to that
/// endpoint is returned instead. A zero-length segment degrades to
/// `distance(point, start)`.
pub fn cross_track_distance(point: Point<f64>, start: Point<f64>, end: Point<f64>) -> f64 {
    let to_start = distance(point, start);
    let to_end = distance(point, end);
    let segment = distance(start, end);

    if segment == 0.0 {
        return to_start;
    }
    if to_start == 0.0 || to_end == 0.0 {
        return 0.0;
    }

    let alpha = angle_opposite(to_end, to_start, segment);
    if alpha > FRAC_PI_2 {
        return to_start;
    }
    let beta = angle_opposite(to_start, to_end, segment);
    if beta > FRAC_PI_2 {
        return to_end;
    }

    alpha.sin() * to_start
}

/// Angle opposite `opposite`, between sides `adjacent` and `base` (law of cosines)
fn angle_opposite(opposite: f64, adjacent: f64, base: f64) -> f64 {
    let cos = (adjacent * adjacent + base * base - opposite * opposite) / (2.0 * adjacent * base);
    cos.clamp(-1.0, 1.0).acos()
}

/// Signed turn in degrees from heading `from` to heading `to`, in (-180, 180].
///
/// Headings wrap, so 359° → 1° is a turn of +2°. Returns 0 when either
/// heading is unknown.
pub fn bearing_delta(from: Option<f64>, to: Option<f64>) -> f64 {
    let (Some(from), Some(to)) = (from, to) else {
        return 0.0;
    };

    let delta = (to - from) % 360.0;
    if delta > 180.0 {
        delta - 360.0
    } else if delta <= -180.0 {
        delta + 360.0
    } else {
        delta
    }
}
