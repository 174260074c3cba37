//! Coordinate projection module.
//!
//! Converts between geographic coordinates (latitude/longitude) and global
//! pixel coordinates in the spherical Web Mercator projection used by
//! static-map tile providers. The world at zoom `z` is a square of
//! `256 * 2^z` pixels on each side.

use std::f64::consts::PI;

/// Base tile size of the Web Mercator pixel grid at zoom 0.
pub const WORLD_TILE_PX: f64 = 256.0;

/// Maximum latitude representable in Web Mercator (degrees).
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum latitude representable in Web Mercator (degrees).
pub const MIN_LAT: f64 = -85.05112878;

/// Meters covered by one degree of latitude (spherical approximation).
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// A point in the global Web Mercator pixel space at a given zoom level.
///
/// Coordinates are fractional: `x` grows eastward from the antimeridian,
/// `y` grows southward from the north clamp latitude.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCoord {
    pub x: f64,
    pub y: f64,
}

/// Width (and height) of the world in pixels at the given zoom level.
#[inline]
pub fn world_pixels(zoom: u8) -> f64 {
    WORLD_TILE_PX * 2.0_f64.powi(zoom as i32)
}

/// Projects geographic coordinates to global pixel coordinates.
///
/// `sin(lat)` is clamped to `[-0.9999, 0.9999]` before the log transform,
/// so latitudes at or beyond the poles never produce infinities; out-of-range
/// input is absorbed rather than rejected.
///
/// # Example
///
/// ```
/// use geomosaic::coord::project;
///
/// let px = project(0.0, 0.0, 0);
/// assert!((px.x - 128.0).abs() < 1e-9);
/// assert!((px.y - 128.0).abs() < 1e-9);
/// ```
#[inline]
pub fn project(lat: f64, lon: f64, zoom: u8) -> PixelCoord {
    let world_px = world_pixels(zoom);
    let x = (lon + 180.0) / 360.0 * world_px;
    let siny = lat.to_radians().sin().clamp(-0.9999, 0.9999);
    let y = (0.5 - ((1.0 + siny) / (1.0 - siny)).ln() / (4.0 * PI)) * world_px;
    PixelCoord { x, y }
}

/// Inverse of [`project`]: maps global pixel coordinates back to lat/lon.
#[inline]
pub fn unproject(px: PixelCoord, zoom: u8) -> (f64, f64) {
    let world_px = world_pixels(zoom);
    let lon = px.x / world_px * 360.0 - 180.0;
    let n = PI - 2.0 * PI * px.y / world_px;
    let lat = n.sinh().atan().to_degrees();
    (lat, lon)
}

/// Ground resolution in meters per pixel at the given latitude and zoom.
///
/// Uses the standard Web Mercator equatorial constant scaled by the cosine
/// of the latitude.
#[inline]
pub fn meters_per_pixel(lat: f64, zoom: u8) -> f64 {
    156_543.033_92 * lat.to_radians().cos() / 2.0_f64.powi(zoom as i32)
}

/// Converts a metric distance to degrees of latitude or longitude at `lat`.
#[inline]
pub fn meters_to_degrees(meters: f64, lat: f64, longitudinal: bool) -> f64 {
    if longitudinal {
        meters / (METERS_PER_DEGREE * lat.to_radians().cos())
    } else {
        meters / METERS_PER_DEGREE
    }
}

/// Derives a bounding box from a center point and per-direction extents
/// in meters.
///
/// Returns `(lat_min, lat_max, lon_min, lon_max)`.
pub fn bounds_from_center(
    center_lat: f64,
    center_lon: f64,
    left_m: f64,
    right_m: f64,
    up_m: f64,
    down_m: f64,
) -> (f64, f64, f64, f64) {
    let lat_up = meters_to_degrees(up_m, center_lat, false);
    let lat_down = meters_to_degrees(down_m, center_lat, false);
    let lon_left = meters_to_degrees(left_m, center_lat, true);
    let lon_right = meters_to_degrees(right_m, center_lat, true);

    (
        center_lat - lat_down,
        center_lat + lat_up,
        center_lon - lon_left,
        center_lon + lon_right,
    )
}
