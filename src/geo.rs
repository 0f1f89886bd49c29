//! Rectangular approximation of radius searches.
//!
//! A "near point" query is answered with an axis-aligned lat/lon rectangle
//! around the point. Points in the corners of the rectangle may be farther
//! away than the requested radius; they are still matched.
//!
//! Longitudes are kept in [-180, 180]. A box reaching over the antimeridian
//! wraps around and then has `min_lon > max_lon`. Close to the poles the box
//! covers every longitude.

use crate::error::AppError;
use std::f64::consts::PI;

/// Equatorial earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6378137.0;

/// Largest longitude offset from the center, covering the whole globe.
const MAX_LON_DELTA: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Builds a box from any two opposite corners.
    pub fn from_corners(lat0: f64, lon0: f64, lat1: f64, lon1: f64) -> Self {
        Self {
            min_lat: lat0.min(lat1),
            max_lat: lat0.max(lat1),
            min_lon: lon0.min(lon1),
            max_lon: lon0.max(lon1),
        }
    }

    pub fn north_west(&self) -> (f64, f64) {
        (self.max_lat, self.min_lon)
    }

    pub fn south_east(&self) -> (f64, f64) {
        (self.min_lat, self.max_lon)
    }

    pub fn center(&self) -> (f64, f64) {
        let lon = if self.crosses_antimeridian() {
            wrap_longitude((self.min_lon + self.max_lon + 360.0) / 2.0)
        } else {
            (self.min_lon + self.max_lon) / 2.0
        };
        ((self.min_lat + self.max_lat) / 2.0, lon)
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    /// Inclusive on all four edges.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.min_lat || lat > self.max_lat {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.min_lon || lon <= self.max_lon
        } else {
            lon >= self.min_lon && lon <= self.max_lon
        }
    }
}

/// Approximate the area within `radius_m` meters of (`lat`, `lon`).
///
/// The longitude offset is widened by `1 / cos(lat)` to account for
/// converging meridians. Once the offset reaches 180 degrees, which happens
/// close to the poles, the box spans the full longitude range.
pub fn approximate(lat: f64, lon: f64, radius_m: f64) -> Result<BoundingBox, AppError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(AppError::Validation(format!(
            "invalid point ({lat}, {lon})"
        )));
    }
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(AppError::Validation(format!(
            "radius must be a non-negative number of meters, got {radius_m}"
        )));
    }

    let lat_delta = (180.0 / PI) * (radius_m / EARTH_RADIUS_M);
    let cos_lat = (lat * PI / 180.0).cos();
    let lon_delta = if cos_lat.abs() <= f64::EPSILON {
        MAX_LON_DELTA
    } else {
        (lat_delta / cos_lat.abs()).min(MAX_LON_DELTA)
    };

    let (min_lon, max_lon) = if lon_delta >= MAX_LON_DELTA {
        (-MAX_LON_DELTA, MAX_LON_DELTA)
    } else {
        (wrap_longitude(lon - lon_delta), wrap_longitude(lon + lon_delta))
    };

    Ok(BoundingBox {
        min_lat: lat - lat_delta,
        max_lat: lat + lat_delta,
        min_lon,
        max_lon,
    })
}

fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn test_rectangle_is_centered_on_point() {
        for (lat, lon, r) in [(64.278, 17.182, 1000.0), (-33.9, 151.2, 25_000.0), (0.0, 0.0, 5.0)] {
            let bb = approximate(lat, lon, r).unwrap();
            let (clat, clon) = bb.center();
            assert!((clat - lat).abs() < TOLERANCE);
            assert!((clon - lon).abs() < TOLERANCE);
        }
    }

    #[test]
    fn test_span_grows_with_radius() {
        let mut last = approximate(62.39, 17.30, 0.0).unwrap();
        for r in [10.0, 100.0, 1_000.0, 10_000.0, 100_000.0] {
            let bb = approximate(62.39, 17.30, r).unwrap();
            assert!(bb.max_lat - bb.min_lat > last.max_lat - last.min_lat);
            assert!(bb.max_lon - bb.min_lon > last.max_lon - last.min_lon);
            last = bb;
        }
    }

    #[test]
    fn test_latitude_delta_at_equator() {
        // one degree of latitude is roughly 111.3 km on this sphere
        let bb = approximate(0.0, 0.0, 111_319.49).unwrap();
        assert!((bb.max_lat - 1.0).abs() < 1e-4);
        assert!((bb.max_lon - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_longitude_delta_is_wider_at_high_latitude() {
        let bb = approximate(60.0, 10.0, 10_000.0).unwrap();
        let lat_span = bb.max_lat - bb.min_lat;
        let lon_span = bb.max_lon - bb.min_lon;
        // cos(60°) = 0.5
        assert!((lon_span - 2.0 * lat_span).abs() < 1e-9);
    }

    #[test]
    fn test_zero_radius_collapses_to_point() {
        let bb = approximate(64.278, 17.182, 0.0).unwrap();
        assert_eq!(bb.min_lat, bb.max_lat);
        assert_eq!(bb.min_lon, bb.max_lon);
        assert!(bb.contains(64.278, 17.182));
        assert!(!bb.contains(64.2781, 17.182));
    }

    #[test]
    fn test_pole_covers_every_longitude() {
        for lat in [90.0, -90.0, 89.999_999_9] {
            let bb = approximate(lat, 17.0, 1000.0).unwrap();
            assert_eq!((bb.min_lon, bb.max_lon), (-180.0, 180.0));
        }

        let bb = approximate(90.0, 17.0, 1000.0).unwrap();
        assert!(bb.contains(89.99999, -170.0));
        assert!(bb.contains(89.99999, 180.0));
        assert!(!bb.contains(89.9, -170.0));
    }

    #[test]
    fn test_box_wraps_over_antimeridian() {
        let bb = approximate(0.0, 179.9999, 1000.0).unwrap();
        assert!(bb.crosses_antimeridian());
        assert!(bb.min_lon > 179.0 && bb.max_lon < -179.0);
        assert!(bb.contains(0.0, -179.9999));
        assert!(bb.contains(0.0, 179.9999));
        assert!(!bb.contains(0.0, 0.0));
        assert!(!bb.contains(0.0, -179.0));

        let (_, clon) = bb.center();
        assert!((clon - 179.9999).abs() < 1e-9);

        let west = approximate(0.0, -179.9999, 1000.0).unwrap();
        assert!(west.crosses_antimeridian());
        assert!(west.contains(0.0, 179.9999));
    }

    #[test]
    fn test_invalid_radius_is_rejected() {
        assert!(approximate(0.0, 0.0, -1.0).is_err());
        assert!(approximate(0.0, 0.0, f64::NAN).is_err());
        assert!(approximate(f64::INFINITY, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_from_corners_normalizes() {
        let bb = BoundingBox::from_corners(64.3, 17.2, 64.2, 17.1);
        assert_eq!(bb.north_west(), (64.3, 17.1));
        assert_eq!(bb.south_east(), (64.2, 17.2));
        assert!(bb.contains(64.3, 17.2));
        assert!(bb.contains(64.2, 17.1));
    }
}
