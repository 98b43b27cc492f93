//! Primary vs secondary comparison at matched time.
//!
//! The distance metric depends on the render mode:
//! - **2D map**: great-circle (haversine) distance over the ground
//! - **3D globe**: straight-line distance between Earth-centred Cartesian
//!   positions, altitude included

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::index::TimestampIndex;
use crate::{GeoPosition, RenderMode, Sample};

// WGS84 ellipsoid
const WGS84_A: f64 = 6_378_137.0;
const WGS84_E2: f64 = 6.694_379_990_14e-3;

/// Secondary readings at the primary's timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Position of the matched sample in the secondary track
    pub secondary_index: usize,
    pub alt: Option<f64>,
    pub speed: Option<f64>,
    /// Distance from primary to secondary in meters
    pub distance_m: f64,
}

/// Distance in meters between two positions in the metric of `mode`.
pub fn compute_distance(a: &GeoPosition, b: &GeoPosition, mode: RenderMode) -> f64 {
    match mode {
        RenderMode::Map2d => {
            Haversine::distance(Point::new(a.lon, a.lat), Point::new(b.lon, b.lat))
        }
        RenderMode::Globe3d => {
            let pa = to_ecef(a);
            let pb = to_ecef(b);
            ((pa[0] - pb[0]).powi(2) + (pa[1] - pb[1]).powi(2) + (pa[2] - pb[2]).powi(2)).sqrt()
        }
    }
}

/// Geodetic position to Earth-centred, Earth-fixed Cartesian meters.
pub fn to_ecef(p: &GeoPosition) -> [f64; 3] {
    let lat = p.lat.to_radians();
    let lon = p.lon.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    [
        (n + p.alt) * cos_lat * lon.cos(),
        (n + p.alt) * cos_lat * lon.sin(),
        (n * (1.0 - WGS84_E2) + p.alt) * sin_lat,
    ]
}

/// Compare `primary` against the secondary sample with the exact same timestamp.
///
/// Returns `None` when the secondary has no sample at that instant.
pub fn compare(
    primary: &Sample,
    secondary: &[Sample],
    index: &TimestampIndex,
    mode: RenderMode,
) -> Option<Comparison> {
    let (secondary_index, matched) = index.find(secondary, &primary.timestamp)?;
    Some(Comparison {
        secondary_index,
        alt: matched.alt,
        speed: matched.speed,
        distance_m: compute_distance(&primary.position(), &matched.position(), mode),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(lat: f64, lon: f64, alt: f64) -> GeoPosition {
        GeoPosition { lat, lon, alt }
    }

    #[test]
    fn test_haversine_distance() {
        // ~111km per degree of latitude
        let d = compute_distance(&pos(40.0, 25.0, 0.0), &pos(41.0, 25.0, 0.0), RenderMode::Map2d);
        assert!((d - 111_195.0).abs() < 200.0, "got {}", d);
    }

    #[test]
    fn test_2d_ignores_altitude_3d_does_not() {
        let a = pos(40.2, 25.88, 0.0);
        let b = pos(40.2, 25.88, 120.0);
        assert!(compute_distance(&a, &b, RenderMode::Map2d) < 1e-6);
        let d3 = compute_distance(&a, &b, RenderMode::Globe3d);
        assert!((d3 - 120.0).abs() < 1e-6, "got {}", d3);
    }

    #[test]
    fn test_modes_differ_over_long_baselines() {
        // The chord is shorter than the arc
        let a = pos(0.0, 0.0, 0.0);
        let b = pos(0.0, 90.0, 0.0);
        let arc = compute_distance(&a, &b, RenderMode::Map2d);
        let chord = compute_distance(&a, &b, RenderMode::Globe3d);
        assert!(chord < arc);
        assert!((chord - WGS84_A * 2f64.sqrt()).abs() < 1.0);
    }

    #[test]
    fn test_ecef_equator_and_pole() {
        let e = to_ecef(&pos(0.0, 0.0, 0.0));
        assert!((e[0] - WGS84_A).abs() < 1e-6);
        let p = to_ecef(&pos(90.0, 0.0, 0.0));
        assert!((p[2] - 6_356_752.314).abs() < 0.01);
    }

    #[test]
    fn test_compare_match_and_miss() {
        let mut primary = Sample::new("2024-09-14 12:00:01", 40.2, 25.88);
        let mut sec_a = Sample::new("2024-09-14 12:00:00", 40.2, 25.88);
        let mut sec_b = Sample::new("2024-09-14 12:00:01", 40.201, 25.88);
        sec_a.alt = Some(90.0);
        sec_b.alt = Some(100.0);
        sec_b.speed = None;
        let secondary = vec![sec_a, sec_b];
        let index = TimestampIndex::build(&secondary);

        let c = compare(&primary, &secondary, &index, RenderMode::Map2d).unwrap();
        assert_eq!(c.secondary_index, 1);
        assert_eq!(c.alt, Some(100.0));
        assert_eq!(c.speed, None);
        assert!((c.distance_m - 111.2).abs() < 1.0, "got {}", c.distance_m);

        primary.timestamp = "2024-09-14 12:00:02".to_string();
        assert!(compare(&primary, &secondary, &index, RenderMode::Map2d).is_none());
    }
}
