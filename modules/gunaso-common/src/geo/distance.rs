use crate::types::GeoPoint;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Distances closer than this are treated as equal when comparing against a radius.
pub const DISTANCE_EPSILON_METERS: f64 = 1e-6;

/// Haversine great-circle distance between two points in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().min(1.0).asin();
    EARTH_RADIUS_METERS * c
}

/// Inclusive radius check: a point exactly `radius_meters` away is within.
pub fn within_radius(a: GeoPoint, b: GeoPoint, radius_meters: f64) -> bool {
    haversine_meters(a, b) <= radius_meters + DISTANCE_EPSILON_METERS
}

/// Point reached by travelling `distance_meters` from `origin` along the
/// initial bearing `bearing_deg` (0 = north, 90 = east).
pub fn destination(origin: GeoPoint, bearing_deg: f64, distance_meters: f64) -> GeoPoint {
    let delta = distance_meters / EARTH_RADIUS_METERS;
    let theta = bearing_deg.to_radians();
    let lat1 = origin.lat.to_radians();
    let lng1 = origin.lng.to_radians();

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * theta.cos()).asin();
    let lng2 = lng1
        + (theta.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    GeoPoint {
        lat: lat2.to_degrees(),
        lng: (lng2.to_degrees() + 540.0) % 360.0 - 180.0,
    }
}

/// Axis-aligned lat/lng box, used as a cheap prefilter before exact tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Smallest box holding every point. `None` for an empty input.
    pub fn of_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a GeoPoint>,
    {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => BoundingBox {
                    min_lat: p.lat,
                    max_lat: p.lat,
                    min_lng: p.lng,
                    max_lng: p.lng,
                },
                Some(b) => BoundingBox {
                    min_lat: b.min_lat.min(p.lat),
                    max_lat: b.max_lat.max(p.lat),
                    min_lng: b.min_lng.min(p.lng),
                    max_lng: b.max_lng.max(p.lng),
                },
            })
        })
    }

    /// Box guaranteed to contain every point within `radius_meters` of `center`.
    pub fn around(center: GeoPoint, radius_meters: f64) -> Self {
        BoundingBox {
            min_lat: center.lat,
            max_lat: center.lat,
            min_lng: center.lng,
            max_lng: center.lng,
        }
        .expanded(radius_meters)
    }

    /// Grow the box by `meters` on every side (slightly more, never less).
    pub fn expanded(&self, meters: f64) -> Self {
        // 1% slack keeps the prefilter conservative against rounding.
        let lat_delta = (meters * 1.01 / EARTH_RADIUS_METERS).to_degrees();
        let widest_lat = self.min_lat.abs().max(self.max_lat.abs()) + lat_delta;
        let cos_lat = widest_lat.min(90.0).to_radians().cos();
        let lng_delta = if cos_lat < 1e-9 {
            360.0
        } else {
            lat_delta / cos_lat
        };

        BoundingBox {
            min_lat: (self.min_lat - lat_delta).max(-90.0),
            max_lat: (self.max_lat + lat_delta).min(90.0),
            min_lng: (self.min_lng - lng_delta).max(-180.0),
            max_lng: (self.max_lng + lng_delta).min(180.0),
        }
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat && p.lat <= self.max_lat && p.lng >= self.min_lng && p.lng <= self.max_lng
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KATHMANDU: GeoPoint = GeoPoint {
        lat: 27.7172,
        lng: 85.3240,
    };

    #[test]
    fn kathmandu_to_pokhara() {
        let pokhara = GeoPoint::new(28.2096, 83.9856);
        let d = haversine_meters(KATHMANDU, pokhara);
        assert!((d - 142_000.0).abs() < 3_000.0, "Expected ~142km, got {d}m");
    }

    #[test]
    fn destination_round_trips_distance() {
        for bearing in [0.0, 45.0, 90.0, 180.0, 270.0] {
            let p = destination(KATHMANDU, bearing, 200.0);
            let d = haversine_meters(KATHMANDU, p);
            assert!((d - 200.0).abs() < 1e-6, "bearing {bearing}: got {d}m");
        }
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let at_edge = destination(KATHMANDU, 0.0, 200.0);
        let beyond = destination(KATHMANDU, 0.0, 200.01);
        assert!(within_radius(KATHMANDU, at_edge, 200.0));
        assert!(!within_radius(KATHMANDU, beyond, 200.0));
    }

    #[test]
    fn bounding_box_covers_radius() {
        let bbox = BoundingBox::around(KATHMANDU, 200.0);
        for bearing in (0..360).step_by(15) {
            let p = destination(KATHMANDU, f64::from(bearing), 200.0);
            assert!(bbox.contains(p), "bearing {bearing} escaped bbox");
        }
        assert!(!bbox.contains(destination(KATHMANDU, 90.0, 400.0)));
    }

    #[test]
    fn bounding_box_of_points() {
        let pts = [GeoPoint::new(1.0, 2.0), GeoPoint::new(-1.0, 5.0)];
        let bbox = BoundingBox::of_points(&pts).unwrap();
        assert_eq!(bbox.min_lat, -1.0);
        assert_eq!(bbox.max_lng, 5.0);
        assert!(BoundingBox::of_points(&[]).is_none());
    }
}
