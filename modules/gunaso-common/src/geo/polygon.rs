//! Polygons on the sphere.
//!
//! Edges are great-circle arcs, not straight lines in lat/lng. Containment
//! projects the ring gnomonically around the query point, where great circles
//! become straight lines, and runs an ordinary crossing test there. Rings
//! spanning more than a hemisphere around the point are not supported; ward
//! polygons are a few square kilometres.

use serde::{Deserialize, Serialize};

use super::distance::{BoundingBox, EARTH_RADIUS_METERS};
use super::geojson::{GeoJsonGeometry, GeometryError};
use crate::types::GeoPoint;

type Vec3 = [f64; 3];

fn to_vec3(p: GeoPoint) -> Vec3 {
    let (lat, lng) = (p.lat.to_radians(), p.lng.to_radians());
    [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: Vec3) -> f64 {
    dot(a, a).sqrt()
}

fn scale(a: Vec3, k: f64) -> Vec3 {
    [a[0] * k, a[1] * k, a[2] * k]
}

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Central angle between two unit vectors, stable for tiny angles.
fn angle_between(a: Vec3, b: Vec3) -> f64 {
    norm(cross(a, b)).atan2(dot(a, b))
}

/// Angular distance from `p` to the minor great-circle arc `a`..`b`.
fn arc_distance(p: Vec3, a: Vec3, b: Vec3) -> f64 {
    let n = cross(a, b);
    let n_len = norm(n);
    if n_len < 1e-15 {
        return angle_between(p, a);
    }
    let n = scale(n, 1.0 / n_len);

    let projected = sub(p, scale(n, dot(n, p)));
    let projected_len = norm(projected);
    if projected_len > 1e-15 {
        let c = scale(projected, 1.0 / projected_len);
        if dot(cross(a, c), n) >= 0.0 && dot(cross(c, b), n) >= 0.0 {
            return dot(n, p).abs().min(1.0).asin();
        }
    }
    angle_between(p, a).min(angle_between(p, b))
}

/// Closed ring of vertices, first == last once normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    points: Vec<GeoPoint>,
}

impl Ring {
    /// Build a ring, dropping repeated vertices and closing it if needed.
    pub fn new(points: Vec<GeoPoint>) -> Result<Self, GeometryError> {
        let mut cleaned: Vec<GeoPoint> = Vec::with_capacity(points.len() + 1);
        for p in points {
            if !p.is_valid() {
                return Err(GeometryError::InvalidCoordinate(p.lat, p.lng));
            }
            if cleaned.last() != Some(&p) {
                cleaned.push(p);
            }
        }
        if cleaned.len() > 1 && cleaned.first() == cleaned.last() {
            cleaned.pop();
        }
        if cleaned.len() < 3 {
            return Err(GeometryError::DegenerateRing(cleaned.len()));
        }
        cleaned.push(cleaned[0]);
        Ok(Self { points: cleaned })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Shoelace area in lng/lat degrees. Positive means counter-clockwise.
    fn planar_signed_area(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].lng * w[1].lat - w[1].lng * w[0].lat)
            .sum::<f64>()
            / 2.0
    }

    pub fn is_counter_clockwise(&self) -> bool {
        self.planar_signed_area() > 0.0
    }

    fn oriented(mut self, counter_clockwise: bool) -> Self {
        if self.is_counter_clockwise() != counter_clockwise {
            self.points.reverse();
        }
        self
    }

    /// Spherical area enclosed by the ring, in square meters.
    pub fn area_m2(&self) -> f64 {
        let total: f64 = self
            .points
            .windows(2)
            .map(|w| {
                let (p1, p2) = (w[0], w[1]);
                (p2.lng - p1.lng).to_radians()
                    * (2.0 + p1.lat.to_radians().sin() + p2.lat.to_radians().sin())
            })
            .sum();
        (total * EARTH_RADIUS_METERS * EARTH_RADIUS_METERS / 2.0).abs()
    }

    /// Strict interior test on the sphere. Points on an edge may go either way.
    pub fn contains(&self, p: GeoPoint) -> bool {
        let c = to_vec3(p);
        let east = {
            let e = cross([0.0, 0.0, 1.0], c);
            let len = norm(e);
            if len < 1e-12 {
                [1.0, 0.0, 0.0]
            } else {
                scale(e, 1.0 / len)
            }
        };
        let north = cross(c, east);

        let mut projected = Vec::with_capacity(self.points.len());
        for v in &self.points {
            let w = to_vec3(*v);
            let d = dot(w, c);
            if d <= 0.0 {
                return false;
            }
            projected.push((dot(w, east) / d, dot(w, north) / d));
        }

        let mut inside = false;
        for edge in projected.windows(2) {
            let ((xi, yi), (xj, yj)) = (edge[0], edge[1]);
            if (yi > 0.0) != (yj > 0.0) {
                let x_at_axis = xi - yi * (xj - xi) / (yj - yi);
                if x_at_axis > 0.0 {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Ground distance from `p` to the nearest edge, in meters.
    pub fn boundary_distance_meters(&self, p: GeoPoint) -> f64 {
        let pv = to_vec3(p);
        self.points
            .windows(2)
            .map(|w| arc_distance(pv, to_vec3(w[0]), to_vec3(w[1])))
            .fold(f64::INFINITY, f64::min)
            * EARTH_RADIUS_METERS
    }
}

/// Polygon with an exterior ring and optional holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Ring,
    holes: Vec<Ring>,
}

impl Polygon {
    /// Normalizes orientation: exterior counter-clockwise, holes clockwise.
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        Self {
            exterior: exterior.oriented(true),
            holes: holes.into_iter().map(|h| h.oriented(false)).collect(),
        }
    }

    pub fn exterior(&self) -> &Ring {
        &self.exterior
    }

    pub fn holes(&self) -> &[Ring] {
        &self.holes
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        self.exterior.contains(p) && !self.holes.iter().any(|h| h.contains(p))
    }

    pub fn boundary_distance_meters(&self, p: GeoPoint) -> f64 {
        std::iter::once(&self.exterior)
            .chain(self.holes.iter())
            .map(|r| r.boundary_distance_meters(p))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn area_m2(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(Ring::area_m2).sum();
        (self.exterior.area_m2() - holes).max(0.0)
    }
}

/// Ward outline. A simple polygon is stored as a one-element multi-polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonGeometry", into = "GeoJsonGeometry")]
pub struct WardGeometry {
    polygons: Vec<Polygon>,
}

impl WardGeometry {
    pub fn new(polygons: Vec<Polygon>) -> Result<Self, GeometryError> {
        if polygons.is_empty() {
            return Err(GeometryError::Empty);
        }
        Ok(Self { polygons })
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn contains(&self, p: GeoPoint) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }

    /// Distance from `p` to the geometry: zero inside, else to the nearest edge.
    pub fn distance_meters(&self, p: GeoPoint) -> f64 {
        if self.contains(p) {
            return 0.0;
        }
        self.polygons
            .iter()
            .map(|poly| poly.boundary_distance_meters(p))
            .fold(f64::INFINITY, f64::min)
    }

    pub fn area_m2(&self) -> f64 {
        self.polygons.iter().map(Polygon::area_m2).sum()
    }

    pub fn bounding_box(&self) -> BoundingBox {
        // Never empty: rings hold at least four points.
        BoundingBox::of_points(self.polygons.iter().flat_map(|p| p.exterior.points.iter()))
            .unwrap_or(BoundingBox {
                min_lat: 0.0,
                max_lat: 0.0,
                min_lng: 0.0,
                max_lng: 0.0,
            })
    }
}
