//! GeoJSON (RFC 7946) ward outlines. Positions are `[lng, lat]`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::polygon::{Polygon, Ring, WardGeometry};
use crate::types::GeoPoint;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Geometry has no polygons")]
    Empty,

    #[error("Polygon has no exterior ring")]
    MissingExterior,

    #[error("Ring needs at least 3 distinct vertices, got {0}")]
    DegenerateRing(usize),

    #[error("Position needs [lng, lat], got {0} values")]
    ShortPosition(usize),

    #[error("Invalid coordinate lat={0} lng={1}")]
    InvalidCoordinate(f64, f64),

    #[error("Unsupported geometry: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJsonGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
}

fn ring_from_positions(positions: &[Vec<f64>]) -> Result<Ring, GeometryError> {
    let points = positions
        .iter()
        .map(|pos| match pos.as_slice() {
            [lng, lat, ..] => Ok(GeoPoint::new(*lat, *lng)),
            other => Err(GeometryError::ShortPosition(other.len())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ring::new(points)
}

fn polygon_from_rings(rings: &[Vec<Vec<f64>>]) -> Result<Polygon, GeometryError> {
    let (exterior, holes) = rings.split_first().ok_or(GeometryError::MissingExterior)?;
    let exterior = ring_from_positions(exterior)?;
    let holes = holes
        .iter()
        .map(|h| ring_from_positions(h))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, holes))
}

fn ring_to_positions(ring: &Ring) -> Vec<Vec<f64>> {
    ring.points().iter().map(|p| vec![p.lng, p.lat]).collect()
}

impl TryFrom<GeoJsonGeometry> for WardGeometry {
    type Error = GeometryError;

    fn try_from(geometry: GeoJsonGeometry) -> Result<Self, Self::Error> {
        let polygons = match geometry {
            GeoJsonGeometry::Polygon { coordinates } => vec![polygon_from_rings(&coordinates)?],
            GeoJsonGeometry::MultiPolygon { coordinates } => coordinates
                .iter()
                .map(|rings| polygon_from_rings(rings))
                .collect::<Result<Vec<_>, _>>()?,
        };
        WardGeometry::new(polygons)
    }
}

impl From<WardGeometry> for GeoJsonGeometry {
    fn from(geometry: WardGeometry) -> Self {
        GeoJsonGeometry::MultiPolygon {
            coordinates: geometry
                .polygons()
                .iter()
                .map(|poly| {
                    std::iter::once(poly.exterior())
                        .chain(poly.holes().iter())
                        .map(ring_to_positions)
                        .collect()
                })
                .collect(),
        }
    }
}

impl WardGeometry {
    /// Parse a GeoJSON geometry object (Polygon or MultiPolygon).
    pub fn from_geojson(value: &Value) -> Result<Self, GeometryError> {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or("<missing>");
        if kind != "Polygon" && kind != "MultiPolygon" {
            return Err(GeometryError::Unsupported(kind.to_string()));
        }
        let geometry: GeoJsonGeometry = serde_json::from_value(value.clone())
            .map_err(|e| GeometryError::Unsupported(e.to_string()))?;
        WardGeometry::try_from(geometry)
    }

    pub fn to_geojson(&self) -> Value {
        serde_json::to_value(GeoJsonGeometry::from(self.clone())).unwrap_or(Value::Null)
    }
}

/// One ward read from an administrative boundary FeatureCollection.
#[derive(Debug, Clone, PartialEq)]
pub struct WardFeature {
    pub ward_name: String,
    pub palika_name: Option<String>,
    pub palika_kind: Option<String>,
    pub province: Option<String>,
    pub geometry: WardGeometry,
}

fn property_string(props: &Value, key: &str) -> Option<String> {
    match props.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Read ward features (`WARD`, `PALIKA`, `TYPE`, `PROVINCE` properties).
/// Features without a ward number or polygonal geometry are skipped.
pub fn parse_ward_features(collection: &Value) -> Vec<WardFeature> {
    let features = collection
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    features
        .iter()
        .filter_map(|feature| {
            let props = feature.get("properties").unwrap_or(&Value::Null);
            let Some(ward_name) = property_string(props, "WARD") else {
                warn!("Skipping feature without WARD property");
                return None;
            };
            let geometry = match feature.get("geometry").map(WardGeometry::from_geojson) {
                Some(Ok(g)) => g,
                Some(Err(e)) => {
                    warn!(ward = %ward_name, error = %e, "Skipping feature: invalid geometry");
                    return None;
                }
                None => {
                    warn!(ward = %ward_name, "Skipping feature: no geometry");
                    return None;
                }
            };
            Some(WardFeature {
                ward_name,
                palika_name: property_string(props, "PALIKA"),
                palika_kind: property_string(props, "TYPE"),
                province: property_string(props, "PROVINCE"),
                geometry,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unit_square() -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[85.30, 27.70], [85.31, 27.70], [85.31, 27.71], [85.30, 27.71], [85.30, 27.70]]]
        })
    }

    #[test]
    fn polygon_parses_lng_first() {
        let geom = WardGeometry::from_geojson(&unit_square()).unwrap();
        assert!(geom.contains(GeoPoint::new(27.705, 85.305)));
        assert!(!geom.contains(GeoPoint::new(85.305, 27.705)));
    }

    #[test]
    fn stored_form_is_multipolygon() {
        let geom = WardGeometry::from_geojson(&unit_square()).unwrap();
        let stored = geom.to_geojson();
        assert_eq!(stored["type"], "MultiPolygon");
        let back = WardGeometry::from_geojson(&stored).unwrap();
        assert_eq!(back, geom);
    }

    #[test]
    fn point_geometry_is_unsupported() {
        let err = WardGeometry::from_geojson(&json!({"type": "Point", "coordinates": [1.0, 2.0]}))
            .unwrap_err();
        assert_eq!(err, GeometryError::Unsupported("Point".into()));
    }

    #[test]
    fn feature_collection_skips_bad_features() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"WARD": 4, "PALIKA": "Kathmandu", "TYPE": "Metropolitan", "PROVINCE": "Bagmati"},
                    "geometry": unit_square()
                },
                {
                    "type": "Feature",
                    "properties": {"WARD": 5},
                    "geometry": {"type": "LineString", "coordinates": [[85.3, 27.7], [85.4, 27.8]]}
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": unit_square()
                }
            ]
        });
        let wards = parse_ward_features(&collection);
        assert_eq!(wards.len(), 1);
        assert_eq!(wards[0].ward_name, "4");
        assert_eq!(wards[0].palika_name.as_deref(), Some("Kathmandu"));
        assert_eq!(wards[0].palika_kind.as_deref(), Some("Metropolitan"));
    }
}
