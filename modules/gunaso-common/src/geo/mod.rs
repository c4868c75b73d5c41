pub mod distance;
pub mod geojson;
pub mod polygon;

pub use distance::{
    destination, haversine_meters, within_radius, BoundingBox, DISTANCE_EPSILON_METERS,
    EARTH_RADIUS_METERS,
};
pub use geojson::{parse_ward_features, GeoJsonGeometry, GeometryError, WardFeature};
pub use polygon::{Polygon, Ring, WardGeometry};
