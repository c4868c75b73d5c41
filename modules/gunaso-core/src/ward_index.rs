//! Point-to-ward resolution over the seeded ward outlines.
//!
//! Outlines are loaded once and tested in memory on the sphere. A bounding
//! box prefilter narrows the candidates before the exact containment test.

use tracing::{debug, info};

use gunaso_common::geo::BoundingBox;
use gunaso_common::{GeoPoint, Ward, WardId};
use gunaso_store::WardStore;

/// Points within this distance of a ward's edge still count as in the ward.
/// Absorbs floating-point noise for points that sit exactly on a shared boundary.
pub const BOUNDARY_TOLERANCE_METERS: f64 = 0.01;

struct IndexedWard {
    ward: Ward,
    bbox: BoundingBox,
    area_m2: f64,
}

pub struct WardIndex {
    wards: Vec<IndexedWard>,
}

impl WardIndex {
    pub async fn load(store: &dyn WardStore) -> anyhow::Result<Self> {
        let wards = store.load_wards().await?;
        let index = Self::from_wards(wards);
        info!(wards = index.len(), "Ward index loaded");
        Ok(index)
    }

    pub fn from_wards(wards: Vec<Ward>) -> Self {
        let wards = wards
            .into_iter()
            .map(|ward| IndexedWard {
                bbox: ward
                    .geometry
                    .bounding_box()
                    .expanded(BOUNDARY_TOLERANCE_METERS),
                area_m2: ward.geometry.area_m2(),
                ward,
            })
            .collect();
        Self { wards }
    }

    pub fn len(&self) -> usize {
        self.wards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wards.is_empty()
    }

    pub fn ward(&self, id: WardId) -> Option<&Ward> {
        self.wards.iter().map(|w| &w.ward).find(|w| w.id == id)
    }

    /// Ward containing `point`, or `None` when it lies outside every ward.
    ///
    /// Overlaps resolve to the ward nearest the point (zero when inside),
    /// then the smallest area, then the lowest id. The result depends only
    /// on the geometry.
    pub fn resolve(&self, point: GeoPoint) -> Option<&Ward> {
        if !point.is_valid() {
            return None;
        }

        let best = self
            .wards
            .iter()
            .filter(|w| w.bbox.contains(point))
            .filter_map(|w| {
                let distance = w.ward.geometry.distance_meters(point);
                (distance <= BOUNDARY_TOLERANCE_METERS).then_some((w, distance))
            })
            .min_by(|(a, da), (b, db)| {
                da.total_cmp(db)
                    .then_with(|| a.area_m2.total_cmp(&b.area_m2))
                    .then_with(|| a.ward.id.cmp(&b.ward.id))
            })
            .map(|(w, _)| &w.ward);

        match best {
            Some(ward) => debug!(
                ward_id = ward.id,
                lat = point.lat,
                lng = point.lng,
                "Point resolved"
            ),
            None => debug!(lat = point.lat, lng = point.lng, "Point outside all wards"),
        }
        best
    }
}
