// Shared harness for core integration tests: in-memory stores, three wards
// around central Kathmandu, and helpers for filing complaints.
//
//   Ward 1: 27.70..27.72 N, 85.30..85.32 E
//   Ward 2: 27.70..27.72 N, 85.32..85.34 E (shares ward 1's east edge)
//   Ward 3: 27.712..27.716 N, 85.312..85.316 E (inside ward 1)

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use gunaso_common::geo::WardGeometry;
use gunaso_common::{Complaint, CoreSettings, GeoPoint, ImageRef, UserId, Ward, WardId};
use gunaso_core::{ComplaintCore, CoreDeps};
use gunaso_store::memory::{MemoryImageStore, MemoryScratchStore, MemoryStore};
use gunaso_store::ComplaintStore;

/// Inside ward 1 only.
pub const WARD_1_POINT: GeoPoint = GeoPoint {
    lat: 27.705,
    lng: 85.305,
};
/// Inside ward 2 only.
pub const WARD_2_POINT: GeoPoint = GeoPoint {
    lat: 27.705,
    lng: 85.335,
};
/// Inside both ward 1 and ward 3.
pub const OVERLAP_POINT: GeoPoint = GeoPoint {
    lat: 27.714,
    lng: 85.314,
};
/// Outside every ward.
pub const OUTSIDE_POINT: GeoPoint = GeoPoint {
    lat: 27.60,
    lng: 85.20,
};

pub struct Harness {
    pub core: ComplaintCore,
    pub store: Arc<MemoryStore>,
    pub scratch: Arc<MemoryScratchStore>,
    pub images: Arc<MemoryImageStore>,
}

/// Axis-aligned box as a GeoJSON polygon, counter-clockwise.
pub fn box_geometry(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> WardGeometry {
    WardGeometry::from_geojson(&json!({
        "type": "Polygon",
        "coordinates": [[
            [min_lng, min_lat],
            [max_lng, min_lat],
            [max_lng, max_lat],
            [min_lng, max_lat],
            [min_lng, min_lat]
        ]]
    }))
    .unwrap()
}

pub fn ward(id: WardId, geometry: WardGeometry) -> Ward {
    Ward {
        id,
        name: format!("Ward {id}"),
        palika_id: Some(1),
        geometry,
    }
}

pub fn default_wards() -> Vec<Ward> {
    vec![
        ward(1, box_geometry(27.70, 85.30, 27.72, 85.32)),
        ward(2, box_geometry(27.70, 85.32, 27.72, 85.34)),
        ward(3, box_geometry(27.712, 85.312, 27.716, 85.316)),
    ]
}

pub async fn harness() -> Harness {
    harness_with(default_wards(), CoreSettings::default()).await
}

pub async fn harness_with(wards: Vec<Ward>, settings: CoreSettings) -> Harness {
    build_harness(wards, settings, |store| store as Arc<dyn ComplaintStore>).await
}

/// Default wards, with the core's complaint store wrapped by `wrap`.
pub async fn harness_wrapping<F>(wrap: F) -> Harness
where
    F: FnOnce(Arc<MemoryStore>) -> Arc<dyn ComplaintStore>,
{
    build_harness(default_wards(), CoreSettings::default(), wrap).await
}

async fn build_harness<F>(wards: Vec<Ward>, settings: CoreSettings, wrap: F) -> Harness
where
    F: FnOnce(Arc<MemoryStore>) -> Arc<dyn ComplaintStore>,
{
    let store = Arc::new(
        wards
            .into_iter()
            .fold(MemoryStore::new(), |store, w| store.with_ward(w)),
    );
    let scratch = Arc::new(MemoryScratchStore::new());
    let images = Arc::new(MemoryImageStore::new());

    let deps = CoreDeps::builder()
        .wards(store.clone())
        .complaints(wrap(store.clone()))
        .scratch(scratch.clone())
        .images(images.clone())
        .settings(settings)
        .build();
    let core = ComplaintCore::build(deps).await.unwrap();

    Harness {
        core,
        store,
        scratch,
        images,
    }
}

impl Harness {
    pub async fn upload(&self) -> ImageRef {
        use gunaso_store::ImageStore;
        self.images.store(vec![0xFF, 0xD8, 0xFF]).await.unwrap()
    }

    /// File a complaint straight through the lifecycle, bypassing intake.
    pub async fn file(&self, user: UserId, at: GeoPoint, tags: &[&str]) -> Complaint {
        let ward_id = self.core.ward_index.resolve(at).map(|w| w.id);
        let image = self.upload().await;
        self.core
            .lifecycle
            .file_new(user, ward_id, "Reported issue", at, tags, Some(image))
            .await
            .unwrap()
    }
}

pub fn user() -> UserId {
    Uuid::new_v4()
}
