use std::sync::Arc;

use tracing::debug;

use gunaso_common::geo::{within_radius, BoundingBox};
use gunaso_common::{Complaint, GeoPoint, Result};
use gunaso_store::ComplaintStore;

/// Finds existing complaints that probably describe the same problem: close
/// by on the ground and sharing at least one tag.
#[derive(Clone)]
pub struct SimilarityFinder {
    complaints: Arc<dyn ComplaintStore>,
    radius_meters: f64,
}

impl SimilarityFinder {
    pub fn new(complaints: Arc<dyn ComplaintStore>, radius_meters: f64) -> Self {
        Self {
            complaints,
            radius_meters,
        }
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Complaints within the radius (inclusive) sharing a tag with `tags`.
    /// Order is unspecified.
    pub async fn find_similar(&self, point: GeoPoint, tags: &[String]) -> Result<Vec<Complaint>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let bbox = BoundingBox::around(point, self.radius_meters);
        let nearby = self.complaints.nearby(&bbox, tags).await?;
        let prefiltered = nearby.len();

        let similar: Vec<Complaint> = nearby
            .into_iter()
            .filter(|c| within_radius(point, c.location, self.radius_meters))
            .filter(|c| c.shares_tag_with(tags))
            .collect();

        debug!(
            prefiltered,
            similar = similar.len(),
            radius_m = self.radius_meters,
            "Similarity search"
        );
        Ok(similar)
    }
}
