//! Rating reads and the cached per-ward admin rating.
//!
//! `refresh_ward_ratings` is what the periodic job calls; dashboards read the
//! cached value with `cached_ward_rating`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use gunaso_common::{ComplaintId, RatingSummary, Result, WardId};
use gunaso_store::{ComplaintStore, ScratchStore};

pub fn ward_rating_key(ward_id: WardId) -> String {
    format!("ward_admin_rating:{ward_id}")
}

#[derive(Clone)]
pub struct WardRatings {
    complaints: Arc<dyn ComplaintStore>,
    scratch: Arc<dyn ScratchStore>,
    cache_ttl: Duration,
}

impl WardRatings {
    pub fn new(
        complaints: Arc<dyn ComplaintStore>,
        scratch: Arc<dyn ScratchStore>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            complaints,
            scratch,
            cache_ttl,
        }
    }

    /// Mean of the supporters' ratings for one complaint.
    pub async fn complaint_rating(&self, id: ComplaintId) -> Result<RatingSummary> {
        Ok(self.complaints.rating_summary(id).await?)
    }

    /// Mean aggregate rating of the ward's rated complaints, computed now.
    pub async fn ward_rating(&self, ward_id: WardId) -> Result<Option<f64>> {
        let ratings = self.complaints.ward_ratings().await?;
        Ok(ratings
            .into_iter()
            .find(|(ward, _)| *ward == ward_id)
            .map(|(_, rating)| rating))
    }

    /// Recompute every ward's rating and cache it. Returns how many wards
    /// were cached.
    pub async fn refresh_ward_ratings(&self) -> Result<usize> {
        let ratings = self.complaints.ward_ratings().await?;
        for (ward_id, rating) in &ratings {
            self.scratch
                .put(&ward_rating_key(*ward_id), rating.to_string(), self.cache_ttl)
                .await?;
        }
        info!(wards = ratings.len(), "Ward ratings refreshed");
        Ok(ratings.len())
    }

    /// Last cached rating for the ward; `None` when absent or expired.
    pub async fn cached_ward_rating(&self, ward_id: WardId) -> Result<Option<f64>> {
        let Some(raw) = self.scratch.get(&ward_rating_key(ward_id)).await? else {
            return Ok(None);
        };
        match raw.parse::<f64>() {
            Ok(rating) => Ok(Some(rating)),
            Err(e) => {
                warn!(ward_id, value = %raw, error = %e, "Ignoring unreadable cached ward rating");
                Ok(None)
            }
        }
    }
}
