use std::sync::Arc;

use tracing::debug;
use typed_builder::TypedBuilder;

use gunaso_common::{CoreSettings, Result};
use gunaso_store::{ComplaintStore, ImageStore, ScratchStore, WardStore};

use crate::drafts::DraftStaging;
use crate::intake::ComplaintIntake;
use crate::lifecycle::ComplaintLifecycle;
use crate::ratings::WardRatings;
use crate::similarity::SimilarityFinder;
use crate::ward_index::WardIndex;

/// Collaborators the complaint core runs on.
#[derive(Clone, TypedBuilder)]
pub struct CoreDeps {
    pub wards: Arc<dyn WardStore>,
    pub complaints: Arc<dyn ComplaintStore>,
    pub scratch: Arc<dyn ScratchStore>,
    pub images: Arc<dyn ImageStore>,
    #[builder(default)]
    pub settings: CoreSettings,
}

/// The assembled core. Outer layers call the components directly.
#[derive(Clone)]
pub struct ComplaintCore {
    pub ward_index: Arc<WardIndex>,
    pub similarity: SimilarityFinder,
    pub drafts: DraftStaging,
    pub lifecycle: ComplaintLifecycle,
    pub intake: ComplaintIntake,
    pub ratings: WardRatings,
}

impl ComplaintCore {
    /// Load the ward outlines and wire every component.
    pub async fn build(deps: CoreDeps) -> anyhow::Result<Self> {
        let ward_index = Arc::new(WardIndex::load(deps.wards.as_ref()).await?);
        Ok(Self::with_index(deps, ward_index))
    }

    /// The periodic job: release the images of expired drafts, then
    /// refresh the cached ward ratings. Hosts run it on a timer no longer
    /// than the rating cache TTL.
    pub async fn run_maintenance(&self) -> Result<()> {
        let swept = self.drafts.sweep_expired().await?;
        let wards = self.ratings.refresh_ward_ratings().await?;
        debug!(drafts = swept, wards, "Maintenance pass complete");
        Ok(())
    }

    pub fn with_index(deps: CoreDeps, ward_index: Arc<WardIndex>) -> Self {
        let settings = deps.settings;
        let similarity =
            SimilarityFinder::new(deps.complaints.clone(), settings.similarity_radius_meters);
        let drafts = DraftStaging::new(
            deps.scratch.clone(),
            deps.images.clone(),
            settings.draft_ttl,
        );
        let lifecycle = ComplaintLifecycle::new(deps.complaints.clone(), deps.images.clone());
        let intake = ComplaintIntake::new(
            ward_index.clone(),
            similarity.clone(),
            drafts.clone(),
            lifecycle.clone(),
        );
        let ratings = WardRatings::new(
            deps.complaints,
            deps.scratch,
            settings.ward_rating_cache_ttl,
        );

        Self {
            ward_index,
            similarity,
            drafts,
            lifecycle,
            intake,
            ratings,
        }
    }
}
