//! Draft staging: a submission parked while the citizen decides between
//! supporting a similar complaint and filing anyway.
//!
//! One draft per user under `draft:complaint:{user_id}`, last write wins.
//! Drafts expire after the configured TTL; a late resolve sees nothing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use gunaso_common::{ComplaintId, GeoPoint, GunasoError, ImageRef, Result, UserId, WardId};
use gunaso_store::{ImageStore, ScratchStore};

/// The validated submission, ready to be filed as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplaintDraft {
    pub ward_id: WardId,
    pub description: String,
    pub location: GeoPoint,
    pub tags: Vec<String>,
    pub image: ImageRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StagedDraft {
    pub user_id: UserId,
    pub draft: ComplaintDraft,
    /// Complaints offered to the citizen as likely duplicates.
    pub candidate_ids: Vec<ComplaintId>,
}

const DRAFT_KEY_PREFIX: &str = "draft:complaint:";

pub fn draft_key(user_id: UserId) -> String {
    format!("{DRAFT_KEY_PREFIX}{user_id}")
}

#[derive(Clone)]
pub struct DraftStaging {
    scratch: Arc<dyn ScratchStore>,
    images: Arc<dyn ImageStore>,
    ttl: Duration,
}

impl DraftStaging {
    pub fn new(scratch: Arc<dyn ScratchStore>, images: Arc<dyn ImageStore>, ttl: Duration) -> Self {
        Self {
            scratch,
            images,
            ttl,
        }
    }

    /// Park `draft` for `user_id`, replacing any earlier draft. Returns the key.
    ///
    /// The replaced draft's image is released unless the new draft carries
    /// the same image.
    pub async fn stage(
        &self,
        user_id: UserId,
        draft: ComplaintDraft,
        candidate_ids: Vec<ComplaintId>,
    ) -> Result<String> {
        let key = draft_key(user_id);
        let staged = StagedDraft {
            user_id,
            draft,
            candidate_ids,
        };
        let value = serde_json::to_string(&staged).context("Failed to serialize draft")?;

        let previous = self.scratch.put(&key, value, self.ttl).await?;
        info!(
            user_id = %user_id,
            candidates = staged.candidate_ids.len(),
            "Draft staged"
        );

        if let Some(previous) = previous {
            match serde_json::from_str::<StagedDraft>(&previous) {
                Ok(old) if old.draft.image != staged.draft.image => {
                    debug!(user_id = %user_id, image = %old.draft.image, "Releasing image of replaced draft");
                    self.release_image(&old.draft.image).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(user_id = %user_id, error = %e, "Replaced draft was unreadable; its image may be orphaned");
                }
            }
        }

        Ok(key)
    }

    /// The current draft without consuming it.
    pub async fn peek(&self, user_id: UserId) -> Result<StagedDraft> {
        let raw = self
            .scratch
            .get(&draft_key(user_id))
            .await?
            .ok_or(GunasoError::DraftExpiredOrMissing)?;
        decode(&raw)
    }

    /// Consume the draft. Expired and missing drafts both read as
    /// `DraftExpiredOrMissing`.
    pub async fn resolve(&self, user_id: UserId) -> Result<StagedDraft> {
        let raw = self
            .scratch
            .take(&draft_key(user_id))
            .await?
            .ok_or_else(|| {
                debug!(user_id = %user_id, "No live draft to resolve");
                GunasoError::DraftExpiredOrMissing
            })?;
        decode(&raw)
    }

    /// Drop `staged` once the decision it was waiting on has been written.
    ///
    /// A draft staged again in the meantime is put back untouched. Failures
    /// are logged only; the write they follow already succeeded.
    pub async fn complete(&self, user_id: UserId, staged: &StagedDraft) {
        let key = draft_key(user_id);
        let taken = match self.scratch.take(&key).await {
            Ok(taken) => taken,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to drop resolved draft");
                return;
            }
        };
        let Some(raw) = taken else {
            debug!(user_id = %user_id, "Resolved draft already gone");
            return;
        };
        match decode(&raw) {
            Ok(current) if current == *staged => {
                debug!(user_id = %user_id, "Draft resolved");
            }
            _ => {
                debug!(user_id = %user_id, "Draft was restaged while resolving; keeping it");
                if let Err(e) = self.scratch.put(&key, raw, self.ttl).await {
                    error!(user_id = %user_id, error = %e, "Failed to restore restaged draft");
                }
            }
        }
    }

    /// Purge expired scratch entries and release the images of the drafts
    /// among them. Returns how many drafts were swept.
    ///
    /// Nothing else ever releases an expired draft's image, so this belongs
    /// in the periodic job (see `ComplaintCore::run_maintenance`).
    pub async fn sweep_expired(&self) -> Result<usize> {
        let purged = self.scratch.purge_expired().await?;
        let mut swept = 0;
        for (key, raw) in purged {
            if !key.starts_with(DRAFT_KEY_PREFIX) {
                continue;
            }
            swept += 1;
            match decode(&raw) {
                Ok(staged) => {
                    self.release_image(&staged.draft.image).await;
                }
                Err(e) => {
                    error!(key = %key, error = %e, "Expired draft was unreadable; its image may be orphaned");
                }
            }
        }
        if swept > 0 {
            info!(drafts = swept, "Expired drafts swept");
        }
        Ok(swept)
    }

    /// Delete an image that no complaint will own. Returns the image back
    /// when the delete failed, so the caller can report the orphan.
    pub async fn release_image(&self, image: &ImageRef) -> Option<ImageRef> {
        match self.images.delete(image).await {
            Ok(()) => {
                debug!(image = %image, "Draft image released");
                None
            }
            Err(e) => {
                error!(image = %image, error = %e, "Failed to release draft image; it is now orphaned");
                Some(image.clone())
            }
        }
    }
}

fn decode(raw: &str) -> Result<StagedDraft> {
    let staged = serde_json::from_str(raw).context("Stored draft is unreadable")?;
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gunaso_store::memory::{MemoryImageStore, MemoryScratchStore};
    use uuid::Uuid;

    fn draft(image: &str) -> ComplaintDraft {
        ComplaintDraft {
            ward_id: 1,
            description: "Drain overflowing".into(),
            location: GeoPoint::new(27.70, 85.32),
            tags: vec!["open drains".into()],
            image: ImageRef::new(image),
        }
    }

    fn staging() -> (DraftStaging, Arc<MemoryImageStore>) {
        let images = Arc::new(MemoryImageStore::new());
        let staging = DraftStaging::new(
            Arc::new(MemoryScratchStore::new()),
            images.clone(),
            Duration::from_secs(300),
        );
        (staging, images)
    }

    #[tokio::test]
    async fn key_is_per_user() {
        let (staging, _) = staging();
        let user = Uuid::new_v4();
        let key = staging.stage(user, draft("a"), vec![]).await.unwrap();
        assert_eq!(key, format!("draft:complaint:{user}"));
    }

    #[tokio::test]
    async fn resolve_consumes() {
        let (staging, _) = staging();
        let user = Uuid::new_v4();
        let candidate = Uuid::new_v4();
        staging.stage(user, draft("a"), vec![candidate]).await.unwrap();

        let staged = staging.resolve(user).await.unwrap();
        assert_eq!(staged.candidate_ids, vec![candidate]);
        assert_eq!(staged.draft.image, ImageRef::new("a"));

        let err = staging.resolve(user).await.unwrap_err();
        assert!(matches!(err, GunasoError::DraftExpiredOrMissing));
    }

    #[tokio::test]
    async fn complete_drops_only_the_draft_it_was_given() {
        let (staging, _) = staging();
        let user = Uuid::new_v4();
        staging.stage(user, draft("first"), vec![]).await.unwrap();
        let first = staging.peek(user).await.unwrap();

        staging.complete(user, &first).await;
        assert!(matches!(
            staging.peek(user).await.unwrap_err(),
            GunasoError::DraftExpiredOrMissing
        ));

        staging.stage(user, draft("second"), vec![]).await.unwrap();
        let second = staging.peek(user).await.unwrap();
        staging.stage(user, draft("third"), vec![]).await.unwrap();

        // "third" was staged while "second" was being resolved.
        staging.complete(user, &second).await;
        assert_eq!(
            staging.peek(user).await.unwrap().draft.image,
            ImageRef::new("third")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sweeping_releases_images_of_expired_drafts_only() {
        let images = Arc::new(MemoryImageStore::new());
        let scratch = Arc::new(MemoryScratchStore::new());
        let staging = DraftStaging::new(scratch.clone(), images.clone(), Duration::from_secs(300));
        let stale = Uuid::new_v4();
        staging.stage(stale, draft("stale"), vec![]).await.unwrap();
        scratch
            .put("ward_admin_rating:1", "4.5".into(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(200)).await;
        let fresh = Uuid::new_v4();
        staging.stage(fresh, draft("fresh"), vec![]).await.unwrap();
        tokio::time::advance(Duration::from_secs(101)).await;

        assert_eq!(staging.sweep_expired().await.unwrap(), 1);
        assert_eq!(images.deletions(), vec![ImageRef::new("stale")]);
        assert_eq!(scratch.len(), 1);
        assert_eq!(
            staging.peek(fresh).await.unwrap().draft.image,
            ImageRef::new("fresh")
        );
        assert_eq!(staging.sweep_expired().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn restaging_releases_the_replaced_image() {
        let (staging, images) = staging();
        let user = Uuid::new_v4();
        staging.stage(user, draft("first"), vec![]).await.unwrap();
        staging.stage(user, draft("second"), vec![]).await.unwrap();

        assert_eq!(images.deletions(), vec![ImageRef::new("first")]);
        assert_eq!(
            staging.resolve(user).await.unwrap().draft.image,
            ImageRef::new("second")
        );
    }

    #[tokio::test]
    async fn restaging_same_image_keeps_it() {
        let (staging, images) = staging();
        let user = Uuid::new_v4();
        staging.stage(user, draft("same"), vec![]).await.unwrap();
        staging.stage(user, draft("same"), vec![]).await.unwrap();
        assert!(images.deletions().is_empty());
    }

    #[tokio::test]
    async fn failed_release_hands_back_the_image() {
        let (staging, images) = staging();
        images.fail_deletes(true);
        let image = ImageRef::new("stuck");
        assert_eq!(staging.release_image(&image).await, Some(image));
    }
}
