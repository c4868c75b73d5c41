//! Submission orchestration: validate, resolve the ward, look for similar
//! complaints, then either file or park a draft for the citizen to decide.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use gunaso_common::taxonomy::validate_tags;
use gunaso_common::{
    Complaint, ComplaintId, GeoPoint, GunasoError, Identity, ImageRef, Result, Role,
};

use crate::drafts::{ComplaintDraft, DraftStaging};
use crate::lifecycle::ComplaintLifecycle;
use crate::similarity::SimilarityFinder;
use crate::ward_index::WardIndex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, TypedBuilder)]
pub struct SubmissionRequest {
    #[builder(setter(into))]
    pub description: String,
    pub location: GeoPoint,
    pub tags: Vec<String>,
    #[builder(default, setter(strip_option))]
    pub image: Option<ImageRef>,
    /// Skip the similarity search and file straight away.
    #[builder(default)]
    #[serde(default)]
    pub bypass_dedup: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Filed(Complaint),
    /// Nothing was filed; the submission waits under `draft_key`.
    SimilarFound {
        draft_key: String,
        candidates: Vec<Complaint>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DraftDecision {
    /// Treat the draft as a duplicate of this candidate.
    SupportExisting(ComplaintId),
    FileAnyway,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DraftResolution {
    /// `orphaned_image` is set when the draft's image could not be released.
    Supported {
        complaint_id: ComplaintId,
        orphaned_image: Option<ImageRef>,
    },
    Filed(Complaint),
}

#[derive(Clone)]
pub struct ComplaintIntake {
    wards: Arc<WardIndex>,
    finder: SimilarityFinder,
    drafts: DraftStaging,
    lifecycle: ComplaintLifecycle,
}

impl ComplaintIntake {
    pub fn new(
        wards: Arc<WardIndex>,
        finder: SimilarityFinder,
        drafts: DraftStaging,
        lifecycle: ComplaintLifecycle,
    ) -> Self {
        Self {
            wards,
            finder,
            drafts,
            lifecycle,
        }
    }

    pub async fn submit(
        &self,
        identity: &Identity,
        request: SubmissionRequest,
    ) -> Result<SubmissionOutcome> {
        if identity.role != Role::Citizen {
            return Err(GunasoError::unauthorized("only citizens may file complaints"));
        }
        let description = request.description.trim();
        if description.is_empty() {
            return Err(GunasoError::InvalidInput("description is required".into()));
        }
        let tags = validate_tags(&request.tags)?;
        let image = request
            .image
            .filter(|i| !i.as_str().trim().is_empty())
            .ok_or(GunasoError::MissingImage)?;
        let location = request.location;
        let bypass_dedup = request.bypass_dedup;
        if !location.is_valid() {
            return Err(GunasoError::InvalidInput("coordinates out of range".into()));
        }

        // Ward lookup and similarity search only depend on the request.
        let (ward_id, similar) = tokio::join!(
            async { self.wards.resolve(location).map(|w| w.id) },
            async {
                if bypass_dedup {
                    Ok(Vec::new())
                } else {
                    self.finder.find_similar(location, &tags).await
                }
            }
        );

        let Some(ward_id) = ward_id else {
            info!(
                user_id = %identity.user_id,
                lat = location.lat,
                lng = location.lng,
                "Submission rejected: outside all wards"
            );
            return Err(GunasoError::LocationOutOfBounds);
        };
        let similar = similar?;

        if !similar.is_empty() {
            let candidate_ids = similar.iter().map(|c| c.id).collect();
            let draft = ComplaintDraft {
                ward_id,
                description: description.to_string(),
                location,
                tags,
                image,
            };
            let draft_key = self
                .drafts
                .stage(identity.user_id, draft, candidate_ids)
                .await?;
            return Ok(SubmissionOutcome::SimilarFound {
                draft_key,
                candidates: similar,
            });
        }

        let complaint = self
            .lifecycle
            .file_new(
                identity.user_id,
                Some(ward_id),
                description,
                location,
                &tags,
                Some(image),
            )
            .await?;
        Ok(SubmissionOutcome::Filed(complaint))
    }

    /// Act on the citizen's choice for their staged draft.
    ///
    /// The draft is only dropped once the choice has been written, so a
    /// store failure leaves it in place for a retry.
    pub async fn resolve_draft(
        &self,
        identity: &Identity,
        decision: DraftDecision,
    ) -> Result<DraftResolution> {
        let user_id = identity.user_id;
        let staged = self.drafts.peek(user_id).await?;
        match decision {
            DraftDecision::SupportExisting(complaint_id) => {
                if !staged.candidate_ids.contains(&complaint_id) {
                    debug!(user_id = %user_id, complaint_id = %complaint_id, "Not a draft candidate");
                    return Err(GunasoError::not_found(format!(
                        "complaint {complaint_id} among similar complaints"
                    )));
                }

                let supported = match self.lifecycle.support_existing(user_id, complaint_id).await {
                    Err(e) if e.is_retryable() => {
                        warn!(user_id = %user_id, complaint_id = %complaint_id, error = %e, "Support from draft failed; draft kept");
                        return Err(e);
                    }
                    other => other,
                };
                if let Err(e) = &supported {
                    warn!(user_id = %user_id, complaint_id = %complaint_id, error = %e, "Support from draft refused");
                }

                // Supported or refused for good: either way the draft is done.
                self.drafts.complete(user_id, &staged).await;
                let orphaned_image = self.drafts.release_image(&staged.draft.image).await;
                supported?;

                Ok(DraftResolution::Supported {
                    complaint_id,
                    orphaned_image,
                })
            }
            DraftDecision::FileAnyway => {
                let draft = &staged.draft;
                let complaint = self
                    .lifecycle
                    .file_new(
                        user_id,
                        Some(draft.ward_id),
                        &draft.description,
                        draft.location,
                        &draft.tags,
                        Some(draft.image.clone()),
                    )
                    .await;
                let complaint = match complaint {
                    Ok(complaint) => complaint,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Filing from draft failed; draft kept");
                        return Err(e);
                    }
                };
                self.drafts.complete(user_id, &staged).await;
                Ok(DraftResolution::Filed(complaint))
            }
        }
    }
}
