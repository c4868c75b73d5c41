//! Complaint lifecycle: filing, support, withdrawal, status, escalation and
//! rating. Every write is a single store call so it lands atomically.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

use gunaso_common::taxonomy::validate_tags;
use gunaso_common::{
    Complaint, ComplaintDetail, ComplaintFilter, ComplaintId, ComplaintStatus, GeoPoint,
    GunasoError, Identity, ImageRef, NewComplaint, Result, Role, StatusCounts, SupportedComplaint,
    SupportedFilter, Supporter, UserId, WardId,
};
use gunaso_store::{
    ComplaintStore, ImageStore, RatingWrite, StatusChange, SupportInsert, Withdrawal,
};

/// What a successful delete request did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeletionOutcome {
    /// Requester owned the complaint; `new_owner` took it over.
    OwnershipTransferred { new_owner: UserId },
    /// Requester was the last supporter. `orphaned_image` is set when the
    /// image could not be released.
    ComplaintDeleted { orphaned_image: Option<ImageRef> },
    SupportWithdrawn,
}

#[derive(Clone)]
pub struct ComplaintLifecycle {
    complaints: Arc<dyn ComplaintStore>,
    images: Arc<dyn ImageStore>,
}

impl ComplaintLifecycle {
    pub fn new(complaints: Arc<dyn ComplaintStore>, images: Arc<dyn ImageStore>) -> Self {
        Self { complaints, images }
    }

    async fn existing(&self, id: ComplaintId) -> Result<Complaint> {
        self.complaints
            .complaint(id)
            .await?
            .ok_or_else(|| GunasoError::not_found(format!("complaint {id}")))
    }

    // --- Writes ---

    /// File a new complaint with `user_id` as owner and first supporter.
    /// `ward_id` is the Ward Index result; `None` means the point fell
    /// outside every ward.
    pub async fn file_new<S: AsRef<str>>(
        &self,
        user_id: UserId,
        ward_id: Option<WardId>,
        description: &str,
        location: GeoPoint,
        tags: &[S],
        image: Option<ImageRef>,
    ) -> Result<Complaint> {
        let ward_id = ward_id.ok_or(GunasoError::LocationOutOfBounds)?;
        let tags = validate_tags(tags)?;
        let image = image
            .filter(|i| !i.as_str().trim().is_empty())
            .ok_or(GunasoError::MissingImage)?;
        let description = description.trim();
        if description.is_empty() {
            return Err(GunasoError::InvalidInput("description is required".into()));
        }
        if !location.is_valid() {
            return Err(GunasoError::InvalidInput("coordinates out of range".into()));
        }

        let complaint = self
            .complaints
            .insert_complaint(&NewComplaint {
                user_id,
                ward_id,
                description: description.to_string(),
                tags,
                image,
                location,
            })
            .await?;

        info!(
            complaint_id = %complaint.id,
            user_id = %user_id,
            ward_id,
            "Complaint filed"
        );
        Ok(complaint)
    }

    pub async fn support_existing(&self, user_id: UserId, id: ComplaintId) -> Result<Supporter> {
        match self.complaints.add_supporter(id, user_id).await? {
            SupportInsert::Added(supporter) => {
                info!(complaint_id = %id, user_id = %user_id, "Supporter added");
                Ok(supporter)
            }
            SupportInsert::AlreadySupporting => {
                debug!(complaint_id = %id, user_id = %user_id, "Duplicate support rejected");
                Err(GunasoError::DuplicateSupport(id))
            }
            SupportInsert::MissingComplaint => Err(GunasoError::not_found(format!("complaint {id}"))),
        }
    }

    /// Withdraw `user_id` from the complaint. An owner hands the complaint to
    /// the earliest remaining supporter; the last supporter deletes it and
    /// its image.
    pub async fn delete(&self, user_id: UserId, id: ComplaintId) -> Result<DeletionOutcome> {
        match self.complaints.withdraw(id, user_id).await? {
            Withdrawal::OwnershipTransferred { new_owner } => {
                info!(complaint_id = %id, from = %user_id, to = %new_owner, "Ownership transferred");
                Ok(DeletionOutcome::OwnershipTransferred { new_owner })
            }
            Withdrawal::ComplaintDeleted { image } => {
                info!(complaint_id = %id, user_id = %user_id, "Complaint deleted");
                let orphaned_image = match self.images.delete(&image).await {
                    Ok(()) => None,
                    Err(e) => {
                        error!(
                            complaint_id = %id,
                            image = %image,
                            error = %e,
                            "Failed to release image of deleted complaint; it is now orphaned"
                        );
                        Some(image)
                    }
                };
                Ok(DeletionOutcome::ComplaintDeleted { orphaned_image })
            }
            Withdrawal::SupportRemoved => {
                info!(complaint_id = %id, user_id = %user_id, "Support withdrawn");
                Ok(DeletionOutcome::SupportWithdrawn)
            }
            Withdrawal::NotParticipant => Err(GunasoError::unauthorized(
                "only the owner or a supporter may delete",
            )),
            Withdrawal::MissingComplaint => Err(GunasoError::not_found(format!("complaint {id}"))),
        }
    }

    /// Set any status except on a resolved complaint. Ward admins act on
    /// their own ward's complaints until escalation; municipality admins act
    /// on escalated ones.
    pub async fn update_status(
        &self,
        admin: &Identity,
        id: ComplaintId,
        status: ComplaintStatus,
    ) -> Result<Complaint> {
        let complaint = self.existing(id).await?;
        if complaint.status.is_terminal() {
            return Err(GunasoError::AlreadyResolved(id));
        }
        authorize_status_change(admin, &complaint)?;

        // The store re-checks the escalation flag the authorization saw.
        match self
            .complaints
            .set_status(id, status, Utc::now(), complaint.escalated)
            .await?
        {
            StatusChange::Updated(updated) => {
                info!(
                    complaint_id = %id,
                    admin_id = %admin.user_id,
                    from = %complaint.status,
                    to = %status,
                    "Status updated"
                );
                Ok(updated)
            }
            StatusChange::AlreadyResolved => Err(GunasoError::AlreadyResolved(id)),
            StatusChange::EscalationChanged => {
                debug!(complaint_id = %id, admin_id = %admin.user_id, "Escalated while updating status");
                Err(GunasoError::unauthorized(
                    "escalated complaints are updated by the municipality",
                ))
            }
            StatusChange::MissingComplaint => {
                Err(GunasoError::not_found(format!("complaint {id}")))
            }
        }
    }

    /// Hand the complaint to the municipality. Only the ward admin of the
    /// complaint's ward may do this.
    pub async fn escalate(&self, admin: &Identity, id: ComplaintId) -> Result<Complaint> {
        let complaint = self.existing(id).await?;
        if admin.role != Role::WardAdmin || admin.ward_id != Some(complaint.ward_id) {
            debug!(complaint_id = %id, admin_id = %admin.user_id, "Escalation refused");
            return Err(GunasoError::unauthorized(
                "only the complaint's ward admin may escalate",
            ));
        }

        let escalated = self
            .complaints
            .set_escalated(id)
            .await?
            .ok_or_else(|| GunasoError::not_found(format!("complaint {id}")))?;
        info!(complaint_id = %id, admin_id = %admin.user_id, "Complaint escalated");
        Ok(escalated)
    }

    /// Record a 1 to 5 rating from the owner or a supporter of a resolved
    /// complaint. Returns the new aggregate.
    pub async fn rate(
        &self,
        user_id: UserId,
        id: ComplaintId,
        rating: i16,
        feedback: Option<&str>,
    ) -> Result<f64> {
        if !(1..=5).contains(&rating) {
            return Err(GunasoError::InvalidRating(rating));
        }
        let complaint = self.existing(id).await?;
        if complaint.status != ComplaintStatus::Resolved {
            return Err(GunasoError::NotResolved(id));
        }

        let feedback = feedback.map(str::trim).filter(|f| !f.is_empty());
        match self
            .complaints
            .record_rating(id, user_id, rating, feedback)
            .await?
        {
            RatingWrite::Recorded { aggregate } => {
                info!(complaint_id = %id, user_id = %user_id, rating, aggregate, "Rating recorded");
                Ok(aggregate)
            }
            RatingWrite::AlreadyRated => Err(GunasoError::AlreadyRated(id)),
            RatingWrite::NotSupporter => Err(GunasoError::unauthorized(
                "only the owner or a supporter may rate",
            )),
        }
    }

    // --- Reads ---

    pub async fn complaint_detail(&self, id: ComplaintId) -> Result<ComplaintDetail> {
        let complaint = self.existing(id).await?;
        let supporters = self.complaints.supporters(id).await?;
        Ok(ComplaintDetail {
            complaint,
            supporters,
        })
    }

    pub async fn list_complaints(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>> {
        if filter.limit == 0 {
            return Err(GunasoError::InvalidInput("limit must be positive".into()));
        }
        Ok(self.complaints.list(filter).await?)
    }

    /// Complaints `subject` supports, with their own rating and feedback.
    /// `None` means the viewer's own history; only admins may read another
    /// user's.
    pub async fn supported_complaints(
        &self,
        viewer: &Identity,
        subject: Option<UserId>,
        filter: &SupportedFilter,
    ) -> Result<Vec<SupportedComplaint>> {
        let subject = subject.unwrap_or(viewer.user_id);
        if subject != viewer.user_id && viewer.role == Role::Citizen {
            return Err(GunasoError::unauthorized(
                "citizens may only read their own complaints",
            ));
        }
        if filter.limit == 0 {
            return Err(GunasoError::InvalidInput("limit must be positive".into()));
        }
        Ok(self.complaints.supported_by(subject, filter).await?)
    }

    /// One complaint with `user_id`'s own rating. `None` unless they support it.
    pub async fn supported_complaint(
        &self,
        user_id: UserId,
        id: ComplaintId,
    ) -> Result<Option<SupportedComplaint>> {
        Ok(self.complaints.supported_complaint(id, user_id).await?)
    }

    pub async fn status_counts(&self, ward: Option<WardId>) -> Result<StatusCounts> {
        Ok(self.complaints.status_counts(ward).await?)
    }
}

fn authorize_status_change(admin: &Identity, complaint: &Complaint) -> Result<()> {
    let allowed = match admin.role {
        Role::WardAdmin => !complaint.escalated && admin.ward_id == Some(complaint.ward_id),
        Role::MunicipalityAdmin => complaint.escalated,
        Role::Citizen => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(GunasoError::unauthorized(if complaint.escalated {
            "escalated complaints are updated by the municipality"
        } else {
            "only the complaint's ward admin may update its status"
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn complaint(ward_id: WardId, escalated: bool) -> Complaint {
        Complaint {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            ward_id,
            description: "Pothole".into(),
            tags: vec!["potholes".into()],
            image: ImageRef::new("img"),
            location: GeoPoint::new(27.7, 85.3),
            status: ComplaintStatus::Registered,
            rating: None,
            submitted_at: Utc::now(),
            resolved_at: None,
            escalated,
        }
    }

    #[test]
    fn ward_admin_needs_matching_ward() {
        let c = complaint(3, false);
        assert!(authorize_status_change(&Identity::ward_admin(Uuid::new_v4(), 3), &c).is_ok());
        assert!(authorize_status_change(&Identity::ward_admin(Uuid::new_v4(), 4), &c).is_err());
        assert!(authorize_status_change(&Identity::municipality_admin(Uuid::new_v4()), &c).is_err());
    }

    #[test]
    fn escalation_moves_authority_to_municipality() {
        let c = complaint(3, true);
        assert!(authorize_status_change(&Identity::ward_admin(Uuid::new_v4(), 3), &c).is_err());
        assert!(authorize_status_change(&Identity::municipality_admin(Uuid::new_v4()), &c).is_ok());
    }

    #[test]
    fn citizens_never_change_status() {
        let c = complaint(3, false);
        let err = authorize_status_change(&Identity::citizen(Uuid::new_v4()), &c).unwrap_err();
        assert!(matches!(err, GunasoError::Unauthorized(_)));
    }
}
