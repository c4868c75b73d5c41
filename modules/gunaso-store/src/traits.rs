// Storage seams for the complaint core.
//
// WardStore and ComplaintStore are backed by Postgres in production
// (PgStore) and by MemoryStore in tests. ScratchStore is the expiring
// key-value store drafts and cached ratings live in. ImageStore is the
// external blob store; the core only ever releases images through it.
//
// Outcomes the store decides inside one transaction (duplicate supporter,
// owner withdrawal, rating already present) come back as enums rather than
// errors. `Err` always means the backing store itself failed.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gunaso_common::geo::{BoundingBox, WardGeometry};
use gunaso_common::{
    Complaint, ComplaintFilter, ComplaintId, ComplaintStatus, ImageRef, NewComplaint, PalikaId,
    RatingSummary, StatusCounts, SupportedComplaint, SupportedFilter, Supporter, UserId, Ward,
    WardId,
};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum SupportInsert {
    Added(Supporter),
    AlreadySupporting,
    MissingComplaint,
}

/// What happened when a user pulled out of a complaint.
#[derive(Debug, Clone, PartialEq)]
pub enum Withdrawal {
    /// Requester owned it; the earliest remaining supporter now does.
    OwnershipTransferred { new_owner: UserId },
    /// Requester was the last supporter; the complaint row is gone.
    ComplaintDeleted { image: ImageRef },
    /// Requester was a non-owning supporter.
    SupportRemoved,
    NotParticipant,
    MissingComplaint,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Updated(Complaint),
    AlreadyResolved,
    /// The escalation flag no longer matches the one the caller authorized against.
    EscalationChanged,
    MissingComplaint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingWrite {
    Recorded { aggregate: f64 },
    AlreadyRated,
    NotSupporter,
}

// ---------------------------------------------------------------------------
// WardStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait WardStore: Send + Sync {
    /// Every seeded ward with its outline.
    async fn load_wards(&self) -> Result<Vec<Ward>>;

    /// Insert a palika or refresh its kind/province. Returns its id.
    async fn upsert_palika(
        &self,
        name: &str,
        kind: &str,
        province: Option<&str>,
    ) -> Result<PalikaId>;

    /// Insert a ward, replacing the outline of an existing ward with the
    /// same name in the same palika.
    async fn upsert_ward(
        &self,
        name: &str,
        palika_id: Option<PalikaId>,
        geometry: &WardGeometry,
    ) -> Result<WardId>;
}

// ---------------------------------------------------------------------------
// ComplaintStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ComplaintStore: Send + Sync {
    // --- Writes (each one atomic) ---

    /// Insert the complaint with status `registered` and its filer as first supporter.
    async fn insert_complaint(&self, new: &NewComplaint) -> Result<Complaint>;

    /// Add a supporter unless the (complaint, user) pair already exists.
    async fn add_supporter(&self, id: ComplaintId, user: UserId) -> Result<SupportInsert>;

    /// Remove `user` from the complaint, transferring ownership or deleting
    /// the complaint as needed.
    async fn withdraw(&self, id: ComplaintId, user: UserId) -> Result<Withdrawal>;

    /// Set the status unless the complaint is already resolved or its
    /// escalation flag differs from `escalated`. `at` becomes `resolved_at`
    /// when moving into `resolved`.
    async fn set_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        at: DateTime<Utc>,
        escalated: bool,
    ) -> Result<StatusChange>;

    /// Flag the complaint as municipality responsibility. `None` if unknown.
    async fn set_escalated(&self, id: ComplaintId) -> Result<Option<Complaint>>;

    /// Store a supporter's first rating and recompute the complaint aggregate.
    async fn record_rating(
        &self,
        id: ComplaintId,
        user: UserId,
        rating: i16,
        feedback: Option<&str>,
    ) -> Result<RatingWrite>;

    // --- Reads ---

    async fn complaint(&self, id: ComplaintId) -> Result<Option<Complaint>>;

    /// Supporters ordered by `supported_at`, then user id.
    async fn supporters(&self, id: ComplaintId) -> Result<Vec<Supporter>>;

    /// Complaints inside `bbox` sharing at least one of `tags`. Callers apply
    /// the exact distance check.
    async fn nearby(&self, bbox: &BoundingBox, tags: &[String]) -> Result<Vec<Complaint>>;

    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>>;

    /// Complaints `user` supports, owned ones included, with their own rating.
    async fn supported_by(
        &self,
        user: UserId,
        filter: &SupportedFilter,
    ) -> Result<Vec<SupportedComplaint>>;

    /// One complaint as `user` sees it. `None` unless they support it.
    async fn supported_complaint(
        &self,
        id: ComplaintId,
        user: UserId,
    ) -> Result<Option<SupportedComplaint>>;

    async fn status_counts(&self, ward: Option<WardId>) -> Result<StatusCounts>;

    async fn rating_summary(&self, id: ComplaintId) -> Result<RatingSummary>;

    /// Mean aggregate rating per ward over rated complaints, two decimals.
    async fn ward_ratings(&self) -> Result<Vec<(WardId, f64)>>;
}

// ---------------------------------------------------------------------------
// ScratchStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ScratchStore: Send + Sync {
    /// Write `value` under `key` for `ttl`. Returns the unexpired value it replaced.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<Option<String>>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove and return the value if it has not expired.
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// Drop expired entries, returning their keys and values so owners can
    /// clean up after them.
    async fn purge_expired(&self) -> Result<Vec<(String, String)>>;
}

// ---------------------------------------------------------------------------
// ImageStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>) -> Result<ImageRef>;

    async fn delete(&self, image: &ImageRef) -> Result<()>;
}
