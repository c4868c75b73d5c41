// In-memory stores for tests.
//
// Three stand-ins matching the storage seams:
// - MemoryStore (WardStore + ComplaintStore): stateful, one interior Mutex,
//   can fail its next few writes
// - MemoryScratchStore (ScratchStore): expiry on tokio's clock, so
//   `tokio::time::pause`/`advance` drive TTLs
// - MemoryImageStore (ImageStore): records deletions, can be told to fail

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use gunaso_common::geo::{BoundingBox, WardGeometry};
use gunaso_common::{
    mean_of_aggregates, mean_rating, AreaScope, Complaint, ComplaintFilter, ComplaintId,
    ComplaintStatus, ImageRef, NewComplaint, Palika, PalikaId, RatingSummary, SortOrder,
    StatusCounts, SupportedComplaint, SupportedFilter, Supporter, UserId, Ward, WardId,
};

use crate::traits::{
    ComplaintStore, ImageStore, RatingWrite, ScratchStore, StatusChange, SupportInsert, WardStore,
    Withdrawal,
};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Wards, complaints and supporters held in memory.
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
    failing_writes: AtomicUsize,
}

#[derive(Default)]
struct MemoryStoreInner {
    palikas: Vec<Palika>,
    wards: Vec<Ward>,
    complaints: HashMap<ComplaintId, Complaint>,
    supporters: Vec<Supporter>,
    last_stamp: Option<DateTime<Utc>>,
}

impl MemoryStoreInner {
    /// Strictly increasing timestamps so supporter order is deterministic.
    fn stamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_stamp {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.last_stamp = Some(next);
        next
    }

    fn supporters_of(&self, id: ComplaintId) -> Vec<Supporter> {
        let mut list: Vec<Supporter> = self
            .supporters
            .iter()
            .filter(|s| s.complaint_id == id)
            .cloned()
            .collect();
        list.sort_by(|a, b| {
            a.supported_at
                .cmp(&b.supported_at)
                .then(a.user_id.cmp(&b.user_id))
        });
        list
    }

    fn palika_of(&self, ward_id: WardId) -> Option<PalikaId> {
        self.wards
            .iter()
            .find(|w| w.id == ward_id)
            .and_then(|w| w.palika_id)
    }

    fn as_seen_by(&self, supporter: &Supporter) -> Option<SupportedComplaint> {
        let complaint = self.complaints.get(&supporter.complaint_id)?;
        Some(SupportedComplaint {
            complaint: complaint.clone(),
            own_rating: supporter.rating,
            own_feedback: supporter.feedback.clone(),
            supported_at: supporter.supported_at,
        })
    }

    fn in_scope(&self, complaint: &Complaint, scope: AreaScope) -> bool {
        match scope {
            AreaScope::Ward(ward_id) => complaint.ward_id == ward_id,
            AreaScope::Palika(palika_id) => self.palika_of(complaint.ward_id) == Some(palika_id),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner::default()),
            failing_writes: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` complaint writes fail as if the database were down.
    pub fn fail_next_writes(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<()> {
        let failing = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            bail!("complaint store unavailable");
        }
        Ok(())
    }

    /// Seed a ward directly, bypassing palika bookkeeping.
    pub fn with_ward(self, ward: Ward) -> Self {
        self.inner.lock().unwrap().wards.push(ward);
        self
    }

    /// Overwrite a stored complaint, e.g. to backdate or pre-resolve it.
    pub fn put_complaint(&self, complaint: Complaint) {
        self.inner
            .lock()
            .unwrap()
            .complaints
            .insert(complaint.id, complaint);
    }

    pub fn complaint_count(&self) -> usize {
        self.inner.lock().unwrap().complaints.len()
    }

    pub fn palikas(&self) -> Vec<Palika> {
        self.inner.lock().unwrap().palikas.clone()
    }
}

#[async_trait]
impl WardStore for MemoryStore {
    async fn load_wards(&self) -> Result<Vec<Ward>> {
        let mut wards = self.inner.lock().unwrap().wards.clone();
        wards.sort_by_key(|w| w.id);
        Ok(wards)
    }

    async fn upsert_palika(
        &self,
        name: &str,
        kind: &str,
        province: Option<&str>,
    ) -> Result<PalikaId> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.palikas.iter_mut().find(|p| p.name == name) {
            existing.kind = kind.to_string();
            if let Some(province) = province {
                existing.province = Some(province.to_string());
            }
            return Ok(existing.id);
        }
        let id = inner.palikas.len() as PalikaId + 1;
        inner.palikas.push(Palika {
            id,
            name: name.to_string(),
            kind: kind.to_string(),
            province: province.map(str::to_string),
        });
        Ok(id)
    }

    async fn upsert_ward(
        &self,
        name: &str,
        palika_id: Option<PalikaId>,
        geometry: &WardGeometry,
    ) -> Result<WardId> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .wards
            .iter_mut()
            .find(|w| w.name == name && w.palika_id == palika_id)
        {
            existing.geometry = geometry.clone();
            return Ok(existing.id);
        }
        let id = inner.wards.iter().map(|w| w.id).max().unwrap_or(0) + 1;
        inner.wards.push(Ward {
            id,
            name: name.to_string(),
            palika_id,
            geometry: geometry.clone(),
        });
        Ok(id)
    }
}

#[async_trait]
impl ComplaintStore for MemoryStore {
    async fn insert_complaint(&self, new: &NewComplaint) -> Result<Complaint> {
        self.check_write()?;
        let mut inner = self.inner.lock().unwrap();
        if inner.complaints.values().any(|c| c.image == new.image) {
            bail!("image {} already attached to a complaint", new.image);
        }
        let at = inner.stamp();
        let complaint = Complaint {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            ward_id: new.ward_id,
            description: new.description.clone(),
            tags: new.tags.clone(),
            image: new.image.clone(),
            location: new.location,
            status: ComplaintStatus::Registered,
            rating: None,
            submitted_at: at,
            resolved_at: None,
            escalated: false,
        };
        inner.complaints.insert(complaint.id, complaint.clone());
        inner.supporters.push(Supporter {
            complaint_id: complaint.id,
            user_id: new.user_id,
            rating: None,
            feedback: None,
            supported_at: at,
        });
        Ok(complaint)
    }

    async fn add_supporter(&self, id: ComplaintId, user: UserId) -> Result<SupportInsert> {
        self.check_write()?;
        let mut inner = self.inner.lock().unwrap();
        if !inner.complaints.contains_key(&id) {
            return Ok(SupportInsert::MissingComplaint);
        }
        if inner
            .supporters
            .iter()
            .any(|s| s.complaint_id == id && s.user_id == user)
        {
            return Ok(SupportInsert::AlreadySupporting);
        }
        let supporter = Supporter {
            complaint_id: id,
            user_id: user,
            rating: None,
            feedback: None,
            supported_at: inner.stamp(),
        };
        inner.supporters.push(supporter.clone());
        Ok(SupportInsert::Added(supporter))
    }

    async fn withdraw(&self, id: ComplaintId, user: UserId) -> Result<Withdrawal> {
        self.check_write()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(complaint) = inner.complaints.get(&id) else {
            return Ok(Withdrawal::MissingComplaint);
        };
        let owner = complaint.user_id;
        let image = complaint.image.clone();
        let supporters = inner.supporters_of(id);

        if owner == user {
            match supporters.iter().find(|s| s.user_id != user) {
                Some(next) => {
                    let new_owner = next.user_id;
                    if let Some(c) = inner.complaints.get_mut(&id) {
                        c.user_id = new_owner;
                    }
                    inner
                        .supporters
                        .retain(|s| !(s.complaint_id == id && s.user_id == user));
                    Ok(Withdrawal::OwnershipTransferred { new_owner })
                }
                None => {
                    inner.complaints.remove(&id);
                    inner.supporters.retain(|s| s.complaint_id != id);
                    Ok(Withdrawal::ComplaintDeleted { image })
                }
            }
        } else if supporters.iter().any(|s| s.user_id == user) {
            inner
                .supporters
                .retain(|s| !(s.complaint_id == id && s.user_id == user));
            Ok(Withdrawal::SupportRemoved)
        } else {
            Ok(Withdrawal::NotParticipant)
        }
    }

    async fn set_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        at: DateTime<Utc>,
        escalated: bool,
    ) -> Result<StatusChange> {
        self.check_write()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(complaint) = inner.complaints.get_mut(&id) else {
            return Ok(StatusChange::MissingComplaint);
        };
        if complaint.status.is_terminal() {
            return Ok(StatusChange::AlreadyResolved);
        }
        if complaint.escalated != escalated {
            return Ok(StatusChange::EscalationChanged);
        }
        complaint.status = status;
        if status.is_terminal() {
            complaint.resolved_at = Some(at);
        }
        Ok(StatusChange::Updated(complaint.clone()))
    }

    async fn set_escalated(&self, id: ComplaintId) -> Result<Option<Complaint>> {
        self.check_write()?;
        let mut inner = self.inner.lock().unwrap();
        Ok(inner.complaints.get_mut(&id).map(|c| {
            c.escalated = true;
            c.clone()
        }))
    }

    async fn record_rating(
        &self,
        id: ComplaintId,
        user: UserId,
        rating: i16,
        feedback: Option<&str>,
    ) -> Result<RatingWrite> {
        self.check_write()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(supporter) = inner
            .supporters
            .iter_mut()
            .find(|s| s.complaint_id == id && s.user_id == user)
        else {
            return Ok(RatingWrite::NotSupporter);
        };
        if supporter.rating.is_some() {
            return Ok(RatingWrite::AlreadyRated);
        }
        supporter.rating = Some(rating);
        supporter.feedback = feedback.map(str::to_string);

        let Some(aggregate) = mean_rating(
            inner
                .supporters
                .iter()
                .filter(|s| s.complaint_id == id)
                .filter_map(|s| s.rating),
        ) else {
            bail!("complaint {id} has no aggregate after rating");
        };
        if let Some(c) = inner.complaints.get_mut(&id) {
            c.rating = Some(aggregate);
        }
        Ok(RatingWrite::Recorded { aggregate })
    }

    async fn complaint(&self, id: ComplaintId) -> Result<Option<Complaint>> {
        Ok(self.inner.lock().unwrap().complaints.get(&id).cloned())
    }

    async fn supporters(&self, id: ComplaintId) -> Result<Vec<Supporter>> {
        Ok(self.inner.lock().unwrap().supporters_of(id))
    }

    async fn nearby(&self, bbox: &BoundingBox, tags: &[String]) -> Result<Vec<Complaint>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .complaints
            .values()
            .filter(|c| bbox.contains(c.location) && c.shares_tag_with(tags))
            .cloned()
            .collect())
    }

    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<Complaint> = inner
            .complaints
            .values()
            .filter(|c| inner.in_scope(c, filter.scope))
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .filter(|c| filter.tags.is_empty() || c.shares_tag_with(&filter.tags))
            .filter(|c| filter.submitted_after.map_or(true, |t| c.submitted_at >= t))
            .filter(|c| filter.submitted_before.map_or(true, |t| c.submitted_at <= t))
            .cloned()
            .collect();

        let by_resolution = filter.sorts_by_resolution();
        matching.sort_by(|a, b| {
            let ord = if by_resolution {
                a.resolved_at.cmp(&b.resolved_at)
            } else {
                a.submitted_at.cmp(&b.submitted_at)
            };
            let ord = match filter.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });

        Ok(matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn supported_by(
        &self,
        user: UserId,
        filter: &SupportedFilter,
    ) -> Result<Vec<SupportedComplaint>> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<SupportedComplaint> = inner
            .supporters
            .iter()
            .filter(|s| s.user_id == user)
            .filter_map(|s| inner.as_seen_by(s))
            .filter(|sc| filter.status.map_or(true, |st| sc.complaint.status == st))
            .collect();

        let by_resolution = filter.sorts_by_resolution();
        matching.sort_by(|a, b| {
            let (a, b) = (&a.complaint, &b.complaint);
            let ord = if by_resolution {
                a.resolved_at.cmp(&b.resolved_at)
            } else {
                a.submitted_at.cmp(&b.submitted_at)
            };
            let ord = match filter.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });

        Ok(matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit as usize)
            .collect())
    }

    async fn supported_complaint(
        &self,
        id: ComplaintId,
        user: UserId,
    ) -> Result<Option<SupportedComplaint>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .supporters
            .iter()
            .find(|s| s.complaint_id == id && s.user_id == user)
            .and_then(|s| inner.as_seen_by(s)))
    }

    async fn status_counts(&self, ward: Option<WardId>) -> Result<StatusCounts> {
        let inner = self.inner.lock().unwrap();
        let mut counts = StatusCounts::default();
        for complaint in inner.complaints.values() {
            if ward.map_or(true, |w| complaint.ward_id == w) {
                counts.record(complaint.status, 1);
            }
        }
        Ok(counts)
    }

    async fn rating_summary(&self, id: ComplaintId) -> Result<RatingSummary> {
        let inner = self.inner.lock().unwrap();
        let ratings: Vec<i16> = inner
            .supporters
            .iter()
            .filter(|s| s.complaint_id == id)
            .filter_map(|s| s.rating)
            .collect();
        Ok(RatingSummary {
            total: ratings.len() as u64,
            average: mean_rating(ratings),
        })
    }

    async fn ward_ratings(&self) -> Result<Vec<(WardId, f64)>> {
        let inner = self.inner.lock().unwrap();
        let mut by_ward: HashMap<WardId, Vec<f64>> = HashMap::new();
        for complaint in inner.complaints.values() {
            if let Some(rating) = complaint.rating {
                by_ward.entry(complaint.ward_id).or_default().push(rating);
            }
        }
        let mut out: Vec<(WardId, f64)> = by_ward
            .into_iter()
            .filter_map(|(ward, ratings)| mean_of_aggregates(ratings).map(|avg| (ward, avg)))
            .collect();
        out.sort_by_key(|(ward, _)| *ward);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// MemoryScratchStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryScratchStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryScratchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw entry count, expired entries included.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn live(entry: &(String, Instant)) -> bool {
    entry.1 > Instant::now()
}

#[async_trait]
impl ScratchStore for MemoryScratchStore {
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        let previous = entries
            .insert(key.to_string(), (value, Instant::now() + ttl))
            .filter(live)
            .map(|(v, _)| v);
        Ok(previous)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.get(key).filter(|e| live(e)).map(|(v, _)| v.clone()))
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap();
        Ok(entries.remove(key).filter(live).map(|(v, _)| v))
    }

    async fn purge_expired(&self) -> Result<Vec<(String, String)>> {
        let mut entries = self.entries.lock().unwrap();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !live(e))
            .map(|(k, _)| k.clone())
            .collect();
        Ok(expired
            .into_iter()
            .filter_map(|k| entries.remove(&k).map(|(v, _)| (k, v)))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryImageStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryImageStore {
    inner: Mutex<MemoryImageInner>,
    fail_deletes: AtomicBool,
}

#[derive(Default)]
struct MemoryImageInner {
    stored: HashSet<ImageRef>,
    deletions: Vec<ImageRef>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image as if it had been uploaded.
    pub fn insert(&self, image: &ImageRef) {
        self.inner.lock().unwrap().stored.insert(image.clone());
    }

    pub fn contains(&self, image: &ImageRef) -> bool {
        self.inner.lock().unwrap().stored.contains(image)
    }

    /// Every delete call that succeeded, in order.
    pub fn deletions(&self) -> Vec<ImageRef> {
        self.inner.lock().unwrap().deletions.clone()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn store(&self, bytes: Vec<u8>) -> Result<ImageRef> {
        if bytes.is_empty() {
            bail!("refusing to store an empty image");
        }
        let image = ImageRef::new(format!("img-{}", Uuid::new_v4()));
        self.insert(&image);
        Ok(image)
    }

    async fn delete(&self, image: &ImageRef) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("image store unavailable");
        }
        let mut inner = self.inner.lock().unwrap();
        inner.stored.remove(image);
        inner.deletions.push(image.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gunaso_common::GeoPoint;

    fn new_complaint(user: UserId, image: &str) -> NewComplaint {
        NewComplaint {
            user_id: user,
            ward_id: 1,
            description: "Overflowing bins".into(),
            tags: vec!["garbage".into()],
            image: ImageRef::new(image),
            location: GeoPoint::new(27.7, 85.3),
        }
    }

    #[tokio::test]
    async fn duplicate_support_is_reported_not_inserted() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let c = store.insert_complaint(&new_complaint(owner, "a")).await.unwrap();

        let other = Uuid::new_v4();
        assert!(matches!(
            store.add_supporter(c.id, other).await.unwrap(),
            SupportInsert::Added(_)
        ));
        assert_eq!(
            store.add_supporter(c.id, other).await.unwrap(),
            SupportInsert::AlreadySupporting
        );
        assert_eq!(store.supporters(c.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn owner_withdrawal_hands_over_to_earliest_supporter() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let c = store.insert_complaint(&new_complaint(owner, "a")).await.unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.add_supporter(c.id, first).await.unwrap();
        store.add_supporter(c.id, second).await.unwrap();

        assert_eq!(
            store.withdraw(c.id, owner).await.unwrap(),
            Withdrawal::OwnershipTransferred { new_owner: first }
        );
        assert_eq!(store.complaint(c.id).await.unwrap().unwrap().user_id, first);
    }

    #[tokio::test]
    async fn second_rating_is_refused() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let c = store.insert_complaint(&new_complaint(owner, "a")).await.unwrap();

        assert_eq!(
            store.record_rating(c.id, owner, 4, None).await.unwrap(),
            RatingWrite::Recorded { aggregate: 4.0 }
        );
        assert_eq!(
            store.record_rating(c.id, owner, 5, None).await.unwrap(),
            RatingWrite::AlreadyRated
        );
    }

    #[tokio::test]
    async fn stale_escalation_flag_blocks_status_change() {
        let store = MemoryStore::new();
        let c = store
            .insert_complaint(&new_complaint(Uuid::new_v4(), "a"))
            .await
            .unwrap();
        store.set_escalated(c.id).await.unwrap();

        assert_eq!(
            store
                .set_status(c.id, ComplaintStatus::Assigned, Utc::now(), false)
                .await
                .unwrap(),
            StatusChange::EscalationChanged
        );
        assert!(matches!(
            store
                .set_status(c.id, ComplaintStatus::Assigned, Utc::now(), true)
                .await
                .unwrap(),
            StatusChange::Updated(_)
        ));
    }

    #[tokio::test]
    async fn failed_writes_leave_no_trace() {
        let store = MemoryStore::new();
        store.fail_next_writes(1);
        assert!(store
            .insert_complaint(&new_complaint(Uuid::new_v4(), "a"))
            .await
            .is_err());
        assert_eq!(store.complaint_count(), 0);

        store
            .insert_complaint(&new_complaint(Uuid::new_v4(), "a"))
            .await
            .unwrap();
        assert_eq!(store.complaint_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn scratch_entries_expire() {
        let scratch = MemoryScratchStore::new();
        scratch
            .put("k", "v".into(), Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(scratch.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(scratch.get("k").await.unwrap(), None);
        assert_eq!(scratch.take("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_returns_only_expired_entries() {
        let scratch = MemoryScratchStore::new();
        scratch
            .put("short", "a".into(), Duration::from_secs(10))
            .await
            .unwrap();
        scratch
            .put("long", "b".into(), Duration::from_secs(600))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(
            scratch.purge_expired().await.unwrap(),
            vec![("short".to_string(), "a".to_string())]
        );
        assert_eq!(scratch.len(), 1);
        assert!(scratch.purge_expired().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_image_store_keeps_the_image() {
        let images = MemoryImageStore::new();
        let image = images.store(vec![1, 2, 3]).await.unwrap();
        images.fail_deletes(true);
        assert!(images.delete(&image).await.is_err());
        assert!(images.contains(&image));
        assert!(images.deletions().is_empty());
    }
}
