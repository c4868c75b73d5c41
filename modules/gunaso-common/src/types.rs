use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GunasoError;
use crate::geo::WardGeometry;

pub type UserId = Uuid;
pub type ComplaintId = Uuid;
pub type WardId = i64;
pub type PalikaId = i64;

// --- Geo Types ---

/// A WGS84 coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Opaque handle returned by the image store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// --- Identity ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    WardAdmin,
    MunicipalityAdmin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Citizen => write!(f, "citizen"),
            Role::WardAdmin => write!(f, "ward_admin"),
            Role::MunicipalityAdmin => write!(f, "municipality_admin"),
        }
    }
}

/// Authenticated caller, as handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
    pub ward_id: Option<WardId>,
}

impl Identity {
    pub fn citizen(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Citizen,
            ward_id: None,
        }
    }

    pub fn ward_admin(user_id: UserId, ward_id: WardId) -> Self {
        Self {
            user_id,
            role: Role::WardAdmin,
            ward_id: Some(ward_id),
        }
    }

    pub fn municipality_admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::MunicipalityAdmin,
            ward_id: None,
        }
    }
}

// --- Complaint status ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ComplaintStatus {
    Registered,
    UnderReview,
    Assigned,
    InProgress,
    Resolved,
}

impl ComplaintStatus {
    pub const ALL: [ComplaintStatus; 5] = [
        ComplaintStatus::Registered,
        ComplaintStatus::UnderReview,
        ComplaintStatus::Assigned,
        ComplaintStatus::InProgress,
        ComplaintStatus::Resolved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplaintStatus::Registered => "registered",
            ComplaintStatus::UnderReview => "under_review",
            ComplaintStatus::Assigned => "assigned",
            ComplaintStatus::InProgress => "in_progress",
            ComplaintStatus::Resolved => "resolved",
        }
    }

    /// `resolved` admits no further status change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ComplaintStatus::Resolved)
    }

    /// Statuses that count as "being worked on" in dashboard counts.
    pub fn is_active_work(&self) -> bool {
        matches!(
            self,
            ComplaintStatus::UnderReview | ComplaintStatus::Assigned | ComplaintStatus::InProgress
        )
    }
}

impl std::fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ComplaintStatus {
    type Err = GunasoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComplaintStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| GunasoError::InvalidStatus(s.to_string()))
    }
}

// --- Wards ---

/// Parent administrative area (municipality) grouping wards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Palika {
    pub id: PalikaId,
    pub name: String,
    pub kind: String,
    pub province: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ward {
    pub id: WardId,
    pub name: String,
    pub palika_id: Option<PalikaId>,
    pub geometry: WardGeometry,
}

// --- Complaints ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Complaint {
    pub id: ComplaintId,
    /// Current owner. Starts as the filer, moves on ownership transfer.
    pub user_id: UserId,
    pub ward_id: WardId,
    pub description: String,
    pub tags: Vec<String>,
    pub image: ImageRef,
    pub location: GeoPoint,
    pub status: ComplaintStatus,
    pub rating: Option<f64>,
    pub submitted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub escalated: bool,
}

impl Complaint {
    pub fn shares_tag_with(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Supporter {
    pub complaint_id: ComplaintId,
    pub user_id: UserId,
    pub rating: Option<i16>,
    pub feedback: Option<String>,
    pub supported_at: DateTime<Utc>,
}

/// Validated input for inserting a complaint and its first supporter.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComplaint {
    pub user_id: UserId,
    pub ward_id: WardId,
    pub description: String,
    pub tags: Vec<String>,
    pub image: ImageRef,
    pub location: GeoPoint,
}

/// A complaint as one of its supporters sees it, with their own rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SupportedComplaint {
    pub complaint: Complaint,
    pub own_rating: Option<i16>,
    pub own_feedback: Option<String>,
    pub supported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplaintDetail {
    pub complaint: Complaint,
    pub supporters: Vec<Supporter>,
}

// --- Listing ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Where a listing is scoped: one ward, or every ward of a palika.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AreaScope {
    Ward(WardId),
    Palika(PalikaId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplaintFilter {
    pub scope: AreaScope,
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub submitted_after: Option<DateTime<Utc>>,
    #[serde(default)]
    pub submitted_before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    10
}

impl ComplaintFilter {
    pub fn for_scope(scope: AreaScope) -> Self {
        Self {
            scope,
            status: None,
            tags: Vec::new(),
            submitted_after: None,
            submitted_before: None,
            order: SortOrder::default(),
            page: default_page(),
            limit: default_limit(),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }

    /// Resolved listings sort by resolution time, everything else by filing time.
    pub fn sorts_by_resolution(&self) -> bool {
        self.status == Some(ComplaintStatus::Resolved)
    }
}

/// Paging over the complaints one user supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SupportedFilter {
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for SupportedFilter {
    fn default() -> Self {
        Self {
            status: None,
            order: SortOrder::default(),
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl SupportedFilter {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.limit)
    }

    pub fn sorts_by_resolution(&self) -> bool {
        self.status == Some(ComplaintStatus::Resolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct StatusCounts {
    pub total: u64,
    pub registered: u64,
    pub in_progress: u64,
    pub resolved: u64,
}

impl StatusCounts {
    pub fn record(&mut self, status: ComplaintStatus, count: u64) {
        self.total += count;
        if status == ComplaintStatus::Registered {
            self.registered += count;
        } else if status.is_active_work() {
            self.in_progress += count;
        } else if status.is_terminal() {
            self.resolved += count;
        }
    }
}

// --- Ratings ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub total: u64,
}

/// Mean of 1 to 5 ratings rounded half-up to two decimals, `None` when empty.
///
/// Works on the integer sum so it agrees with `ROUND(AVG(rating), 2)` in
/// Postgres.
pub fn mean_rating<I>(ratings: I) -> Option<f64>
where
    I: IntoIterator<Item = i16>,
{
    let (sum, count) = ratings
        .into_iter()
        .fold((0i64, 0i64), |(sum, count), r| (sum + i64::from(r), count + 1));
    mean_in_cents(sum * 100, count)
}

/// Mean of two-decimal aggregates, rounded like [`mean_rating`].
pub fn mean_of_aggregates<I>(aggregates: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = aggregates
        .into_iter()
        .fold((0i64, 0i64), |(sum, count), a| {
            (sum + (a * 100.0).round() as i64, count + 1)
        });
    mean_in_cents(sum, count)
}

fn mean_in_cents(total_cents: i64, count: i64) -> Option<f64> {
    if count == 0 {
        return None;
    }
    // Ratings are positive, so half-up and half-away-from-zero agree.
    let cents = (2 * total_cents + count) / (2 * count);
    Some(cents as f64 / 100.0)
}
