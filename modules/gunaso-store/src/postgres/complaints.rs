use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use gunaso_common::geo::BoundingBox;
use gunaso_common::{
    AreaScope, Complaint, ComplaintFilter, ComplaintId, ComplaintStatus, GeoPoint, ImageRef,
    NewComplaint, RatingSummary, SortOrder, StatusCounts, SupportedComplaint, SupportedFilter,
    Supporter, UserId, WardId,
};

use super::PgStore;
use crate::traits::{ComplaintStore, RatingWrite, StatusChange, SupportInsert, Withdrawal};

const COMPLAINT_COLUMNS: &str = "c.id, c.user_id, c.ward_id, c.description, c.tags, c.image_ref, \
     c.lat, c.lng, c.status, c.rating, c.submitted_at, c.resolved_at, c.escalated";

const SUPPORTER_COLUMNS: &str = "complaint_id, user_id, rating, feedback, supported_at";

#[derive(sqlx::FromRow)]
struct ComplaintRow {
    id: Uuid,
    user_id: Uuid,
    ward_id: i64,
    description: String,
    tags: Vec<String>,
    image_ref: String,
    lat: f64,
    lng: f64,
    status: String,
    rating: Option<f64>,
    submitted_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
    escalated: bool,
}

impl TryFrom<ComplaintRow> for Complaint {
    type Error = anyhow::Error;

    fn try_from(row: ComplaintRow) -> Result<Self> {
        let status = row
            .status
            .parse::<ComplaintStatus>()
            .map_err(|e| anyhow!("complaint {}: {e}", row.id))?;
        Ok(Complaint {
            id: row.id,
            user_id: row.user_id,
            ward_id: row.ward_id,
            description: row.description,
            tags: row.tags,
            image: ImageRef(row.image_ref),
            location: GeoPoint::new(row.lat, row.lng),
            status,
            rating: row.rating,
            submitted_at: row.submitted_at,
            resolved_at: row.resolved_at,
            escalated: row.escalated,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SupporterRow {
    complaint_id: Uuid,
    user_id: Uuid,
    rating: Option<i16>,
    feedback: Option<String>,
    supported_at: DateTime<Utc>,
}

impl From<SupporterRow> for Supporter {
    fn from(row: SupporterRow) -> Self {
        Supporter {
            complaint_id: row.complaint_id,
            user_id: row.user_id,
            rating: row.rating,
            feedback: row.feedback,
            supported_at: row.supported_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SupportedRow {
    #[sqlx(flatten)]
    complaint: ComplaintRow,
    own_rating: Option<i16>,
    own_feedback: Option<String>,
    own_supported_at: DateTime<Utc>,
}

impl TryFrom<SupportedRow> for SupportedComplaint {
    type Error = anyhow::Error;

    fn try_from(row: SupportedRow) -> Result<Self> {
        Ok(SupportedComplaint {
            complaint: Complaint::try_from(row.complaint)?,
            own_rating: row.own_rating,
            own_feedback: row.own_feedback,
            supported_at: row.own_supported_at,
        })
    }
}

const SUPPORTED_FROM: &str = "s.rating AS own_rating, s.feedback AS own_feedback, \
     s.supported_at AS own_supported_at \
     FROM complaints c JOIN complaint_supporters s ON s.complaint_id = c.id";

fn into_complaints(rows: Vec<ComplaintRow>) -> Result<Vec<Complaint>> {
    rows.into_iter().map(Complaint::try_from).collect()
}

impl PgStore {
    async fn complaint_exists(&self, id: ComplaintId) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM complaints WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl ComplaintStore for PgStore {
    async fn insert_complaint(&self, new: &NewComplaint) -> Result<Complaint> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ComplaintRow>(&format!(
            r#"
            INSERT INTO complaints AS c (id, user_id, ward_id, description, tags, image_ref, lat, lng)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COMPLAINT_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.ward_id)
        .bind(&new.description)
        .bind(&new.tags)
        .bind(new.image.as_str())
        .bind(new.location.lat)
        .bind(new.location.lng)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO complaint_supporters (complaint_id, user_id) VALUES ($1, $2)")
            .bind(row.id)
            .bind(new.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Complaint::try_from(row)
    }

    async fn add_supporter(&self, id: ComplaintId, user: UserId) -> Result<SupportInsert> {
        // The composite key decides; no read-then-insert race.
        let inserted = sqlx::query_as::<_, SupporterRow>(&format!(
            r#"
            INSERT INTO complaint_supporters (complaint_id, user_id)
            SELECT id, $2 FROM complaints WHERE id = $1
            ON CONFLICT (complaint_id, user_id) DO NOTHING
            RETURNING {SUPPORTER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => Ok(SupportInsert::Added(row.into())),
            None if self.complaint_exists(id).await? => Ok(SupportInsert::AlreadySupporting),
            None => Ok(SupportInsert::MissingComplaint),
        }
    }

    async fn withdraw(&self, id: ComplaintId, user: UserId) -> Result<Withdrawal> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT user_id, image_ref FROM complaints WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((owner, image_ref)) = locked else {
            return Ok(Withdrawal::MissingComplaint);
        };

        let supporters = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id FROM complaint_supporters
            WHERE complaint_id = $1
            ORDER BY supported_at ASC, user_id ASC
            "#,
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let outcome = if owner == user {
            match supporters.iter().find(|s| **s != user) {
                Some(&new_owner) => {
                    sqlx::query("UPDATE complaints SET user_id = $2 WHERE id = $1")
                        .bind(id)
                        .bind(new_owner)
                        .execute(&mut *tx)
                        .await?;
                    sqlx::query(
                        "DELETE FROM complaint_supporters WHERE complaint_id = $1 AND user_id = $2",
                    )
                    .bind(id)
                    .bind(user)
                    .execute(&mut *tx)
                    .await?;
                    Withdrawal::OwnershipTransferred { new_owner }
                }
                None => {
                    // Supporter rows go with the complaint (ON DELETE CASCADE).
                    sqlx::query("DELETE FROM complaints WHERE id = $1")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    Withdrawal::ComplaintDeleted {
                        image: ImageRef(image_ref),
                    }
                }
            }
        } else if supporters.contains(&user) {
            sqlx::query("DELETE FROM complaint_supporters WHERE complaint_id = $1 AND user_id = $2")
                .bind(id)
                .bind(user)
                .execute(&mut *tx)
                .await?;
            Withdrawal::SupportRemoved
        } else {
            return Ok(Withdrawal::NotParticipant);
        };

        tx.commit().await?;
        debug!(complaint_id = %id, user_id = %user, ?outcome, "Withdrawal committed");
        Ok(outcome)
    }

    async fn set_status(
        &self,
        id: ComplaintId,
        status: ComplaintStatus,
        at: DateTime<Utc>,
        escalated: bool,
    ) -> Result<StatusChange> {
        let row = sqlx::query_as::<_, ComplaintRow>(&format!(
            r#"
            UPDATE complaints AS c SET
              status = $2,
              resolved_at = CASE WHEN $2 = 'resolved' THEN $3 ELSE c.resolved_at END
            WHERE c.id = $1 AND c.status <> 'resolved' AND c.escalated = $4
            RETURNING {COMPLAINT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(at)
        .bind(escalated)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(StatusChange::Updated(Complaint::try_from(row)?));
        }
        Ok(match self.complaint(id).await? {
            None => StatusChange::MissingComplaint,
            Some(current) if current.status.is_terminal() => StatusChange::AlreadyResolved,
            Some(_) => {
                debug!(complaint_id = %id, "Escalation changed before status update");
                StatusChange::EscalationChanged
            }
        })
    }

    async fn set_escalated(&self, id: ComplaintId) -> Result<Option<Complaint>> {
        let row = sqlx::query_as::<_, ComplaintRow>(&format!(
            "UPDATE complaints AS c SET escalated = TRUE WHERE c.id = $1 RETURNING {COMPLAINT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Complaint::try_from).transpose()
    }

    async fn record_rating(
        &self,
        id: ComplaintId,
        user: UserId,
        rating: i16,
        feedback: Option<&str>,
    ) -> Result<RatingWrite> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE complaint_supporters SET rating = $3, feedback = $4
            WHERE complaint_id = $1 AND user_id = $2 AND rating IS NULL
            "#,
        )
        .bind(id)
        .bind(user)
        .bind(rating)
        .bind(feedback)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let is_supporter = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM complaint_supporters WHERE complaint_id = $1 AND user_id = $2)",
            )
            .bind(id)
            .bind(user)
            .fetch_one(&mut *tx)
            .await?;
            return Ok(if is_supporter {
                RatingWrite::AlreadyRated
            } else {
                RatingWrite::NotSupporter
            });
        }

        let aggregate = sqlx::query_scalar::<_, Option<f64>>(
            r#"
            UPDATE complaints SET rating = (
              SELECT ROUND(AVG(rating), 2)::float8
              FROM complaint_supporters
              WHERE complaint_id = $1 AND rating IS NOT NULL
            )
            WHERE id = $1
            RETURNING rating
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?
        .ok_or_else(|| anyhow!("complaint {id} has no aggregate after rating"))?;

        tx.commit().await?;
        Ok(RatingWrite::Recorded { aggregate })
    }

    async fn complaint(&self, id: ComplaintId) -> Result<Option<Complaint>> {
        let row = sqlx::query_as::<_, ComplaintRow>(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Complaint::try_from).transpose()
    }

    async fn supporters(&self, id: ComplaintId) -> Result<Vec<Supporter>> {
        let rows = sqlx::query_as::<_, SupporterRow>(&format!(
            r#"
            SELECT {SUPPORTER_COLUMNS} FROM complaint_supporters
            WHERE complaint_id = $1
            ORDER BY supported_at ASC, user_id ASC
            "#
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Supporter::from).collect())
    }

    async fn nearby(&self, bbox: &BoundingBox, tags: &[String]) -> Result<Vec<Complaint>> {
        let rows = sqlx::query_as::<_, ComplaintRow>(&format!(
            r#"
            SELECT {COMPLAINT_COLUMNS} FROM complaints c
            WHERE c.lat BETWEEN $1 AND $2
              AND c.lng BETWEEN $3 AND $4
              AND c.tags && $5
            "#
        ))
        .bind(bbox.min_lat)
        .bind(bbox.max_lat)
        .bind(bbox.min_lng)
        .bind(bbox.max_lng)
        .bind(tags)
        .fetch_all(&self.pool)
        .await?;

        into_complaints(rows)
    }

    async fn list(&self, filter: &ComplaintFilter) -> Result<Vec<Complaint>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaints c JOIN wards w ON w.id = c.ward_id WHERE "
        ));

        match filter.scope {
            AreaScope::Ward(ward_id) => qb.push("c.ward_id = ").push_bind(ward_id),
            AreaScope::Palika(palika_id) => qb.push("w.palika_id = ").push_bind(palika_id),
        };
        if let Some(status) = filter.status {
            qb.push(" AND c.status = ").push_bind(status.as_str());
        }
        if !filter.tags.is_empty() {
            qb.push(" AND c.tags && ").push_bind(filter.tags.clone());
        }
        if let Some(after) = filter.submitted_after {
            qb.push(" AND c.submitted_at >= ").push_bind(after);
        }
        if let Some(before) = filter.submitted_before {
            qb.push(" AND c.submitted_at <= ").push_bind(before);
        }

        let column = if filter.sorts_by_resolution() {
            "c.resolved_at"
        } else {
            "c.submitted_at"
        };
        let direction = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(" ORDER BY {column} {direction}, c.id ASC"));
        qb.push(" LIMIT ").push_bind(i64::from(filter.limit));
        qb.push(" OFFSET ").push_bind(filter.offset() as i64);

        let rows = qb
            .build_query_as::<ComplaintRow>()
            .fetch_all(&self.pool)
            .await?;

        into_complaints(rows)
    }

    async fn supported_by(
        &self,
        user: UserId,
        filter: &SupportedFilter,
    ) -> Result<Vec<SupportedComplaint>> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {COMPLAINT_COLUMNS}, {SUPPORTED_FROM} WHERE s.user_id = "
        ));
        qb.push_bind(user);
        if let Some(status) = filter.status {
            qb.push(" AND c.status = ").push_bind(status.as_str());
        }

        let column = if filter.sorts_by_resolution() {
            "c.resolved_at"
        } else {
            "c.submitted_at"
        };
        let direction = match filter.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(" ORDER BY {column} {direction}, c.id ASC"));
        qb.push(" LIMIT ").push_bind(i64::from(filter.limit));
        qb.push(" OFFSET ").push_bind(filter.offset() as i64);

        let rows = qb
            .build_query_as::<SupportedRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(SupportedComplaint::try_from).collect()
    }

    async fn supported_complaint(
        &self,
        id: ComplaintId,
        user: UserId,
    ) -> Result<Option<SupportedComplaint>> {
        let row = sqlx::query_as::<_, SupportedRow>(&format!(
            "SELECT {COMPLAINT_COLUMNS}, {SUPPORTED_FROM} WHERE c.id = $1 AND s.user_id = $2"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SupportedComplaint::try_from).transpose()
    }

    async fn status_counts(&self, ward: Option<WardId>) -> Result<StatusCounts> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT status, COUNT(*) FROM complaints
            WHERE $1::BIGINT IS NULL OR ward_id = $1
            GROUP BY status
            "#,
        )
        .bind(ward)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let status = status
                .parse::<ComplaintStatus>()
                .map_err(|e| anyhow!("status count: {e}"))?;
            counts.record(status, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn rating_summary(&self, id: ComplaintId) -> Result<RatingSummary> {
        let (average, total) = sqlx::query_as::<_, (Option<f64>, i64)>(
            r#"
            SELECT ROUND(AVG(rating), 2)::float8, COUNT(rating)
            FROM complaint_supporters
            WHERE complaint_id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RatingSummary {
            average,
            total: total.max(0) as u64,
        })
    }

    async fn ward_ratings(&self) -> Result<Vec<(WardId, f64)>> {
        let rows = sqlx::query_as::<_, (i64, f64)>(
            r#"
            SELECT ward_id, ROUND(AVG(rating::numeric), 2)::float8
            FROM complaints
            WHERE rating IS NOT NULL
            GROUP BY ward_id
            ORDER BY ward_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
