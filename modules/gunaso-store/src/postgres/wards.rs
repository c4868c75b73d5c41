use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use gunaso_common::geo::WardGeometry;
use gunaso_common::{PalikaId, Ward, WardId};

use super::PgStore;
use crate::traits::WardStore;

#[derive(sqlx::FromRow)]
struct WardRow {
    id: i64,
    name: String,
    palika_id: Option<i64>,
    geometry: Value,
}

impl TryFrom<WardRow> for Ward {
    type Error = anyhow::Error;

    fn try_from(row: WardRow) -> Result<Self> {
        let geometry = WardGeometry::from_geojson(&row.geometry)
            .with_context(|| format!("ward {} has an unreadable outline", row.id))?;
        Ok(Ward {
            id: row.id,
            name: row.name,
            palika_id: row.palika_id,
            geometry,
        })
    }
}

#[async_trait]
impl WardStore for PgStore {
    async fn load_wards(&self) -> Result<Vec<Ward>> {
        let rows = sqlx::query_as::<_, WardRow>(
            "SELECT id, name, palika_id, geometry FROM wards ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Ward::try_from).collect()
    }

    async fn upsert_palika(
        &self,
        name: &str,
        kind: &str,
        province: Option<&str>,
    ) -> Result<PalikaId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO palikas (name, kind, province)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET
              kind = EXCLUDED.kind,
              province = COALESCE(EXCLUDED.province, palikas.province)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(kind)
        .bind(province)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn upsert_ward(
        &self,
        name: &str,
        palika_id: Option<PalikaId>,
        geometry: &WardGeometry,
    ) -> Result<WardId> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO wards (name, palika_id, geometry)
            VALUES ($1, $2, $3)
            ON CONFLICT (palika_id, name) DO UPDATE SET geometry = EXCLUDED.geometry
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(palika_id)
        .bind(geometry.to_geojson())
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }
}
