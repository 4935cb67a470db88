//! Daily metrics buckets on Postgres.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use super::Db;
use crate::error::Result;
use crate::model::cache::{BucketQuery, MetricsBucket};
use crate::store::CacheStore;

#[async_trait]
impl CacheStore for Db {
    async fn buckets(
        &self,
        query: &BucketQuery,
        not_before: DateTime<Utc>,
    ) -> Result<Vec<MetricsBucket>> {
        let rows: Vec<BucketRow> = sqlx::query_as(
            "SELECT date, entity_type, entity_id, active_seconds, idle_seconds, absent_seconds,
                    units, occupancy_seconds, utilization_pct, computed_at
             FROM metrics_cache
             WHERE entity_type = $1 AND entity_id = $2
             AND ($3::date IS NULL OR date >= $3)
             AND ($4::date IS NULL OR date <= $4)
             AND computed_at >= $5
             ORDER BY date ASC",
        )
        .bind(query.entity_type.as_str())
        .bind(&query.entity_id)
        .bind(query.from)
        .bind(query.to)
        .bind(not_before)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(BucketRow::try_into_bucket).collect()
    }

    async fn upsert_bucket(&self, bucket: &MetricsBucket) -> Result<()> {
        sqlx::query(
            "INSERT INTO metrics_cache (date, entity_type, entity_id, active_seconds, idle_seconds,
                                        absent_seconds, units, occupancy_seconds, utilization_pct, computed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (date, entity_type, entity_id) DO UPDATE SET
                active_seconds = EXCLUDED.active_seconds,
                idle_seconds = EXCLUDED.idle_seconds,
                absent_seconds = EXCLUDED.absent_seconds,
                units = EXCLUDED.units,
                occupancy_seconds = EXCLUDED.occupancy_seconds,
                utilization_pct = EXCLUDED.utilization_pct,
                computed_at = EXCLUDED.computed_at",
        )
        .bind(bucket.date)
        .bind(bucket.entity_type.as_str())
        .bind(&bucket.entity_id)
        .bind(bucket.active_seconds)
        .bind(bucket.idle_seconds)
        .bind(bucket.absent_seconds)
        .bind(bucket.units)
        .bind(bucket.occupancy_seconds)
        .bind(bucket.utilization_pct)
        .bind(bucket.computed_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn purge_buckets(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let removed = sqlx::query("DELETE FROM metrics_cache WHERE computed_at < $1")
            .bind(cutoff)
            .execute(self.pool())
            .await?
            .rows_affected();
        Ok(removed)
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct BucketRow {
    date: NaiveDate,
    entity_type: String,
    entity_id: String,
    active_seconds: i64,
    idle_seconds: i64,
    absent_seconds: i64,
    units: i64,
    occupancy_seconds: i64,
    utilization_pct: f64,
    computed_at: DateTime<Utc>,
}

impl BucketRow {
    fn try_into_bucket(self) -> Result<MetricsBucket> {
        Ok(MetricsBucket {
            date: self.date,
            entity_type: self.entity_type.parse()?,
            entity_id: self.entity_id,
            active_seconds: self.active_seconds,
            idle_seconds: self.idle_seconds,
            absent_seconds: self.absent_seconds,
            units: self.units,
            occupancy_seconds: self.occupancy_seconds,
            utilization_pct: self.utilization_pct,
            computed_at: self.computed_at,
        })
    }
}
