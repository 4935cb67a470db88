//! Event log on Postgres: chunked dedup inserts and filtered reads.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::Db;
use crate::error::{Error, Result};
use crate::model::analytics::{DailyUnits, ModelVersionStats};
use crate::model::event::{Event, NewEvent};
use crate::model::round4;
use crate::store::{EventFilter, EventQuery, EventStore, InsertOutcome, SortOrder};

const EVENT_COLUMNS: &str = "id, observed_at, worker_id, workstation_id, event_type, confidence, count, model_version, dedup_key, created_at";

/// Append the WHERE clause for `filter`. The single place filters become SQL.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    qb.push(" WHERE TRUE");
    if let Some(worker_id) = &filter.worker_id {
        qb.push(" AND worker_id = ").push_bind(worker_id.clone());
    }
    if let Some(workstation_id) = &filter.workstation_id {
        qb.push(" AND workstation_id = ")
            .push_bind(workstation_id.clone());
    }
    if let Some(from) = filter.from {
        qb.push(" AND observed_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND observed_at <= ").push_bind(to);
    }
    if let Some(threshold) = filter.below_confidence {
        qb.push(" AND confidence < ").push_bind(threshold);
    }
}

impl Db {
    /// Insert one chunk. Returns how many rows were new.
    async fn insert_chunk(&self, chunk: &[NewEvent]) -> Result<u64> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "INSERT INTO events (id, observed_at, worker_id, workstation_id, event_type, confidence, count, model_version, dedup_key) ",
        );
        qb.push_values(chunk, |mut row, event| {
            row.push_bind(Uuid::new_v4())
                .push_bind(event.timestamp)
                .push_bind(event.worker_id.clone())
                .push_bind(event.workstation_id.clone())
                .push_bind(event.event_type.as_str())
                .push_bind(event.confidence)
                .push_bind(event.count)
                .push_bind(event.model_version.clone())
                .push_bind(event.dedup_key.clone());
        });
        qb.push(" ON CONFLICT (dedup_key) DO NOTHING RETURNING id");

        let inserted: Vec<(Uuid,)> = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(inserted.len() as u64)
    }
}

#[async_trait]
impl EventStore for Db {
    async fn insert_many(&self, events: &[NewEvent]) -> Result<InsertOutcome> {
        let mut outcome = InsertOutcome::default();

        for chunk in events.chunks(self.chunk_size) {
            match self.insert_chunk(chunk).await {
                Ok(inserted) => {
                    outcome.inserted += inserted;
                    outcome.skipped += chunk.len() as u64 - inserted;
                }
                Err(e) if outcome == InsertOutcome::default() => return Err(e),
                Err(e) => {
                    return Err(Error::PartialIngest {
                        inserted: outcome.inserted,
                        skipped: outcome.skipped,
                        source: Box::new(e),
                    });
                }
            }
        }

        Ok(outcome)
    }

    async fn find(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        qb.push(EVENT_COLUMNS).push(" FROM events");
        push_filter(&mut qb, &query.filter);
        qb.push(match query.order {
            SortOrder::Ascending => " ORDER BY observed_at ASC, id ASC",
            SortOrder::Descending => " ORDER BY observed_at DESC, id DESC",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit.max(0));
        }

        let rows: Vec<EventRow> = qb.build_query_as().fetch_all(self.pool()).await?;
        rows.into_iter().map(EventRow::try_into_event).collect()
    }

    async fn count(&self, filter: &EventFilter) -> Result<u64> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM events");
        push_filter(&mut qb, filter);
        let (count,): (i64,) = qb.build_query_as().fetch_one(self.pool()).await?;
        Ok(count as u64)
    }

    async fn daily_units(&self, filter: &EventFilter) -> Result<Vec<DailyUnits>> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT (observed_at AT TIME ZONE 'UTC')::date AS day, COALESCE(SUM(count), 0)::BIGINT AS units FROM events",
        );
        push_filter(&mut qb, filter);
        qb.push(" AND event_type = 'product_count' GROUP BY day ORDER BY day");

        let rows: Vec<(NaiveDate, i64)> = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(rows
            .into_iter()
            .map(|(date, units)| DailyUnits { date, units })
            .collect())
    }

    async fn event_days(&self, filter: &EventFilter) -> Result<Vec<NaiveDate>> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT DISTINCT (observed_at AT TIME ZONE 'UTC')::date AS day FROM events");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY day");

        let rows: Vec<(NaiveDate,)> = qb.build_query_as().fetch_all(self.pool()).await?;
        Ok(rows.into_iter().map(|(day,)| day).collect())
    }

    async fn model_versions(&self) -> Result<Vec<ModelVersionStats>> {
        let rows: Vec<(String, i64, f64, DateTime<Utc>, DateTime<Utc>)> = sqlx::query_as(
            "SELECT model_version, COUNT(*)::BIGINT, AVG(confidence)::DOUBLE PRECISION,
                    MIN(observed_at), MAX(observed_at)
             FROM events
             GROUP BY model_version
             ORDER BY MAX(observed_at) DESC, model_version ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|(version, count, avg, first_seen, last_seen)| ModelVersionStats {
                version,
                event_count: count as u64,
                avg_confidence: round4(avg),
                first_seen,
                last_seen,
            })
            .collect())
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    observed_at: DateTime<Utc>,
    worker_id: String,
    workstation_id: String,
    event_type: String,
    confidence: f64,
    count: i64,
    model_version: String,
    dedup_key: String,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn try_into_event(self) -> Result<Event> {
        Ok(Event {
            id: self.id,
            timestamp: self.observed_at,
            worker_id: self.worker_id,
            workstation_id: self.workstation_id,
            event_type: self.event_type.parse()?,
            confidence: self.confidence,
            count: self.count,
            model_version: self.model_version,
            dedup_key: self.dedup_key,
            created_at: self.created_at,
        })
    }
}
