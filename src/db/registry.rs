//! Worker and workstation registry on Postgres.

use async_trait::async_trait;

use super::Db;
use crate::error::Result;
use crate::model::registry::{Worker, Workstation};
use crate::store::Registry;

#[async_trait]
impl Registry for Db {
    async fn worker(&self, worker_id: &str) -> Result<Option<Worker>> {
        let row: Option<WorkerRow> = sqlx::query_as(
            "SELECT worker_id, name, department, shift FROM workers WHERE worker_id = $1",
        )
        .bind(worker_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Worker::from))
    }

    async fn workstation(&self, station_id: &str) -> Result<Option<Workstation>> {
        let row: Option<WorkstationRow> = sqlx::query_as(
            "SELECT station_id, name, station_type, location, capacity FROM workstations WHERE station_id = $1",
        )
        .bind(station_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Workstation::from))
    }

    async fn workers(&self) -> Result<Vec<Worker>> {
        let rows: Vec<WorkerRow> = sqlx::query_as(
            "SELECT worker_id, name, department, shift FROM workers ORDER BY worker_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Worker::from).collect())
    }

    async fn workstations(&self) -> Result<Vec<Workstation>> {
        let rows: Vec<WorkstationRow> = sqlx::query_as(
            "SELECT station_id, name, station_type, location, capacity FROM workstations ORDER BY station_id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Workstation::from).collect())
    }

    async fn register_worker(&self, worker: &Worker) -> Result<()> {
        sqlx::query(
            "INSERT INTO workers (worker_id, name, department, shift) VALUES ($1, $2, $3, $4)
             ON CONFLICT (worker_id) DO UPDATE SET
                name = EXCLUDED.name, department = EXCLUDED.department, shift = EXCLUDED.shift",
        )
        .bind(&worker.worker_id)
        .bind(&worker.name)
        .bind(&worker.department)
        .bind(&worker.shift)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn register_workstation(&self, workstation: &Workstation) -> Result<()> {
        sqlx::query(
            "INSERT INTO workstations (station_id, name, station_type, location, capacity)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (station_id) DO UPDATE SET
                name = EXCLUDED.name, station_type = EXCLUDED.station_type,
                location = EXCLUDED.location, capacity = EXCLUDED.capacity",
        )
        .bind(&workstation.station_id)
        .bind(&workstation.name)
        .bind(&workstation.station_type)
        .bind(&workstation.location)
        .bind(workstation.capacity)
        .execute(self.pool())
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct WorkerRow {
    worker_id: String,
    name: String,
    department: String,
    shift: String,
}

impl From<WorkerRow> for Worker {
    fn from(row: WorkerRow) -> Self {
        Worker {
            worker_id: row.worker_id,
            name: row.name,
            department: row.department,
            shift: row.shift,
        }
    }
}

#[derive(sqlx::FromRow)]
struct WorkstationRow {
    station_id: String,
    name: String,
    station_type: String,
    location: String,
    capacity: i32,
}

impl From<WorkstationRow> for Workstation {
    fn from(row: WorkstationRow) -> Self {
        Workstation {
            station_id: row.station_id,
            name: row.name,
            station_type: row.station_type,
            location: row.location,
            capacity: row.capacity,
        }
    }
}
