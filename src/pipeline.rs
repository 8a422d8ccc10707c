use crate::datapoint::Datapoint;
use crate::error::SinkError;
use anyhow::Result;
use chrono::Utc;
use sqlx::types::Json as SqlJson;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, QueryBuilder};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};
use std::time::Duration;

/// Columns written per datapoint by [`PgSink`].
const DATAPOINT_COLUMNS: usize = 13;
const MAX_BIND_PARAMS: usize = u16::MAX as usize;
/// Largest batch that fits a single multi-row insert.
pub const MAX_PG_BATCH_ROWS: usize = MAX_BIND_PARAMS / DATAPOINT_COLUMNS;

/// Bulk persistence target for generated datapoints. A batch is owned by the
/// sink once handed over; any retry happens inside the sink.
pub trait BatchSink {
    async fn insert_batch(&mut self, records: Vec<Datapoint>) -> Result<(), SinkError>;
}

#[derive(Debug)]
pub struct GenerationStats {
    pub expected: AtomicU64,
    pub generated: AtomicU64,
    pub persisted: AtomicU64,
    pub batches: AtomicU64,
    pub last_batch_len: AtomicU64,
    pub last_flush_unix_ms: AtomicU64,
    pub average_flush_micros: AtomicU64,
    pub last_error: Mutex<Option<String>>,
}

impl GenerationStats {
    pub fn new() -> Self {
        Self {
            expected: AtomicU64::new(0),
            generated: AtomicU64::new(0),
            persisted: AtomicU64::new(0),
            batches: AtomicU64::new(0),
            last_batch_len: AtomicU64::new(0),
            last_flush_unix_ms: AtomicU64::new(0),
            average_flush_micros: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn record_generated(&self) {
        self.generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, len: usize, elapsed: Duration) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.persisted.fetch_add(len as u64, Ordering::Relaxed);
        self.last_batch_len.store(len as u64, Ordering::Relaxed);
        let now = Utc::now().timestamp_millis() as u64;
        self.last_flush_unix_ms.store(now, Ordering::Relaxed);
        let micros = elapsed.as_micros() as u64;
        let prev = self.average_flush_micros.load(Ordering::Relaxed);
        let avg = if prev == 0 {
            micros
        } else {
            (prev + micros) / 2
        };
        self.average_flush_micros.store(avg, Ordering::Relaxed);
        self.clear_error();
    }

    pub fn record_error(&self, err: impl Into<String>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(err.into());
        }
    }

    pub fn clear_error(&self) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = None;
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|guard| guard.clone())
    }
}

impl Default for GenerationStats {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn build_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Writes batches into a Postgres table with one multi-row `INSERT` per batch.
pub struct PgSink {
    pool: PgPool,
    table: String,
    attempts: u32,
    backoff: Duration,
}

impl PgSink {
    /// `table` must already be validated as a plain identifier.
    pub fn new(pool: PgPool, table: String, attempts: u32, backoff: Duration) -> Self {
        Self {
            pool,
            table,
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id bigserial primary key,
                organization_id text not null,
                location_id text not null,
                robot_id text not null,
                part_id text not null,
                component_name text not null,
                component_type text not null,
                method_name text not null,
                tags jsonb null,
                additional_parameters jsonb not null default '{{}}'::jsonb,
                data jsonb not null,
                capture_day timestamptz not null,
                time_requested timestamptz not null,
                time_received timestamptz not null
            )
            "#,
            table = self.table
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_org_capture_day_idx ON {table} (organization_id, capture_day)",
            table = self.table
        ))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_once(&self, records: &[Datapoint]) -> Result<u64, sqlx::Error> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} (organization_id, location_id, robot_id, part_id, component_name, \
             component_type, method_name, tags, additional_parameters, data, capture_day, \
             time_requested, time_received) ",
            self.table
        ));
        builder.push_values(records.iter(), |mut b, point| {
            b.push_bind(&point.organization_id)
                .push_bind(&point.location_id)
                .push_bind(&point.robot_id)
                .push_bind(&point.part_id)
                .push_bind(point.component_name)
                .push_bind(point.component_type)
                .push_bind(point.method_name)
                .push_bind(point.tags.map(SqlJson))
                .push_bind(SqlJson(point.additional_parameters))
                .push_bind(SqlJson(&point.data))
                .push_bind(point.capture_day)
                .push_bind(point.time_requested)
                .push_bind(point.time_received);
        });
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

impl BatchSink for PgSink {
    async fn insert_batch(&mut self, records: Vec<Datapoint>) -> Result<(), SinkError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.insert_once(&records).await {
                Ok(inserted) => {
                    tracing::debug!(inserted, table = %self.table, "inserted datapoint batch");
                    return Ok(());
                }
                Err(err) if attempt < self.attempts => {
                    tracing::warn!(
                        error = %err,
                        attempt,
                        len = records.len(),
                        "datapoint insert failed; retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
                Err(source) => {
                    return Err(SinkError::Database {
                        attempts: attempt,
                        source,
                    });
                }
            }
        }
    }
}
