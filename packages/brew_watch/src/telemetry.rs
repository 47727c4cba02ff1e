//! Power log in SQLite.
//!
//! `append` only enqueues; a background task writes whatever has queued up
//! in one transaction, so a slow disk never stalls the monitor loop.

use anyhow::{Context, Result};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use brew_signal::{ChannelError, Reading, SessionStats, TelemetrySink};

use crate::config::TelemetryConfig;

const COLLABORATOR: &str = "telemetry";

/// Most rows written per transaction.
const MAX_BATCH: usize = 64;

#[derive(Clone)]
pub struct PowerLog {
    pool: SqlitePool,
    table: String,
    insert_sql: String,
}

impl PowerLog {
    pub async fn connect(config: &TelemetryConfig) -> Result<Self> {
        info!("Connecting to power log: {}", config.url);

        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect(&config.url)
            .await
            .with_context(|| format!("Failed to connect to power log: {}", config.url))?;

        // table name is checked to be a plain identifier during config validation
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT NOT NULL,
                power REAL NOT NULL
            )
            "#,
            config.table
        ))
        .execute(&pool)
        .await
        .with_context(|| format!("Failed to create table {}", config.table))?;

        Ok(Self {
            pool,
            table: config.table.clone(),
            insert_sql: format!("INSERT INTO {} (ts, power) VALUES (?, ?)", config.table),
        })
    }

    pub async fn insert_batch(&self, readings: &[Reading]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for reading in readings {
            sqlx::query(&self.insert_sql)
                .bind(reading.at)
                .bind(reading.watts)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(readings.len() as u64)
    }

    pub async fn count(&self) -> Result<u64, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", self.table))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n").unwrap_or(0) as u64)
    }

    /// Start the background writer. Readings appended to the returned queue
    /// end up in the table; [`TelemetryWriter::flush`] drains it.
    pub fn spawn(
        self,
        capacity: usize,
        stats: Arc<SessionStats>,
    ) -> (TelemetryQueue, TelemetryWriter) {
        let (queue, rx) = TelemetryQueue::bounded(capacity);
        let handle = tokio::spawn(write_loop(self, rx, stats));
        (queue, TelemetryWriter { handle })
    }
}

async fn write_loop(
    log: PowerLog,
    mut rx: mpsc::Receiver<Reading>,
    stats: Arc<SessionStats>,
) -> u64 {
    let mut written = 0;
    let mut batch = Vec::with_capacity(MAX_BATCH);

    while rx.recv_many(&mut batch, MAX_BATCH).await > 0 {
        match log.insert_batch(&batch).await {
            Ok(n) => {
                written += n;
                debug!("Wrote {} readings to {}", n, log.table);
            }
            Err(e) => {
                warn!("Failed to write {} readings: {}", batch.len(), e);
                stats.collaborator_failed();
            }
        }
        batch.clear();
    }

    written
}

/// Producer side of the power log.
#[derive(Clone)]
pub struct TelemetryQueue {
    tx: mpsc::Sender<Reading>,
}

impl TelemetryQueue {
    fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Reading>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl TelemetrySink for TelemetryQueue {
    fn append(&self, reading: Reading) -> Result<(), ChannelError> {
        self.tx.try_send(reading).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::QueueFull {
                collaborator: COLLABORATOR,
            },
            TrySendError::Closed(_) => ChannelError::Transport {
                collaborator: COLLABORATOR,
                reason: "writer stopped".to_string(),
            },
        })
    }
}

pub struct TelemetryWriter {
    handle: JoinHandle<u64>,
}

impl TelemetryWriter {
    /// Wait for every queued reading to be written. The queue (and all its
    /// clones) must have been dropped, otherwise this waits for them.
    pub async fn flush(self) -> u64 {
        match self.handle.await {
            Ok(written) => written,
            Err(e) => {
                warn!("Telemetry writer failed: {}", e);
                0
            }
        }
    }
}
