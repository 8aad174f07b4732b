//! PostgreSQL implementation of the event log.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::StoredTaskEvent;
use crate::domain::{DeadLetter, TaskEvent, TaskId};
use crate::error::GatewayError;

/// PostgreSQL-backed event log using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Wraps an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(Self::new(pool))
    }

    /// Appends a task event to the event log.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_event(&self, event: &TaskEvent) -> Result<i64, GatewayError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| GatewayError::Internal(format!("event serialization failed: {e}")))?;
        let task_id = event.task_id().map(Uuid::from);

        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO task_events (task_id, event_type, payload) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(task_id)
        .bind(event.event_type_str())
        .bind(&payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    /// Stores a rejected webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn save_dead_letter(&self, letter: &DeadLetter) -> Result<i64, GatewayError> {
        let row = sqlx::query_scalar::<_, i64>(
            "INSERT INTO webhook_dead_letters (dispatch_id, event_type, data, reason, received_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&letter.dispatch_id)
        .bind(&letter.event_type)
        .bind(&letter.data)
        .bind(&letter.reason)
        .bind(letter.received_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    /// Loads the event history of one task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] on database failure.
    pub async fn load_task_events(
        &self,
        task_id: TaskId,
    ) -> Result<Vec<StoredTaskEvent>, GatewayError> {
        let rows = sqlx::query_as::<_, (i64, Option<Uuid>, String, serde_json::Value, DateTime<Utc>)>(
            "SELECT id, task_id, event_type, payload, created_at FROM task_events \
             WHERE task_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(task_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(id, task_id, event_type, payload, created_at)| StoredTaskEvent {
                id,
                task_id,
                event_type,
                payload,
                created_at,
            })
            .collect())
    }
}
