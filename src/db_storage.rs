use crate::errors::{AppError, ResultExt};
use crate::models::{Profile, GHUNT_DATA_SOURCE};
use crate::services::ProfileSink;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Stores assembled profiles in `opse.profiles`.
///
/// Expected table:
///
/// ```sql
/// CREATE TABLE opse.profiles (
///     id uuid PRIMARY KEY,
///     source text NOT NULL,
///     profile jsonb NOT NULL,
///     created_at timestamptz NOT NULL DEFAULT now()
/// );
/// ```
pub struct PgProfileSink {
    pool: PgPool,
}

impl PgProfileSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a profile and return its row id.
    pub async fn store_profile(&self, profile: &Profile) -> Result<Uuid, AppError> {
        let id = Uuid::new_v4();
        let payload = serde_json::to_value(profile)
            .map_err(|e| AppError::InternalError(format!("Failed to encode profile: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO opse.profiles (id, source, profile, created_at)
            VALUES ($1, $2, $3, now())
            "#,
        )
        .bind(id)
        .bind(GHUNT_DATA_SOURCE)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .context("insert profile")?;

        tracing::debug!("Stored profile {}", id);
        Ok(id)
    }

    /// Most recently stored profiles, newest first.
    pub async fn recent_profiles(
        &self,
        limit: i64,
    ) -> Result<Vec<(Uuid, Profile, DateTime<Utc>)>, AppError> {
        let rows: Vec<(Uuid, serde_json::Value, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, profile, created_at FROM opse.profiles ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("select profiles")?;

        rows.into_iter()
            .map(|(id, payload, created_at)| {
                let profile = serde_json::from_value(payload).map_err(|e| {
                    AppError::InternalError(format!("Stored profile {} is malformed: {}", id, e))
                })?;
                Ok((id, profile, created_at))
            })
            .collect()
    }
}

#[async_trait]
impl ProfileSink for PgProfileSink {
    async fn append_profile(&self, profile: &Profile) -> Result<(), AppError> {
        self.store_profile(profile).await.map(|_| ())
    }
}
