//! Generation repository.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;
use vhook_models::{Generation, GenerationId, GenerationStatus, ShotScript};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

const COLUMNS: &str = "id, source_image, script, status, final_video, created_at, updated_at";

#[derive(Debug, FromRow)]
struct GenerationRow {
    id: String,
    source_image: String,
    script: String,
    status: String,
    final_video: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<GenerationRow> for Generation {
    type Error = StoreError;

    fn try_from(row: GenerationRow) -> StoreResult<Self> {
        let script: ShotScript = serde_json::from_str(&row.script)?;
        let status = row
            .status
            .parse::<GenerationStatus>()
            .map_err(|e| StoreError::corrupt(format!("generation {}: {}", row.id, e)))?;

        Ok(Generation {
            id: GenerationId(row.id),
            source_image: row.source_image,
            script,
            status,
            final_video: row.final_video,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for generation records.
#[derive(Debug, Clone)]
pub struct GenerationRepository {
    db: Database,
}

impl GenerationRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new generation.
    pub async fn create(&self, generation: &Generation) -> StoreResult<()> {
        let script = serde_json::to_string(&generation.script)?;
        sqlx::query(
            "INSERT INTO generations (id, source_image, script, status, final_video, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(generation.id.as_str())
        .bind(&generation.source_image)
        .bind(script)
        .bind(generation.status.as_str())
        .bind(&generation.final_video)
        .bind(generation.created_at)
        .bind(generation.updated_at)
        .execute(self.db.pool())
        .await?;

        debug!(generation_id = %generation.id, "Created generation");
        Ok(())
    }

    /// Get a generation by ID.
    pub async fn get(&self, id: &GenerationId) -> StoreResult<Option<Generation>> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = ?");
        let row = sqlx::query_as::<_, GenerationRow>(&query)
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await?;
        row.map(Generation::try_from).transpose()
    }

    /// Get a generation, failing if it does not exist.
    pub async fn require(&self, id: &GenerationId) -> StoreResult<Generation> {
        self.get(id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("generation {}", id)))
    }

    /// Unconditionally set the status.
    pub async fn update_status(&self, id: &GenerationId, status: GenerationStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE generations SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.as_str())
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("generation {}", id)));
        }
        Ok(())
    }

    /// Move from `from` to `to` only if the record is currently in `from`.
    ///
    /// Returns whether the transition happened.
    pub async fn transition(
        &self,
        id: &GenerationId,
        from: GenerationStatus,
        to: GenerationStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE generations SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(to.as_str())
        .bind(Utc::now())
        .bind(id.as_str())
        .bind(from.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record the final video and mark the generation completed in one write.
    ///
    /// Only applies to a generation in `assembling`; returns whether it did.
    pub async fn complete(&self, id: &GenerationId, final_video: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE generations SET status = ?, final_video = ?, updated_at = ? \
             WHERE id = ? AND status = ?",
        )
        .bind(GenerationStatus::Completed.as_str())
        .bind(final_video)
        .bind(Utc::now())
        .bind(id.as_str())
        .bind(GenerationStatus::Assembling.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
