//! Clip repository.
//!
//! Each clip row is written only by the worker that owns it, so updates are
//! keyed by clip id and never touch sibling rows.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;
use vhook_models::{Clip, ClipId, ClipStatus, GenerationId};

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

const COLUMNS: &str = "id, generation_id, sequence_index, role, prompt, remote_job_id, \
                       remote_url, local_path, duration_secs, status, created_at, updated_at";

#[derive(Debug, FromRow)]
struct ClipRow {
    id: String,
    generation_id: String,
    sequence_index: i64,
    role: String,
    prompt: String,
    remote_job_id: Option<String>,
    remote_url: Option<String>,
    local_path: Option<String>,
    duration_secs: f64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<ClipRow> for Clip {
    type Error = StoreError;

    fn try_from(row: ClipRow) -> StoreResult<Self> {
        let status = row
            .status
            .parse::<ClipStatus>()
            .map_err(|e| StoreError::corrupt(format!("clip {}: {}", row.id, e)))?;
        let sequence_index = u32::try_from(row.sequence_index).map_err(|_| {
            StoreError::corrupt(format!("clip {}: sequence index {}", row.id, row.sequence_index))
        })?;

        Ok(Clip {
            id: ClipId(row.id),
            generation_id: GenerationId(row.generation_id),
            sequence_index,
            role: row.role,
            prompt: row.prompt,
            remote_job_id: row.remote_job_id,
            remote_url: row.remote_url,
            local_path: row.local_path,
            duration_secs: row.duration_secs,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Repository for clip records.
#[derive(Debug, Clone)]
pub struct ClipRepository {
    db: Database,
}

impl ClipRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert all clips of a generation at once.
    ///
    /// Either every clip is inserted or none is; a duplicate sequence index
    /// rejects the whole batch.
    pub async fn create_batch(&self, clips: &[Clip]) -> StoreResult<()> {
        let mut tx = self.db.pool().begin().await?;
        for clip in clips {
            sqlx::query(
                "INSERT INTO clips (id, generation_id, sequence_index, role, prompt, remote_job_id, \
                 remote_url, local_path, duration_secs, status, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(clip.id.as_str())
            .bind(clip.generation_id.as_str())
            .bind(clip.sequence_index as i64)
            .bind(&clip.role)
            .bind(&clip.prompt)
            .bind(&clip.remote_job_id)
            .bind(&clip.remote_url)
            .bind(&clip.local_path)
            .bind(clip.duration_secs)
            .bind(clip.status.as_str())
            .bind(clip.created_at)
            .bind(clip.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(count = clips.len(), "Created clip batch");
        Ok(())
    }

    pub async fn get(&self, id: &ClipId) -> StoreResult<Option<Clip>> {
        let query = format!("SELECT {COLUMNS} FROM clips WHERE id = ?");
        let row = sqlx::query_as::<_, ClipRow>(&query)
            .bind(id.as_str())
            .fetch_optional(self.db.pool())
            .await?;
        row.map(Clip::try_from).transpose()
    }

    /// All clips of a generation in playback order.
    pub async fn list_for_generation(&self, generation_id: &GenerationId) -> StoreResult<Vec<Clip>> {
        let query = format!(
            "SELECT {COLUMNS} FROM clips WHERE generation_id = ? ORDER BY sequence_index ASC"
        );
        let rows = sqlx::query_as::<_, ClipRow>(&query)
            .bind(generation_id.as_str())
            .fetch_all(self.db.pool())
            .await?;
        rows.into_iter().map(Clip::try_from).collect()
    }

    /// Number of clips of a generation in the given status.
    pub async fn count_with_status(
        &self,
        generation_id: &GenerationId,
        status: ClipStatus,
    ) -> StoreResult<u32> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM clips WHERE generation_id = ? AND status = ?")
                .bind(generation_id.as_str())
                .bind(status.as_str())
                .fetch_one(self.db.pool())
                .await?;
        Ok(count as u32)
    }

    pub async fn mark_generating(&self, id: &ClipId) -> StoreResult<()> {
        self.set_status(id, ClipStatus::Generating).await
    }

    pub async fn mark_failed(&self, id: &ClipId) -> StoreResult<()> {
        self.set_status(id, ClipStatus::Failed).await
    }

    /// Remember the provider task backing this clip.
    pub async fn set_remote_job(&self, id: &ClipId, remote_job_id: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE clips SET remote_job_id = ?, updated_at = ? WHERE id = ?")
            .bind(remote_job_id)
            .bind(Utc::now())
            .bind(id.as_str())
            .execute(self.db.pool())
            .await?;
        ensure_updated(result.rows_affected(), id)
    }

    /// Record the downloaded clip and mark it completed.
    pub async fn mark_completed(
        &self,
        id: &ClipId,
        local_path: &str,
        remote_url: Option<&str>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE clips SET status = ?, local_path = ?, remote_url = ?, updated_at = ? WHERE id = ?",
        )
        .bind(ClipStatus::Completed.as_str())
        .bind(local_path)
        .bind(remote_url)
        .bind(Utc::now())
        .bind(id.as_str())
        .execute(self.db.pool())
        .await?;
        ensure_updated(result.rows_affected(), id)
    }

    async fn set_status(&self, id: &ClipId, status: ClipStatus) -> StoreResult<()> {
        let result = sqlx::query("UPDATE clips SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.as_str())
            .execute(self.db.pool())
            .await?;
        ensure_updated(result.rows_affected(), id)
    }
}

fn ensure_updated(rows: u64, id: &ClipId) -> StoreResult<()> {
    if rows == 0 {
        return Err(StoreError::not_found(format!("clip {}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenerationRepository;
    use vhook_models::{Generation, Scene, ShotScript};

    async fn setup(scene_ids: &[u32]) -> (ClipRepository, Generation, Vec<Clip>) {
        let db = Database::in_memory().await.unwrap();
        let script = ShotScript {
            product_name: "Lamp".to_string(),
            master_description: "Brass desk lamp".to_string(),
            scenes: scene_ids
                .iter()
                .map(|id| Scene::new(*id, "hook", format!("scene {id}")))
                .collect(),
            tone: Default::default(),
        };
        let generation = Generation::new("/api/files/lamp.png", script);
        GenerationRepository::new(db.clone())
            .create(&generation)
            .await
            .unwrap();

        let clips: Vec<Clip> = generation
            .script
            .scenes
            .iter()
            .map(|s| Clip::for_scene(&generation.id, s, &s.prompt))
            .collect();
        (ClipRepository::new(db), generation, clips)
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_sequence_index() {
        let (repo, generation, clips) = setup(&[3, 1, 2]).await;
        repo.create_batch(&clips).await.unwrap();

        let listed = repo.list_for_generation(&generation.id).await.unwrap();
        let order: Vec<u32> = listed.iter().map(|c| c.sequence_index).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(listed.iter().all(|c| c.status == ClipStatus::Pending));
    }

    #[tokio::test]
    async fn test_duplicate_sequence_index_rejects_batch() {
        let (repo, generation, mut clips) = setup(&[1, 2]).await;
        clips[1].sequence_index = 1;

        assert!(repo.create_batch(&clips).await.is_err());
        assert!(repo.list_for_generation(&generation.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clip_lifecycle() {
        let (repo, generation, clips) = setup(&[1, 2]).await;
        repo.create_batch(&clips).await.unwrap();
        let first = &clips[0].id;
        let second = &clips[1].id;

        repo.mark_generating(first).await.unwrap();
        repo.set_remote_job(first, "task-1").await.unwrap();
        repo.mark_completed(first, "clips/a.mp4", Some("https://cdn/a.mp4"))
            .await
            .unwrap();
        repo.mark_failed(second).await.unwrap();

        let done = repo.get(first).await.unwrap().unwrap();
        assert_eq!(done.status, ClipStatus::Completed);
        assert_eq!(done.remote_job_id.as_deref(), Some("task-1"));
        assert_eq!(done.local_path.as_deref(), Some("clips/a.mp4"));
        assert_eq!(done.remote_url.as_deref(), Some("https://cdn/a.mp4"));

        assert_eq!(
            repo.count_with_status(&generation.id, ClipStatus::Completed).await.unwrap(),
            1
        );
        assert_eq!(
            repo.count_with_status(&generation.id, ClipStatus::Failed).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_unknown_clip() {
        let (repo, _, _) = setup(&[1]).await;
        let err = repo.mark_failed(&ClipId::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
