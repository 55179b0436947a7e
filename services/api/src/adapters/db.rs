//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use storybook_core::domain::{
    Asset, AssetSource, AssetType, ImageStatus, Job, JobStatus, JobType, Page, ReadingLevel,
    Story, StoryMetadata, StoryStatus,
};
use storybook_core::ports::{
    DatabaseService, NewAsset, NewJob, NewStory, PortError, PortResult, StoryUpdate,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Creates a new `PgDatabase`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const STORY_COLUMNS: &str = "id, user_id, title, outline, reading_level, status, page_count, \
     raw_model_output, generation_job_id, tone, illustration_hints, created_at, updated_at";

#[derive(FromRow)]
struct StoryRow {
    id: Uuid,
    user_id: String,
    title: String,
    outline: String,
    reading_level: String,
    status: String,
    page_count: i32,
    raw_model_output: Option<String>,
    generation_job_id: Option<Uuid>,
    tone: Option<String>,
    illustration_hints: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoryRow> for Story {
    type Error = PortError;

    fn try_from(row: StoryRow) -> Result<Self, Self::Error> {
        Ok(Story {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            outline: row.outline,
            reading_level: ReadingLevel::from_str(&row.reading_level).ok_or_else(|| {
                PortError::Unexpected(format!("Unknown reading level '{}'", row.reading_level))
            })?,
            status: StoryStatus::from_str(&row.status).ok_or_else(|| {
                PortError::Unexpected(format!("Unknown story status '{}'", row.status))
            })?,
            page_count: row.page_count.max(0) as u32,
            raw_model_output: row.raw_model_output,
            generation_job_id: row.generation_job_id,
            metadata: StoryMetadata {
                tone: row.tone,
                illustration_hints: row.illustration_hints,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const PAGE_COLUMNS: &str = "id, story_id, page_number, original_text, current_text, is_locked, \
     image_status, image_id, image_url, created_at, updated_at";

#[derive(FromRow)]
struct PageRow {
    id: Uuid,
    story_id: Uuid,
    page_number: i32,
    original_text: String,
    current_text: String,
    is_locked: bool,
    image_status: String,
    image_id: Option<Uuid>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PageRow> for Page {
    type Error = PortError;

    fn try_from(row: PageRow) -> Result<Self, Self::Error> {
        Ok(Page {
            id: row.id,
            story_id: row.story_id,
            page_number: row.page_number.max(0) as u32,
            original_text: row.original_text,
            current_text: row.current_text,
            is_locked: row.is_locked,
            image_status: ImageStatus::from_str(&row.image_status).ok_or_else(|| {
                PortError::Unexpected(format!("Unknown image status '{}'", row.image_status))
            })?,
            image_id: row.image_id,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const JOB_COLUMNS: &str = "id, job_type, status, user_id, story_id, page_id, input, output, \
     error, retry_count, max_retries, created_at, started_at, completed_at";

#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    job_type: String,
    status: String,
    user_id: String,
    story_id: Uuid,
    page_id: Option<Uuid>,
    input: Value,
    output: Option<Value>,
    error: Option<String>,
    retry_count: i32,
    max_retries: i32,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = PortError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            job_type: JobType::from_str(&row.job_type).ok_or_else(|| {
                PortError::Unexpected(format!("Unknown job type '{}'", row.job_type))
            })?,
            status: JobStatus::from_str(&row.status).ok_or_else(|| {
                PortError::Unexpected(format!("Unknown job status '{}'", row.status))
            })?,
            user_id: row.user_id,
            story_id: row.story_id,
            page_id: row.page_id,
            input: row.input,
            output: row.output,
            error: row.error,
            retry_count: row.retry_count.max(0) as u32,
            max_retries: row.max_retries.max(0) as u32,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}

const ASSET_COLUMNS: &str = "id, story_id, page_id, asset_type, source, storage_path, \
     public_url, mime_type, size_bytes, generation_job_id, created_at";

#[derive(FromRow)]
struct AssetRow {
    id: Uuid,
    story_id: Uuid,
    page_id: Uuid,
    asset_type: String,
    source: String,
    storage_path: String,
    public_url: String,
    mime_type: String,
    size_bytes: i64,
    generation_job_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AssetRow> for Asset {
    type Error = PortError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Asset {
            id: row.id,
            story_id: row.story_id,
            page_id: row.page_id,
            asset_type: AssetType::from_str(&row.asset_type).ok_or_else(|| {
                PortError::Unexpected(format!("Unknown asset type '{}'", row.asset_type))
            })?,
            source: AssetSource::from_str(&row.source).ok_or_else(|| {
                PortError::Unexpected(format!("Unknown asset source '{}'", row.source))
            })?,
            storage_path: row.storage_path,
            public_url: row.public_url,
            mime_type: row.mime_type,
            size_bytes: row.size_bytes,
            generation_job_id: row.generation_job_id,
            created_at: row.created_at,
        })
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for PgDatabase {
    async fn create_story(&self, new_story: NewStory) -> PortResult<Story> {
        let sql = format!(
            "INSERT INTO stories (id, user_id, title, outline, reading_level, status, tone, illustration_hints) \
             VALUES ($1, $2, $3, $4, $5, 'draft', $6, $7) RETURNING {STORY_COLUMNS}"
        );
        let row: StoryRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_story.user_id)
            .bind(&new_story.title)
            .bind(&new_story.outline)
            .bind(new_story.reading_level.as_str())
            .bind(&new_story.metadata.tone)
            .bind(&new_story.metadata.illustration_hints)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        row.try_into()
    }

    async fn get_story(&self, story_id: Uuid) -> PortResult<Story> {
        let sql = format!("SELECT {STORY_COLUMNS} FROM stories WHERE id = $1");
        let row: Option<StoryRow> = sqlx::query_as(&sql)
            .bind(story_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or_else(|| PortError::NotFound(format!("Story {} not found", story_id)))?
            .try_into()
    }

    async fn list_stories_for_user(&self, user_id: &str) -> PortResult<Vec<Story>> {
        let sql = format!(
            "SELECT {STORY_COLUMNS} FROM stories WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows: Vec<StoryRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(Story::try_from).collect()
    }

    async fn update_story(&self, story_id: Uuid, update: StoryUpdate) -> PortResult<()> {
        let metadata = update.metadata.clone();

        let result = sqlx::query(
            "UPDATE stories SET \
                 title = COALESCE($2, title), \
                 outline = COALESCE($3, outline), \
                 reading_level = COALESCE($4, reading_level), \
                 status = COALESCE($5, status), \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(story_id)
        .bind(&update.title)
        .bind(&update.outline)
        .bind(update.reading_level.map(|l| l.as_str()))
        .bind(update.status.map(|s| s.as_str()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Story {} not found", story_id)));
        }

        // Metadata is replaced as a unit, including clearing fields to NULL,
        // so it cannot go through the COALESCE statement above.
        if let Some(metadata) = metadata {
            sqlx::query(
                "UPDATE stories SET tone = $2, illustration_hints = $3, updated_at = now() \
                 WHERE id = $1",
            )
            .bind(story_id)
            .bind(&metadata.tone)
            .bind(&metadata.illustration_hints)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        }

        Ok(())
    }

    async fn delete_story(&self, story_id: Uuid) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM assets WHERE story_id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM pages WHERE story_id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // Jobs are audit records and intentionally survive story deletion.
        let result = sqlx::query("DELETE FROM stories WHERE id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Story {} not found", story_id)));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn try_claim_generation(&self, story_id: Uuid) -> PortResult<bool> {
        // Compare-and-swap on status: a concurrent request that loses this
        // race sees zero affected rows and must back off with a conflict.
        let result = sqlx::query(
            "UPDATE stories SET status = 'generating', updated_at = now() \
             WHERE id = $1 AND status <> 'generating'",
        )
        .bind(story_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_generation_job(&self, story_id: Uuid, job_id: Uuid) -> PortResult<()> {
        sqlx::query(
            "UPDATE stories SET generation_job_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(story_id)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn finish_generation(
        &self,
        story_id: Uuid,
        page_count: u32,
        raw_model_output: &str,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE stories SET status = 'editing', page_count = $2, raw_model_output = $3, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(story_id)
        .bind(page_count as i32)
        .bind(raw_model_output)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn revert_generation(&self, story_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE stories SET status = 'draft', updated_at = now() WHERE id = $1")
            .bind(story_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn replace_pages(&self, story_id: Uuid, texts: &[String]) -> PortResult<Vec<Page>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The whole batch is replaced so page numbers stay dense at 1..=N
        // even when a story is regenerated.
        sqlx::query("DELETE FROM pages WHERE story_id = $1")
            .bind(story_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let insert_sql = format!(
            "INSERT INTO pages (id, story_id, page_number, original_text, current_text) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {PAGE_COLUMNS}"
        );

        let mut pages = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let row: PageRow = sqlx::query_as(&insert_sql)
                .bind(Uuid::new_v4())
                .bind(story_id)
                .bind((index + 1) as i32)
                .bind(text)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
            pages.push(row.try_into()?);
        }

        tx.commit().await.map_err(db_err)?;
        Ok(pages)
    }

    async fn get_pages(&self, story_id: Uuid) -> PortResult<Vec<Page>> {
        let sql = format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE story_id = $1 ORDER BY page_number"
        );
        let rows: Vec<PageRow> = sqlx::query_as(&sql)
            .bind(story_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(Page::try_from).collect()
    }

    async fn get_page(&self, story_id: Uuid, page_id: Uuid) -> PortResult<Page> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1 AND story_id = $2");
        let row: Option<PageRow> = sqlx::query_as(&sql)
            .bind(page_id)
            .bind(story_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or_else(|| PortError::NotFound(format!("Page {} not found", page_id)))?
            .try_into()
    }

    async fn set_page_image_status(&self, page_id: Uuid, status: ImageStatus) -> PortResult<()> {
        sqlx::query("UPDATE pages SET image_status = $2, updated_at = now() WHERE id = $1")
            .bind(page_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn attach_page_image(
        &self,
        page_id: Uuid,
        asset_id: Uuid,
        image_url: &str,
    ) -> PortResult<()> {
        sqlx::query(
            "UPDATE pages SET image_id = $2, image_url = $3, image_status = 'generated', \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(page_id)
        .bind(asset_id)
        .bind(image_url)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn create_job(&self, new_job: NewJob) -> PortResult<Job> {
        let sql = format!(
            "INSERT INTO jobs (id, job_type, status, user_id, story_id, page_id, input, max_retries) \
             VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7) RETURNING {JOB_COLUMNS}"
        );
        let row: JobRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(new_job.job_type.as_str())
            .bind(&new_job.user_id)
            .bind(new_job.story_id)
            .bind(new_job.page_id)
            .bind(&new_job.input)
            .bind(new_job.max_retries as i32)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        row.try_into()
    }

    async fn get_job(&self, job_id: Uuid) -> PortResult<Job> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let row: Option<JobRow> = sqlx::query_as(&sql)
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.ok_or_else(|| PortError::NotFound(format!("Job {} not found", job_id)))?
            .try_into()
    }

    async fn mark_job_processing(&self, job_id: Uuid) -> PortResult<()> {
        // Terminal jobs are immutable; the status guard makes every
        // transition statement a no-op once completed/failed is reached.
        sqlx::query(
            "UPDATE jobs SET status = 'processing', started_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid, output: Value) -> PortResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'completed', output = $2, completed_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(job_id)
        .bind(&output)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> PortResult<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'failed', error = $2, completed_at = now() \
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn create_asset(&self, new_asset: NewAsset) -> PortResult<Asset> {
        let sql = format!(
            "INSERT INTO assets (id, story_id, page_id, asset_type, source, storage_path, \
                 public_url, mime_type, size_bytes, generation_job_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {ASSET_COLUMNS}"
        );
        let row: AssetRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(new_asset.story_id)
            .bind(new_asset.page_id)
            .bind(new_asset.asset_type.as_str())
            .bind(new_asset.source.as_str())
            .bind(&new_asset.storage_path)
            .bind(&new_asset.public_url)
            .bind(&new_asset.mime_type)
            .bind(new_asset.size_bytes)
            .bind(new_asset.generation_job_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        row.try_into()
    }
}
