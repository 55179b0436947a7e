//! crates/storybook_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{
    Asset, AssetSource, AssetType, ImageStatus, Job, JobType, Page, ReadingLevel, Story,
    StoryMetadata, StoryStatus,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The upstream service rejected the call for quota or rate-limit reasons.
    /// Only the image-generation path differentiates this from other failures,
    /// because only that path has retry behavior keyed on it.
    #[error("Upstream rate limit: {0}")]
    RateLimited(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, PortError::RateLimited(_))
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Port Input / Output Structs
//=========================================================================================

/// Everything needed to create a story record in draft status.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub user_id: String,
    pub title: String,
    pub outline: String,
    pub reading_level: ReadingLevel,
    pub metadata: StoryMetadata,
}

/// A typed partial update for a story. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct StoryUpdate {
    pub title: Option<String>,
    pub outline: Option<String>,
    pub reading_level: Option<ReadingLevel>,
    pub status: Option<StoryStatus>,
    pub metadata: Option<StoryMetadata>,
}

impl StoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.outline.is_none()
            && self.reading_level.is_none()
            && self.status.is_none()
            && self.metadata.is_none()
    }
}

/// Everything needed to open a job record in pending status.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: JobType,
    pub user_id: String,
    pub story_id: Uuid,
    pub page_id: Option<Uuid>,
    pub input: Value,
    pub max_retries: u32,
}

/// Everything needed to record a successfully uploaded artifact.
#[derive(Debug, Clone)]
pub struct NewAsset {
    pub story_id: Uuid,
    pub page_id: Uuid,
    pub asset_type: AssetType,
    pub source: AssetSource,
    pub storage_path: String,
    pub public_url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub generation_job_id: Option<Uuid>,
}

/// The raw result of one image-model call: base64 payload plus MIME type.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub data_base64: String,
    pub mime_type: String,
}

/// Where an uploaded object landed and how the public can reach it.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub storage_path: String,
    pub public_url: String,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Story Management ---
    async fn create_story(&self, new_story: NewStory) -> PortResult<Story>;

    async fn get_story(&self, story_id: Uuid) -> PortResult<Story>;

    /// Stories for one user, newest first.
    async fn list_stories_for_user(&self, user_id: &str) -> PortResult<Vec<Story>>;

    async fn update_story(&self, story_id: Uuid, update: StoryUpdate) -> PortResult<()>;

    /// Deletes the story together with its pages in one transaction.
    async fn delete_story(&self, story_id: Uuid) -> PortResult<()>;

    /// Atomically moves the story into `generating` unless it is already
    /// there. Returns `false` when another generation holds the claim, in
    /// which case the caller must not create a job or touch pages.
    async fn try_claim_generation(&self, story_id: Uuid) -> PortResult<bool>;

    /// Records the job driving the current generation attempt.
    async fn set_generation_job(&self, story_id: Uuid, job_id: Uuid) -> PortResult<()>;

    /// Moves a successfully generated story into `editing`, recording the
    /// page count and the raw model output.
    async fn finish_generation(
        &self,
        story_id: Uuid,
        page_count: u32,
        raw_model_output: &str,
    ) -> PortResult<()>;

    /// Returns a failed generation to `draft` so the user can retry.
    async fn revert_generation(&self, story_id: Uuid) -> PortResult<()>;

    // --- Page Management ---
    /// Replaces the story's pages with a fresh batch numbered 1..=N, in one
    /// transaction. Page numbers stay dense across regeneration.
    async fn replace_pages(&self, story_id: Uuid, texts: &[String]) -> PortResult<Vec<Page>>;

    /// Pages of a story ordered by page number.
    async fn get_pages(&self, story_id: Uuid) -> PortResult<Vec<Page>>;

    async fn get_page(&self, story_id: Uuid, page_id: Uuid) -> PortResult<Page>;

    async fn set_page_image_status(&self, page_id: Uuid, status: ImageStatus) -> PortResult<()>;

    /// Points the page at its freshly stored illustration and marks it
    /// `generated`. The previous reference, if any, is replaced wholesale.
    async fn attach_page_image(
        &self,
        page_id: Uuid,
        asset_id: Uuid,
        image_url: &str,
    ) -> PortResult<()>;

    // --- Job Management ---
    async fn create_job(&self, new_job: NewJob) -> PortResult<Job>;

    async fn get_job(&self, job_id: Uuid) -> PortResult<Job>;

    /// pending -> processing, stamping `started_at`. A no-op on terminal jobs.
    async fn mark_job_processing(&self, job_id: Uuid) -> PortResult<()>;

    /// Terminal success with an output snapshot. A no-op on terminal jobs.
    async fn complete_job(&self, job_id: Uuid, output: Value) -> PortResult<()>;

    /// Terminal failure with the captured error message. A no-op on terminal jobs.
    async fn fail_job(&self, job_id: Uuid, error: &str) -> PortResult<()>;

    // --- Asset Management ---
    async fn create_asset(&self, new_asset: NewAsset) -> PortResult<Asset>;
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Submits a prompt and returns the full generated text. No streaming;
    /// every upstream failure collapses to a generic error at this layer.
    async fn generate(&self, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    /// One attempt against the image model. Rate-limit rejections surface as
    /// `PortError::RateLimited` so the retry loop can back off; a response
    /// with no image part is an ordinary failure.
    async fn generate(&self, prompt: &str) -> PortResult<GeneratedImage>;
}

#[async_trait]
pub trait ImageStorageService: Send + Sync {
    /// Uploads a binary object and returns its storage path and public URL.
    async fn upload(&self, path: &str, data: &[u8], mime_type: &str) -> PortResult<StoredObject>;
}
