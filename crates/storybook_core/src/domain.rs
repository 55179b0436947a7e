//! crates/storybook_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// The six grade bands a story can target. The band drives vocabulary,
/// sentence length, suggested page count, and illustration style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingLevel {
    Kindergarten,
    Grade1,
    Grade2,
    Grade3,
    Grade4,
    Grade5,
}

impl ReadingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingLevel::Kindergarten => "kindergarten",
            ReadingLevel::Grade1 => "grade1",
            ReadingLevel::Grade2 => "grade2",
            ReadingLevel::Grade3 => "grade3",
            ReadingLevel::Grade4 => "grade4",
            ReadingLevel::Grade5 => "grade5",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kindergarten" => Some(ReadingLevel::Kindergarten),
            "grade1" => Some(ReadingLevel::Grade1),
            "grade2" => Some(ReadingLevel::Grade2),
            "grade3" => Some(ReadingLevel::Grade3),
            "grade4" => Some(ReadingLevel::Grade4),
            "grade5" => Some(ReadingLevel::Grade5),
            _ => None,
        }
    }
}

/// Where a story sits in its lifecycle. Only the generation pipeline moves a
/// story draft -> generating -> editing; the single allowed regression is
/// generating -> draft when generation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryStatus {
    Draft,
    Generating,
    Editing,
    Complete,
    Purchased,
}

impl StoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoryStatus::Draft => "draft",
            StoryStatus::Generating => "generating",
            StoryStatus::Editing => "editing",
            StoryStatus::Complete => "complete",
            StoryStatus::Purchased => "purchased",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(StoryStatus::Draft),
            "generating" => Some(StoryStatus::Generating),
            "editing" => Some(StoryStatus::Editing),
            "complete" => Some(StoryStatus::Complete),
            "purchased" => Some(StoryStatus::Purchased),
            _ => None,
        }
    }
}

/// Illustration state of a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStatus {
    None,
    Generating,
    Uploaded,
    Generated,
}

impl ImageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStatus::None => "none",
            ImageStatus::Generating => "generating",
            ImageStatus::Uploaded => "uploaded",
            ImageStatus::Generated => "generated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(ImageStatus::None),
            "generating" => Some(ImageStatus::Generating),
            "uploaded" => Some(ImageStatus::Uploaded),
            "generated" => Some(ImageStatus::Generated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    StoryGeneration,
    ImageGeneration,
    PdfExport,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::StoryGeneration => "story_generation",
            JobType::ImageGeneration => "image_generation",
            JobType::PdfExport => "pdf_export",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "story_generation" => Some(JobType::StoryGeneration),
            "image_generation" => Some(JobType::ImageGeneration),
            "pdf_export" => Some(JobType::PdfExport),
            _ => None,
        }
    }
}

/// Lifecycle of one attempted AI operation. A job that reaches a terminal
/// state (completed or failed) is immutable; a retried generation creates a
/// new job rather than reusing the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetType {
    Image,
    Pdf,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Image => "image",
            AssetType::Pdf => "pdf",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(AssetType::Image),
            "pdf" => Some(AssetType::Pdf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    Upload,
    Generated,
}

impl AssetSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetSource::Upload => "upload",
            AssetSource::Generated => "generated",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(AssetSource::Upload),
            "generated" => Some(AssetSource::Generated),
            _ => None,
        }
    }
}

/// Optional authoring hints attached to a story at creation time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryMetadata {
    pub tone: Option<String>,
    pub illustration_hints: Option<String>,
}

/// A user's in-progress or finished illustrated book project.
/// The story is the aggregation root; it owns its pages.
#[derive(Debug, Clone)]
pub struct Story {
    pub id: Uuid,
    pub user_id: String, // Opaque id issued by the external auth provider
    pub title: String,
    pub outline: String,
    pub reading_level: ReadingLevel,
    pub status: StoryStatus,
    pub page_count: u32,
    pub raw_model_output: Option<String>,
    pub generation_job_id: Option<Uuid>,
    pub metadata: StoryMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One unit of story text (and optional illustration) within a story.
/// Page numbers are 1-based, dense, and fixed at batch creation.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: Uuid,
    pub story_id: Uuid,
    pub page_number: u32,
    pub original_text: String,
    pub current_text: String, // User-editable; starts equal to original_text
    pub is_locked: bool,
    pub image_status: ImageStatus,
    pub image_id: Option<Uuid>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An audit record of one attempted long-running AI operation.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub user_id: String,
    pub story_id: Uuid,
    pub page_id: Option<Uuid>,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A stored binary artifact (illustration or exported PDF) tied to a page.
/// Only created after a successful upload.
#[derive(Debug, Clone)]
pub struct Asset {
    pub id: Uuid,
    pub story_id: Uuid,
    pub page_id: Uuid,
    pub asset_type: AssetType,
    pub source: AssetSource,
    pub storage_path: String,
    pub public_url: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub generation_job_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [
            StoryStatus::Draft,
            StoryStatus::Generating,
            StoryStatus::Editing,
            StoryStatus::Complete,
            StoryStatus::Purchased,
        ] {
            assert_eq!(StoryStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(StoryStatus::from_str("archived"), None);
    }

    #[test]
    fn terminal_job_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn reading_level_wire_names() {
        assert_eq!(ReadingLevel::Kindergarten.as_str(), "kindergarten");
        assert_eq!(ReadingLevel::from_str("grade3"), Some(ReadingLevel::Grade3));
        assert_eq!(ReadingLevel::from_str("grade6"), None);
    }
}
