//! services/api/src/generation/mod.rs
//!
//! The generation pipeline: orchestrates the prompt builder, the model
//! clients, the page parser, persistence, and job bookkeeping for
//! full-story and per-page-image generation.

pub mod image;
pub mod story;

use storybook_core::ports::PortError;
use uuid::Uuid;

pub use image::{generate_with_retry, run_image_generation, ImageGenerationOutcome};
pub use story::{run_story_generation, StoryGenerationOutcome};

/// Failures a generation request can surface to the HTTP layer. Every
/// failure after a job has been opened is also recorded on that job.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Story {0} not found")]
    StoryNotFound(Uuid),

    #[error("Page {0} not found")]
    PageNotFound(Uuid),

    /// The story already holds the generation claim; the losing request
    /// creates no job and no pages.
    #[error("Story is already being generated")]
    AlreadyGenerating,

    /// The caller is not the story owner. Distinct from not-found.
    #[error("Caller does not own this story")]
    NotStoryOwner,

    /// The model response parsed to zero pages; zero-page stories are
    /// never created.
    #[error("No pages generated from model response")]
    NoUsableContent,

    #[error(transparent)]
    Port(#[from] PortError),
}
