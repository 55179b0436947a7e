//! services/api/src/generation/story.rs
//!
//! Full-story generation: prompt -> text model -> page parsing -> page
//! batch, with a job record tracking the attempt and rollback to draft on
//! any failure after the generation claim is taken.

use serde_json::json;
use storybook_core::domain::{JobType, Story};
use storybook_core::parser::parse_story_pages;
use storybook_core::ports::{DatabaseService, NewJob, PortError, TextGenerationService};
use storybook_core::prompt::build_story_prompt;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::GenerationError;

/// What a successful story generation reports back to the caller.
#[derive(Debug, Clone)]
pub struct StoryGenerationOutcome {
    pub page_count: u32,
    pub job_id: Uuid,
}

/// Runs one story generation attempt end to end.
///
/// State machine per attempt:
/// claim story (draft -> generating) -> job pending -> job processing ->
/// on success: pages replaced, story editing, job completed;
/// on failure: job failed, story back to draft.
///
/// The claim is a compare-and-swap, so of two concurrent requests exactly
/// one proceeds; the other gets `AlreadyGenerating` without creating a job.
pub async fn run_story_generation(
    db: &dyn DatabaseService,
    text_generator: &dyn TextGenerationService,
    story_id: Uuid,
) -> Result<StoryGenerationOutcome, GenerationError> {
    let story = match db.get_story(story_id).await {
        Ok(story) => story,
        Err(PortError::NotFound(_)) => return Err(GenerationError::StoryNotFound(story_id)),
        Err(e) => return Err(e.into()),
    };

    if !db.try_claim_generation(story_id).await? {
        info!(story_id = %story_id, "Rejected concurrent generation request");
        return Err(GenerationError::AlreadyGenerating);
    }

    // The claim is held from here on: every failure path must release it
    // by reverting the story to draft.
    let job = match db
        .create_job(NewJob {
            job_type: JobType::StoryGeneration,
            user_id: story.user_id.clone(),
            story_id,
            page_id: None,
            input: json!({
                "title": story.title,
                "outline": story.outline,
                "readingLevel": story.reading_level.as_str(),
            }),
            max_retries: 3,
        })
        .await
    {
        Ok(job) => job,
        Err(e) => {
            release_claim(db, story_id).await;
            return Err(e.into());
        }
    };

    info!(story_id = %story_id, job_id = %job.id, "Story generation started");

    match attempt_story_generation(db, text_generator, &story, job.id).await {
        Ok(outcome) => {
            info!(
                story_id = %story_id,
                job_id = %job.id,
                page_count = outcome.page_count,
                "Story generation completed"
            );
            Ok(outcome)
        }
        Err(err) => {
            warn!(story_id = %story_id, job_id = %job.id, error = %err, "Story generation failed");
            if let Err(e) = db.fail_job(job.id, &err.to_string()).await {
                error!(job_id = %job.id, error = %e, "Failed to record job failure");
            }
            release_claim(db, story_id).await;
            Err(err)
        }
    }
}

/// The fallible middle of the pipeline; the caller owns rollback.
async fn attempt_story_generation(
    db: &dyn DatabaseService,
    text_generator: &dyn TextGenerationService,
    story: &Story,
    job_id: Uuid,
) -> Result<StoryGenerationOutcome, GenerationError> {
    db.set_generation_job(story.id, job_id).await?;
    db.mark_job_processing(job_id).await?;

    let prompt = build_story_prompt(&story.title, &story.outline, story.reading_level);
    let raw_response = text_generator.generate(&prompt).await?;

    let page_texts = parse_story_pages(&raw_response);
    if page_texts.is_empty() {
        return Err(GenerationError::NoUsableContent);
    }

    let pages = db.replace_pages(story.id, &page_texts).await?;
    db.finish_generation(story.id, pages.len() as u32, &raw_response)
        .await?;

    let page_ids: Vec<String> = pages.iter().map(|p| p.id.to_string()).collect();
    db.complete_job(
        job_id,
        json!({
            "pageCount": pages.len(),
            "pageIds": page_ids,
        }),
    )
    .await?;

    Ok(StoryGenerationOutcome {
        page_count: pages.len() as u32,
        job_id,
    })
}

/// Returns the story to draft so the user can retry. Best effort: a story
/// stuck in `generating` would block all future attempts, so the failure
/// is logged loudly rather than swallowed silently.
async fn release_claim(db: &dyn DatabaseService, story_id: Uuid) {
    if let Err(e) = db.revert_generation(story_id).await {
        error!(story_id = %story_id, error = %e, "Failed to revert story to draft");
    }
}
