//! services/api/src/generation/image.rs
//!
//! Per-page illustration generation: retrying image client -> object
//! storage upload -> asset record, with a job tracking the attempt and the
//! page's image status reverted to `none` on any failure.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::json;
use std::time::Duration;
use storybook_core::domain::{AssetSource, AssetType, ImageStatus, JobType, Page, Story};
use storybook_core::ports::{
    DatabaseService, GeneratedImage, ImageGenerationService, ImageStorageService, NewAsset,
    NewJob, PortError, PortResult,
};
use storybook_core::prompt::build_image_prompt;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::storage::page_image_path;

use super::GenerationError;

/// What a successful image generation reports back to the caller.
#[derive(Debug, Clone)]
pub struct ImageGenerationOutcome {
    pub asset_id: Uuid,
    pub image_url: String,
    pub job_id: Uuid,
}

/// Calls the image model up to `max_retries` times, strictly sequentially.
///
/// After a rate-limited failure on attempt `n` (for `n < max_retries`) the
/// loop sleeps `2^n` seconds before the next attempt; other failures retry
/// immediately. There is no sleep after the final attempt. Exhaustion
/// produces a composed error naming the attempt count and the last error.
pub async fn generate_with_retry(
    service: &dyn ImageGenerationService,
    prompt: &str,
    max_retries: u32,
) -> PortResult<GeneratedImage> {
    let mut last_error = PortError::Unexpected("Image generation was never attempted".to_string());

    for attempt in 1..=max_retries {
        match service.generate(prompt).await {
            Ok(image) => return Ok(image),
            Err(err) => {
                warn!(attempt, max_retries, error = %err, "Image generation attempt failed");
                let rate_limited = err.is_rate_limited();
                last_error = err;

                if rate_limited && attempt < max_retries {
                    let backoff = Duration::from_secs(1u64 << attempt);
                    info!(attempt, backoff_secs = backoff.as_secs(), "Backing off after rate limit");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(PortError::Unexpected(format!(
        "Failed after {} attempts. Last error: {}",
        max_retries, last_error
    )))
}

/// Runs one page-image generation attempt end to end.
///
/// The caller must be the story owner (mismatch is `NotStoryOwner`, distinct
/// from not-found). Upload failure after a successful model call is treated
/// exactly like a generation failure: job failed, image status back to
/// `none`, no asset record, and no retry of the upload step.
pub async fn run_image_generation(
    db: &dyn DatabaseService,
    image_generator: &dyn ImageGenerationService,
    storage: &dyn ImageStorageService,
    story_id: Uuid,
    page_id: Uuid,
    caller_user_id: &str,
    max_retries: u32,
) -> Result<ImageGenerationOutcome, GenerationError> {
    let story = match db.get_story(story_id).await {
        Ok(story) => story,
        Err(PortError::NotFound(_)) => return Err(GenerationError::StoryNotFound(story_id)),
        Err(e) => return Err(e.into()),
    };

    if story.user_id != caller_user_id {
        warn!(story_id = %story_id, "Image generation rejected: caller does not own story");
        return Err(GenerationError::NotStoryOwner);
    }

    let page = match db.get_page(story_id, page_id).await {
        Ok(page) => page,
        Err(PortError::NotFound(_)) => return Err(GenerationError::PageNotFound(page_id)),
        Err(e) => return Err(e.into()),
    };

    let job = db
        .create_job(NewJob {
            job_type: JobType::ImageGeneration,
            user_id: caller_user_id.to_string(),
            story_id,
            page_id: Some(page_id),
            input: json!({
                "pageText": page.current_text,
                "storyTitle": story.title,
                "readingLevel": story.reading_level.as_str(),
                "pageNumber": page.page_number,
            }),
            max_retries,
        })
        .await?;

    db.mark_job_processing(job.id).await?;
    db.set_page_image_status(page_id, ImageStatus::Generating)
        .await?;

    info!(story_id = %story_id, page_id = %page_id, job_id = %job.id, "Image generation started");

    match attempt_image_generation(db, image_generator, storage, &story, &page, job.id, max_retries)
        .await
    {
        Ok(outcome) => {
            db.complete_job(
                job.id,
                json!({
                    "assetId": outcome.asset_id.to_string(),
                    "imageUrl": outcome.image_url,
                }),
            )
            .await?;
            info!(page_id = %page_id, job_id = %job.id, "Image generation completed");
            Ok(outcome)
        }
        Err(err) => {
            warn!(page_id = %page_id, job_id = %job.id, error = %err, "Image generation failed");
            if let Err(e) = db.fail_job(job.id, &err.to_string()).await {
                error!(job_id = %job.id, error = %e, "Failed to record job failure");
            }
            if let Err(e) = db.set_page_image_status(page_id, ImageStatus::None).await {
                error!(page_id = %page_id, error = %e, "Failed to reset page image status");
            }
            Err(err)
        }
    }
}

/// The fallible middle of the pipeline; the caller owns rollback.
async fn attempt_image_generation(
    db: &dyn DatabaseService,
    image_generator: &dyn ImageGenerationService,
    storage: &dyn ImageStorageService,
    story: &Story,
    page: &Page,
    job_id: Uuid,
    max_retries: u32,
) -> Result<ImageGenerationOutcome, GenerationError> {
    let prompt = build_image_prompt(
        &page.current_text,
        &story.title,
        story.reading_level,
        page.page_number,
    );

    let image = generate_with_retry(image_generator, &prompt, max_retries).await?;

    let data = BASE64
        .decode(image.data_base64.as_bytes())
        .map_err(|e| PortError::Unexpected(format!("Invalid base64 image payload: {}", e)))?;

    let path = page_image_path(story.id, page.id);
    let stored = storage.upload(&path, &data, &image.mime_type).await?;

    let asset = db
        .create_asset(NewAsset {
            story_id: story.id,
            page_id: page.id,
            asset_type: AssetType::Image,
            source: AssetSource::Generated,
            storage_path: stored.storage_path,
            public_url: stored.public_url.clone(),
            mime_type: image.mime_type,
            size_bytes: data.len() as i64,
            generation_job_id: Some(job_id),
        })
        .await?;

    db.attach_page_image(page.id, asset.id, &stored.public_url)
        .await?;

    Ok(ImageGenerationOutcome {
        asset_id: asset.id,
        image_url: stored.public_url,
        job_id,
    })
}
