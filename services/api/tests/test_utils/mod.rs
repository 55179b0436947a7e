//! In-memory fakes for the service ports, used by the pipeline tests.
//! They mirror the conditional-update semantics of the Postgres adapter:
//! the generation claim is a compare-and-swap and terminal jobs are
//! immutable.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use storybook_core::domain::{
    Asset, ImageStatus, Job, JobStatus, Page, Story, StoryStatus,
};
use storybook_core::ports::{
    DatabaseService, GeneratedImage, ImageGenerationService, ImageStorageService, NewAsset,
    NewJob, NewStory, PortError, PortResult, StoredObject, StoryUpdate, TextGenerationService,
};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryDatabase {
    stories: Mutex<HashMap<Uuid, Story>>,
    pages: Mutex<HashMap<Uuid, Page>>,
    jobs: Mutex<HashMap<Uuid, Job>>,
    assets: Mutex<HashMap<Uuid, Asset>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }

    pub fn all_assets(&self) -> Vec<Asset> {
        self.assets.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn create_story(&self, new_story: NewStory) -> PortResult<Story> {
        let now = Utc::now();
        let story = Story {
            id: Uuid::new_v4(),
            user_id: new_story.user_id,
            title: new_story.title,
            outline: new_story.outline,
            reading_level: new_story.reading_level,
            status: StoryStatus::Draft,
            page_count: 0,
            raw_model_output: None,
            generation_job_id: None,
            metadata: new_story.metadata,
            created_at: now,
            updated_at: now,
        };
        self.stories.lock().unwrap().insert(story.id, story.clone());
        Ok(story)
    }

    async fn get_story(&self, story_id: Uuid) -> PortResult<Story> {
        self.stories
            .lock()
            .unwrap()
            .get(&story_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Story {} not found", story_id)))
    }

    async fn list_stories_for_user(&self, user_id: &str) -> PortResult<Vec<Story>> {
        let mut stories: Vec<Story> = self
            .stories
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(stories)
    }

    async fn update_story(&self, story_id: Uuid, update: StoryUpdate) -> PortResult<()> {
        let mut stories = self.stories.lock().unwrap();
        let story = stories
            .get_mut(&story_id)
            .ok_or_else(|| PortError::NotFound(format!("Story {} not found", story_id)))?;
        if let Some(title) = update.title {
            story.title = title;
        }
        if let Some(outline) = update.outline {
            story.outline = outline;
        }
        if let Some(reading_level) = update.reading_level {
            story.reading_level = reading_level;
        }
        if let Some(status) = update.status {
            story.status = status;
        }
        if let Some(metadata) = update.metadata {
            story.metadata = metadata;
        }
        story.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_story(&self, story_id: Uuid) -> PortResult<()> {
        let removed = self.stories.lock().unwrap().remove(&story_id);
        if removed.is_none() {
            return Err(PortError::NotFound(format!("Story {} not found", story_id)));
        }
        self.pages.lock().unwrap().retain(|_, p| p.story_id != story_id);
        self.assets.lock().unwrap().retain(|_, a| a.story_id != story_id);
        Ok(())
    }

    async fn try_claim_generation(&self, story_id: Uuid) -> PortResult<bool> {
        let mut stories = self.stories.lock().unwrap();
        match stories.get_mut(&story_id) {
            Some(story) if story.status != StoryStatus::Generating => {
                story.status = StoryStatus::Generating;
                story.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_generation_job(&self, story_id: Uuid, job_id: Uuid) -> PortResult<()> {
        if let Some(story) = self.stories.lock().unwrap().get_mut(&story_id) {
            story.generation_job_id = Some(job_id);
        }
        Ok(())
    }

    async fn finish_generation(
        &self,
        story_id: Uuid,
        page_count: u32,
        raw_model_output: &str,
    ) -> PortResult<()> {
        if let Some(story) = self.stories.lock().unwrap().get_mut(&story_id) {
            story.status = StoryStatus::Editing;
            story.page_count = page_count;
            story.raw_model_output = Some(raw_model_output.to_string());
            story.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn revert_generation(&self, story_id: Uuid) -> PortResult<()> {
        if let Some(story) = self.stories.lock().unwrap().get_mut(&story_id) {
            story.status = StoryStatus::Draft;
            story.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn replace_pages(&self, story_id: Uuid, texts: &[String]) -> PortResult<Vec<Page>> {
        let mut pages = self.pages.lock().unwrap();
        pages.retain(|_, p| p.story_id != story_id);

        let now = Utc::now();
        let mut created = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let page = Page {
                id: Uuid::new_v4(),
                story_id,
                page_number: (index + 1) as u32,
                original_text: text.clone(),
                current_text: text.clone(),
                is_locked: false,
                image_status: ImageStatus::None,
                image_id: None,
                image_url: None,
                created_at: now,
                updated_at: now,
            };
            pages.insert(page.id, page.clone());
            created.push(page);
        }
        Ok(created)
    }

    async fn get_pages(&self, story_id: Uuid) -> PortResult<Vec<Page>> {
        let mut pages: Vec<Page> = self
            .pages
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.story_id == story_id)
            .cloned()
            .collect();
        pages.sort_by_key(|p| p.page_number);
        Ok(pages)
    }

    async fn get_page(&self, story_id: Uuid, page_id: Uuid) -> PortResult<Page> {
        self.pages
            .lock()
            .unwrap()
            .get(&page_id)
            .filter(|p| p.story_id == story_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Page {} not found", page_id)))
    }

    async fn set_page_image_status(&self, page_id: Uuid, status: ImageStatus) -> PortResult<()> {
        if let Some(page) = self.pages.lock().unwrap().get_mut(&page_id) {
            page.image_status = status;
            page.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn attach_page_image(
        &self,
        page_id: Uuid,
        asset_id: Uuid,
        image_url: &str,
    ) -> PortResult<()> {
        if let Some(page) = self.pages.lock().unwrap().get_mut(&page_id) {
            page.image_id = Some(asset_id);
            page.image_url = Some(image_url.to_string());
            page.image_status = ImageStatus::Generated;
            page.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn create_job(&self, new_job: NewJob) -> PortResult<Job> {
        let job = Job {
            id: Uuid::new_v4(),
            job_type: new_job.job_type,
            status: JobStatus::Pending,
            user_id: new_job.user_id,
            story_id: new_job.story_id,
            page_id: new_job.page_id,
            input: new_job.input,
            output: None,
            error: None,
            retry_count: 0,
            max_retries: new_job.max_retries,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> PortResult<Job> {
        self.jobs
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Job {} not found", job_id)))
    }

    async fn mark_job_processing(&self, job_id: Uuid) -> PortResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Processing;
                job.started_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn complete_job(&self, job_id: Uuid, output: Value) -> PortResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Completed;
                job.output = Some(output);
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn fail_job(&self, job_id: Uuid, error: &str) -> PortResult<()> {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Failed;
                job.error = Some(error.to_string());
                job.completed_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn create_asset(&self, new_asset: NewAsset) -> PortResult<Asset> {
        let asset = Asset {
            id: Uuid::new_v4(),
            story_id: new_asset.story_id,
            page_id: new_asset.page_id,
            asset_type: new_asset.asset_type,
            source: new_asset.source,
            storage_path: new_asset.storage_path,
            public_url: new_asset.public_url,
            mime_type: new_asset.mime_type,
            size_bytes: new_asset.size_bytes,
            generation_job_id: new_asset.generation_job_id,
            created_at: Utc::now(),
        };
        self.assets.lock().unwrap().insert(asset.id, asset.clone());
        Ok(asset)
    }
}

/// Text generator that always returns the same scripted result.
pub struct ScriptedTextGenerator {
    response: PortResult<String>,
}

impl ScriptedTextGenerator {
    pub fn returning(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(PortError::Unexpected(message.to_string())),
        }
    }
}

#[async_trait]
impl TextGenerationService for ScriptedTextGenerator {
    async fn generate(&self, _prompt: &str) -> PortResult<String> {
        self.response.clone()
    }
}

/// Image generator that always returns the same scripted result and counts
/// how many times it was called.
pub struct ScriptedImageGenerator {
    response: PortResult<GeneratedImage>,
    attempts: AtomicU32,
}

impl ScriptedImageGenerator {
    pub fn returning_png(data_base64: &str) -> Self {
        Self {
            response: Ok(GeneratedImage {
                data_base64: data_base64.to_string(),
                mime_type: "image/png".to_string(),
            }),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(PortError::Unexpected(message.to_string())),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerationService for ScriptedImageGenerator {
    async fn generate(&self, _prompt: &str) -> PortResult<GeneratedImage> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Storage that records uploads in memory, optionally failing every call.
#[derive(Default)]
pub struct MemoryImageStorage {
    fail_uploads: bool,
    uploads: Mutex<Vec<(String, usize, String)>>,
}

impl MemoryImageStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_uploads: true,
            ..Self::default()
        }
    }

    pub fn uploads(&self) -> Vec<(String, usize, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStorageService for MemoryImageStorage {
    async fn upload(&self, path: &str, data: &[u8], mime_type: &str) -> PortResult<StoredObject> {
        if self.fail_uploads {
            return Err(PortError::Unexpected("Storage rejected the upload".to_string()));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), data.len(), mime_type.to_string()));
        Ok(StoredObject {
            storage_path: path.to_string(),
            public_url: format!("http://media.test/media/{}", path),
        })
    }
}
