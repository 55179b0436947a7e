//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::generation::{self, GenerationError};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storybook_core::domain::{Job, Page, ReadingLevel, Story, StoryMetadata, StoryStatus};
use storybook_core::ports::{NewStory, PortError, StoryUpdate};
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_story_handler,
        list_stories_handler,
        get_story_handler,
        update_story_handler,
        delete_story_handler,
        generate_story_handler,
        generate_page_image_handler,
        get_job_handler,
    ),
    components(
        schemas(
            CreateStoryRequest,
            CreateStoryResponse,
            UpdateStoryRequest,
            StoryMetadataDto,
            StoryDto,
            PageDto,
            JobDto,
            StoriesResponse,
            StoryWithPagesResponse,
            SuccessResponse,
            GenerateStoryResponse,
            GenerateImageResponse,
            JobResponse,
            ErrorBody,
            FieldIssue,
        )
    ),
    tags(
        (name = "Storybook API", description = "API endpoints for creating, generating, and illustrating storybooks.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// A JSON error payload, optionally carrying structured details
/// (e.g. field-level validation issues).
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// One field-level validation problem.
#[derive(Debug, Serialize, ToSchema)]
pub struct FieldIssue {
    pub field: &'static str,
    pub message: String,
}

#[derive(Deserialize, Serialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoryMetadataDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub illustration_hints: Option<String>,
}

impl From<StoryMetadata> for StoryMetadataDto {
    fn from(metadata: StoryMetadata) -> Self {
        Self {
            tone: metadata.tone,
            illustration_hints: metadata.illustration_hints,
        }
    }
}

impl From<StoryMetadataDto> for StoryMetadata {
    fn from(dto: StoryMetadataDto) -> Self {
        Self {
            tone: dto.tone,
            illustration_hints: dto.illustration_hints,
        }
    }
}

/// The request payload for creating a story.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryRequest {
    pub user_id: String,
    pub title: String,
    pub outline: String,
    pub reading_level: String,
    pub metadata: Option<StoryMetadataDto>,
}

/// The response payload sent after successfully creating a story.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryResponse {
    pub story_id: Uuid,
}

/// A partial story update. Absent fields are left untouched.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStoryRequest {
    pub title: Option<String>,
    pub outline: Option<String>,
    pub reading_level: Option<String>,
    pub status: Option<String>,
    pub metadata: Option<StoryMetadataDto>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryDto {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub outline: String,
    pub reading_level: String,
    pub status: String,
    pub page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_model_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_job_id: Option<Uuid>,
    pub metadata: StoryMetadataDto,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Story> for StoryDto {
    fn from(story: Story) -> Self {
        Self {
            id: story.id,
            user_id: story.user_id,
            title: story.title,
            outline: story.outline,
            reading_level: story.reading_level.as_str().to_string(),
            status: story.status.as_str().to_string(),
            page_count: story.page_count,
            raw_model_output: story.raw_model_output,
            generation_job_id: story.generation_job_id,
            metadata: story.metadata.into(),
            created_at: story.created_at,
            updated_at: story.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageDto {
    pub id: Uuid,
    pub story_id: Uuid,
    pub page_number: u32,
    pub original_text: String,
    pub current_text: String,
    pub is_locked: bool,
    pub image_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Page> for PageDto {
    fn from(page: Page) -> Self {
        Self {
            id: page.id,
            story_id: page.story_id,
            page_number: page.page_number,
            original_text: page.original_text,
            current_text: page.current_text,
            is_locked: page.is_locked,
            image_status: page.image_status.as_str().to_string(),
            image_id: page.image_id,
            image_url: page.image_url,
            created_at: page.created_at,
            updated_at: page.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobDto {
    pub id: Uuid,
    pub job_type: String,
    pub status: String,
    pub user_id: String,
    pub story_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<Uuid>,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobDto {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type.as_str().to_string(),
            status: job.status.as_str().to_string(),
            user_id: job.user_id,
            story_id: job.story_id,
            page_id: job.page_id,
            input: job.input,
            output: job.output,
            error: job.error,
            retry_count: job.retry_count,
            max_retries: job.max_retries,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StoriesResponse {
    pub stories: Vec<StoryDto>,
}

#[derive(Serialize, ToSchema)]
pub struct StoryWithPagesResponse {
    pub story: StoryDto,
    pub pages: Vec<PageDto>,
}

#[derive(Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateStoryResponse {
    pub success: bool,
    pub page_count: u32,
    pub job_id: Uuid,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub success: bool,
    pub image_url: String,
    pub asset_id: Uuid,
    pub job_id: Uuid,
}

#[derive(Serialize, ToSchema)]
pub struct JobResponse {
    pub job: JobDto,
}

#[derive(Deserialize)]
pub struct ListStoriesQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

//=========================================================================================
// Error Helpers
//=========================================================================================

type HandlerError = (StatusCode, Json<ErrorBody>);

fn error_response(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
            details: None,
        }),
    )
}

fn internal_error(message: impl Into<String>, err: impl std::fmt::Display) -> HandlerError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: message.into(),
            details: Some(serde_json::Value::String(err.to_string())),
        }),
    )
}

fn story_not_found(story_id: Uuid) -> HandlerError {
    error_response(StatusCode::NOT_FOUND, format!("Story {} not found", story_id))
}

/// Maps a pipeline failure onto the HTTP taxonomy: 404 for missing
/// entities, 409 for the concurrent-generation conflict, 403 for owner
/// mismatch, and a generic 500 (with captured detail) for everything else.
fn generation_error_response(err: GenerationError, context: &'static str) -> HandlerError {
    match err {
        GenerationError::StoryNotFound(_) | GenerationError::PageNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, err.to_string())
        }
        GenerationError::AlreadyGenerating => {
            error_response(StatusCode::CONFLICT, err.to_string())
        }
        GenerationError::NotStoryOwner => {
            error_response(StatusCode::FORBIDDEN, "Unauthorized")
        }
        GenerationError::NoUsableContent | GenerationError::Port(_) => {
            internal_error(context, err)
        }
    }
}

//=========================================================================================
// Validation
//=========================================================================================

fn validate_create_story(request: CreateStoryRequest) -> Result<NewStory, Vec<FieldIssue>> {
    let mut issues = Vec::new();

    if request.user_id.trim().is_empty() {
        issues.push(FieldIssue {
            field: "userId",
            message: "userId must not be empty".to_string(),
        });
    }

    let title_len = request.title.chars().count();
    if request.title.trim().is_empty() || title_len > 200 {
        issues.push(FieldIssue {
            field: "title",
            message: "title must be between 1 and 200 characters".to_string(),
        });
    }

    let outline_len = request.outline.chars().count();
    if !(10..=2000).contains(&outline_len) {
        issues.push(FieldIssue {
            field: "outline",
            message: "outline must be between 10 and 2000 characters".to_string(),
        });
    }

    let reading_level = ReadingLevel::from_str(&request.reading_level);
    if reading_level.is_none() {
        issues.push(FieldIssue {
            field: "readingLevel",
            message: format!("'{}' is not a valid reading level", request.reading_level),
        });
    }

    match (issues.is_empty(), reading_level) {
        (true, Some(reading_level)) => Ok(NewStory {
            user_id: request.user_id,
            title: request.title,
            outline: request.outline,
            reading_level,
            metadata: request.metadata.map(Into::into).unwrap_or_default(),
        }),
        _ => Err(issues),
    }
}

fn validate_update_story(request: UpdateStoryRequest) -> Result<StoryUpdate, Vec<FieldIssue>> {
    let mut issues = Vec::new();

    let reading_level = match request.reading_level {
        Some(raw) => match ReadingLevel::from_str(&raw) {
            Some(level) => Some(level),
            None => {
                issues.push(FieldIssue {
                    field: "readingLevel",
                    message: format!("'{}' is not a valid reading level", raw),
                });
                None
            }
        },
        None => None,
    };

    let status = match request.status {
        Some(raw) => match StoryStatus::from_str(&raw) {
            Some(status) => Some(status),
            None => {
                issues.push(FieldIssue {
                    field: "status",
                    message: format!("'{}' is not a valid story status", raw),
                });
                None
            }
        },
        None => None,
    };

    if issues.is_empty() {
        Ok(StoryUpdate {
            title: request.title,
            outline: request.outline,
            reading_level,
            status,
            metadata: request.metadata.map(Into::into),
        })
    } else {
        Err(issues)
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new story in draft status.
#[utoipa::path(
    post,
    path = "/stories",
    request_body = CreateStoryRequest,
    responses(
        (status = 201, description = "Story created", body = CreateStoryResponse),
        (status = 400, description = "Validation failure with field-level issues", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    )
)]
pub async fn create_story_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let new_story = validate_create_story(request).map_err(|issues| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Validation failed".to_string(),
                details: serde_json::to_value(issues).ok(),
            }),
        )
    })?;

    let story = app_state.db.create_story(new_story).await.map_err(|e| {
        error!("Failed to create story: {:?}", e);
        internal_error("Failed to create story", e)
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateStoryResponse { story_id: story.id }),
    ))
}

/// List a user's stories, newest first.
#[utoipa::path(
    get,
    path = "/stories",
    params(("userId" = String, Query, description = "Owner of the stories to list")),
    responses(
        (status = 200, description = "The user's stories", body = StoriesResponse),
        (status = 400, description = "Missing userId", body = ErrorBody)
    )
)]
pub async fn list_stories_handler(
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<ListStoriesQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "userId is required"))?;

    let stories = app_state
        .db
        .list_stories_for_user(&user_id)
        .await
        .map_err(|e| {
            error!("Failed to list stories: {:?}", e);
            internal_error("Failed to fetch stories", e)
        })?;

    Ok(Json(StoriesResponse {
        stories: stories.into_iter().map(Into::into).collect(),
    }))
}

/// Fetch a story together with its pages, ordered by page number.
#[utoipa::path(
    get,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 200, description = "Story with pages", body = StoryWithPagesResponse),
        (status = 404, description = "Unknown story", body = ErrorBody)
    )
)]
pub async fn get_story_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let story = match app_state.db.get_story(story_id).await {
        Ok(story) => story,
        Err(PortError::NotFound(_)) => return Err(story_not_found(story_id)),
        Err(e) => {
            error!("Failed to fetch story: {:?}", e);
            return Err(internal_error("Failed to fetch story", e));
        }
    };

    let pages = app_state.db.get_pages(story_id).await.map_err(|e| {
        error!("Failed to fetch pages: {:?}", e);
        internal_error("Failed to fetch story", e)
    })?;

    Ok(Json(StoryWithPagesResponse {
        story: story.into(),
        pages: pages.into_iter().map(Into::into).collect(),
    }))
}

/// Apply a partial update to a story.
#[utoipa::path(
    patch,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    request_body = UpdateStoryRequest,
    responses(
        (status = 200, description = "Story updated", body = SuccessResponse),
        (status = 400, description = "Validation failure", body = ErrorBody),
        (status = 404, description = "Unknown story", body = ErrorBody)
    )
)]
pub async fn update_story_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<Uuid>,
    Json(request): Json<UpdateStoryRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let update = validate_update_story(request).map_err(|issues| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "Validation failed".to_string(),
                details: serde_json::to_value(issues).ok(),
            }),
        )
    })?;

    match app_state.db.update_story(story_id, update).await {
        Ok(()) => Ok(Json(SuccessResponse { success: true })),
        Err(PortError::NotFound(_)) => Err(story_not_found(story_id)),
        Err(e) => {
            error!("Failed to update story: {:?}", e);
            Err(internal_error("Failed to update story", e))
        }
    }
}

/// Delete a story and all of its pages.
#[utoipa::path(
    delete,
    path = "/stories/{id}",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 200, description = "Story deleted", body = SuccessResponse),
        (status = 404, description = "Unknown story", body = ErrorBody)
    )
)]
pub async fn delete_story_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    match app_state.db.delete_story(story_id).await {
        Ok(()) => Ok(Json(SuccessResponse { success: true })),
        Err(PortError::NotFound(_)) => Err(story_not_found(story_id)),
        Err(e) => {
            error!("Failed to delete story: {:?}", e);
            Err(internal_error("Failed to delete story", e))
        }
    }
}

/// Generate the story text and create its pages.
#[utoipa::path(
    post,
    path = "/stories/{id}/generate",
    params(("id" = Uuid, Path, description = "Story id")),
    responses(
        (status = 200, description = "Generation finished", body = GenerateStoryResponse),
        (status = 404, description = "Unknown story", body = ErrorBody),
        (status = 409, description = "Story is already being generated", body = ErrorBody),
        (status = 500, description = "Generation failed", body = ErrorBody)
    )
)]
pub async fn generate_story_handler(
    State(app_state): State<Arc<AppState>>,
    Path(story_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let outcome = generation::run_story_generation(
        app_state.db.as_ref(),
        app_state.text_generator.as_ref(),
        story_id,
    )
    .await
    .map_err(|err| generation_error_response(err, "Failed to generate story"))?;

    Ok(Json(GenerateStoryResponse {
        success: true,
        page_count: outcome.page_count,
        job_id: outcome.job_id,
    }))
}

/// Generate an illustration for one page.
///
/// Requires `Authorization: Bearer <userId>`; the caller must own the story.
#[utoipa::path(
    post,
    path = "/stories/{id}/pages/{page_id}/generate-image",
    params(
        ("id" = Uuid, Path, description = "Story id"),
        ("page_id" = Uuid, Path, description = "Page id")
    ),
    responses(
        (status = 200, description = "Illustration generated and stored", body = GenerateImageResponse),
        (status = 401, description = "Missing bearer token", body = ErrorBody),
        (status = 403, description = "Caller does not own the story", body = ErrorBody),
        (status = 404, description = "Unknown story or page", body = ErrorBody),
        (status = 500, description = "Generation or upload failed", body = ErrorBody)
    )
)]
pub async fn generate_page_image_handler(
    State(app_state): State<Arc<AppState>>,
    Path((story_id, page_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let user_id = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    let outcome = generation::run_image_generation(
        app_state.db.as_ref(),
        app_state.image_generator.as_ref(),
        app_state.image_storage.as_ref(),
        story_id,
        page_id,
        user_id,
        app_state.config.image_max_retries,
    )
    .await
    .map_err(|err| generation_error_response(err, "Failed to generate image"))?;

    Ok(Json(GenerateImageResponse {
        success: true,
        image_url: outcome.image_url,
        asset_id: outcome.asset_id,
        job_id: outcome.job_id,
    }))
}

/// Fetch one job audit record.
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "The job record", body = JobResponse),
        (status = 404, description = "Unknown job", body = ErrorBody)
    )
)]
pub async fn get_job_handler(
    State(app_state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    match app_state.db.get_job(job_id).await {
        Ok(job) => Ok(Json(JobResponse { job: job.into() })),
        Err(PortError::NotFound(_)) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("Job {} not found", job_id),
        )),
        Err(e) => {
            error!("Failed to fetch job: {:?}", e);
            Err(internal_error("Failed to fetch job", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> CreateStoryRequest {
        CreateStoryRequest {
            user_id: "user-1".to_string(),
            title: "Luna".to_string(),
            outline: "A curious cat sneaks onto a rocket and visits the moon.".to_string(),
            reading_level: "grade1".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn accepts_a_valid_create_request() {
        let new_story = validate_create_story(valid_request()).unwrap();
        assert_eq!(new_story.reading_level, ReadingLevel::Grade1);
        assert_eq!(new_story.title, "Luna");
    }

    #[test]
    fn rejects_short_outline_with_field_issue() {
        let mut request = valid_request();
        request.outline = "too short".to_string();
        let issues = validate_create_story(request).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "outline");
    }

    #[test]
    fn rejects_unknown_reading_level() {
        let mut request = valid_request();
        request.reading_level = "grade9".to_string();
        let issues = validate_create_story(request).unwrap_err();
        assert!(issues.iter().any(|i| i.field == "readingLevel"));
    }

    #[test]
    fn collects_multiple_issues_at_once() {
        let request = CreateStoryRequest {
            user_id: "  ".to_string(),
            title: String::new(),
            outline: "x".to_string(),
            reading_level: "college".to_string(),
            metadata: None,
        };
        let issues = validate_create_story(request).unwrap_err();
        assert_eq!(issues.len(), 4);
    }

    #[test]
    fn update_validation_maps_enum_strings() {
        let update = validate_update_story(UpdateStoryRequest {
            title: Some("New title".to_string()),
            outline: None,
            reading_level: Some("grade4".to_string()),
            status: Some("complete".to_string()),
            metadata: None,
        })
        .unwrap();
        assert_eq!(update.reading_level, Some(ReadingLevel::Grade4));
        assert_eq!(update.status, Some(StoryStatus::Complete));
        assert_eq!(update.title.as_deref(), Some("New title"));
    }

    #[test]
    fn update_validation_rejects_bad_status() {
        let issues = validate_update_story(UpdateStoryRequest {
            title: None,
            outline: None,
            reading_level: None,
            status: Some("archived".to_string()),
            metadata: None,
        })
        .unwrap_err();
        assert_eq!(issues[0].field, "status");
    }
}
