pub mod domain;
pub mod parser;
pub mod ports;
pub mod prompt;

pub use domain::{
    Asset, AssetSource, AssetType, ImageStatus, Job, JobStatus, JobType, Page, ReadingLevel,
    Story, StoryMetadata, StoryStatus,
};
pub use parser::parse_story_pages;
pub use ports::{
    DatabaseService, GeneratedImage, ImageGenerationService, ImageStorageService, NewAsset,
    NewJob, NewStory, PortError, PortResult, StoredObject, StoryUpdate, TextGenerationService,
};
pub use prompt::{build_image_prompt, build_story_prompt, level_profile, PAGE_DELIMITER};
