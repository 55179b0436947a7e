pub mod db;
pub mod gemini_image;
pub mod storage;
pub mod story_llm;

pub use db::PgDatabase;
pub use gemini_image::{GeminiImageAdapter, GeminiImageConfig};
pub use storage::{page_image_path, FileImageStorage};
pub use story_llm::OpenAiStoryAdapter;
