pub mod rest;
pub mod state;

// Re-export the handlers and shared state so the binary that assembles the
// router can pull everything from one place.
pub use rest::{
    create_story_handler, delete_story_handler, generate_page_image_handler,
    generate_story_handler, get_job_handler, get_story_handler, list_stories_handler,
    update_story_handler,
};
pub use state::AppState;
