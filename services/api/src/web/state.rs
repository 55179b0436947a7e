//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.
//!
//! All SDK clients are constructed explicitly at startup and injected here;
//! no component reaches for a process-wide singleton.

use crate::config::Config;
use std::sync::Arc;
use storybook_core::ports::{
    DatabaseService, ImageGenerationService, ImageStorageService, TextGenerationService,
};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub text_generator: Arc<dyn TextGenerationService>,
    pub image_generator: Arc<dyn ImageGenerationService>,
    pub image_storage: Arc<dyn ImageStorageService>,
}
