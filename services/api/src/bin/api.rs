//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        db::PgDatabase, gemini_image::{GeminiImageAdapter, GeminiImageConfig},
        storage::FileImageStorage, story_llm::OpenAiStoryAdapter,
    },
    config::Config,
    error::ApiError,
    web::{
        create_story_handler, delete_story_handler, generate_page_image_handler,
        generate_story_handler, get_job_handler, get_story_handler, list_stories_handler,
        rest::ApiDoc, state::AppState, update_story_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(PgDatabase::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let text_generator = Arc::new(OpenAiStoryAdapter::new(
        openai_client,
        config.story_model.clone(),
    ));

    let gemini_api_key = config
        .gemini_api_key
        .as_ref()
        .ok_or_else(|| ApiError::Internal("GEMINI_API_KEY is required".to_string()))?;
    let image_generator = Arc::new(GeminiImageAdapter::new(GeminiImageConfig::new(
        gemini_api_key,
        config.image_model.clone(),
    ))?);

    let image_storage = Arc::new(
        FileImageStorage::new(&config.media_dir, config.public_base_url.clone()).await?,
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        text_generator,
        image_generator,
        image_storage,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route(
            "/stories",
            post(create_story_handler).get(list_stories_handler),
        )
        .route(
            "/stories/{id}",
            get(get_story_handler)
                .patch(update_story_handler)
                .delete(delete_story_handler),
        )
        .route("/stories/{id}/generate", post(generate_story_handler))
        .route(
            "/stories/{id}/pages/{page_id}/generate-image",
            post(generate_page_image_handler),
        )
        .route("/jobs/{id}", get(get_job_handler))
        // Stored illustrations are served straight from the media root;
        // this is how the storage adapter's public URLs resolve.
        .nest_service("/media", ServeDir::new(&config.media_dir))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
