//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        ContentSources, DbAdapter, EdgeChatAdapter, HttpProbe, QuranApiAdapter, RetryPolicy,
        SurahListCache,
    },
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        resolve_identity,
        rest::{
            ayah_handler, connection_handler, delete_bookmark_handler, juz_handler,
            juz_markers_handler, list_bookmarks_handler, list_surahs_handler, put_bookmark_handler,
            reading_stats_handler, record_reading_handler, resolve_juz_handler, surah_juz_handler,
            surah_pages_handler, tafsir_handler, word_by_word_handler, ApiDoc,
        },
        state::AppState,
        ws_handler,
    },
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
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
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder().build()?;

    let chat_adapter = Arc::new(EdgeChatAdapter::new(
        http_client.clone(),
        config.chat_endpoint_url.clone(),
        config.chat_api_key.clone(),
    ));

    let content_adapter = Arc::new(
        QuranApiAdapter::new(
            http_client.clone(),
            ContentSources {
                quran_base_url: config.quran_api_base_url.clone(),
                verses_base_url: config.tafsir_api_base_url.clone(),
                translation_edition: config.translation_edition.clone(),
                word_language: config.word_language.clone(),
                tafsir_id: config.tafsir_id,
            },
            SurahListCache::new(config.cache_dir.clone(), config.cache_ttl),
            RetryPolicy {
                max_attempts: config.fetch_max_retries,
                base_delay: config.fetch_base_delay,
            },
        )
        .map_err(|e| ApiError::Internal(format!("Invalid markup pattern: {}", e)))?,
    );

    let probe = Arc::new(HttpProbe::new(
        http_client,
        config.probe_url.clone(),
        config.probe_timeout,
        config.probe_slow_threshold,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        chat_adapter,
        content_adapter,
        probe,
    });

    // --- 5. CORS ---
    let allowed_origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Every route sees an optional identity; nothing is rejected for being anonymous.
    let api_router = Router::new()
        .route("/juz/resolve", get(resolve_juz_handler))
        .route("/juz/{juz}", get(juz_handler))
        .route("/surahs", get(list_surahs_handler))
        .route("/surahs/{surah}/juz", get(surah_juz_handler))
        .route("/surahs/{surah}/juz-markers", get(juz_markers_handler))
        .route("/surahs/{surah}/pages", get(surah_pages_handler))
        .route("/surahs/{surah}/ayahs/{ayah}", get(ayah_handler))
        .route("/surahs/{surah}/ayahs/{ayah}/words", get(word_by_word_handler))
        .route("/surahs/{surah}/ayahs/{ayah}/tafsir", get(tafsir_handler))
        .route("/connection", get(connection_handler))
        .route("/bookmarks", get(list_bookmarks_handler))
        .route(
            "/bookmarks/{surah}/{ayah}",
            put(put_bookmark_handler).delete(delete_bookmark_handler),
        )
        .route("/stats", get(reading_stats_handler))
        .route("/stats/reading", post(record_reading_handler))
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/chat", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            resolve_identity,
        ))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
