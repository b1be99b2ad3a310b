//! # Agri-Sentinel Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod config;

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use ag_api::middleware::{cors_policy, standard_middleware};
use ag_api::{configure_routes, AppState, Settings};
use anyhow::Context;

use crate::config::AppConfig;

#[cfg(feature = "db-sqlite")]
use ag_db_sqlite::SqliteStore;

#[cfg(feature = "storage-local")]
use ag_storage_local::LocalMediaStore;

#[cfg(feature = "auth-simple")]
use ag_auth_simple::SimpleAuthProvider;

#[cfg(not(all(feature = "db-sqlite", feature = "auth-simple")))]
compile_error!("agri-sentinel needs the `db-sqlite` and `auth-simple` features");

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env()?;
    if !config.has_session_salt() {
        log::warn!("AGRI_SESSION_SALT is not set; using a development salt");
    }

    // 1. Database
    let store = Arc::new(
        SqliteStore::new(&config.database_url)
            .await
            .with_context(|| format!("failed to open {}", config.database_url))?,
    );

    // 2. Auth
    let auth = Arc::new(
        SimpleAuthProvider::new(store.clone(), config.session_salt()).with_session_ttl(config.session_ttl()),
    );

    let settings = Settings {
        default_language: config.language,
        processing_delay: config.processing_delay(),
    };
    let state = AppState::new(store.clone(), store, auth, settings);

    // 3. Media (optional)
    #[cfg(feature = "storage-local")]
    let state = {
        std::fs::create_dir_all(&config.upload_dir)
            .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;
        state.with_media_store(Arc::new(LocalMediaStore::new(
            config.upload_dir.clone(),
            config.upload_url.clone(),
        )))
    };

    let state = web::Data::new(state);
    let upload_dir = config.upload_dir.clone();
    let upload_url = config.upload_url.trim_end_matches('/').to_string();

    log::info!("Agri-Sentinel starting on http://{}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(cors_policy())
            .wrap(standard_middleware())
            .app_data(state.clone())
            .service(actix_files::Files::new(&upload_url, &upload_dir))
            .configure(configure_routes)
    })
    .bind(&config.bind_addr)
    .with_context(|| format!("failed to bind {}", config.bind_addr))?
    .run()
    .await?;

    Ok(())
}
