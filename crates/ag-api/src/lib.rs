//! # ag-api
//!
//! The web routing and orchestration layer for Agri-Sentinel.

pub mod api;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, Settings};

use actix_web::web;

/// Registers the HTML views and the JSON API.
///
/// Static assets (uploaded images) are mounted by the binary, since only it
/// knows where the media store writes them.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/queries", web::get().to(api::list_queries))
            .route("/queries", web::post().to(api::create_query))
            .route("/queries", web::delete().to(api::delete_all))
            .route("/queries/{id}", web::get().to(api::get_query))
            .route("/queries/{id}", web::delete().to(api::delete_query))
            .route("/voice/start", web::post().to(api::voice_start))
            .route("/voice/chunk", web::post().to(api::voice_chunk))
            .route("/voice/stop", web::post().to(api::voice_stop)),
    )
    .service(
        web::scope("/auth")
            .route("", web::get().to(handlers::auth_page))
            .route("/signin", web::post().to(handlers::sign_in))
            .route("/signup", web::post().to(handlers::sign_up))
            .route("/demo", web::post().to(handlers::demo_login))
            .route("/signout", web::post().to(handlers::sign_out)),
    )
    .route("/", web::get().to(handlers::index))
    .route("/ask", web::get().to(handlers::ask_form))
    .route("/ask", web::post().to(handlers::submit_question))
    .route("/history", web::get().to(handlers::history))
    .route("/history/clear", web::post().to(handlers::clear_history))
    .route("/history/{id}/delete", web::post().to(handlers::delete_query))
    .route("/results/{id}", web::get().to(handlers::view_result))
    .route("/profile", web::get().to(handlers::profile))
    .route("/profile", web::post().to(handlers::save_profile))
    .route("/lang/{code}", web::get().to(handlers::set_language));
}
