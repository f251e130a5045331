// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // API v1 routes
        .service(
            web::scope("/api/v1")
                .route("/filters", web::get().to(handlers::get_filters))
                .route("/search", web::get().to(handlers::search_games))
                .route("/browse", web::get().to(handlers::browse_games))
                .route("/games", web::post().to(handlers::add_games)),
        );
}
