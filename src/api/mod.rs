mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::engine::MembershipEngine;

pub fn create_router(engine: MembershipEngine) -> Router {
    let api = Router::new()
        // Individuals
        .route("/individuals", get(handlers::list_individuals))
        .route("/individuals", post(handlers::register_individual))
        .route("/individuals/{student_id}", delete(handlers::withdraw_individual))
        // Groups
        .route("/groups", get(handlers::list_groups))
        .route("/groups", post(handlers::create_group))
        .route("/groups/{id}", get(handlers::get_group))
        .route("/groups/{id}", delete(handlers::disband_group))
        .route("/groups/{id}/members", post(handlers::add_member))
        .route("/groups/{id}/members/{student_id}", delete(handlers::remove_member))
        // Students
        .route("/students/{student_id}", get(handlers::student_state))
        .route("/students/{student_id}/switch", post(handlers::switch_group))
        // Views
        .route("/search", get(handlers::search))
        .route("/summary", get(handlers::summary))
        .route("/dashboard", get(handlers::dashboard))
        .route("/export", get(handlers::export))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(engine)
}
