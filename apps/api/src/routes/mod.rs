pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::interview::handlers;
use crate::preferences::handlers as preferences;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Interview API
        .route("/api/v1/interviews", post(handlers::handle_start))
        .route(
            "/api/v1/interviews/:id",
            get(handlers::handle_get_interview).delete(handlers::handle_end_interview),
        )
        .route(
            "/api/v1/interviews/:id/next",
            post(handlers::handle_next_question),
        )
        .route(
            "/api/v1/interviews/:id/skip",
            post(handlers::handle_skip_question),
        )
        .route(
            "/api/v1/interviews/:id/answer",
            put(handlers::handle_draft_answer),
        )
        .route(
            "/api/v1/interviews/:id/submit",
            post(handlers::handle_submit_answer),
        )
        .route(
            "/api/v1/interviews/:id/feedback/detailed",
            post(handlers::handle_detailed_feedback),
        )
        .route(
            "/api/v1/interviews/:id/surfaces/:surface",
            get(handlers::handle_surface_snapshot),
        )
        .route(
            "/api/v1/interviews/:id/surfaces/:surface/events",
            get(handlers::handle_surface_events),
        )
        // Preferences API
        .route(
            "/api/v1/preferences/theme",
            get(preferences::handle_get_theme).put(preferences::handle_set_theme),
        )
        .route(
            "/api/v1/preferences/theme/toggle",
            post(preferences::handle_toggle_theme),
        )
        .with_state(state)
}
