//! Machinery route definitions

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{machinery, review};
use crate::state::AppState;

pub fn machinery_routes() -> Router<AppState> {
    Router::new()
        .route("/api/machinery", get(machinery::list_machinery))
        .route("/api/machinery", post(machinery::create_machinery))
        .route("/api/machinery/:id", get(machinery::get_machinery))
        .route("/api/machinery/:id", put(machinery::update_machinery))
        .route("/api/machinery/:id", delete(machinery::delete_machinery))
        .route(
            "/api/machinery/:id/reviews",
            get(review::list_machinery_reviews),
        )
}
