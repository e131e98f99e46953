//! Review route definitions

use axum::{
    routing::{patch, post},
    Router,
};

use crate::handlers::review;
use crate::state::AppState;

pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reviews", post(review::create_review))
        .route(
            "/api/reviews/:id/response",
            patch(review::respond_to_review),
        )
}
