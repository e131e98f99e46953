//! Review-related API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use super::AuthenticatedUser;
use crate::error::ApiError;
use crate::review::{CreateReviewRequest, Review, ReviewResponseRequest, ReviewWithReviewer};
use crate::state::AppState;

/// POST /api/reviews - Review a completed booking (its renter only)
pub async fn create_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    req.validate()?;

    let review = state.review_service.create_review(user.user_id, req).await?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// PATCH /api/reviews/:id/response - Owner responds to a review
pub async fn respond_to_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewResponseRequest>,
) -> Result<Json<Review>, ApiError> {
    req.validate()?;

    let review = state
        .review_service
        .respond_to_review(id, user.user_id, req)
        .await?;

    Ok(Json(review))
}

/// GET /api/machinery/:id/reviews - Reviews of a listing (public)
pub async fn list_machinery_reviews(
    State(state): State<AppState>,
    Path(machinery_id): Path<Uuid>,
) -> Result<Json<Vec<ReviewWithReviewer>>, ApiError> {
    let reviews = state.review_service.list_for_machinery(machinery_id).await?;

    Ok(Json(reviews))
}
