//! Review models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Review model: one per completed booking
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub machinery_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    /// Written by the reviewed owner, if they choose to reply
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating a review
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub booking_id: Uuid,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    pub comment: Option<String>,
}

/// Request DTO for the owner's response to a review
#[derive(Debug, Deserialize, Validate)]
pub struct ReviewResponseRequest {
    #[validate(length(min = 1, message = "Response is required"))]
    pub response: String,
}

/// Review with the reviewer's public profile attached
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ReviewWithReviewer {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub machinery_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewee_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub reviewer_name: String,
}
