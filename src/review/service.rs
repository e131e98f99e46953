//! Review service layer - Business logic for post-rental reviews

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::error::ApiError;
use crate::retry::{with_retry, RetryError, RetryPolicy};

use super::{CreateReviewRequest, Review, ReviewResponseRequest, ReviewWithReviewer};

/// Review service errors
#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Booking not found")]
    BookingNotFound,

    #[error("Review not found")]
    NotFound,

    #[error("Only the booking's renter can review it")]
    NotRenter,

    #[error("Only the reviewed owner can respond")]
    NotReviewee,

    #[error("Can only review completed bookings")]
    BookingNotCompleted,

    #[error("Review already exists for this booking")]
    AlreadyReviewed,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database connection failed after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },
}

impl From<sqlx::Error> for ReviewError {
    fn from(e: sqlx::Error) -> Self {
        ReviewError::DatabaseError(e.to_string())
    }
}

impl From<RetryError<sqlx::Error>> for ReviewError {
    fn from(e: RetryError<sqlx::Error>) -> Self {
        match e {
            RetryError::ConnectionExhausted { attempts, .. } => {
                ReviewError::ConnectionFailed { attempts }
            }
            RetryError::Operation(inner) => inner.into(),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(e: ReviewError) -> Self {
        match e {
            ReviewError::BookingNotFound | ReviewError::NotFound => {
                ApiError::NotFound(e.to_string())
            }
            ReviewError::NotRenter | ReviewError::NotReviewee => ApiError::Forbidden(e.to_string()),
            ReviewError::BookingNotCompleted => ApiError::InvalidState(e.to_string()),
            ReviewError::AlreadyReviewed => ApiError::Conflict(e.to_string()),
            ReviewError::ConnectionFailed { attempts } => ApiError::DatabaseUnavailable { attempts },
            ReviewError::DatabaseError(d) => ApiError::DatabaseError(d),
        }
    }
}

/// Review service
#[derive(Clone)]
pub struct ReviewService {
    db_pool: PgPool,
    retry_policy: RetryPolicy,
}

impl ReviewService {
    /// Create a new review service instance
    pub fn new(db_pool: PgPool, retry_policy: RetryPolicy) -> Self {
        Self {
            db_pool,
            retry_policy,
        }
    }

    /// Create a review for a completed booking.
    ///
    /// Only the booking's renter may review, only once, and only after the
    /// booking reached COMPLETED. The reviewee is the listing's owner.
    pub async fn create_review(
        &self,
        reviewer_id: Uuid,
        request: CreateReviewRequest,
    ) -> Result<Review, ReviewError> {
        let pool = self.db_pool.clone();
        let booking_id = request.booking_id;

        let booking: Option<Booking> = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
                    .bind(booking_id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        let booking = booking.ok_or(ReviewError::BookingNotFound)?;

        if booking.renter_id != reviewer_id {
            return Err(ReviewError::NotRenter);
        }

        if booking.status != BookingStatus::Completed {
            return Err(ReviewError::BookingNotCompleted);
        }

        let existing: Option<(Uuid,)> = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT id FROM reviews WHERE booking_id = $1")
                    .bind(booking_id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        if existing.is_some() {
            return Err(ReviewError::AlreadyReviewed);
        }

        let machinery_id = booking.machinery_id;
        let reviewee_id: (Uuid,) = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT owner_id FROM machinery WHERE id = $1")
                    .bind(machinery_id)
                    .fetch_one(&pool)
                    .await
            }
        })
        .await?;

        let review: Review = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let request = &request;
            async move {
                sqlx::query_as(
                    r#"
                    INSERT INTO reviews (
                        id, booking_id, machinery_id, reviewer_id, reviewee_id,
                        rating, comment, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(request.booking_id)
                .bind(machinery_id)
                .bind(reviewer_id)
                .bind(reviewee_id.0)
                .bind(request.rating)
                .bind(&request.comment)
                .bind(Utc::now())
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        tracing::info!(
            review_id = %review.id,
            booking_id = %booking_id,
            rating = review.rating,
            "Review created"
        );

        Ok(review)
    }

    /// Add the owner's response to a review; only the reviewee may respond
    pub async fn respond_to_review(
        &self,
        review_id: Uuid,
        actor_id: Uuid,
        request: ReviewResponseRequest,
    ) -> Result<Review, ReviewError> {
        let review = self.get(&review_id).await?.ok_or(ReviewError::NotFound)?;

        if review.reviewee_id != actor_id {
            return Err(ReviewError::NotReviewee);
        }

        let pool = self.db_pool.clone();
        let response = request.response;
        let review = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let response = response.clone();
            async move {
                sqlx::query_as(
                    "UPDATE reviews SET response = $1, updated_at = $2 WHERE id = $3 RETURNING *",
                )
                .bind(&response)
                .bind(Utc::now())
                .bind(review_id)
                .fetch_one(&pool)
                .await
            }
        })
        .await?;

        Ok(review)
    }

    /// Get a single review by ID
    pub async fn get(&self, id: &Uuid) -> Result<Option<Review>, ReviewError> {
        let pool = self.db_pool.clone();
        let id = *id;
        let review = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT * FROM reviews WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(review)
    }

    /// List reviews of a machinery listing, newest first
    pub async fn list_for_machinery(
        &self,
        machinery_id: Uuid,
    ) -> Result<Vec<ReviewWithReviewer>, ReviewError> {
        let pool = self.db_pool.clone();
        let reviews = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT r.*, u.name AS reviewer_name
                    FROM reviews r
                    JOIN users u ON u.id = r.reviewer_id
                    WHERE r.machinery_id = $1
                    ORDER BY r.created_at DESC
                    "#,
                )
                .bind(machinery_id)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        Ok(reviews)
    }
}
