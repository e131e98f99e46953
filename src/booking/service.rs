//! Booking service layer - Admission and lifecycle logic for rentals
//!
//! Admission runs exists -> available -> overlap in order, each with its own
//! rejection reason, and the overlap check shares a SERIALIZABLE transaction
//! with the insert so concurrent requests for the same window cannot both
//! be admitted.

use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ApiError;
use crate::machinery::Machinery;
use crate::retry::{with_retry, RetryError, RetryPolicy};

use super::pricing::compute_price;
use super::{Booking, BookingStatus, BookingWithDetails, CreateBookingRequest, TransitionTarget};

/// Booking service errors; each admission precondition fails distinctly
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Machinery not found")]
    MachineryNotFound,

    #[error("Booking not found")]
    NotFound,

    #[error("Machinery is not available")]
    Unavailable,

    #[error("Machinery is already booked for the selected dates")]
    Conflict,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("Cannot move a booking from {current} to {requested}")]
    InvalidState {
        current: BookingStatus,
        requested: BookingStatus,
    },

    #[error("End time must be after start time")]
    InvalidTimeRange,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Database connection failed after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },
}

impl From<sqlx::Error> for BookingError {
    fn from(e: sqlx::Error) -> Self {
        BookingError::DatabaseError(e.to_string())
    }
}

impl From<RetryError<sqlx::Error>> for BookingError {
    fn from(e: RetryError<sqlx::Error>) -> Self {
        match e {
            RetryError::ConnectionExhausted { attempts, .. } => {
                BookingError::ConnectionFailed { attempts }
            }
            // Losing a serializable race against a concurrent admission is
            // a booking conflict, not a server fault
            RetryError::Operation(inner) if is_serialization_failure(&inner) => {
                BookingError::Conflict
            }
            RetryError::Operation(inner) => inner.into(),
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::MachineryNotFound | BookingError::NotFound => {
                ApiError::NotFound(e.to_string())
            }
            BookingError::Unavailable => ApiError::Unavailable(e.to_string()),
            BookingError::Conflict => ApiError::Conflict(e.to_string()),
            BookingError::Forbidden(msg) => ApiError::Forbidden(msg.to_string()),
            BookingError::InvalidState { .. } => ApiError::InvalidState(e.to_string()),
            BookingError::InvalidTimeRange => ApiError::ValidationError(e.to_string()),
            BookingError::ConnectionFailed { attempts } => {
                ApiError::DatabaseUnavailable { attempts }
            }
            BookingError::DatabaseError(d) => ApiError::DatabaseError(d),
        }
    }
}

fn is_serialization_failure(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|code| code == "40001")
        .unwrap_or(false)
}

/// Booking service for admission and lifecycle management
#[derive(Clone)]
pub struct BookingService {
    db_pool: PgPool,
    retry_policy: RetryPolicy,
}

impl BookingService {
    /// Create a new booking service instance
    pub fn new(db_pool: PgPool, retry_policy: RetryPolicy) -> Self {
        Self {
            db_pool,
            retry_policy,
        }
    }

    /// Admit a booking request.
    ///
    /// Preconditions, in order: the listing exists, its `available` flag is
    /// set, and no PENDING or CONFIRMED booking overlaps the requested
    /// window. Two closed intervals overlap iff `s1 <= e2 AND e1 >= s2`,
    /// so back-to-back bookings sharing a boundary instant are rejected.
    ///
    /// On success exactly one PENDING booking is persisted with its price
    /// computed from the listing's rates; on failure nothing is written.
    pub async fn create_booking(
        &self,
        renter_id: Uuid,
        request: CreateBookingRequest,
    ) -> Result<BookingWithDetails, BookingError> {
        if request.end_time <= request.start_time {
            return Err(BookingError::InvalidTimeRange);
        }

        let machinery = self
            .fetch_machinery(request.machinery_id)
            .await?
            .ok_or(BookingError::MachineryNotFound)?;

        if !machinery.available {
            return Err(BookingError::Unavailable);
        }

        let total_price = compute_price(
            request.start_time,
            request.end_time,
            machinery.hourly_rate,
            Some(machinery.daily_rate),
        );

        let pool = self.db_pool.clone();
        let machinery_id = machinery.id;
        let start_time = request.start_time;
        let end_time = request.end_time;
        let notes = request.notes.clone();

        // Overlap check and insert share one SERIALIZABLE transaction;
        // concurrent admissions for the same window serialize, and the
        // loser surfaces as a Conflict (see From<RetryError>).
        let admitted: Option<Booking> = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            let notes = notes.clone();
            async move {
                let mut tx = pool.begin().await?;

                sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                    .execute(&mut *tx)
                    .await?;

                let conflicting: Option<(Uuid,)> = sqlx::query_as(
                    r#"
                    SELECT id FROM bookings
                    WHERE machinery_id = $1
                      AND status IN ('PENDING', 'CONFIRMED')
                      AND start_time <= $3
                      AND end_time >= $2
                    LIMIT 1
                    "#,
                )
                .bind(machinery_id)
                .bind(start_time)
                .bind(end_time)
                .fetch_optional(&mut *tx)
                .await?;

                if conflicting.is_some() {
                    tx.rollback().await?;
                    return Ok(None);
                }

                let booking: Booking = sqlx::query_as(
                    r#"
                    INSERT INTO bookings (
                        id, machinery_id, renter_id, start_time, end_time,
                        status, total_price, notes, created_at, updated_at
                    )
                    VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7, $8, $8)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(machinery_id)
                .bind(renter_id)
                .bind(start_time)
                .bind(end_time)
                .bind(total_price)
                .bind(&notes)
                .fetch_one(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(Some(booking))
            }
        })
        .await?;

        let booking = admitted.ok_or(BookingError::Conflict)?;

        tracing::info!(
            booking_id = %booking.id,
            machinery_id = %machinery_id,
            renter_id = %renter_id,
            total_price = total_price,
            "Booking created"
        );

        self.fetch_details(booking.id)
            .await?
            .ok_or(BookingError::NotFound)
    }

    /// Transition a booking's status on behalf of `actor_id`.
    ///
    /// Approve/reject is reserved to the listing owner on a PENDING
    /// booking; cancellation to the renter (while PENDING or CONFIRMED) or
    /// the owner (while PENDING). Actor checks run before state checks, so
    /// a wrong actor is always Forbidden regardless of status.
    pub async fn transition_booking(
        &self,
        booking_id: Uuid,
        actor_id: Uuid,
        target: TransitionTarget,
    ) -> Result<BookingWithDetails, BookingError> {
        let booking = self
            .fetch_details(booking_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        let requested = target.as_status();
        let is_owner = actor_id == booking.machinery_owner_id;
        let is_renter = actor_id == booking.renter_id;

        let allowed_sources: &[BookingStatus] = match target {
            TransitionTarget::Confirmed | TransitionTarget::Rejected => {
                if !is_owner {
                    return Err(BookingError::Forbidden(
                        "Only the machinery owner can approve or reject a booking",
                    ));
                }
                &[BookingStatus::Pending]
            }
            TransitionTarget::Cancelled => {
                if is_renter {
                    &[BookingStatus::Pending, BookingStatus::Confirmed]
                } else if is_owner {
                    &[BookingStatus::Pending]
                } else {
                    return Err(BookingError::Forbidden(
                        "Only the renter or the machinery owner can cancel a booking",
                    ));
                }
            }
        };

        if !allowed_sources.contains(&booking.status) {
            return Err(BookingError::InvalidState {
                current: booking.status,
                requested,
            });
        }

        self.update_status(booking_id, requested).await?;

        tracing::info!(
            booking_id = %booking_id,
            actor_id = %actor_id,
            status = %requested,
            "Booking status updated"
        );

        self.fetch_details(booking_id)
            .await?
            .ok_or(BookingError::NotFound)
    }

    /// Mark a CONFIRMED booking COMPLETED.
    ///
    /// Completion is owned by an external process (billing close-out,
    /// scheduled sweep); no HTTP route drives this directly.
    pub async fn complete_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let booking = self
            .fetch_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::InvalidState {
                current: booking.status,
                requested: BookingStatus::Completed,
            });
        }

        self.update_status(booking_id, BookingStatus::Completed)
            .await?;

        self.fetch_booking(booking_id)
            .await?
            .ok_or(BookingError::NotFound)
    }

    /// Get a booking with details; visible to its renter and the listing
    /// owner only
    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        actor_id: Uuid,
    ) -> Result<BookingWithDetails, BookingError> {
        let booking = self
            .fetch_details(booking_id)
            .await?
            .ok_or(BookingError::NotFound)?;

        if actor_id != booking.renter_id && actor_id != booking.machinery_owner_id {
            return Err(BookingError::Forbidden(
                "Only the renter or the machinery owner can view this booking",
            ));
        }

        Ok(booking)
    }

    /// List bookings made by the user (renter view)
    pub async fn list_for_renter(
        &self,
        renter_id: Uuid,
    ) -> Result<Vec<BookingWithDetails>, BookingError> {
        let pool = self.db_pool.clone();
        let bookings = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT b.*, m.name AS machinery_name, m.machinery_type,
                           m.owner_id AS machinery_owner_id,
                           u.name AS renter_name, u.email AS renter_email
                    FROM bookings b
                    JOIN machinery m ON m.id = b.machinery_id
                    JOIN users u ON u.id = b.renter_id
                    WHERE b.renter_id = $1
                    ORDER BY b.created_at DESC
                    "#,
                )
                .bind(renter_id)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        Ok(bookings)
    }

    /// List bookings on machinery owned by the user (owner view)
    pub async fn list_for_owner(
        &self,
        owner_id: Uuid,
    ) -> Result<Vec<BookingWithDetails>, BookingError> {
        let pool = self.db_pool.clone();
        let bookings = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT b.*, m.name AS machinery_name, m.machinery_type,
                           m.owner_id AS machinery_owner_id,
                           u.name AS renter_name, u.email AS renter_email
                    FROM bookings b
                    JOIN machinery m ON m.id = b.machinery_id
                    JOIN users u ON u.id = b.renter_id
                    WHERE m.owner_id = $1
                    ORDER BY b.created_at DESC
                    "#,
                )
                .bind(owner_id)
                .fetch_all(&pool)
                .await
            }
        })
        .await?;

        Ok(bookings)
    }

    // ===== Private helpers =====

    async fn fetch_machinery(&self, id: Uuid) -> Result<Option<Machinery>, BookingError> {
        let pool = self.db_pool.clone();
        let machinery = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT * FROM machinery WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(machinery)
    }

    async fn fetch_booking(&self, id: Uuid) -> Result<Option<Booking>, BookingError> {
        let pool = self.db_pool.clone();
        let booking = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        Ok(booking)
    }

    async fn fetch_details(&self, id: Uuid) -> Result<Option<BookingWithDetails>, BookingError> {
        let pool = self.db_pool.clone();
        let booking = with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query_as(
                    r#"
                    SELECT b.*, m.name AS machinery_name, m.machinery_type,
                           m.owner_id AS machinery_owner_id,
                           u.name AS renter_name, u.email AS renter_email
                    FROM bookings b
                    JOIN machinery m ON m.id = b.machinery_id
                    JOIN users u ON u.id = b.renter_id
                    WHERE b.id = $1
                    "#,
                )
                .bind(id)
                .fetch_optional(&pool)
                .await
            }
        })
        .await?;

        Ok(booking)
    }

    async fn update_status(
        &self,
        booking_id: Uuid,
        status: BookingStatus,
    ) -> Result<(), BookingError> {
        let pool = self.db_pool.clone();
        with_retry(&self.retry_policy, || {
            let pool = pool.clone();
            async move {
                sqlx::query("UPDATE bookings SET status = $1, updated_at = $2 WHERE id = $3")
                    .bind(status)
                    .bind(Utc::now())
                    .bind(booking_id)
                    .execute(&pool)
                    .await
            }
        })
        .await?;

        Ok(())
    }
}
