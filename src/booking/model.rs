//! Booking models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::machinery::MachineryType;

/// Booking lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "booking_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    /// Created by a renter, awaiting the owner's decision
    Pending,
    /// Approved by the listing owner
    Confirmed,
    /// Declined by the listing owner
    Rejected,
    /// Rental finished; the booking may now receive a review
    Completed,
    /// Withdrawn by the renter (or the owner, while still pending)
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Booking {
    pub id: Uuid,
    pub machinery_id: Uuid,
    pub renter_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub total_price: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating a booking
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub machinery_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub notes: Option<String>,
}

/// Status a caller may transition a booking to
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransitionTarget {
    Confirmed,
    Rejected,
    Cancelled,
}

impl TransitionTarget {
    pub fn as_status(&self) -> BookingStatus {
        match self {
            TransitionTarget::Confirmed => BookingStatus::Confirmed,
            TransitionTarget::Rejected => BookingStatus::Rejected,
            TransitionTarget::Cancelled => BookingStatus::Cancelled,
        }
    }
}

/// Request DTO for the status transition endpoint
#[derive(Debug, Deserialize)]
pub struct TransitionBookingRequest {
    pub status: TransitionTarget,
}

/// Query parameters for listing bookings
#[derive(Debug, Default, Deserialize)]
pub struct ListBookingsQuery {
    /// `renter` (default) lists the caller's own bookings; `owner` lists
    /// bookings on machinery the caller owns
    pub role: Option<String>,
}

/// Booking with its listing and renter identity attached
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct BookingWithDetails {
    pub id: Uuid,
    pub machinery_id: Uuid,
    pub renter_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub total_price: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub machinery_name: String,
    pub machinery_type: MachineryType,
    pub machinery_owner_id: Uuid,
    pub renter_name: String,
    pub renter_email: String,
}

/// Booking event types for real-time updates
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type")]
pub enum BookingEvent {
    Created {
        booking_id: Uuid,
        machinery_id: Uuid,
        renter_id: Uuid,
    },
    StatusChanged {
        booking_id: Uuid,
        status: BookingStatus,
    },
}

impl BookingEvent {
    /// Booking this event refers to (for subscription filtering)
    pub fn booking_id(&self) -> Uuid {
        match self {
            BookingEvent::Created { booking_id, .. }
            | BookingEvent::StatusChanged { booking_id, .. } => *booking_id,
        }
    }
}
