//! Booking-related API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::AuthenticatedUser;
use crate::booking::{
    BookingEvent, BookingWithDetails, CreateBookingRequest, ListBookingsQuery,
    TransitionBookingRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/bookings - Request a booking for a time window
pub async fn create_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingWithDetails>), ApiError> {
    let booking = state.booking_service.create_booking(user.user_id, req).await?;

    state
        .ws_state
        .broadcast_event(BookingEvent::Created {
            booking_id: booking.id,
            machinery_id: booking.machinery_id,
            renter_id: booking.renter_id,
        })
        .await;

    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /api/bookings?role=renter|owner - List bookings for the caller
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<Vec<BookingWithDetails>>, ApiError> {
    let bookings = match query.role.as_deref() {
        Some("owner") => state.booking_service.list_for_owner(user.user_id).await?,
        _ => state.booking_service.list_for_renter(user.user_id).await?,
    };

    Ok(Json(bookings))
}

/// GET /api/bookings/:id - Booking detail (renter or listing owner)
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<BookingWithDetails>, ApiError> {
    let booking = state.booking_service.get_booking(id, user.user_id).await?;

    Ok(Json(booking))
}

/// PUT /api/bookings/:id/status - Approve, reject, or cancel a booking
pub async fn transition_booking(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TransitionBookingRequest>,
) -> Result<Json<BookingWithDetails>, ApiError> {
    let booking = state
        .booking_service
        .transition_booking(id, user.user_id, req.status)
        .await?;

    state
        .ws_state
        .broadcast_event(BookingEvent::StatusChanged {
            booking_id: booking.id,
            status: booking.status,
        })
        .await;

    Ok(Json(booking))
}
