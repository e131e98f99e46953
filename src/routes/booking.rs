//! Booking route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::booking;
use crate::state::AppState;

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/api/bookings", post(booking::create_booking))
        .route("/api/bookings", get(booking::list_bookings))
        .route("/api/bookings/:id", get(booking::get_booking))
        .route("/api/bookings/:id/status", put(booking::transition_booking))
}
